//! Policy engine for Tiddly Store.
//!
//! Every store access with semantic meaning is preceded by a policy check:
//! read before fetch, write (and create) before a put, delete before
//! removal, manage before changing a bag or recipe definition.
//!
//! ```rust
//! use tiddly_model::{Bag, Operation, Policy, Principal};
//! use tiddly_policy::PolicyEngine;
//!
//! let engine = PolicyEngine::default();
//! let bag = Bag::new("cooking")
//!     .unwrap()
//!     .with_policy(Policy::open().with(Operation::Write, &["alice"]));
//! assert!(engine.check(&bag, Operation::Write, &Principal::user("alice")).is_allowed());
//! assert!(!engine.check(&bag, Operation::Write, &Principal::user("bob")).is_allowed());
//! ```

pub mod config;
pub mod engine;
pub mod error;

pub use config::PolicyConfig;
pub use engine::{Decision, Governed, PolicyEngine};
pub use error::{PolicyError, PolicyResult};
