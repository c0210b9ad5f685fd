//! Operation orchestrator for Tiddly Store.
//!
//! Every request names a tiddler plus a bag or a recipe. The
//! [`Orchestrator`] resolves the recipe to a bag, checks the bag's policy
//! for the requested operation, and only then touches the store:
//!
//! ```text
//! RESOLVING ──▶ AUTHORIZING ──▶ EXECUTING ──▶ DONE
//!     │              │              │
//!     └──────────────┴──────────────┴───────▶ FAILED
//! ```
//!
//! Failures come back as a [`CoreError`] whose [`ErrorKind`] tells the
//! transport which outward signal to use.

pub mod config;
pub mod error;
pub mod orchestrator;
pub mod phase;
pub mod target;

pub use config::{CoreConfig, CreatePolicy};
pub use error::{CoreError, CoreResult, ErrorKind, Location};
pub use orchestrator::{Orchestrator, Precondition, Rendered, TiddlerPut, Written};
pub use phase::Phase;
pub use target::Target;
