//! Revision store interface for Tiddly Store.
//!
//! The core never talks to a database directly. It consumes the
//! [`TiddlerStore`] trait, which persists tiddler revisions, bags, and
//! recipes. Backends own durability, atomic revision assignment, and
//! timeouts; the core only awaits their results.
//!
//! # Storage Backends
//!
//! - [`InMemoryStore`] -- `HashMap`-based store for tests and embedding
//!
//! # Design Rules
//!
//! 1. Revisions are immutable once written; a write always appends.
//! 2. Revision numbers per `(bag, title)` start at 1 and never repeat.
//! 3. Writes to a missing bag fail with [`StoreError::NoBag`].
//! 4. Ephemeral bags are never persisted.
//! 5. Backend failures are propagated, never silently ignored.

pub mod error;
pub mod memory;
pub mod traits;

pub use error::{StoreError, StoreResult};
pub use memory::InMemoryStore;
pub use traits::TiddlerStore;
