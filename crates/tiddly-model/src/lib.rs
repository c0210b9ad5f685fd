//! Entity model for Tiddly Store.
//!
//! Every other crate in the workspace depends on `tiddly-model`. It defines
//! the entities and their invariants and nothing else: no storage, no
//! policy evaluation, no wire formats.
//!
//! # Key Types
//!
//! - [`Tiddler`] -- a named, versioned unit of content
//! - [`Revision`] -- store-assigned revision number (always `>= 1`)
//! - [`Bag`] -- a named container of tiddlers with a [`Policy`]
//! - [`Recipe`] -- an ordered list of bags, optionally filtered
//! - [`Policy`] -- read/write/create/delete/manage permission lists
//! - [`Principal`] -- the identity issuing an operation

pub mod bag;
pub mod error;
pub mod names;
pub mod policy;
pub mod principal;
pub mod recipe;
pub mod tiddler;

pub use bag::{Bag, History};
pub use error::{ModelError, ModelResult};
pub use policy::{Operation, Policy};
pub use principal::Principal;
pub use recipe::{Recipe, RecipeEntry};
pub use tiddler::{Revision, Tiddler};
