//! Recipe filters and bag resolution for Tiddly Store.
//!
//! A recipe is an ordered list of bags, each optionally narrowed by a
//! [`Filter`]. The [`RecipeResolver`] answers three questions about it:
//!
//! - [`RecipeResolver::resolve`]: which bag holds this title right now?
//! - [`RecipeResolver::resolve_for_write`]: which bag would a new tiddler
//!   land in, for this principal?
//! - [`RecipeResolver::enumerate`]: which titles are visible, and from where?
//!
//! All three treat the last-listed entry as the most specific one.

pub mod error;
pub mod filter;
pub mod resolver;

pub use error::{RecipeError, RecipeResult};
pub use filter::Filter;
pub use resolver::{CompiledRecipe, RecipeResolver};
