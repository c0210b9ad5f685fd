use async_trait::async_trait;
use tiddly_model::{Bag, Recipe, Revision, Tiddler};

use crate::error::StoreResult;

/// Persistence contract for tiddlers, bags, and recipes.
///
/// Every method is a potential suspension point (disk or network I/O).
/// Implementations must satisfy these invariants:
/// - Revisions are assigned by the store, start at 1, and increase by one
///   per write to the same `(bag, title)`. Assignment is atomic: concurrent
///   writers to one key never receive the same number.
/// - A stored revision is immutable.
/// - `put_unit` on a missing bag fails with `NoBag`, never creates the bag.
/// - Ephemeral bags are rejected by `put_bag`.
/// - Timeouts and backend failures surface as `Unavailable`; the store does
///   not hide them behind not-found results.
#[async_trait]
pub trait TiddlerStore: Send + Sync {
    /// Fetch a tiddler. `revision = None` selects the latest revision.
    async fn get_unit(
        &self,
        bag: &str,
        title: &str,
        revision: Option<Revision>,
    ) -> StoreResult<Tiddler>;

    /// Store a new revision of `unit` in `unit.bag` and return its number.
    ///
    /// If `expected` is set, the write only succeeds when it is the current
    /// latest revision; otherwise `RevisionConflict` is returned. With
    /// `expected = None` the write always appends.
    async fn put_unit(&self, unit: &Tiddler, expected: Option<Revision>) -> StoreResult<Revision>;

    /// Revision numbers of a tiddler, oldest first.
    async fn list_revisions(&self, bag: &str, title: &str) -> StoreResult<Vec<Revision>>;

    /// Titles held by a bag, sorted.
    async fn list_units(&self, bag: &str) -> StoreResult<Vec<String>>;

    /// Whether the bag currently holds a tiddler with this title.
    async fn has_unit(&self, bag: &str, title: &str) -> StoreResult<bool>;

    /// Remove a tiddler and all of its revisions.
    async fn delete_unit(&self, bag: &str, title: &str) -> StoreResult<()>;

    async fn get_bag(&self, name: &str) -> StoreResult<Bag>;

    /// Create or replace a bag definition. Existing tiddlers are kept.
    async fn put_bag(&self, bag: &Bag) -> StoreResult<()>;

    /// Remove a bag and every tiddler in it.
    async fn delete_bag(&self, name: &str) -> StoreResult<()>;

    /// All bag names, sorted.
    async fn list_bags(&self) -> StoreResult<Vec<String>>;

    async fn get_recipe(&self, name: &str) -> StoreResult<Recipe>;

    /// Create or replace a recipe definition.
    async fn put_recipe(&self, recipe: &Recipe) -> StoreResult<()>;

    /// All recipe names, sorted.
    async fn list_recipes(&self) -> StoreResult<Vec<String>>;

    /// Whether a bag with this name exists.
    async fn has_bag(&self, name: &str) -> StoreResult<bool> {
        match self.get_bag(name).await {
            Ok(_) => Ok(true),
            Err(crate::StoreError::BagNotFound(_)) => Ok(false),
            Err(e) => Err(e),
        }
    }
}
