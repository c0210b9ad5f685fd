use std::collections::{BTreeMap, HashMap};

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use tiddly_model::{Bag, History, Recipe, Revision, Tiddler};

use crate::error::{StoreError, StoreResult};
use crate::traits::TiddlerStore;

/// Revision chain of one tiddler.
#[derive(Debug, Default)]
struct Chain {
    latest: Option<Revision>,
    revisions: BTreeMap<Revision, Tiddler>,
}

#[derive(Debug)]
struct BagSlot {
    bag: Bag,
    tiddlers: HashMap<String, Chain>,
}

#[derive(Debug, Default)]
struct Inner {
    bags: HashMap<String, BagSlot>,
    recipes: HashMap<String, Recipe>,
}

impl Inner {
    fn slot(&self, bag: &str) -> StoreResult<&BagSlot> {
        self.bags
            .get(bag)
            .ok_or_else(|| StoreError::BagNotFound(bag.to_string()))
    }

    fn chain(&self, bag: &str, title: &str) -> StoreResult<&Chain> {
        self.slot(bag)?
            .tiddlers
            .get(title)
            .filter(|chain| !chain.revisions.is_empty())
            .ok_or_else(|| StoreError::TiddlerNotFound {
                bag: bag.to_string(),
                title: title.to_string(),
                revision: None,
            })
    }
}

/// In-memory, HashMap-based revision store.
///
/// Intended for tests, demos, and embedding. All state sits behind a single
/// `tokio::sync::RwLock`; revision assignment happens while holding the
/// write lock, which makes it atomic per key.
#[derive(Default)]
pub struct InMemoryStore {
    inner: RwLock<Inner>,
}

impl InMemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored revisions across all bags.
    pub async fn revision_count(&self) -> usize {
        let inner = self.inner.read().await;
        inner
            .bags
            .values()
            .flat_map(|slot| slot.tiddlers.values())
            .map(|chain| chain.revisions.len())
            .sum()
    }
}

#[async_trait]
impl TiddlerStore for InMemoryStore {
    async fn get_unit(
        &self,
        bag: &str,
        title: &str,
        revision: Option<Revision>,
    ) -> StoreResult<Tiddler> {
        let inner = self.inner.read().await;
        let chain = inner.chain(bag, title)?;
        let wanted = revision.or(chain.latest);
        wanted
            .and_then(|rev| chain.revisions.get(&rev))
            .cloned()
            .ok_or_else(|| StoreError::TiddlerNotFound {
                bag: bag.to_string(),
                title: title.to_string(),
                revision,
            })
    }

    async fn put_unit(&self, unit: &Tiddler, expected: Option<Revision>) -> StoreResult<Revision> {
        unit.validate()?;
        let bag_name = unit.bag.clone().ok_or_else(|| StoreError::NoBag {
            bag: String::new(),
            title: unit.title.clone(),
        })?;

        let mut inner = self.inner.write().await;
        let slot = inner.bags.get_mut(&bag_name).ok_or_else(|| StoreError::NoBag {
            bag: bag_name.clone(),
            title: unit.title.clone(),
        })?;
        let history = slot.bag.history;

        if let Some(expected) = expected {
            let latest = slot.tiddlers.get(&unit.title).and_then(|chain| chain.latest);
            if latest != Some(expected) {
                return Err(StoreError::RevisionConflict {
                    bag: bag_name,
                    title: unit.title.clone(),
                    expected,
                    actual: latest,
                });
            }
        }
        let chain = slot.tiddlers.entry(unit.title.clone()).or_default();

        let revision = chain.latest.map(|r| r.next()).unwrap_or(Revision::FIRST);
        let created = chain
            .revisions
            .values()
            .next()
            .and_then(|first| first.created)
            .or(unit.created)
            .or(unit.modified);

        let mut stored = unit.clone();
        stored.revision = Some(revision);
        stored.created = created;

        if history == History::LatestOnly {
            chain.revisions.clear();
        }
        chain.revisions.insert(revision, stored);
        chain.latest = Some(revision);

        debug!(bag = %bag_name, title = %unit.title, revision = revision.get(), "stored revision");
        Ok(revision)
    }

    async fn list_revisions(&self, bag: &str, title: &str) -> StoreResult<Vec<Revision>> {
        let inner = self.inner.read().await;
        let chain = inner.chain(bag, title)?;
        Ok(chain.revisions.keys().copied().collect())
    }

    async fn list_units(&self, bag: &str) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        let slot = inner.slot(bag)?;
        let mut titles: Vec<String> = slot
            .tiddlers
            .iter()
            .filter(|(_, chain)| !chain.revisions.is_empty())
            .map(|(title, _)| title.clone())
            .collect();
        titles.sort();
        Ok(titles)
    }

    async fn has_unit(&self, bag: &str, title: &str) -> StoreResult<bool> {
        let inner = self.inner.read().await;
        Ok(inner.chain(bag, title).is_ok())
    }

    async fn delete_unit(&self, bag: &str, title: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        let slot = inner
            .bags
            .get_mut(bag)
            .ok_or_else(|| StoreError::BagNotFound(bag.to_string()))?;
        match slot.tiddlers.remove(title) {
            Some(chain) if !chain.revisions.is_empty() => {
                debug!(bag, title, revisions = chain.revisions.len(), "deleted tiddler");
                Ok(())
            }
            _ => Err(StoreError::TiddlerNotFound {
                bag: bag.to_string(),
                title: title.to_string(),
                revision: None,
            }),
        }
    }

    async fn get_bag(&self, name: &str) -> StoreResult<Bag> {
        let inner = self.inner.read().await;
        Ok(inner.slot(name)?.bag.clone())
    }

    async fn put_bag(&self, bag: &Bag) -> StoreResult<()> {
        bag.validate()?;
        if bag.ephemeral {
            return Err(StoreError::EphemeralBag(bag.name.clone()));
        }
        let mut inner = self.inner.write().await;
        match inner.bags.get_mut(&bag.name) {
            Some(slot) => {
                if bag.history == History::LatestOnly {
                    for chain in slot.tiddlers.values_mut() {
                        if let Some(latest) = chain.latest {
                            chain.revisions.retain(|rev, _| *rev == latest);
                        }
                    }
                }
                slot.bag = bag.clone();
            }
            None => {
                inner.bags.insert(
                    bag.name.clone(),
                    BagSlot {
                        bag: bag.clone(),
                        tiddlers: HashMap::new(),
                    },
                );
            }
        }
        debug!(bag = %bag.name, "stored bag");
        Ok(())
    }

    async fn delete_bag(&self, name: &str) -> StoreResult<()> {
        let mut inner = self.inner.write().await;
        if inner.bags.remove(name).is_none() {
            return Err(StoreError::BagNotFound(name.to_string()));
        }
        debug!(bag = name, "deleted bag");
        Ok(())
    }

    async fn list_bags(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner.bags.keys().cloned().collect();
        names.sort();
        Ok(names)
    }

    async fn get_recipe(&self, name: &str) -> StoreResult<Recipe> {
        let inner = self.inner.read().await;
        inner
            .recipes
            .get(name)
            .cloned()
            .ok_or_else(|| StoreError::RecipeNotFound(name.to_string()))
    }

    async fn put_recipe(&self, recipe: &Recipe) -> StoreResult<()> {
        recipe.validate()?;
        let mut inner = self.inner.write().await;
        inner.recipes.insert(recipe.name.clone(), recipe.clone());
        debug!(recipe = %recipe.name, entries = recipe.entries.len(), "stored recipe");
        Ok(())
    }

    async fn list_recipes(&self) -> StoreResult<Vec<String>> {
        let inner = self.inner.read().await;
        let mut names: Vec<String> = inner.recipes.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl std::fmt::Debug for InMemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InMemoryStore").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use std::sync::Arc;

    fn soup(text: &str) -> Tiddler {
        Tiddler::in_bag("soup", "cooking").unwrap().with_text(text)
    }

    async fn store_with_bag() -> InMemoryStore {
        let store = InMemoryStore::new();
        store.put_bag(&Bag::new("cooking").unwrap()).await.unwrap();
        store
    }

    fn rev(n: i64) -> Revision {
        Revision::new(n).unwrap()
    }

    // -----------------------------------------------------------------------
    // Revision assignment
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn revisions_start_at_one_and_increase() {
        let store = store_with_bag().await;
        assert_eq!(store.put_unit(&soup("a"), None).await.unwrap(), rev(1));
        assert_eq!(store.put_unit(&soup("b"), None).await.unwrap(), rev(2));
        assert_eq!(store.put_unit(&soup("c"), None).await.unwrap(), rev(3));
        assert_eq!(
            store.list_revisions("cooking", "soup").await.unwrap(),
            vec![rev(1), rev(2), rev(3)]
        );
    }

    #[tokio::test]
    async fn old_revisions_are_immutable() {
        let store = store_with_bag().await;
        store.put_unit(&soup("first"), None).await.unwrap();
        store.put_unit(&soup("second"), None).await.unwrap();

        let first = store.get_unit("cooking", "soup", Some(rev(1))).await.unwrap();
        assert_eq!(first.text, "first");
        assert_eq!(first.revision, Some(rev(1)));

        let latest = store.get_unit("cooking", "soup", None).await.unwrap();
        assert_eq!(latest.text, "second");
        assert_eq!(latest.revision, Some(rev(2)));
    }

    #[tokio::test]
    async fn created_is_carried_forward() {
        let store = store_with_bag().await;
        let mut first = soup("a");
        let stamp: DateTime<Utc> = "2024-01-02T03:04:05Z".parse().unwrap();
        first.modified = Some(stamp);
        store.put_unit(&first, None).await.unwrap();
        store.put_unit(&soup("b"), None).await.unwrap();
        let latest = store.get_unit("cooking", "soup", None).await.unwrap();
        assert_eq!(latest.created, Some(stamp));
    }

    #[tokio::test]
    async fn concurrent_writers_get_distinct_revisions() {
        let store = Arc::new(store_with_bag().await);
        let handles: Vec<_> = (0..32)
            .map(|i| {
                let store = Arc::clone(&store);
                tokio::spawn(async move { store.put_unit(&soup(&i.to_string()), None).await })
            })
            .collect();

        let mut assigned = Vec::new();
        for h in handles {
            assigned.push(h.await.unwrap().unwrap().get());
        }
        assigned.sort();
        assert_eq!(assigned, (1..=32).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn expected_revision_mismatch_conflicts() {
        let store = store_with_bag().await;
        store.put_unit(&soup("a"), None).await.unwrap();
        store.put_unit(&soup("b"), Some(rev(1))).await.unwrap();

        let err = store.put_unit(&soup("stale"), Some(rev(1))).await.unwrap_err();
        assert!(matches!(
            err,
            StoreError::RevisionConflict { actual: Some(a), .. } if a == rev(2)
        ));
        assert_eq!(store.list_revisions("cooking", "soup").await.unwrap().len(), 2);
    }

    #[tokio::test]
    async fn conflicted_put_on_new_title_leaves_nothing_behind() {
        let store = store_with_bag().await;
        let err = store.put_unit(&soup("a"), Some(rev(3))).await.unwrap_err();
        assert!(matches!(err, StoreError::RevisionConflict { actual: None, .. }));
        assert!(!store.has_unit("cooking", "soup").await.unwrap());
        assert!(store.inner.read().await.bags["cooking"].tiddlers.is_empty());
    }

    // -----------------------------------------------------------------------
    // Missing entities
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn put_into_missing_bag_is_no_bag() {
        let store = InMemoryStore::new();
        let err = store.put_unit(&soup("a"), None).await.unwrap_err();
        assert!(matches!(err, StoreError::NoBag { ref bag, .. } if bag == "cooking"));
    }

    #[tokio::test]
    async fn get_missing_tiddler_and_revision() {
        let store = store_with_bag().await;
        assert!(matches!(
            store.get_unit("cooking", "soup", None).await,
            Err(StoreError::TiddlerNotFound { .. })
        ));
        store.put_unit(&soup("a"), None).await.unwrap();
        let err = store.get_unit("cooking", "soup", Some(rev(5))).await.unwrap_err();
        assert!(matches!(err, StoreError::TiddlerNotFound { revision: Some(r), .. } if r == rev(5)));
        assert!(matches!(
            store.get_unit("nowhere", "soup", None).await,
            Err(StoreError::BagNotFound(_))
        ));
    }

    #[tokio::test]
    async fn has_and_list_units() {
        let store = store_with_bag().await;
        assert!(!store.has_unit("cooking", "soup").await.unwrap());
        store.put_unit(&soup("a"), None).await.unwrap();
        store
            .put_unit(&Tiddler::in_bag("bread", "cooking").unwrap(), None)
            .await
            .unwrap();
        assert!(store.has_unit("cooking", "soup").await.unwrap());
        assert!(!store.has_unit("missing", "soup").await.unwrap());
        assert_eq!(store.list_units("cooking").await.unwrap(), ["bread", "soup"]);
    }

    // -----------------------------------------------------------------------
    // Deletion and history modes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn delete_removes_all_revisions() {
        let store = store_with_bag().await;
        store.put_unit(&soup("a"), None).await.unwrap();
        store.put_unit(&soup("b"), None).await.unwrap();
        store.delete_unit("cooking", "soup").await.unwrap();
        assert!(!store.has_unit("cooking", "soup").await.unwrap());
        assert!(store.list_revisions("cooking", "soup").await.is_err());
        assert!(store.delete_unit("cooking", "soup").await.is_err());

        // A new write starts a fresh chain.
        assert_eq!(store.put_unit(&soup("c"), None).await.unwrap(), rev(1));
    }

    #[tokio::test]
    async fn latest_only_bag_keeps_one_revision() {
        let store = InMemoryStore::new();
        let bag = Bag::new("cooking").unwrap().with_history(History::LatestOnly);
        store.put_bag(&bag).await.unwrap();
        store.put_unit(&soup("a"), None).await.unwrap();
        let second = store.put_unit(&soup("b"), None).await.unwrap();
        assert_eq!(second, rev(2));
        assert_eq!(store.list_revisions("cooking", "soup").await.unwrap(), [rev(2)]);
        assert!(store.get_unit("cooking", "soup", Some(rev(1))).await.is_err());
        assert_eq!(store.revision_count().await, 1);
    }

    #[tokio::test]
    async fn switching_to_latest_only_prunes() {
        let store = store_with_bag().await;
        store.put_unit(&soup("a"), None).await.unwrap();
        store.put_unit(&soup("b"), None).await.unwrap();
        let bag = Bag::new("cooking").unwrap().with_history(History::LatestOnly);
        store.put_bag(&bag).await.unwrap();
        assert_eq!(store.list_revisions("cooking", "soup").await.unwrap(), [rev(2)]);
    }

    // -----------------------------------------------------------------------
    // Bags and recipes
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn ephemeral_bags_are_rejected() {
        let store = InMemoryStore::new();
        let err = store.put_bag(&Bag::ephemeral("tmp").unwrap()).await.unwrap_err();
        assert!(matches!(err, StoreError::EphemeralBag(_)));
        assert!(store.list_bags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn replacing_bag_keeps_tiddlers() {
        let store = store_with_bag().await;
        store.put_unit(&soup("a"), None).await.unwrap();
        let updated = Bag::new("cooking").unwrap().with_description("recipes");
        store.put_bag(&updated).await.unwrap();
        assert_eq!(store.get_bag("cooking").await.unwrap().description, "recipes");
        assert!(store.has_unit("cooking", "soup").await.unwrap());
    }

    #[tokio::test]
    async fn delete_bag_removes_contents() {
        let store = store_with_bag().await;
        store.put_unit(&soup("a"), None).await.unwrap();
        store.delete_bag("cooking").await.unwrap();
        assert!(!store.has_bag("cooking").await.unwrap());
        assert!(store.delete_bag("cooking").await.is_err());
    }

    #[tokio::test]
    async fn recipes_round_trip() {
        let store = InMemoryStore::new();
        let recipe = Recipe::new("dinner")
            .unwrap()
            .with_entry(tiddly_model::RecipeEntry::new("base"));
        store.put_recipe(&recipe).await.unwrap();
        assert_eq!(store.get_recipe("dinner").await.unwrap(), recipe);
        assert_eq!(store.list_recipes().await.unwrap(), ["dinner"]);
        assert!(matches!(
            store.get_recipe("lunch").await,
            Err(StoreError::RecipeNotFound(_))
        ));
    }
}
