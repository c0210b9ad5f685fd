use std::collections::BTreeMap;

use tracing::{debug, warn};

use tiddly_model::{Bag, Operation, Principal, Recipe, Tiddler};
use tiddly_policy::{PolicyEngine, PolicyError};
use tiddly_store::{StoreError, TiddlerStore};

use crate::error::{RecipeError, RecipeResult};
use crate::filter::Filter;

// ---------------------------------------------------------------------------
// CompiledRecipe
// ---------------------------------------------------------------------------

/// A recipe whose filters have been parsed.
///
/// Compiling validates every filter up front, so a malformed filter is
/// reported when the recipe is stored rather than on first use.
#[derive(Clone, Debug)]
pub struct CompiledRecipe {
    recipe: Recipe,
    filters: Vec<Option<Filter>>,
}

impl CompiledRecipe {
    pub fn compile(recipe: Recipe) -> RecipeResult<Self> {
        let filters = recipe
            .entries
            .iter()
            .map(|entry| entry.filter().map(Filter::parse).transpose())
            .collect::<RecipeResult<Vec<_>>>()?;
        Ok(Self { recipe, filters })
    }

    pub fn recipe(&self) -> &Recipe {
        &self.recipe
    }

    pub fn name(&self) -> &str {
        &self.recipe.name
    }

    /// Entries from last to first: the order in which overrides apply.
    fn entries_newest_first(&self) -> impl Iterator<Item = (&str, Option<&Filter>)> {
        self.recipe
            .entries
            .iter()
            .zip(&self.filters)
            .rev()
            .map(|(entry, filter)| (entry.bag.as_str(), filter.as_ref()))
    }
}

// ---------------------------------------------------------------------------
// RecipeResolver
// ---------------------------------------------------------------------------

/// Maps tiddler titles to bags through a recipe.
///
/// The last-listed entry always wins. Read resolution, write resolution, and
/// enumeration all walk in that same direction.
pub struct RecipeResolver<'a, S: TiddlerStore + ?Sized> {
    store: &'a S,
    policy: &'a PolicyEngine,
}

impl<'a, S: TiddlerStore + ?Sized> RecipeResolver<'a, S> {
    pub fn new(store: &'a S, policy: &'a PolicyEngine) -> Self {
        Self { store, policy }
    }

    /// Find the bag that currently holds `title`.
    ///
    /// Walks entries from last to first. An entry is considered when its
    /// filter is absent or matches; the first such bag that holds the title
    /// wins.
    pub async fn resolve(&self, recipe: &CompiledRecipe, title: &str) -> RecipeResult<Bag> {
        for (bag, filter) in recipe.entries_newest_first() {
            if let Some(false) = filter.and_then(|f| f.matches_title(title)) {
                continue;
            }
            if !self.store.has_unit(bag, title).await? {
                continue;
            }
            if let Some(filter) = filter.filter(|f| f.needs_content()) {
                let stored = self.store.get_unit(bag, title, None).await?;
                if !filter.matches(&stored) {
                    continue;
                }
            }
            debug!(recipe = recipe.name(), title, bag, "resolved tiddler");
            return Ok(self.store.get_bag(bag).await?);
        }

        Err(RecipeError::NotFound {
            recipe: recipe.name().to_string(),
            title: title.to_string(),
        })
    }

    /// Find the bag a new tiddler would land in.
    ///
    /// Walks entries from last to first and returns the first bag whose
    /// filter accepts `candidate`, which exists, and whose policy lets
    /// `principal` both write and create. Existence of the title anywhere in
    /// the recipe is not consulted.
    pub async fn resolve_for_write(
        &self,
        recipe: &CompiledRecipe,
        candidate: &Tiddler,
        principal: &Principal,
    ) -> RecipeResult<Bag> {
        let mut first_denial: Option<PolicyError> = None;

        for (bag_name, filter) in recipe.entries_newest_first() {
            if filter.is_some_and(|f| !f.matches(candidate)) {
                continue;
            }
            let bag = match self.store.get_bag(bag_name).await {
                Ok(bag) => bag,
                Err(StoreError::BagNotFound(_)) => {
                    warn!(recipe = recipe.name(), bag = bag_name, "recipe references missing bag");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            let allowed = self
                .policy
                .require(&bag, Operation::Write, principal)
                .and_then(|()| self.policy.require(&bag, Operation::Create, principal));
            match allowed {
                Ok(()) => {
                    debug!(
                        recipe = recipe.name(),
                        title = %candidate.title,
                        bag = bag_name,
                        "resolved write target"
                    );
                    return Ok(bag);
                }
                Err(denial) => {
                    first_denial.get_or_insert(denial);
                }
            }
        }

        match first_denial {
            Some(denial) => Err(RecipeError::Forbidden(denial)),
            None => Err(RecipeError::NoWritableBag {
                recipe: recipe.name().to_string(),
                title: candidate.title.clone(),
            }),
        }
    }

    /// Every title visible through the recipe with the bag it resolves to,
    /// sorted by title.
    ///
    /// Entries are applied first to last so later bags override earlier
    /// ones, which agrees with [`Self::resolve`] for every title.
    pub async fn enumerate(&self, recipe: &CompiledRecipe) -> RecipeResult<Vec<(String, String)>> {
        let mut visible: BTreeMap<String, String> = BTreeMap::new();

        for (entry, filter) in recipe.recipe.entries.iter().zip(&recipe.filters) {
            let titles = match self.store.list_units(&entry.bag).await {
                Ok(titles) => titles,
                Err(StoreError::BagNotFound(_)) => {
                    warn!(recipe = recipe.name(), bag = %entry.bag, "recipe references missing bag");
                    continue;
                }
                Err(e) => return Err(e.into()),
            };
            for title in titles {
                if let Some(filter) = filter {
                    let hit = match filter.matches_title(&title) {
                        Some(hit) => hit,
                        None => {
                            let stored = self.store.get_unit(&entry.bag, &title, None).await?;
                            filter.matches(&stored)
                        }
                    };
                    if !hit {
                        continue;
                    }
                }
                visible.insert(title, entry.bag.clone());
            }
        }

        Ok(visible.into_iter().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tiddly_model::{Policy, RecipeEntry};
    use tiddly_store::InMemoryStore;

    async fn put(store: &InMemoryStore, bag: &str, title: &str, tags: &[&str]) {
        let t = Tiddler::in_bag(title, bag)
            .unwrap()
            .with_text(format!("{title} in {bag}"))
            .with_tags(tags.iter().copied());
        store.put_unit(&t, None).await.unwrap();
    }

    async fn bags(store: &InMemoryStore, names: &[&str]) {
        for name in names {
            store.put_bag(&Bag::new(*name).unwrap()).await.unwrap();
        }
    }

    fn recipe(entries: Vec<RecipeEntry>) -> CompiledRecipe {
        let mut r = Recipe::new("dinner").unwrap();
        r.entries = entries;
        CompiledRecipe::compile(r).unwrap()
    }

    // -----------------------------------------------------------------------
    // Read resolution
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn resolves_to_only_holder() {
        let store = InMemoryStore::new();
        let engine = PolicyEngine::default();
        bags(&store, &["base", "cooking"]).await;
        put(&store, "cooking", "soup", &[]).await;

        let r = recipe(vec![RecipeEntry::new("base"), RecipeEntry::new("cooking")]);
        let bag = RecipeResolver::new(&store, &engine).resolve(&r, "soup").await.unwrap();
        assert_eq!(bag.name, "cooking");
    }

    #[tokio::test]
    async fn last_listed_bag_wins() {
        let store = InMemoryStore::new();
        let engine = PolicyEngine::default();
        bags(&store, &["base", "cooking"]).await;
        put(&store, "base", "soup", &[]).await;
        put(&store, "cooking", "soup", &[]).await;

        let resolver = RecipeResolver::new(&store, &engine);
        let forward = recipe(vec![RecipeEntry::new("base"), RecipeEntry::new("cooking")]);
        assert_eq!(resolver.resolve(&forward, "soup").await.unwrap().name, "cooking");
        let reversed = recipe(vec![RecipeEntry::new("cooking"), RecipeEntry::new("base")]);
        assert_eq!(resolver.resolve(&reversed, "soup").await.unwrap().name, "base");
    }

    #[tokio::test]
    async fn filter_skips_non_matching_entry() {
        let store = InMemoryStore::new();
        let engine = PolicyEngine::default();
        bags(&store, &["base", "cooking"]).await;
        put(&store, "base", "soup", &[]).await;
        put(&store, "cooking", "soup", &["draft"]).await;

        let r = recipe(vec![
            RecipeEntry::new("base"),
            RecipeEntry::filtered("cooking", "!tag:draft"),
        ]);
        let bag = RecipeResolver::new(&store, &engine).resolve(&r, "soup").await.unwrap();
        assert_eq!(bag.name, "base");
    }

    #[tokio::test]
    async fn not_found_when_no_entry_holds_title() {
        let store = InMemoryStore::new();
        let engine = PolicyEngine::default();
        bags(&store, &["base"]).await;
        let r = recipe(vec![RecipeEntry::new("base"), RecipeEntry::new("ghost")]);
        let err = RecipeResolver::new(&store, &engine)
            .resolve(&r, "soup")
            .await
            .unwrap_err();
        assert!(matches!(err, RecipeError::NotFound { ref title, .. } if title == "soup"));
    }

    #[test]
    fn compile_rejects_bad_filter() {
        let mut r = Recipe::new("dinner").unwrap();
        r.entries.push(RecipeEntry::filtered("base", "colour:red"));
        assert!(matches!(
            CompiledRecipe::compile(r),
            Err(RecipeError::InvalidFilter { .. })
        ));
    }

    // -----------------------------------------------------------------------
    // Write resolution
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn write_target_is_last_permitted_bag() {
        let store = InMemoryStore::new();
        let engine = PolicyEngine::default();
        store.put_bag(&Bag::new("base").unwrap()).await.unwrap();
        let locked = Bag::new("cooking")
            .unwrap()
            .with_policy(Policy::open().with(Operation::Create, &["alice"]));
        store.put_bag(&locked).await.unwrap();

        let r = recipe(vec![RecipeEntry::new("base"), RecipeEntry::new("cooking")]);
        let resolver = RecipeResolver::new(&store, &engine);
        let candidate = Tiddler::new("stew").unwrap();

        let alice = resolver
            .resolve_for_write(&r, &candidate, &Principal::user("alice"))
            .await
            .unwrap();
        assert_eq!(alice.name, "cooking");

        let bob = resolver
            .resolve_for_write(&r, &candidate, &Principal::user("bob"))
            .await
            .unwrap();
        assert_eq!(bob.name, "base");
    }

    #[tokio::test]
    async fn write_resolution_ignores_existing_holders() {
        let store = InMemoryStore::new();
        let engine = PolicyEngine::default();
        bags(&store, &["base", "cooking"]).await;
        put(&store, "base", "soup", &[]).await;

        let r = recipe(vec![RecipeEntry::new("base"), RecipeEntry::new("cooking")]);
        let resolver = RecipeResolver::new(&store, &engine);
        let candidate = Tiddler::new("soup").unwrap();
        assert_eq!(resolver.resolve(&r, "soup").await.unwrap().name, "base");
        assert_eq!(
            resolver
                .resolve_for_write(&r, &candidate, &Principal::anonymous())
                .await
                .unwrap()
                .name,
            "cooking"
        );
    }

    #[tokio::test]
    async fn write_resolution_forbidden_when_all_denied() {
        let store = InMemoryStore::new();
        let engine = PolicyEngine::default();
        let bag = Bag::new("cooking").unwrap().with_policy(Policy::private("alice"));
        store.put_bag(&bag).await.unwrap();

        let r = recipe(vec![RecipeEntry::new("cooking")]);
        let err = RecipeResolver::new(&store, &engine)
            .resolve_for_write(&r, &Tiddler::new("soup").unwrap(), &Principal::user("bob"))
            .await
            .unwrap_err();
        assert!(matches!(err, RecipeError::Forbidden(_)));
    }

    #[tokio::test]
    async fn write_resolution_respects_filters() {
        let store = InMemoryStore::new();
        let engine = PolicyEngine::default();
        bags(&store, &["system", "content"]).await;

        let r = recipe(vec![
            RecipeEntry::filtered("system", "prefix:$:/"),
            RecipeEntry::filtered("content", "!prefix:$:/"),
        ]);
        let resolver = RecipeResolver::new(&store, &engine);
        let who = Principal::anonymous();

        let sys = Tiddler::new("$:/config").unwrap();
        assert_eq!(resolver.resolve_for_write(&r, &sys, &who).await.unwrap().name, "system");
        let plain = Tiddler::new("soup").unwrap();
        assert_eq!(resolver.resolve_for_write(&r, &plain, &who).await.unwrap().name, "content");
    }

    #[tokio::test]
    async fn write_resolution_without_candidates() {
        let store = InMemoryStore::new();
        let engine = PolicyEngine::default();
        let r = recipe(vec![RecipeEntry::new("ghost")]);
        let err = RecipeResolver::new(&store, &engine)
            .resolve_for_write(&r, &Tiddler::new("soup").unwrap(), &Principal::anonymous())
            .await
            .unwrap_err();
        assert!(matches!(err, RecipeError::NoWritableBag { .. }));
    }

    // -----------------------------------------------------------------------
    // Enumeration
    // -----------------------------------------------------------------------

    #[tokio::test]
    async fn enumeration_agrees_with_resolve() {
        let store = InMemoryStore::new();
        let engine = PolicyEngine::default();
        bags(&store, &["base", "cooking", "drafts"]).await;
        put(&store, "base", "soup", &[]).await;
        put(&store, "base", "bread", &[]).await;
        put(&store, "cooking", "soup", &[]).await;
        put(&store, "cooking", "stew", &[]).await;
        put(&store, "drafts", "stew", &["draft"]).await;
        put(&store, "drafts", "pie", &[]).await;

        let r = recipe(vec![
            RecipeEntry::new("base"),
            RecipeEntry::new("cooking"),
            RecipeEntry::filtered("drafts", "!tag:draft"),
        ]);
        let resolver = RecipeResolver::new(&store, &engine);
        let listing = resolver.enumerate(&r).await.unwrap();
        assert_eq!(
            listing,
            vec![
                ("bread".to_string(), "base".to_string()),
                ("pie".to_string(), "drafts".to_string()),
                ("soup".to_string(), "cooking".to_string()),
                ("stew".to_string(), "cooking".to_string()),
            ]
        );
        for (title, bag) in &listing {
            assert_eq!(&resolver.resolve(&r, title).await.unwrap().name, bag);
        }
    }
}
