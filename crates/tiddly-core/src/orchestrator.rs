use std::collections::BTreeSet;
use std::sync::Arc;

use chrono::{SubsecRound, Utc};
use tracing::{info, instrument};

use tiddly_codec::{Codec, CodecRegistry, CodecResult};
use tiddly_model::{Bag, Operation, Principal, Recipe, Revision, Tiddler};
use tiddly_policy::{Decision, Governed, PolicyEngine, PolicyError};
use tiddly_recipe::{CompiledRecipe, RecipeError, RecipeResolver};
use tiddly_store::{StoreError, TiddlerStore};

use crate::config::{CoreConfig, Creating};
use crate::error::{CoreError, CoreResult};
use crate::phase::{Phase, Progress};
use crate::target::Target;

/// What a tiddler write expects to find in its bag.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum Precondition {
    /// Write whether or not the tiddler exists.
    #[default]
    None,
    /// The tiddler must already exist.
    Exists,
    /// The latest revision must be exactly this one.
    Latest(Revision),
}

/// A tiddler body as received from the transport.
#[derive(Clone, Copy, Debug)]
pub struct TiddlerPut<'a> {
    pub body: &'a str,
    pub content_type: &'a str,
    pub precondition: Precondition,
}

/// Where a successful tiddler write landed.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Written {
    pub bag: String,
    pub title: String,
    pub revision: Revision,
}

/// An encoded response body with its media type.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Rendered {
    pub media_type: &'static str,
    pub body: String,
}

/// Ties recipe resolution, policy checks, and store access together for
/// every request.
///
/// Each operation runs through [`Phase::Resolving`], [`Phase::Authorizing`]
/// and [`Phase::Executing`]. Nothing is written before `Executing`, so an
/// operation dropped earlier leaves the store untouched. Store failures are
/// never retried here.
pub struct Orchestrator<S: TiddlerStore + ?Sized> {
    store: Arc<S>,
    codecs: CodecRegistry,
    policy: PolicyEngine,
    config: CoreConfig,
}

impl<S: TiddlerStore + ?Sized> Orchestrator<S> {
    pub fn new(
        store: Arc<S>,
        codecs: CodecRegistry,
        policy: PolicyEngine,
        config: CoreConfig,
    ) -> Self {
        Self {
            store,
            codecs,
            policy,
            config,
        }
    }

    pub fn store(&self) -> &Arc<S> {
        &self.store
    }

    pub fn codecs(&self) -> &CodecRegistry {
        &self.codecs
    }

    pub fn policy(&self) -> &PolicyEngine {
        &self.policy
    }

    pub fn config(&self) -> &CoreConfig {
        &self.config
    }

    // --- Tiddlers ---

    /// Fetch a tiddler, latest revision unless `revision` is given.
    #[instrument(level = "debug", skip_all, fields(on = %target, title = %title))]
    pub async fn get_tiddler(
        &self,
        target: &Target,
        title: &str,
        revision: Option<Revision>,
        who: &Principal,
    ) -> CoreResult<Tiddler> {
        let mut progress = Progress::start("get_tiddler");
        let result = self
            .fetch_tiddler(&mut progress, target, title, revision, who)
            .await;
        progress.finish(result)
    }

    async fn fetch_tiddler(
        &self,
        progress: &mut Progress,
        target: &Target,
        title: &str,
        revision: Option<Revision>,
        who: &Principal,
    ) -> CoreResult<Tiddler> {
        let bag = self.locate(target, title, who).await?;
        progress.enter(Phase::Authorizing);
        self.policy.require(&bag, Operation::Read, who)?;
        progress.enter(Phase::Executing);
        Ok(self.store.get_unit(&bag.name, title, revision).await?)
    }

    /// Decode and store a new revision of `title`.
    ///
    /// Through a recipe, an existing tiddler is rewritten in the bag it
    /// resolves to; a new one goes to the bag a new tiddler would land in.
    #[instrument(level = "debug", skip_all, fields(on = %target, title = %title))]
    pub async fn put_tiddler(
        &self,
        target: &Target,
        title: &str,
        put: TiddlerPut<'_>,
        who: &Principal,
    ) -> CoreResult<Written> {
        let mut progress = Progress::start("put_tiddler");
        let result = self.store_tiddler(&mut progress, target, title, put, who).await;
        progress.finish(result)
    }

    async fn store_tiddler(
        &self,
        progress: &mut Progress,
        target: &Target,
        title: &str,
        put: TiddlerPut<'_>,
        who: &Principal,
    ) -> CoreResult<Written> {
        let codec = self.codecs.for_content_type(put.content_type)?;
        let mut candidate = codec.decode_tiddler(put.body, title)?;

        let bag = match target {
            Target::Bag(name) => match self.store.get_bag(name).await {
                Ok(bag) => bag,
                Err(StoreError::BagNotFound(_)) => {
                    return Err(CoreError::NoContainer {
                        bag: name.clone(),
                        title: title.to_string(),
                    })
                }
                Err(e) => return Err(e.into()),
            },
            Target::Recipe(name) => {
                let recipe = self.readable_recipe(name, who).await?;
                let resolver = self.resolver();
                match resolver.resolve(&recipe, title).await {
                    Ok(bag) => bag,
                    Err(RecipeError::NotFound { .. }) => {
                        resolver.resolve_for_write(&recipe, &candidate, who).await?
                    }
                    Err(e) => return Err(e.into()),
                }
            }
        };

        progress.enter(Phase::Authorizing);
        let exists = self.store.has_unit(&bag.name, title).await?;
        self.policy.require(&bag, Operation::Write, who)?;
        if !exists {
            self.policy.require(&bag, Operation::Create, who)?;
        }

        progress.enter(Phase::Executing);
        let expected = match put.precondition {
            Precondition::None => None,
            Precondition::Latest(revision) => Some(revision),
            // Pinned to the latest revision, so a concurrent delete conflicts.
            Precondition::Exists if exists => {
                self.store.list_revisions(&bag.name, title).await?.last().copied()
            }
            Precondition::Exists => {
                return Err(CoreError::Conflict {
                    bag: bag.name,
                    title: title.to_string(),
                    detail: "no existing tiddler to replace".into(),
                })
            }
        };
        candidate.bag = Some(bag.name.clone());
        candidate.revision = None;
        candidate.modifier = Some(who.name.clone());
        candidate.modified = Some(Utc::now().trunc_subsecs(0));
        let revision = self.store.put_unit(&candidate, expected).await?;

        info!(bag = %bag.name, title, %revision, principal = %who, "stored tiddler");
        Ok(Written {
            bag: bag.name,
            title: title.to_string(),
            revision,
        })
    }

    /// Every revision of a tiddler, oldest first.
    ///
    /// If any listed revision cannot be fetched the whole listing fails with
    /// not-found; a partial history is never returned.
    #[instrument(level = "debug", skip_all, fields(on = %target, title = %title))]
    pub async fn list_revisions(
        &self,
        target: &Target,
        title: &str,
        who: &Principal,
    ) -> CoreResult<Vec<Tiddler>> {
        let mut progress = Progress::start("list_revisions");
        let result = self.collect_revisions(&mut progress, target, title, who).await;
        progress.finish(result)
    }

    async fn collect_revisions(
        &self,
        progress: &mut Progress,
        target: &Target,
        title: &str,
        who: &Principal,
    ) -> CoreResult<Vec<Tiddler>> {
        let bag = self.locate(target, title, who).await?;
        progress.enter(Phase::Authorizing);
        self.policy.require(&bag, Operation::Read, who)?;

        progress.enter(Phase::Executing);
        let revisions = self.store.list_revisions(&bag.name, title).await?;
        let mut history = Vec::with_capacity(revisions.len());
        for revision in revisions {
            history.push(self.store.get_unit(&bag.name, title, Some(revision)).await?);
        }
        Ok(history)
    }

    /// Remove a tiddler and all of its revisions.
    #[instrument(level = "debug", skip_all, fields(on = %target, title = %title))]
    pub async fn delete_tiddler(
        &self,
        target: &Target,
        title: &str,
        who: &Principal,
    ) -> CoreResult<()> {
        let mut progress = Progress::start("delete_tiddler");
        let result = self.remove_tiddler(&mut progress, target, title, who).await;
        progress.finish(result)
    }

    async fn remove_tiddler(
        &self,
        progress: &mut Progress,
        target: &Target,
        title: &str,
        who: &Principal,
    ) -> CoreResult<()> {
        let bag = self.locate(target, title, who).await?;
        progress.enter(Phase::Authorizing);
        self.policy.require(&bag, Operation::Delete, who)?;
        progress.enter(Phase::Executing);
        self.store.delete_unit(&bag.name, title).await?;
        info!(bag = %bag.name, title, principal = %who, "deleted tiddler");
        Ok(())
    }

    /// Latest revision of every tiddler visible through `target`, sorted by
    /// title.
    ///
    /// Through a recipe, every bag contributing a tiddler must be readable.
    #[instrument(level = "debug", skip_all, fields(on = %target))]
    pub async fn list_tiddlers(&self, target: &Target, who: &Principal) -> CoreResult<Vec<Tiddler>> {
        let mut progress = Progress::start("list_tiddlers");
        let result = self.collect_tiddlers(&mut progress, target, who).await;
        progress.finish(result)
    }

    async fn collect_tiddlers(
        &self,
        progress: &mut Progress,
        target: &Target,
        who: &Principal,
    ) -> CoreResult<Vec<Tiddler>> {
        let visible: Vec<(String, String)> = match target {
            Target::Bag(name) => {
                let bag = self.store.get_bag(name).await?;
                progress.enter(Phase::Authorizing);
                self.policy.require(&bag, Operation::Read, who)?;
                self.store
                    .list_units(name)
                    .await?
                    .into_iter()
                    .map(|title| (title, name.clone()))
                    .collect()
            }
            Target::Recipe(name) => {
                let recipe = self.readable_recipe(name, who).await?;
                let visible = self.resolver().enumerate(&recipe).await?;
                progress.enter(Phase::Authorizing);
                let bags: BTreeSet<&str> = visible.iter().map(|(_, bag)| bag.as_str()).collect();
                for bag in bags {
                    let bag = self.store.get_bag(bag).await?;
                    self.policy.require(&bag, Operation::Read, who)?;
                }
                visible
            }
        };

        progress.enter(Phase::Executing);
        let mut tiddlers = Vec::with_capacity(visible.len());
        for (title, bag) in visible {
            tiddlers.push(self.store.get_unit(&bag, &title, None).await?);
        }
        Ok(tiddlers)
    }

    // --- Bags ---

    /// A bag definition. Requires manage, since it exposes the policy.
    pub async fn get_bag(&self, name: &str, who: &Principal) -> CoreResult<Bag> {
        let bag = self.store.get_bag(name).await?;
        self.policy.require(&bag, Operation::Manage, who)?;
        Ok(bag)
    }

    /// Create or replace a bag from an encoded body.
    ///
    /// Replacing needs manage on the existing bag; creating is governed by
    /// [`CoreConfig::create_policy`].
    #[instrument(level = "debug", skip_all, fields(bag = name))]
    pub async fn put_bag(
        &self,
        name: &str,
        body: &str,
        content_type: &str,
        who: &Principal,
    ) -> CoreResult<Bag> {
        let mut progress = Progress::start("put_bag");
        let result = self
            .store_bag(&mut progress, name, body, content_type, who)
            .await;
        progress.finish(result)
    }

    async fn store_bag(
        &self,
        progress: &mut Progress,
        name: &str,
        body: &str,
        content_type: &str,
        who: &Principal,
    ) -> CoreResult<Bag> {
        let codec = self.codecs.for_content_type(content_type)?;
        let bag = codec.decode_bag(body, name)?;
        bag.validate()?;

        let existing = match self.store.get_bag(name).await {
            Ok(existing) => Some(existing),
            Err(StoreError::BagNotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        progress.enter(Phase::Authorizing);
        self.authorize_definition(existing.as_ref(), Creating::Bag, name, who)?;

        progress.enter(Phase::Executing);
        self.store.put_bag(&bag).await?;
        info!(bag = name, created = existing.is_none(), principal = %who, "stored bag");
        Ok(bag)
    }

    /// Remove a bag and its tiddlers. Requires manage.
    pub async fn delete_bag(&self, name: &str, who: &Principal) -> CoreResult<()> {
        let bag = self.store.get_bag(name).await?;
        self.policy.require(&bag, Operation::Manage, who)?;
        self.store.delete_bag(name).await?;
        info!(bag = name, principal = %who, "deleted bag");
        Ok(())
    }

    /// Names of the bags `who` may read.
    pub async fn list_bags(&self, who: &Principal) -> CoreResult<Vec<String>> {
        let mut readable = Vec::new();
        for name in self.store.list_bags().await? {
            let bag = self.store.get_bag(&name).await?;
            if self.policy.check(&bag, Operation::Read, who).is_allowed() {
                readable.push(name);
            }
        }
        Ok(readable)
    }

    // --- Recipes ---

    /// A recipe definition. Requires manage, since it exposes the policy.
    pub async fn get_recipe(&self, name: &str, who: &Principal) -> CoreResult<Recipe> {
        let recipe = self.store.get_recipe(name).await?;
        self.policy.require(&recipe, Operation::Manage, who)?;
        Ok(recipe)
    }

    /// Create or replace a recipe from an encoded body.
    ///
    /// Every filter is compiled before anything is stored.
    #[instrument(level = "debug", skip_all, fields(recipe = name))]
    pub async fn put_recipe(
        &self,
        name: &str,
        body: &str,
        content_type: &str,
        who: &Principal,
    ) -> CoreResult<Recipe> {
        let mut progress = Progress::start("put_recipe");
        let result = self
            .store_recipe(&mut progress, name, body, content_type, who)
            .await;
        progress.finish(result)
    }

    async fn store_recipe(
        &self,
        progress: &mut Progress,
        name: &str,
        body: &str,
        content_type: &str,
        who: &Principal,
    ) -> CoreResult<Recipe> {
        let codec = self.codecs.for_content_type(content_type)?;
        let recipe = codec.decode_recipe(body, name)?;
        recipe.validate()?;
        CompiledRecipe::compile(recipe.clone())?;

        let existing = match self.store.get_recipe(name).await {
            Ok(existing) => Some(existing),
            Err(StoreError::RecipeNotFound(_)) => None,
            Err(e) => return Err(e.into()),
        };
        progress.enter(Phase::Authorizing);
        self.authorize_definition(existing.as_ref(), Creating::Recipe, name, who)?;

        progress.enter(Phase::Executing);
        self.store.put_recipe(&recipe).await?;
        info!(recipe = name, created = existing.is_none(), principal = %who, "stored recipe");
        Ok(recipe)
    }

    /// Names of the recipes `who` may read.
    pub async fn list_recipes(&self, who: &Principal) -> CoreResult<Vec<String>> {
        let mut readable = Vec::new();
        for name in self.store.list_recipes().await? {
            let recipe = self.store.get_recipe(&name).await?;
            if self.policy.check(&recipe, Operation::Read, who).is_allowed() {
                readable.push(name);
            }
        }
        Ok(readable)
    }

    // --- Encoding ---

    /// The codec an `Accept` header selects. Call before doing any work so
    /// an unacceptable request fails fast.
    pub fn negotiate(&self, accept: Option<&str>) -> CoreResult<Arc<dyn Codec>> {
        Ok(self.codecs.negotiate(accept)?)
    }

    pub fn encode_tiddler(&self, accept: Option<&str>, tiddler: &Tiddler) -> CoreResult<Rendered> {
        self.render(accept, |codec| codec.encode_tiddler(tiddler))
    }

    pub fn encode_tiddlers(
        &self,
        accept: Option<&str>,
        tiddlers: &[Tiddler],
    ) -> CoreResult<Rendered> {
        self.render(accept, |codec| codec.encode_tiddlers(tiddlers))
    }

    pub fn encode_bag(&self, accept: Option<&str>, bag: &Bag) -> CoreResult<Rendered> {
        self.render(accept, |codec| codec.encode_bag(bag))
    }

    pub fn encode_recipe(&self, accept: Option<&str>, recipe: &Recipe) -> CoreResult<Rendered> {
        self.render(accept, |codec| codec.encode_recipe(recipe))
    }

    pub fn encode_names(&self, accept: Option<&str>, names: &[String]) -> CoreResult<Rendered> {
        self.render(accept, |codec| codec.encode_names(names))
    }

    fn render<F>(&self, accept: Option<&str>, encode: F) -> CoreResult<Rendered>
    where
        F: FnOnce(&dyn Codec) -> CodecResult<String>,
    {
        let codec = self.codecs.negotiate(accept)?;
        let body = encode(codec.as_ref())?;
        Ok(Rendered {
            media_type: codec.media_type(),
            body,
        })
    }

    // --- Internals ---

    fn resolver(&self) -> RecipeResolver<'_, S> {
        RecipeResolver::new(self.store.as_ref(), &self.policy)
    }

    /// Load a recipe `who` may read, with its filters compiled.
    async fn readable_recipe(&self, name: &str, who: &Principal) -> CoreResult<CompiledRecipe> {
        let recipe = self.store.get_recipe(name).await?;
        self.policy.require(&recipe, Operation::Read, who)?;
        Ok(CompiledRecipe::compile(recipe)?)
    }

    /// The bag currently holding `title` for a read, delete, or history
    /// request.
    async fn locate(&self, target: &Target, title: &str, who: &Principal) -> CoreResult<Bag> {
        match target {
            Target::Bag(name) => Ok(self.store.get_bag(name).await?),
            Target::Recipe(name) => {
                let recipe = self.readable_recipe(name, who).await?;
                Ok(self.resolver().resolve(&recipe, title).await?)
            }
        }
    }

    fn authorize_definition<G: Governed>(
        &self,
        existing: Option<&G>,
        creating: Creating,
        name: &str,
        who: &Principal,
    ) -> CoreResult<()> {
        if let Some(existing) = existing {
            return Ok(self.policy.require(existing, Operation::Manage, who)?);
        }
        match self.config.may_create(&self.policy, creating, who) {
            Decision::Allowed => Ok(()),
            Decision::Denied { reason } => {
                let entity = match creating {
                    Creating::Bag => format!("bag {name:?}"),
                    Creating::Recipe => format!("recipe {name:?}"),
                };
                Err(PolicyError::Forbidden {
                    entity,
                    op: Operation::Create,
                    principal: who.name.clone(),
                    reason,
                }
                .into())
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use tiddly_model::{History, Policy, RecipeEntry};
    use tiddly_store::{InMemoryStore, StoreResult};

    use crate::error::ErrorKind;

    const JSON: &str = "application/json";

    fn orchestrator(store: Arc<InMemoryStore>) -> Orchestrator<InMemoryStore> {
        Orchestrator::new(
            store,
            CodecRegistry::with_defaults(),
            PolicyEngine::default(),
            CoreConfig::default(),
        )
    }

    fn put(body: &str) -> TiddlerPut<'_> {
        TiddlerPut {
            body,
            content_type: JSON,
            precondition: Precondition::None,
        }
    }

    fn private_bag(name: &str, owner: &str) -> Bag {
        Bag::new(name).unwrap().with_policy(Policy::private(owner))
    }

    async fn seed_bag(store: &InMemoryStore, bag: Bag) {
        store.put_bag(&bag).await.unwrap();
    }

    async fn seed_tiddler(store: &InMemoryStore, bag: &str, title: &str, text: &str) {
        let tiddler = Tiddler::in_bag(title, bag).unwrap().with_text(text);
        store.put_unit(&tiddler, None).await.unwrap();
    }

    #[tokio::test]
    async fn write_policy_admits_listed_writer_only() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(
            &store,
            Bag::new("cooking")
                .unwrap()
                .with_policy(Policy::open().with(Operation::Write, &["alice"])),
        )
        .await;
        let core = orchestrator(Arc::clone(&store));
        let cooking = Target::bag("cooking");

        let written = core
            .put_tiddler(&cooking, "soup", put(r#"{"text": "hot"}"#), &Principal::user("alice"))
            .await
            .unwrap();
        assert_eq!(written.revision, Revision::FIRST);
        assert_eq!(written.bag, "cooking");

        let err = core
            .put_tiddler(&cooking, "soup", put(r#"{"text": "cold"}"#), &Principal::user("bob"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
        assert_eq!(store.revision_count().await, 1);
    }

    #[tokio::test]
    async fn recipe_read_returns_last_listed_bag() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("system").unwrap()).await;
        seed_bag(&store, Bag::new("user").unwrap()).await;
        seed_tiddler(&store, "system", "x", "from system").await;
        seed_tiddler(&store, "user", "x", "from user").await;
        let recipe = Recipe::new("default")
            .unwrap()
            .with_entry(RecipeEntry::new("system"))
            .with_entry(RecipeEntry::new("user"));
        store.put_recipe(&recipe).await.unwrap();
        let core = orchestrator(store);

        let got = core
            .get_tiddler(&Target::recipe("default"), "x", None, &Principal::anonymous())
            .await
            .unwrap();
        assert_eq!(got.bag.as_deref(), Some("user"));
        assert_eq!(got.text, "from user");
    }

    #[tokio::test]
    async fn missing_title_is_not_found_with_context() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("cooking").unwrap()).await;
        let core = orchestrator(store);

        let err = core
            .get_tiddler(&Target::bag("cooking"), "soup", None, &Principal::anonymous())
            .await
            .unwrap_err();
        match err {
            CoreError::NotFound { location, .. } => {
                assert_eq!(location.bag.as_deref(), Some("cooking"));
                assert_eq!(location.title.as_deref(), Some("soup"));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn put_to_missing_bag_is_no_container() {
        let core = orchestrator(Arc::new(InMemoryStore::new()));
        let err = core
            .put_tiddler(&Target::bag("nowhere"), "soup", put("{}"), &Principal::user("alice"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::NoContainer);
        assert!(err.to_string().contains("create the bag"));
    }

    #[tokio::test]
    async fn stale_expected_revision_conflicts() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("cooking").unwrap()).await;
        let core = orchestrator(store);
        let cooking = Target::bag("cooking");
        let alice = Principal::user("alice");

        core.put_tiddler(&cooking, "soup", put("{}"), &alice).await.unwrap();
        core.put_tiddler(&cooking, "soup", put("{}"), &alice).await.unwrap();

        let stale = TiddlerPut {
            precondition: Precondition::Latest(Revision::FIRST),
            ..put("{}")
        };
        let err = core.put_tiddler(&cooking, "soup", stale, &alice).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn exists_precondition_requires_a_tiddler() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("cooking").unwrap()).await;
        let core = orchestrator(Arc::clone(&store));
        let cooking = Target::bag("cooking");
        let alice = Principal::user("alice");
        let replace = || TiddlerPut {
            precondition: Precondition::Exists,
            ..put("{}")
        };

        let err = core.put_tiddler(&cooking, "soup", replace(), &alice).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Conflict);
        assert!(!store.has_unit("cooking", "soup").await.unwrap());

        core.put_tiddler(&cooking, "soup", put("{}"), &alice).await.unwrap();
        let written = core.put_tiddler(&cooking, "soup", replace(), &alice).await.unwrap();
        assert_eq!(written.revision.get(), 2);
    }

    #[tokio::test]
    async fn put_stamps_modifier_and_keeps_created() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("cooking").unwrap()).await;
        let core = orchestrator(Arc::clone(&store));
        let cooking = Target::bag("cooking");

        core.put_tiddler(&cooking, "soup", put("{}"), &Principal::user("alice"))
            .await
            .unwrap();
        core.put_tiddler(&cooking, "soup", put(r#"{"text": "v2"}"#), &Principal::user("bob"))
            .await
            .unwrap();

        let history = core
            .list_revisions(&cooking, "soup", &Principal::anonymous())
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].modifier.as_deref(), Some("alice"));
        assert_eq!(history[1].modifier.as_deref(), Some("bob"));
        assert_eq!(history[1].created, history[0].created);
        assert!(history[0].created.is_some());
    }

    #[tokio::test]
    async fn unknown_content_type_is_format_error() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("cooking").unwrap()).await;
        let core = orchestrator(store);
        let body = TiddlerPut {
            content_type: "image/png",
            ..put("{}")
        };
        let err = core
            .put_tiddler(&Target::bag("cooking"), "soup", body, &Principal::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }

    #[tokio::test]
    async fn new_tiddler_needs_create() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(
            &store,
            Bag::new("cooking")
                .unwrap()
                .with_policy(Policy::open().with(Operation::Create, &["alice"])),
        )
        .await;
        let core = orchestrator(store);
        let cooking = Target::bag("cooking");

        let err = core
            .put_tiddler(&cooking, "soup", put("{}"), &Principal::user("bob"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        core.put_tiddler(&cooking, "soup", put("{}"), &Principal::user("alice"))
            .await
            .unwrap();
        // Existing tiddler: write alone suffices.
        core.put_tiddler(&cooking, "soup", put("{}"), &Principal::user("bob"))
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn recipe_put_lands_in_writable_bag() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("public").unwrap()).await;
        seed_bag(&store, private_bag("private", "alice")).await;
        let recipe = Recipe::new("mixed")
            .unwrap()
            .with_entry(RecipeEntry::new("public"))
            .with_entry(RecipeEntry::new("private"));
        store.put_recipe(&recipe).await.unwrap();
        let core = orchestrator(Arc::clone(&store));
        let mixed = Target::recipe("mixed");

        let by_alice = core
            .put_tiddler(&mixed, "a", put("{}"), &Principal::user("alice"))
            .await
            .unwrap();
        assert_eq!(by_alice.bag, "private");

        let by_bob = core
            .put_tiddler(&mixed, "b", put("{}"), &Principal::user("bob"))
            .await
            .unwrap();
        assert_eq!(by_bob.bag, "public");
    }

    #[tokio::test]
    async fn recipe_put_rewrites_existing_bag() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("system").unwrap()).await;
        seed_bag(&store, Bag::new("user").unwrap()).await;
        seed_tiddler(&store, "system", "config", "v1").await;
        let recipe = Recipe::new("default")
            .unwrap()
            .with_entry(RecipeEntry::new("system"))
            .with_entry(RecipeEntry::new("user"));
        store.put_recipe(&recipe).await.unwrap();
        let core = orchestrator(Arc::clone(&store));

        let written = core
            .put_tiddler(&Target::recipe("default"), "config", put("{}"), &Principal::user("alice"))
            .await
            .unwrap();
        assert_eq!(written.bag, "system");
        assert_eq!(written.revision.get(), 2);
    }

    #[tokio::test]
    async fn unreadable_recipe_is_forbidden() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("public").unwrap()).await;
        let recipe = Recipe::new("secret")
            .unwrap()
            .with_policy(Policy::private("alice"))
            .with_entry(RecipeEntry::new("public"));
        store.put_recipe(&recipe).await.unwrap();
        let core = orchestrator(store);

        let err = core
            .list_tiddlers(&Target::recipe("secret"), &Principal::user("bob"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);
    }

    #[tokio::test]
    async fn list_tiddlers_through_recipe() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("system").unwrap()).await;
        seed_bag(&store, Bag::new("user").unwrap()).await;
        seed_tiddler(&store, "system", "a", "").await;
        seed_tiddler(&store, "system", "b", "").await;
        seed_tiddler(&store, "user", "b", "").await;
        let recipe = Recipe::new("default")
            .unwrap()
            .with_entry(RecipeEntry::new("system"))
            .with_entry(RecipeEntry::new("user"));
        store.put_recipe(&recipe).await.unwrap();
        let core = orchestrator(store);

        let listed = core
            .list_tiddlers(&Target::recipe("default"), &Principal::anonymous())
            .await
            .unwrap();
        let pairs: Vec<_> = listed
            .iter()
            .map(|t| (t.title.as_str(), t.bag.as_deref().unwrap_or_default()))
            .collect();
        assert_eq!(pairs, [("a", "system"), ("b", "user")]);
    }

    #[tokio::test]
    async fn delete_requires_delete_policy() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(
            &store,
            Bag::new("cooking")
                .unwrap()
                .with_policy(Policy::open().with(Operation::Delete, &["alice"])),
        )
        .await;
        seed_tiddler(&store, "cooking", "soup", "").await;
        let core = orchestrator(Arc::clone(&store));
        let cooking = Target::bag("cooking");

        let err = core
            .delete_tiddler(&cooking, "soup", &Principal::user("bob"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        core.delete_tiddler(&cooking, "soup", &Principal::user("alice"))
            .await
            .unwrap();
        assert!(!store.has_unit("cooking", "soup").await.unwrap());
    }

    #[tokio::test]
    async fn latest_only_bag_lists_one_revision() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(
            &store,
            Bag::new("scratch").unwrap().with_history(History::LatestOnly),
        )
        .await;
        let core = orchestrator(store);
        let scratch = Target::bag("scratch");
        let alice = Principal::user("alice");
        for _ in 0..3 {
            core.put_tiddler(&scratch, "note", put("{}"), &alice).await.unwrap();
        }
        let history = core.list_revisions(&scratch, "note", &alice).await.unwrap();
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].revision.map(|r| r.get()), Some(3));
    }

    /// Lists one revision more than it can produce.
    struct LeakyHistory(InMemoryStore);

    #[async_trait]
    impl TiddlerStore for LeakyHistory {
        async fn get_unit(
            &self,
            bag: &str,
            title: &str,
            revision: Option<Revision>,
        ) -> StoreResult<Tiddler> {
            self.0.get_unit(bag, title, revision).await
        }
        async fn put_unit(&self, unit: &Tiddler, expected: Option<Revision>) -> StoreResult<Revision> {
            self.0.put_unit(unit, expected).await
        }
        async fn list_revisions(&self, bag: &str, title: &str) -> StoreResult<Vec<Revision>> {
            let mut revisions = self.0.list_revisions(bag, title).await?;
            if let Some(last) = revisions.last().copied() {
                revisions.push(last.next());
            }
            Ok(revisions)
        }
        async fn list_units(&self, bag: &str) -> StoreResult<Vec<String>> {
            self.0.list_units(bag).await
        }
        async fn has_unit(&self, bag: &str, title: &str) -> StoreResult<bool> {
            self.0.has_unit(bag, title).await
        }
        async fn delete_unit(&self, bag: &str, title: &str) -> StoreResult<()> {
            self.0.delete_unit(bag, title).await
        }
        async fn get_bag(&self, name: &str) -> StoreResult<Bag> {
            self.0.get_bag(name).await
        }
        async fn put_bag(&self, bag: &Bag) -> StoreResult<()> {
            self.0.put_bag(bag).await
        }
        async fn delete_bag(&self, name: &str) -> StoreResult<()> {
            self.0.delete_bag(name).await
        }
        async fn list_bags(&self) -> StoreResult<Vec<String>> {
            self.0.list_bags().await
        }
        async fn get_recipe(&self, name: &str) -> StoreResult<Recipe> {
            self.0.get_recipe(name).await
        }
        async fn put_recipe(&self, recipe: &Recipe) -> StoreResult<()> {
            self.0.put_recipe(recipe).await
        }
        async fn list_recipes(&self) -> StoreResult<Vec<String>> {
            self.0.list_recipes().await
        }
    }

    #[tokio::test]
    async fn vanished_revision_aborts_history() {
        let inner = InMemoryStore::new();
        inner.put_bag(&Bag::new("cooking").unwrap()).await.unwrap();
        let tiddler = Tiddler::in_bag("soup", "cooking").unwrap();
        inner.put_unit(&tiddler, None).await.unwrap();
        inner.put_unit(&tiddler, None).await.unwrap();

        let store: Arc<dyn TiddlerStore> = Arc::new(LeakyHistory(inner));
        let core = Orchestrator::new(
            store,
            CodecRegistry::with_defaults(),
            PolicyEngine::default(),
            CoreConfig::default(),
        );
        let err = core
            .list_revisions(&Target::bag("cooking"), "soup", &Principal::anonymous())
            .await
            .unwrap_err();
        match err {
            CoreError::NotFound { location, .. } => {
                assert_eq!(location.revision.map(|r| r.get()), Some(3));
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[tokio::test]
    async fn bag_creation_and_management() {
        let store = Arc::new(InMemoryStore::new());
        let core = Orchestrator::new(
            Arc::clone(&store),
            CodecRegistry::with_defaults(),
            PolicyEngine::default(),
            CoreConfig::authenticated_creators(),
        );
        let body = r#"{"desc": "recipes", "policy": {"owner": "alice", "manage": ["NONE"]}}"#;

        let err = core
            .put_bag("cooking", body, JSON, &Principal::anonymous())
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        let bag = core
            .put_bag("cooking", body, JSON, &Principal::user("alice"))
            .await
            .unwrap();
        assert_eq!(bag.description, "recipes");

        let err = core
            .put_bag("cooking", body, JSON, &Principal::user("bob"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Forbidden);

        assert_eq!(
            core.list_bags(&Principal::anonymous()).await.unwrap(),
            ["cooking"]
        );
        assert!(core.get_bag("cooking", &Principal::user("alice")).await.is_ok());
        assert!(core.get_bag("cooking", &Principal::user("bob")).await.is_err());

        core.delete_bag("cooking", &Principal::user("alice")).await.unwrap();
        assert!(store.list_bags().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn recipe_with_bad_filter_is_rejected() {
        let store = Arc::new(InMemoryStore::new());
        let core = orchestrator(Arc::clone(&store));
        let body = r#"{"recipe": [["system", "colour:blue"]]}"#;
        let err = core
            .put_recipe("default", body, JSON, &Principal::user("alice"))
            .await
            .unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        assert!(store.list_recipes().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn listings_hide_unreadable_entities() {
        let store = Arc::new(InMemoryStore::new());
        seed_bag(&store, Bag::new("public").unwrap()).await;
        seed_bag(&store, private_bag("diary", "alice")).await;
        let core = orchestrator(store);

        assert_eq!(core.list_bags(&Principal::user("bob")).await.unwrap(), ["public"]);
        assert_eq!(
            core.list_bags(&Principal::user("alice")).await.unwrap(),
            ["diary", "public"]
        );
    }

    #[test]
    fn encode_helpers_follow_accept() {
        let core = orchestrator(Arc::new(InMemoryStore::new()));
        let tiddler = Tiddler::in_bag("soup", "cooking").unwrap().with_text("hot");

        let json = core.encode_tiddler(None, &tiddler).unwrap();
        assert_eq!(json.media_type, "application/json");
        let text = core.encode_tiddler(Some("text/plain"), &tiddler).unwrap();
        assert_eq!(text.media_type, "text/plain");
        assert!(text.body.ends_with("hot"));

        let err = core.encode_tiddler(Some("image/png"), &tiddler).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::UnsupportedFormat);
    }
}
