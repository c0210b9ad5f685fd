use std::future::Future;
use std::sync::Arc;

use tokio::net::TcpListener;

use tiddly_codec::CodecRegistry;
use tiddly_core::{CoreError, Orchestrator};
use tiddly_policy::PolicyEngine;
use tiddly_recipe::CompiledRecipe;
use tiddly_store::TiddlerStore;

use crate::auth::{AuthProvider, StaticTokenAuth};
use crate::config::Config;
use crate::error::ServerResult;
use crate::router::build_router;
use crate::state::AppState;

/// Tiddly Store HTTP server.
pub struct TiddlyServer {
    config: Config,
    state: AppState,
}

impl TiddlyServer {
    /// Wire an orchestrator over `store`, authenticating with the configured
    /// token table.
    pub fn new(config: Config, store: Arc<dyn TiddlerStore>) -> Self {
        let core = Orchestrator::new(
            store,
            CodecRegistry::with_defaults(),
            PolicyEngine::new(config.policy.clone()),
            config.core.clone(),
        );
        let auth = Arc::new(StaticTokenAuth::new(&config.server.tokens));
        Self {
            state: AppState::new(core, auth),
            config,
        }
    }

    /// Replace the authentication provider.
    pub fn with_auth(mut self, auth: Arc<dyn AuthProvider>) -> Self {
        self.state.auth = auth;
        self
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn state(&self) -> &AppState {
        &self.state
    }

    /// Build the router (useful for testing).
    pub fn router(&self) -> axum::Router {
        build_router(self.state.clone(), &self.config.server)
    }

    /// Write the bags and recipes listed in the configuration, replacing
    /// any existing definitions. Returns how many entities were written.
    pub async fn seed(&self) -> ServerResult<usize> {
        let store = self.state.core.store();
        for bag in &self.config.bags {
            bag.validate().map_err(CoreError::from)?;
            store.put_bag(bag).await.map_err(CoreError::from)?;
            tracing::info!(bag = %bag.name, "seeded bag");
        }
        for recipe in &self.config.recipes {
            CompiledRecipe::compile(recipe.clone()).map_err(CoreError::from)?;
            store.put_recipe(recipe).await.map_err(CoreError::from)?;
            tracing::info!(recipe = %recipe.name, "seeded recipe");
        }
        Ok(self.config.bags.len() + self.config.recipes.len())
    }

    /// Start serving requests.
    pub async fn serve(self) -> ServerResult<()> {
        self.serve_with_shutdown(std::future::pending()).await
    }

    /// Serve until `signal` resolves, then drain in-flight requests.
    pub async fn serve_with_shutdown<F>(self, signal: F) -> ServerResult<()>
    where
        F: Future<Output = ()> + Send + 'static,
    {
        let app = self.router();
        let listener = TcpListener::bind(self.config.server.bind_addr).await?;
        tracing::info!(
            addr = %self.config.server.bind_addr,
            tokens = self.config.server.tokens.len(),
            "tiddly server listening"
        );
        axum::serve(listener, app)
            .with_graceful_shutdown(signal)
            .await?;
        tracing::info!("tiddly server stopped");
        Ok(())
    }
}
