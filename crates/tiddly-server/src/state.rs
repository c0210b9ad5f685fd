use std::sync::Arc;

use async_trait::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use tiddly_core::Orchestrator;
use tiddly_model::Principal;
use tiddly_store::TiddlerStore;

use crate::auth::{AuthProvider, Credentials};
use crate::error::ServerError;

/// Shared by every handler.
#[derive(Clone)]
pub struct AppState {
    pub core: Arc<Orchestrator<dyn TiddlerStore>>,
    pub auth: Arc<dyn AuthProvider>,
}

impl AppState {
    pub fn new(core: Orchestrator<dyn TiddlerStore>, auth: Arc<dyn AuthProvider>) -> Self {
        Self {
            core: Arc::new(core),
            auth,
        }
    }
}

/// The authenticated principal behind a request, `GUEST` when no
/// credentials were sent.
#[derive(Clone, Debug)]
pub struct Caller(pub Principal);

#[async_trait]
impl FromRequestParts<AppState> for Caller {
    type Rejection = ServerError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let credentials = Credentials::from_headers(&parts.headers)?;
        let principal = state.auth.authenticate(&credentials).await?;
        Ok(Self(principal))
    }
}
