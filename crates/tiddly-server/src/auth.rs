use std::collections::HashMap;

use async_trait::async_trait;
use axum::http::{header, HeaderMap};

use tiddly_model::Principal;

use crate::config::TokenConfig;
use crate::error::{ServerError, ServerResult};

/// What a request presented to identify itself.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Credentials {
    Bearer(String),
    Anonymous,
}

impl Credentials {
    /// Read `Authorization: Bearer <token>`. A missing header is anonymous;
    /// any other scheme is rejected.
    pub fn from_headers(headers: &HeaderMap) -> ServerResult<Self> {
        let Some(value) = headers.get(header::AUTHORIZATION) else {
            return Ok(Self::Anonymous);
        };
        let value = value
            .to_str()
            .map_err(|_| ServerError::AuthFailed("authorization header is not ASCII".into()))?;
        match value.split_once(' ') {
            Some((scheme, token))
                if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() =>
            {
                Ok(Self::Bearer(token.trim().to_string()))
            }
            _ => Err(ServerError::AuthFailed(
                "expected a bearer token".into(),
            )),
        }
    }
}

/// Turns credentials into a principal.
#[async_trait]
pub trait AuthProvider: Send + Sync {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Principal>;
}

/// Fixed token table from configuration.
#[derive(Clone, Debug, Default)]
pub struct StaticTokenAuth {
    tokens: HashMap<String, Principal>,
}

impl StaticTokenAuth {
    pub fn new(entries: &[TokenConfig]) -> Self {
        let tokens = entries
            .iter()
            .map(|entry| {
                let principal = entry
                    .roles
                    .iter()
                    .fold(Principal::user(&entry.user), |p, role| p.with_role(role));
                (entry.token.clone(), principal)
            })
            .collect();
        Self { tokens }
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

#[async_trait]
impl AuthProvider for StaticTokenAuth {
    async fn authenticate(&self, credentials: &Credentials) -> ServerResult<Principal> {
        match credentials {
            Credentials::Anonymous => Ok(Principal::anonymous()),
            Credentials::Bearer(token) => self
                .tokens
                .get(token)
                .cloned()
                .ok_or_else(|| ServerError::AuthFailed("unknown token".into())),
        }
    }
}
