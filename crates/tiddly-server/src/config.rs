use std::net::{Ipv4Addr, SocketAddr};
use std::path::Path;

use serde::{Deserialize, Serialize};

use tiddly_core::CoreConfig;
use tiddly_model::{Bag, Recipe};
use tiddly_policy::PolicyConfig;

use crate::error::{ServerError, ServerResult};

/// A bearer token and the principal it stands for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenConfig {
    pub token: String,
    pub user: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: SocketAddr,
    /// Largest accepted request body.
    pub max_body_bytes: usize,
    /// Answer cross-origin requests from any origin.
    pub permissive_cors: bool,
    pub tokens: Vec<TokenConfig>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from((Ipv4Addr::LOCALHOST, 8080)),
            max_body_bytes: 1024 * 1024,
            permissive_cors: false,
            tokens: Vec::new(),
        }
    }
}

/// Everything a running instance needs, as read from a TOML file:
///
/// ```toml
/// [server]
/// bind_addr = "0.0.0.0:8080"
///
/// [[server.tokens]]
/// token = "s3cret"
/// user = "alice"
/// roles = ["editor"]
///
/// [policy]
/// superuser_role = "admin"
///
/// [core.create_policy]
/// bag = ["ANY"]
///
/// [[bags]]
/// name = "system"
/// policy = { write = ["NONE"] }
///
/// [[recipes]]
/// name = "default"
/// entries = [{ bag = "system" }, { bag = "common" }]
/// ```
///
/// `bags` and `recipes` are written to the store at startup, bypassing
/// policy checks.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub server: ServerConfig,
    pub core: CoreConfig,
    pub policy: PolicyConfig,
    pub bags: Vec<Bag>,
    pub recipes: Vec<Recipe>,
}

impl Config {
    pub fn from_toml_str(input: &str) -> ServerResult<Self> {
        Ok(toml::from_str(input)?)
    }

    pub fn load(path: impl AsRef<Path>) -> ServerResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|e| {
            ServerError::Config(format!("cannot read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&raw)
    }
}
