//! HTTP server for Tiddly Store.
//!
//! Maps REST routes onto the orchestrator. Requests identify themselves with
//! `Authorization: Bearer <token>`; without one they run as `GUEST`.
//!
//! | Outcome            | Status |
//! |--------------------|--------|
//! | not found          | 404    |
//! | denied (guest)     | 401    |
//! | denied             | 403    |
//! | missing bag, failed `If-Match` | 409 |
//! | bad content type   | 415    |
//! | malformed entity   | 400    |
//! | store unavailable  | 503    |

pub mod auth;
pub mod config;
pub mod error;
pub mod handler;
pub mod router;
pub mod server;
pub mod state;

pub use auth::{AuthProvider, Credentials, StaticTokenAuth};
pub use config::{Config, ServerConfig, TokenConfig};
pub use error::{ServerError, ServerResult};
pub use server::TiddlyServer;
pub use state::{AppState, Caller};
