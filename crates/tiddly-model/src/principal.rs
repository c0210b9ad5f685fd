use std::fmt;

use serde::{Deserialize, Serialize};

/// Name given to the unauthenticated principal.
pub const ANONYMOUS: &str = "GUEST";

/// The identity issuing an operation.
///
/// Supplied by the transport layer after authentication. A principal is
/// either anonymous (`GUEST`) or an authenticated user with zero or more
/// roles.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Principal {
    pub name: String,
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Principal {
    pub fn anonymous() -> Self {
        Self {
            name: ANONYMOUS.into(),
            roles: Vec::new(),
        }
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            roles: Vec::new(),
        }
    }

    /// Add a role to this principal (builder style).
    pub fn with_role(mut self, role: impl Into<String>) -> Self {
        self.roles.push(role.into());
        self
    }

    pub fn is_authenticated(&self) -> bool {
        self.name != ANONYMOUS
    }

    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl fmt::Display for Principal {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.name)
    }
}
