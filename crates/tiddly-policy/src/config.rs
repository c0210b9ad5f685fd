use serde::{Deserialize, Serialize};

/// Configuration for the policy engine.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct PolicyConfig {
    /// Principals holding this role pass every check, as if they owned
    /// every bag and recipe. `None` disables the bypass.
    pub superuser_role: Option<String>,
}

impl PolicyConfig {
    pub fn with_superuser_role(role: impl Into<String>) -> Self {
        Self {
            superuser_role: Some(role.into()),
        }
    }
}
