use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// List token granting access to any authenticated principal.
pub const ANY: &str = "ANY";
/// List token granting access to nobody but the owner.
pub const NONE: &str = "NONE";
/// Prefix marking a role token, e.g. `R:editor`.
pub const ROLE_PREFIX: &str = "R:";

/// The kind of operation a policy check is made for.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Operation {
    Read,
    Write,
    Create,
    Delete,
    Manage,
}

impl Operation {
    pub const ALL: [Operation; 5] = [
        Operation::Read,
        Operation::Write,
        Operation::Create,
        Operation::Delete,
        Operation::Manage,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Read => "read",
            Self::Write => "write",
            Self::Create => "create",
            Self::Delete => "delete",
            Self::Manage => "manage",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Operation {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|op| op.as_str() == s)
            .ok_or_else(|| format!("unknown operation: {s}"))
    }
}

/// Access rules attached to a bag or recipe.
///
/// Each list holds principal names, role tokens (`R:<role>`), or the special
/// tokens [`ANY`] and [`NONE`]. An empty list leaves that operation
/// unrestricted. Evaluation lives in the `tiddly-policy` crate; this type is
/// plain data and clones into an independent value.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Policy {
    #[serde(default)]
    pub owner: Option<String>,
    #[serde(default)]
    pub read: Vec<String>,
    #[serde(default)]
    pub write: Vec<String>,
    #[serde(default)]
    pub create: Vec<String>,
    #[serde(default)]
    pub delete: Vec<String>,
    #[serde(default)]
    pub manage: Vec<String>,
}

impl Policy {
    /// A policy with every list empty: anyone may do anything.
    pub fn open() -> Self {
        Self::default()
    }

    /// A policy where only `owner` may do anything.
    pub fn private(owner: impl Into<String>) -> Self {
        let locked = || vec![NONE.to_string()];
        Self {
            owner: Some(owner.into()),
            read: locked(),
            write: locked(),
            create: locked(),
            delete: locked(),
            manage: locked(),
        }
    }

    /// The permission list for an operation.
    pub fn list(&self, op: Operation) -> &[String] {
        match op {
            Operation::Read => &self.read,
            Operation::Write => &self.write,
            Operation::Create => &self.create,
            Operation::Delete => &self.delete,
            Operation::Manage => &self.manage,
        }
    }

    /// Mutable access to the permission list for an operation.
    pub fn list_mut(&mut self, op: Operation) -> &mut Vec<String> {
        match op {
            Operation::Read => &mut self.read,
            Operation::Write => &mut self.write,
            Operation::Create => &mut self.create,
            Operation::Delete => &mut self.delete,
            Operation::Manage => &mut self.manage,
        }
    }

    /// Replace the list for `op` (builder style).
    pub fn with(mut self, op: Operation, entries: &[&str]) -> Self {
        *self.list_mut(op) = entries.iter().map(|e| e.to_string()).collect();
        self
    }

    pub fn with_owner(mut self, owner: impl Into<String>) -> Self {
        self.owner = Some(owner.into());
        self
    }

    pub fn is_unrestricted(&self, op: Operation) -> bool {
        self.list(op).is_empty()
    }
}
