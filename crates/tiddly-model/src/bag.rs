use serde::{Deserialize, Serialize};

use crate::error::ModelResult;
use crate::names::validate_bag_name;
use crate::policy::Policy;

/// How much revision history a bag retains.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum History {
    /// Every revision is kept.
    #[default]
    Full,
    /// Only the newest revision is kept. Revision numbers still increase.
    LatestOnly,
}

/// A named container of tiddlers with an attached access policy.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Bag {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub policy: Policy,
    /// Ephemeral bags are in-memory scratch space and are never persisted.
    #[serde(default)]
    pub ephemeral: bool,
    #[serde(default)]
    pub history: History,
}

impl Bag {
    pub fn new(name: impl Into<String>) -> ModelResult<Self> {
        let name = name.into();
        validate_bag_name(&name)?;
        Ok(Self {
            name,
            description: String::new(),
            policy: Policy::default(),
            ephemeral: false,
            history: History::Full,
        })
    }

    /// A scratch bag that stores refuse to persist.
    pub fn ephemeral(name: impl Into<String>) -> ModelResult<Self> {
        let mut bag = Self::new(name)?;
        bag.ephemeral = true;
        Ok(bag)
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    pub fn with_history(mut self, history: History) -> Self {
        self.history = history;
        self
    }

    pub fn validate(&self) -> ModelResult<()> {
        validate_bag_name(&self.name)
    }
}
