use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::names::{validate_bag_name, validate_recipe_name};
use crate::policy::Policy;

/// One step of a recipe: a bag plus an optional filter expression.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RecipeEntry {
    pub bag: String,
    #[serde(default)]
    pub filter: Option<String>,
}

impl RecipeEntry {
    pub fn new(bag: impl Into<String>) -> Self {
        Self {
            bag: bag.into(),
            filter: None,
        }
    }

    pub fn filtered(bag: impl Into<String>, filter: impl Into<String>) -> Self {
        Self {
            bag: bag.into(),
            filter: Some(filter.into()),
        }
    }

    /// The filter, treating blank strings as absent.
    pub fn filter(&self) -> Option<&str> {
        self.filter.as_deref().filter(|f| !f.trim().is_empty())
    }
}

/// An ordered composition of bags.
///
/// Later entries override earlier ones: when two bags hold the same title,
/// the one listed last is the one a reader sees.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipe {
    pub name: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub policy: Policy,
    #[serde(default)]
    pub entries: Vec<RecipeEntry>,
}

impl Recipe {
    pub fn new(name: impl Into<String>) -> ModelResult<Self> {
        let name = name.into();
        validate_recipe_name(&name)?;
        Ok(Self {
            name,
            description: String::new(),
            policy: Policy::default(),
            entries: Vec::new(),
        })
    }

    /// Append an entry (builder style).
    pub fn with_entry(mut self, entry: RecipeEntry) -> Self {
        self.entries.push(entry);
        self
    }

    pub fn with_policy(mut self, policy: Policy) -> Self {
        self.policy = policy;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = description.into();
        self
    }

    /// Bag names in listed order, duplicates included.
    pub fn bag_names(&self) -> impl Iterator<Item = &str> {
        self.entries.iter().map(|e| e.bag.as_str())
    }

    pub fn validate(&self) -> ModelResult<()> {
        validate_recipe_name(&self.name)?;
        for (i, entry) in self.entries.iter().enumerate() {
            validate_bag_name(&entry.bag).map_err(|e| ModelError::InvalidName {
                entity: "recipe entry",
                name: entry.bag.clone(),
                reason: format!("entry {i}: {e}"),
            })?;
        }
        Ok(())
    }
}
