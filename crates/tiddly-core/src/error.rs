use std::fmt;

use tiddly_codec::CodecError;
use tiddly_model::{ModelError, Revision};
use tiddly_policy::PolicyError;
use tiddly_recipe::RecipeError;
use tiddly_store::StoreError;

use crate::target::Target;

/// Outward classification of a [`CoreError`], for transports to map onto
/// their own status codes.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ErrorKind {
    /// Malformed entity. Never retried.
    Validation,
    /// Entity absent. Retry after creating it.
    NotFound,
    /// Write target bag absent. Create the bag first.
    NoContainer,
    /// Policy denial.
    Forbidden,
    /// Unsupported or malformed content.
    UnsupportedFormat,
    /// Revision collision. Retry after re-reading.
    Conflict,
    /// Backend failure. Retry with backoff.
    Unavailable,
}

/// Where a missing entity was looked for.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Location {
    pub bag: Option<String>,
    pub recipe: Option<String>,
    pub title: Option<String>,
    pub revision: Option<Revision>,
}

impl Location {
    /// A tiddler addressed through `target`.
    pub fn tiddler(target: &Target, title: &str) -> Self {
        let (bag, recipe) = match target {
            Target::Bag(name) => (Some(name.clone()), None),
            Target::Recipe(name) => (None, Some(name.clone())),
        };
        Self {
            bag,
            recipe,
            title: Some(title.to_string()),
            revision: None,
        }
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(recipe) = &self.recipe {
            parts.push(format!("recipe={recipe}"));
        }
        if let Some(bag) = &self.bag {
            parts.push(format!("bag={bag}"));
        }
        if let Some(title) = &self.title {
            parts.push(format!("title={title}"));
        }
        if let Some(revision) = &self.revision {
            parts.push(format!("revision={revision}"));
        }
        f.write_str(&parts.join(" "))
    }
}

/// Errors surfaced by the orchestrator.
#[derive(Debug, thiserror::Error)]
pub enum CoreError {
    #[error("validation error: {0}")]
    Validation(String),

    #[error("not found ({location}): {detail}")]
    NotFound { location: Location, detail: String },

    #[error(
        "unable to put tiddler {title:?}: there is no bag named {bag:?}; create the bag first"
    )]
    NoContainer { bag: String, title: String },

    #[error(transparent)]
    Forbidden(#[from] PolicyError),

    #[error("unsupported or malformed content: {0}")]
    Format(CodecError),

    #[error("conflict on {bag}/{title}: {detail}")]
    Conflict {
        bag: String,
        title: String,
        detail: String,
    },

    #[error("store failure: {0}")]
    Store(StoreError),
}

impl CoreError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::NotFound { .. } => ErrorKind::NotFound,
            Self::NoContainer { .. } => ErrorKind::NoContainer,
            Self::Forbidden(_) => ErrorKind::Forbidden,
            Self::Format(_) => ErrorKind::UnsupportedFormat,
            Self::Conflict { .. } => ErrorKind::Conflict,
            Self::Store(_) => ErrorKind::Unavailable,
        }
    }

    pub fn is_retryable(&self) -> bool {
        matches!(self.kind(), ErrorKind::Conflict | ErrorKind::Unavailable)
    }

    pub(crate) fn not_found(location: Location, detail: impl Into<String>) -> Self {
        Self::NotFound {
            location,
            detail: detail.into(),
        }
    }
}

impl From<ModelError> for CoreError {
    fn from(e: ModelError) -> Self {
        Self::Validation(e.to_string())
    }
}

impl From<CodecError> for CoreError {
    fn from(e: CodecError) -> Self {
        match e {
            CodecError::Invalid(model) => model.into(),
            other => Self::Format(other),
        }
    }
}

impl From<StoreError> for CoreError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::TiddlerNotFound {
                ref bag,
                ref title,
                revision,
            } => Self::not_found(
                Location {
                    bag: Some(bag.clone()),
                    title: Some(title.clone()),
                    revision,
                    ..Location::default()
                },
                e.to_string(),
            ),
            StoreError::BagNotFound(ref bag) => Self::not_found(
                Location {
                    bag: Some(bag.clone()),
                    ..Location::default()
                },
                e.to_string(),
            ),
            StoreError::RecipeNotFound(ref recipe) => Self::not_found(
                Location {
                    recipe: Some(recipe.clone()),
                    ..Location::default()
                },
                e.to_string(),
            ),
            StoreError::NoBag { bag, title } => Self::NoContainer { bag, title },
            StoreError::RevisionConflict {
                ref bag, ref title, ..
            } => Self::Conflict {
                bag: bag.clone(),
                title: title.clone(),
                detail: e.to_string(),
            },
            StoreError::EphemeralBag(_) => Self::Validation(e.to_string()),
            StoreError::Invalid(model) => model.into(),
            StoreError::Unavailable(_) => Self::Store(e),
        }
    }
}

impl From<RecipeError> for CoreError {
    fn from(e: RecipeError) -> Self {
        match e {
            RecipeError::InvalidFilter { .. } => Self::Validation(e.to_string()),
            RecipeError::NotFound {
                ref recipe,
                ref title,
            }
            | RecipeError::NoWritableBag {
                ref recipe,
                ref title,
            } => Self::not_found(
                Location {
                    recipe: Some(recipe.clone()),
                    title: Some(title.clone()),
                    ..Location::default()
                },
                e.to_string(),
            ),
            RecipeError::Forbidden(denial) => Self::Forbidden(denial),
            RecipeError::Store(store) => store.into(),
        }
    }
}

pub type CoreResult<T> = Result<T, CoreError>;
