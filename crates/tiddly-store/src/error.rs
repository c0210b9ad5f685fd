use tiddly_model::{ModelError, Revision};

/// Errors from revision store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// No tiddler (or no such revision of it) exists in the bag.
    #[error("tiddler {title:?} not found in bag {bag:?}{}", revision_suffix(.revision))]
    TiddlerNotFound {
        bag: String,
        title: String,
        revision: Option<Revision>,
    },

    /// The named bag does not exist.
    #[error("bag not found: {0}")]
    BagNotFound(String),

    /// The named recipe does not exist.
    #[error("recipe not found: {0}")]
    RecipeNotFound(String),

    /// A put targeted a bag that does not exist. The caller should create
    /// the bag first.
    #[error("cannot put tiddler {title:?}: there is no bag named {bag:?}")]
    NoBag { bag: String, title: String },

    /// The writer expected to replace `expected` but the latest revision
    /// is `actual`. Safe to retry after re-reading.
    #[error("revision conflict on {bag}/{title}: expected {expected}, latest is {}", latest_label(.actual))]
    RevisionConflict {
        bag: String,
        title: String,
        expected: Revision,
        actual: Option<Revision>,
    },

    /// Ephemeral bags are scratch space and are never persisted.
    #[error("bag {0:?} is ephemeral and cannot be stored")]
    EphemeralBag(String),

    /// The entity handed to the store is invalid.
    #[error("invalid entity: {0}")]
    Invalid(#[from] ModelError),

    /// The backend could not complete the request (timeout, unavailable).
    #[error("store unavailable: {0}")]
    Unavailable(String),
}

fn revision_suffix(revision: &Option<Revision>) -> String {
    revision.map(|r| format!(" at revision {r}")).unwrap_or_default()
}

fn latest_label(actual: &Option<Revision>) -> String {
    actual.map(|r| r.to_string()).unwrap_or_else(|| "none".into())
}

impl StoreError {
    /// Whether retrying the same call later may succeed without any other
    /// change by the caller.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_) | Self::RevisionConflict { .. })
    }

    /// Whether this error means the requested entity is absent.
    pub fn is_not_found(&self) -> bool {
        matches!(
            self,
            Self::TiddlerNotFound { .. } | Self::BagNotFound(_) | Self::RecipeNotFound(_)
        )
    }
}

pub type StoreResult<T> = Result<T, StoreError>;
