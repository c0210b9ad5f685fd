use tiddly_policy::PolicyError;
use tiddly_store::StoreError;

/// Errors from filter parsing and recipe resolution.
#[derive(Debug, thiserror::Error)]
pub enum RecipeError {
    /// A filter expression could not be parsed.
    #[error("invalid filter {filter:?}: {reason}")]
    InvalidFilter { filter: String, reason: String },

    /// No bag in the recipe holds the tiddler.
    #[error("tiddler {title:?} not found in recipe {recipe:?}")]
    NotFound { recipe: String, title: String },

    /// No bag in the recipe would accept a new tiddler with this title.
    #[error("no bag in recipe {recipe:?} accepts tiddler {title:?}")]
    NoWritableBag { recipe: String, title: String },

    /// Candidate bags exist but the principal may not create in any of them.
    #[error(transparent)]
    Forbidden(#[from] PolicyError),

    #[error(transparent)]
    Store(#[from] StoreError),
}

pub type RecipeResult<T> = Result<T, RecipeError>;
