use thiserror::Error;

/// Errors produced while constructing or validating model entities.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A tiddler title is empty or malformed.
    #[error("invalid title {title:?}: {reason}")]
    InvalidTitle { title: String, reason: String },

    /// A bag or recipe name is empty or malformed.
    #[error("invalid {entity} name {name:?}: {reason}")]
    InvalidName {
        entity: &'static str,
        name: String,
        reason: String,
    },

    /// An explicitly supplied revision is not a positive integer.
    #[error("invalid revision {0}: revisions start at 1")]
    InvalidRevision(i64),

    /// An extension field key is empty or collides with a core attribute.
    #[error("invalid field {key:?}: {reason}")]
    InvalidField { key: String, reason: String },

    /// A tag is blank or cannot be written in a tag list.
    #[error("invalid tag {tag:?}: {reason}")]
    InvalidTag { tag: String, reason: String },
}

pub type ModelResult<T> = Result<T, ModelError>;
