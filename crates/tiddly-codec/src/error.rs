use thiserror::Error;
use tiddly_model::ModelError;

#[derive(Debug, Error)]
pub enum CodecError {
    /// No codec is registered for the requested media type.
    #[error("unsupported media type: {0}")]
    UnsupportedMediaType(String),

    /// The input is not well-formed for this codec.
    #[error("malformed {media_type} input: {reason}")]
    Malformed {
        media_type: &'static str,
        reason: String,
    },

    /// The body names a different tiddler than the request does.
    #[error("title mismatch: request names {expected:?}, body names {found:?}")]
    TitleMismatch { expected: String, found: String },

    /// The entity cannot be expressed in this format.
    #[error("cannot encode as {media_type}: {reason}")]
    Unrepresentable {
        media_type: &'static str,
        reason: String,
    },

    /// The decoded entity violates a model invariant.
    #[error(transparent)]
    Invalid(#[from] ModelError),
}

impl CodecError {
    pub(crate) fn malformed(media_type: &'static str, reason: impl ToString) -> Self {
        Self::Malformed {
            media_type,
            reason: reason.to_string(),
        }
    }
}

pub type CodecResult<T> = Result<T, CodecError>;
