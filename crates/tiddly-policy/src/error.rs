use tiddly_model::Operation;

/// Errors raised by policy enforcement.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum PolicyError {
    /// The principal may not perform `op` on `entity`.
    #[error("{principal} may not {op} {entity}: {reason}")]
    Forbidden {
        entity: String,
        op: Operation,
        principal: String,
        reason: String,
    },
}

impl PolicyError {
    /// The principal the denial applies to.
    pub fn principal(&self) -> &str {
        match self {
            Self::Forbidden { principal, .. } => principal,
        }
    }
}

pub type PolicyResult<T> = Result<T, PolicyError>;
