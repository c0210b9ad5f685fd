use tiddly_model::policy::{ANY, NONE, ROLE_PREFIX};
use tiddly_model::{Bag, Operation, Policy, Principal, Recipe};

use crate::config::PolicyConfig;
use crate::error::{PolicyError, PolicyResult};

// ---------------------------------------------------------------------------
// Decision
// ---------------------------------------------------------------------------

/// The outcome of a policy check.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum Decision {
    Allowed,
    Denied { reason: String },
}

impl Decision {
    pub fn is_allowed(&self) -> bool {
        matches!(self, Self::Allowed)
    }

    fn forbidden(detail: impl AsRef<str>) -> Self {
        Self::Denied {
            reason: format!("forbidden: {}", detail.as_ref()),
        }
    }
}

// ---------------------------------------------------------------------------
// Governed
// ---------------------------------------------------------------------------

/// An entity that carries an access policy.
pub trait Governed {
    fn policy(&self) -> &Policy;

    /// Human-readable label used in denial messages, e.g. `bag "cooking"`.
    fn describe(&self) -> String;
}

impl Governed for Bag {
    fn policy(&self) -> &Policy {
        &self.policy
    }

    fn describe(&self) -> String {
        format!("bag {:?}", self.name)
    }
}

impl Governed for Recipe {
    fn policy(&self) -> &Policy {
        &self.policy
    }

    fn describe(&self) -> String {
        format!("recipe {:?}", self.name)
    }
}

// ---------------------------------------------------------------------------
// PolicyEngine
// ---------------------------------------------------------------------------

/// Evaluates policies. Stateless apart from its configuration, so a single
/// engine can be shared across concurrent requests.
#[derive(Clone, Debug, Default)]
pub struct PolicyEngine {
    config: PolicyConfig,
}

impl PolicyEngine {
    pub fn new(config: PolicyConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &PolicyConfig {
        &self.config
    }

    /// Decide whether `principal` may perform `op` on `entity`.
    pub fn check<G: Governed + ?Sized>(
        &self,
        entity: &G,
        op: Operation,
        principal: &Principal,
    ) -> Decision {
        self.evaluate(entity.policy(), op, principal)
    }

    /// Like [`Self::check`], but a denial becomes [`PolicyError::Forbidden`].
    pub fn require<G: Governed + ?Sized>(
        &self,
        entity: &G,
        op: Operation,
        principal: &Principal,
    ) -> PolicyResult<()> {
        match self.check(entity, op, principal) {
            Decision::Allowed => Ok(()),
            Decision::Denied { reason } => {
                tracing::debug!(
                    entity = %entity.describe(),
                    op = %op,
                    principal = %principal,
                    "policy denied"
                );
                Err(PolicyError::Forbidden {
                    entity: entity.describe(),
                    op,
                    principal: principal.name.clone(),
                    reason,
                })
            }
        }
    }

    /// Evaluate a bare policy.
    ///
    /// Order: owner and superuser pass; an empty list passes; `NONE` denies;
    /// then the principal's name, its roles (`R:<role>`), and `ANY` for
    /// authenticated principals are tried in turn.
    pub fn evaluate(&self, policy: &Policy, op: Operation, principal: &Principal) -> Decision {
        if principal.is_authenticated() && policy.owner.as_deref() == Some(principal.name.as_str())
        {
            return Decision::Allowed;
        }
        if let Some(role) = &self.config.superuser_role {
            if principal.has_role(role) {
                return Decision::Allowed;
            }
        }

        let list = policy.list(op);
        if list.is_empty() {
            return Decision::Allowed;
        }
        if list.iter().any(|entry| entry == NONE) {
            return Decision::forbidden(format!("{op} is restricted to the owner"));
        }

        let admitted = list.iter().any(|entry| {
            if entry == ANY {
                return principal.is_authenticated();
            }
            if let Some(role) = entry.strip_prefix(ROLE_PREFIX) {
                return principal.has_role(role);
            }
            *entry == principal.name
        });

        if admitted {
            Decision::Allowed
        } else {
            Decision::forbidden(format!("{principal} is not permitted to {op}"))
        }
    }
}
