use serde::{Deserialize, Serialize};

use tiddly_model::{Operation, Policy, Principal};
use tiddly_policy::{Decision, PolicyEngine};

/// Who may create new bags and recipes.
///
/// Each list uses the policy vocabulary: principal names, `R:<role>`,
/// `ANY`, or `NONE`. An empty list lets everyone create.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CreatePolicy {
    pub bag: Vec<String>,
    pub recipe: Vec<String>,
}

/// Orchestrator configuration.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CoreConfig {
    pub create_policy: CreatePolicy,
}

/// The kind of entity being created.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub(crate) enum Creating {
    Bag,
    Recipe,
}

impl CoreConfig {
    /// Only authenticated principals may create bags and recipes.
    pub fn authenticated_creators() -> Self {
        let any = vec![tiddly_model::policy::ANY.to_string()];
        Self {
            create_policy: CreatePolicy {
                bag: any.clone(),
                recipe: any,
            },
        }
    }

    pub(crate) fn may_create(
        &self,
        engine: &PolicyEngine,
        what: Creating,
        principal: &Principal,
    ) -> Decision {
        let list = match what {
            Creating::Bag => &self.create_policy.bag,
            Creating::Recipe => &self.create_policy.recipe,
        };
        let mut policy = Policy::open();
        *policy.list_mut(Operation::Create) = list.clone();
        engine.evaluate(&policy, Operation::Create, principal)
    }
}
