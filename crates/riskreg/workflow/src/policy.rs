//! Approval policy: which edits must go through the draft path.

use std::collections::HashSet;

use riskreg_types::{Actor, ControlId, EntityKind};
use serde::{Deserialize, Serialize};

/// Answers "does an edit to this entity currently need approval?".
///
/// Implementations are consulted on every routed edit and must be cheap.
pub trait ApprovalPolicy: Send + Sync {
    fn is_required(&self, entity: EntityKind, entity_id: &str) -> bool;
}

/// Gating decision for one edit: the policy says so and the actor is not a
/// manager.
pub fn requires_approval(policy: &dyn ApprovalPolicy, control_id: &ControlId, actor: &Actor) -> bool {
    policy.is_required(EntityKind::Control, control_id.as_str()) && !actor.role.is_manager()
}

/// Which controls the built-in policy gates.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ApprovalMode {
    /// Every edit is applied directly.
    #[default]
    None,
    /// Every control edit needs approval.
    AllControls,
    /// Only controls listed in `control_ids`.
    Listed,
}

#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ApprovalConfig {
    #[serde(default)]
    pub mode: ApprovalMode,
    #[serde(default)]
    pub control_ids: Vec<String>,
}

/// Policy driven by [`ApprovalConfig`]. Only control edits are ever gated.
#[derive(Clone, Debug, Default)]
pub struct ConfiguredApprovalPolicy {
    mode: ApprovalMode,
    listed: HashSet<String>,
}

impl ConfiguredApprovalPolicy {
    pub fn new(config: &ApprovalConfig) -> Self {
        Self {
            mode: config.mode,
            listed: config.control_ids.iter().cloned().collect(),
        }
    }

    pub fn all_controls() -> Self {
        Self {
            mode: ApprovalMode::AllControls,
            listed: HashSet::new(),
        }
    }

    pub fn listed<I, S>(ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            mode: ApprovalMode::Listed,
            listed: ids.into_iter().map(Into::into).collect(),
        }
    }

    pub fn mode(&self) -> ApprovalMode {
        self.mode
    }
}

impl ApprovalPolicy for ConfiguredApprovalPolicy {
    fn is_required(&self, entity: EntityKind, entity_id: &str) -> bool {
        if entity != EntityKind::Control {
            return false;
        }
        match self.mode {
            ApprovalMode::None => false,
            ApprovalMode::AllControls => true,
            ApprovalMode::Listed => self.listed.contains(entity_id),
        }
    }
}
