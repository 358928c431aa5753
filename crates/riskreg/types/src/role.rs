//! Who is acting.

use serde::{Deserialize, Serialize};

use crate::ids::UserId;

/// Register roles. Only managers bypass approval gating and create
/// controls.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Manager,
    RiskOwner,
    ControlOwner,
}

impl Role {
    pub fn is_manager(self) -> bool {
        matches!(self, Self::Manager)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Manager => "manager",
            Self::RiskOwner => "risk_owner",
            Self::ControlOwner => "control_owner",
        }
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A user acting in a role.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Actor {
    pub user_id: UserId,
    pub role: Role,
}

impl Actor {
    pub fn new(user_id: impl Into<String>, role: Role) -> Self {
        Self {
            user_id: UserId::new(user_id),
            role,
        }
    }

    pub fn manager(user_id: impl Into<String>) -> Self {
        Self::new(user_id, Role::Manager)
    }
}

impl std::fmt::Display for Actor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} ({})", self.user_id, self.role)
    }
}
