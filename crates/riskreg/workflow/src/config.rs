use serde::{Deserialize, Serialize};

use crate::events::EventBus;

/// Review and event settings.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowConfig {
    /// Compare a change's recorded baseline with the live entity before
    /// approving it, and reject it if they differ.
    #[serde(default)]
    pub validate_baseline_on_approval: bool,

    #[serde(default = "default_event_capacity")]
    pub event_capacity: usize,
}

impl Default for WorkflowConfig {
    fn default() -> Self {
        Self {
            validate_baseline_on_approval: false,
            event_capacity: default_event_capacity(),
        }
    }
}

fn default_event_capacity() -> usize {
    EventBus::DEFAULT_CAPACITY
}
