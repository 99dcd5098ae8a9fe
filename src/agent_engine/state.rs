use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::action::types::Command;

/// Lifecycle of one task run. `Finished` and `Failed` are terminal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TaskState {
    Running,
    Finished { success: bool },
    Failed { error: String },
}

impl TaskState {
    pub fn is_running(&self) -> bool {
        matches!(self, TaskState::Running)
    }
}

/// Audit entry for one loop iteration. Never mutated after it is appended.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepRecord {
    /// 1-based.
    pub step: u32,
    pub reasoning: String,
    /// Directive text as the model wrote it.
    pub directive: String,
    /// `None` when the directive failed to decode.
    pub action: Option<Command>,
    pub success: bool,
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct TaskResult {
    pub success: bool,
    /// The loop reached a terminal outcome rather than running out of steps.
    pub finished: bool,
    pub steps: u32,
    pub records: Vec<StepRecord>,
    pub message: Option<String>,
    pub error: Option<String>,
}
