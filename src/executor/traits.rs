use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::action::types::Command;
use crate::errors::DroidClawResult;
use crate::perception::types::Screenshot;

/// Result of dispatching one command to the device.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActionOutcome {
    pub success: bool,
    /// Device-side terminal condition: the finish command itself, or a
    /// sensitive tap the human declined.
    pub should_finish: bool,
    pub message: Option<String>,
}

impl ActionOutcome {
    pub fn ok() -> Self {
        Self {
            success: true,
            should_finish: false,
            message: None,
        }
    }

    pub fn ok_with(message: impl Into<String>) -> Self {
        Self {
            success: true,
            should_finish: false,
            message: Some(message.into()),
        }
    }

    pub fn failed(message: impl Into<String>) -> Self {
        Self {
            success: false,
            should_finish: false,
            message: Some(message.into()),
        }
    }

    pub fn finished(success: bool, message: impl Into<String>) -> Self {
        Self {
            success,
            should_finish: true,
            message: Some(message.into()),
        }
    }
}

/// Everything the task loop needs from a device. Implementations own their
/// transport; the loop never sees it.
#[async_trait]
pub trait DeviceController: Send + Sync {
    async fn capture_screen(&self, device_id: Option<&str>) -> DroidClawResult<Screenshot>;

    /// Human-readable name of the foreground app.
    async fn current_app(&self, device_id: Option<&str>) -> DroidClawResult<String>;

    /// Execute `command`; virtual coordinates are scaled against `width`×`height`.
    async fn dispatch(
        &self,
        command: &Command,
        device_id: Option<&str>,
        width: u32,
        height: u32,
    ) -> DroidClawResult<ActionOutcome>;
}

/// Human-in-the-loop hooks for sensitive taps and takeover requests.
#[async_trait]
pub trait Interaction: Send + Sync {
    /// Return `true` to let a sensitive tap proceed.
    async fn confirm(&self, message: &str) -> bool;

    /// Block until the human has finished acting on the device.
    async fn take_over(&self, message: &str);
}
