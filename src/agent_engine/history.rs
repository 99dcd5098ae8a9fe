use serde::{Deserialize, Serialize};
use std::io::Write;
use std::path::{Path, PathBuf};

use crate::agent_engine::state::{StepRecord, TaskResult};
use crate::errors::DroidClawResult;

/// One JSONL line of a session file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum HistoryEntry {
    Task {
        ts: i64,
        session_id: String,
        task: String,
        device_id: Option<String>,
    },
    Step(StepRecord),
    Result {
        ts: i64,
        success: bool,
        finished: bool,
        steps: u32,
        message: Option<String>,
        error: Option<String>,
    },
}

/// Append-only audit file for one task run.
pub struct SessionHistory {
    pub session_id: String,
    file_path: PathBuf,
}

impl SessionHistory {
    pub fn new() -> Self {
        Self::in_dir(&data_dir_or_cwd())
    }

    pub fn in_dir(dir: &Path) -> Self {
        let session_id = uuid::Uuid::new_v4().to_string();
        let file_path = dir.join(format!("session_{session_id}.jsonl"));
        Self {
            session_id,
            file_path,
        }
    }

    pub fn path(&self) -> &Path {
        &self.file_path
    }

    pub fn record_task(&self, task: &str, device_id: Option<&str>) -> DroidClawResult<()> {
        self.append(&HistoryEntry::Task {
            ts: chrono::Utc::now().timestamp_millis(),
            session_id: self.session_id.clone(),
            task: task.to_string(),
            device_id: device_id.map(str::to_string),
        })
    }

    pub fn record_step(&self, record: &StepRecord) -> DroidClawResult<()> {
        self.append(&HistoryEntry::Step(record.clone()))
    }

    pub fn record_result(&self, result: &TaskResult) -> DroidClawResult<()> {
        self.append(&HistoryEntry::Result {
            ts: chrono::Utc::now().timestamp_millis(),
            success: result.success,
            finished: result.finished,
            steps: result.steps,
            message: result.message.clone(),
            error: result.error.clone(),
        })
    }

    fn append(&self, entry: &HistoryEntry) -> DroidClawResult<()> {
        if let Some(parent) = self.file_path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let line = serde_json::to_string(entry)?;
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.file_path)?;
        writeln!(file, "{}", line)?;
        tracing::debug!(path = %self.file_path.display(), "history entry flushed");
        Ok(())
    }
}

impl Default for SessionHistory {
    fn default() -> Self {
        Self::new()
    }
}

/// `<local data dir>/droidclaw/sessions`, falling back to the working directory.
fn data_dir_or_cwd() -> PathBuf {
    if let Some(data_dir) = dirs::data_local_dir() {
        return data_dir.join("droidclaw").join("sessions");
    }
    std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."))
}
