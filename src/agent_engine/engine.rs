use std::path::PathBuf;
use std::sync::atomic::AtomicBool;
use std::sync::Arc;
use std::time::Duration;

use crate::action::{parse_action, split_response, Command};
use crate::agent_engine::history::SessionHistory;
use crate::agent_engine::loop_control::{LoopController, StopReason};
use crate::agent_engine::prompt::system_prompt;
use crate::agent_engine::state::{StepRecord, TaskResult, TaskState};
use crate::config::AgentConfig;
use crate::errors::{DroidClawError, DroidClawResult};
use crate::executor::traits::{ActionOutcome, DeviceController};
use crate::llm::provider::ModelClient;
use crate::llm::types::ChatMessage;
use crate::perception::screenshot;

/// Label used when the foreground app cannot be determined.
pub const UNKNOWN_APP: &str = "Unknown";

/// Observer called after every appended step record.
pub type StepObserver<'a> = &'a mut (dyn FnMut(&StepRecord) + Send);

/// Sequences screenshot → model → decode → dispatch until the task finishes,
/// fails, or runs out of steps. Holds no per-task state; every `run` gets a
/// fresh conversation.
pub struct TaskLoop {
    model: Arc<dyn ModelClient>,
    device: Arc<dyn DeviceController>,
    config: AgentConfig,
    system_prompt: String,
    history_dir: Option<PathBuf>,
    stop_flag: Option<Arc<AtomicBool>>,
}

/// What one iteration produced.
struct StepOutcome {
    record: StepRecord,
    command: Option<Command>,
    should_finish: bool,
}

impl TaskLoop {
    pub fn new(
        model: Arc<dyn ModelClient>,
        device: Arc<dyn DeviceController>,
        config: AgentConfig,
    ) -> Self {
        let system_prompt = system_prompt(config.system_prompt.as_deref());
        Self {
            model,
            device,
            config,
            system_prompt,
            history_dir: None,
            stop_flag: None,
        }
    }

    /// Write session files here instead of the default data directory.
    pub fn with_history_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.history_dir = Some(dir.into());
        self
    }

    /// Checked before every step; setting it fails the task with "Task cancelled".
    pub fn with_stop_flag(mut self, flag: Arc<AtomicBool>) -> Self {
        self.stop_flag = Some(flag);
        self
    }

    pub fn system_prompt(&self) -> &str {
        &self.system_prompt
    }

    /// Run `task` to completion. Never returns an error: fatal failures end up
    /// in `TaskResult::error` alongside every step recorded so far.
    pub async fn run(
        &self,
        task: &str,
        device_id: Option<&str>,
        max_steps: u32,
        mut on_step: Option<StepObserver<'_>>,
    ) -> TaskResult {
        let mut result = TaskResult::default();
        let mut state = TaskState::Running;
        let mut ctrl = LoopController::new(
            max_steps,
            self.config.max_consecutive_failures,
            self.stop_flag.clone(),
        );
        let history = self.open_history(task, device_id);
        let mut conversation = vec![ChatMessage::system(self.system_prompt.clone())];

        tracing::info!(task = %task, device = device_id.unwrap_or("default"), max_steps, "task started");

        while state.is_running() {
            if let Some(reason) = ctrl.should_stop() {
                match reason {
                    StopReason::MaxSteps => {
                        tracing::info!(max_steps, "step limit reached");
                    }
                    StopReason::TooManyFailures(n) => {
                        state = TaskState::Failed {
                            error: DroidClawError::Agent(format!(
                                "stopped after {n} consecutive failed steps"
                            ))
                            .to_string(),
                        };
                    }
                    StopReason::Cancelled => {
                        state = TaskState::Failed {
                            error: DroidClawError::Cancelled.to_string(),
                        };
                    }
                }
                break;
            }

            let step = ctrl.begin_step();
            let outcome = match self.step(step, task, device_id, &mut conversation).await {
                Ok(o) => o,
                Err(e) => {
                    tracing::error!(step, error = %e, "step aborted");
                    state = TaskState::Failed { error: e.to_string() };
                    break;
                }
            };

            if outcome.record.success {
                ctrl.record_success();
            } else {
                ctrl.record_failure();
            }

            if outcome.should_finish {
                result.message = match &outcome.command {
                    Some(Command::Finish { message }) => Some(message.clone()),
                    _ => outcome.record.message.clone(),
                };
                state = TaskState::Finished {
                    success: outcome.record.success,
                };
            }

            if let Some(h) = &history {
                if let Err(e) = h.record_step(&outcome.record) {
                    tracing::warn!("history write failed: {e}");
                }
            }
            result.records.push(outcome.record);
            if let Some(cb) = on_step.as_deref_mut() {
                if let Some(last) = result.records.last() {
                    cb(last);
                }
            }
        }

        result.steps = result.records.len() as u32;
        match state {
            TaskState::Finished { success } => {
                result.finished = true;
                result.success = success;
            }
            TaskState::Failed { error } => {
                result.error = Some(error);
            }
            TaskState::Running => {}
        }

        tracing::info!(
            success = result.success,
            finished = result.finished,
            steps = result.steps,
            error = result.error.as_deref().unwrap_or(""),
            "task ended"
        );
        if let Some(h) = &history {
            if let Err(e) = h.record_result(&result) {
                tracing::warn!("history write failed: {e}");
            }
        }
        result
    }

    async fn step(
        &self,
        step: u32,
        task: &str,
        device_id: Option<&str>,
        conversation: &mut Vec<ChatMessage>,
    ) -> DroidClawResult<StepOutcome> {
        let shot = match self.device.capture_screen(device_id).await {
            Ok(s) => s,
            Err(e) => {
                tracing::warn!(step, error = %e, "screenshot failed, using placeholder");
                screenshot::placeholder(false)
            }
        };
        let current_app = match self.device.current_app(device_id).await {
            Ok(app) => app,
            Err(e) => {
                tracing::debug!(step, error = %e, "foreground app unknown");
                UNKNOWN_APP.to_string()
            }
        };

        let text = build_user_text(step, task, &current_app);
        conversation.push(ChatMessage::user_with_image(text, shot.data_url()));

        tracing::debug!(step, messages = conversation.len(), app = %current_app, "calling model");
        let completion = self.model.send(conversation).await?;

        let split = split_response(&completion);
        let decoded = parse_action(&split.action);

        if let Some(last) = conversation.last_mut() {
            last.strip_images();
        }

        let (command, outcome, finish) = match decoded {
            Ok(parsed) => {
                let finish = parsed.is_finish();
                let outcome = match self
                    .device
                    .dispatch(&parsed.command, device_id, shot.width, shot.height)
                    .await
                {
                    Ok(o) => o,
                    Err(e) => ActionOutcome::failed(format!("Dispatch failed: {e}")),
                };
                if !finish && self.config.settle_delay_ms > 0 {
                    tokio::time::sleep(Duration::from_millis(self.config.settle_delay_ms)).await;
                }
                (Some(parsed.command), outcome, finish)
            }
            Err(e) => {
                tracing::warn!(step, directive = %split.action, error = %e, "could not decode action");
                (None, ActionOutcome::failed(format!("Failed to parse action: {e}")), false)
            }
        };

        // a finish directive ends the task whatever the device reported
        let should_finish = finish || outcome.should_finish;
        tracing::info!(
            step,
            action = command.as_ref().map(Command::name).unwrap_or("<invalid>"),
            success = outcome.success,
            should_finish,
            "step complete"
        );

        conversation.push(ChatMessage::assistant(format!(
            "<think>{}</think><answer>{}</answer>",
            split.reasoning, split.action
        )));

        let record = StepRecord {
            step,
            reasoning: split.reasoning,
            directive: split.action,
            action: command.clone(),
            success: outcome.success,
            message: outcome.message,
            timestamp: chrono::Utc::now(),
        };
        Ok(StepOutcome {
            record,
            command,
            should_finish,
        })
    }

    fn open_history(&self, task: &str, device_id: Option<&str>) -> Option<SessionHistory> {
        if !self.config.record_history {
            return None;
        }
        let history = match &self.history_dir {
            Some(dir) => SessionHistory::in_dir(dir),
            None => SessionHistory::new(),
        };
        if let Err(e) = history.record_task(task, device_id) {
            tracing::warn!(path = %history.path().display(), "history disabled: {e}");
            return None;
        }
        tracing::debug!(session = %history.session_id, path = %history.path().display(), "recording session");
        Some(history)
    }
}

/// `{"current_app": ...}` as sent alongside every screenshot.
pub fn screen_info(current_app: &str) -> String {
    serde_json::json!({ "current_app": current_app }).to_string()
}

/// Text part of the user turn: the task on the first step, screen info only
/// afterwards.
pub fn build_user_text(step: u32, task: &str, current_app: &str) -> String {
    let info = screen_info(current_app);
    if step <= 1 {
        format!("{task}\n\n{info}")
    } else {
        format!("** Screen Info **\n\n{info}")
    }
}
