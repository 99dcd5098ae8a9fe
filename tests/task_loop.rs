use std::collections::VecDeque;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use async_trait::async_trait;

use droidclaw_lib::action::{Command, Point};
use droidclaw_lib::agent_engine::{StepRecord, TaskLoop};
use droidclaw_lib::config::AgentConfig;
use droidclaw_lib::errors::{DroidClawError, DroidClawResult};
use droidclaw_lib::executor::{ActionOutcome, DeviceController};
use droidclaw_lib::llm::{ChatMessage, ModelClient};
use droidclaw_lib::perception::types::Screenshot;

/// Replays canned completions and keeps a copy of every conversation it was sent.
struct ScriptedModel {
    replies: Mutex<VecDeque<Result<String, String>>>,
    seen: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedModel {
    fn new(replies: Vec<Result<&str, &str>>) -> Arc<Self> {
        Arc::new(Self {
            replies: Mutex::new(
                replies
                    .into_iter()
                    .map(|r| r.map(str::to_string).map_err(str::to_string))
                    .collect(),
            ),
            seen: Mutex::new(Vec::new()),
        })
    }

    fn conversations(&self) -> Vec<Vec<ChatMessage>> {
        self.seen.lock().unwrap().clone()
    }
}

#[async_trait]
impl ModelClient for ScriptedModel {
    fn name(&self) -> &str {
        "scripted"
    }

    async fn send(&self, messages: &[ChatMessage]) -> DroidClawResult<String> {
        self.seen.lock().unwrap().push(messages.to_vec());
        match self.replies.lock().unwrap().pop_front() {
            Some(Ok(text)) => Ok(text),
            Some(Err(e)) => Err(DroidClawError::ModelTransport(e)),
            None => Err(DroidClawError::ModelResponse("script exhausted".into())),
        }
    }
}

/// Records dispatched commands. Finish and declined sensitive taps end the task.
struct RecordingDevice {
    dispatched: Mutex<Vec<(Command, u32, u32)>>,
    decline_sensitive: bool,
    screenshot_fails: bool,
    fail_dispatch: bool,
    /// Report every command, finish included, as a plain success.
    plain_outcomes: bool,
}

impl RecordingDevice {
    fn new() -> Self {
        Self {
            dispatched: Mutex::new(Vec::new()),
            decline_sensitive: false,
            screenshot_fails: false,
            fail_dispatch: false,
            plain_outcomes: false,
        }
    }

    fn commands(&self) -> Vec<Command> {
        self.dispatched.lock().unwrap().iter().map(|(c, _, _)| c.clone()).collect()
    }
}

#[async_trait]
impl DeviceController for RecordingDevice {
    async fn capture_screen(&self, _device_id: Option<&str>) -> DroidClawResult<Screenshot> {
        if self.screenshot_fails {
            return Err(DroidClawError::Perception("screencap failed".into()));
        }
        Ok(Screenshot {
            base64_png: "iVBORw0KGgo=".into(),
            width: 720,
            height: 1600,
            is_sensitive: false,
            is_placeholder: false,
        })
    }

    async fn current_app(&self, _device_id: Option<&str>) -> DroidClawResult<String> {
        Ok("Settings".into())
    }

    async fn dispatch(
        &self,
        command: &Command,
        _device_id: Option<&str>,
        width: u32,
        height: u32,
    ) -> DroidClawResult<ActionOutcome> {
        self.dispatched.lock().unwrap().push((command.clone(), width, height));
        if self.fail_dispatch {
            return Err(DroidClawError::Device("device offline".into()));
        }
        if self.plain_outcomes {
            return Ok(ActionOutcome::ok());
        }
        Ok(match command {
            Command::Finish { message } => ActionOutcome::finished(true, message.clone()),
            Command::Tap { sensitive: Some(_), .. } if self.decline_sensitive => {
                ActionOutcome::finished(false, "User cancelled sensitive operation")
            }
            _ => ActionOutcome::ok(),
        })
    }
}

fn quiet_config() -> AgentConfig {
    AgentConfig {
        settle_delay_ms: 0,
        record_history: false,
        ..AgentConfig::default()
    }
}

fn task_loop(model: Arc<ScriptedModel>, device: Arc<RecordingDevice>) -> TaskLoop {
    TaskLoop::new(model, device, quiet_config())
}

const TAP: &str = "The search box is at the top. do(action=\"Tap\", element=[500,100])";
const FINISH: &str = "All set. finish(message=\"Task completed.\")";

#[tokio::test]
async fn step_limit_without_finish() {
    let model = ScriptedModel::new(vec![Ok(TAP)]);
    let device = Arc::new(RecordingDevice::new());
    let result = task_loop(model, device.clone()).run("Search", None, 1, None).await;

    assert_eq!(result.steps, 1);
    assert!(!result.success);
    assert!(!result.finished);
    assert!(result.error.is_none());
    assert_eq!(result.records.len(), 1);
    assert!(result.records[0].success);
    assert_eq!(result.records[0].step, 1);
    assert_eq!(result.records[0].reasoning, "The search box is at the top.");
    assert_eq!(
        result.records[0].action,
        Some(Command::Tap { point: Point::new(500, 100), sensitive: None })
    );
    // dispatch receives the screenshot dimensions for scaling
    assert_eq!(device.dispatched.lock().unwrap()[0].1, 720);
    assert_eq!(device.dispatched.lock().unwrap()[0].2, 1600);
}

#[tokio::test]
async fn finish_on_second_step() {
    let model = ScriptedModel::new(vec![Ok(TAP), Ok(FINISH)]);
    let device = Arc::new(RecordingDevice::new());
    let result = task_loop(model, device.clone()).run("Search", None, 10, None).await;

    assert!(result.success);
    assert!(result.finished);
    assert_eq!(result.message.as_deref(), Some("Task completed."));
    assert_eq!(result.steps, 2);
    assert_eq!(result.records.len(), 2);
    assert_eq!(
        device.commands().last(),
        Some(&Command::Finish { message: "Task completed.".into() })
    );
}

#[tokio::test]
async fn model_error_is_fatal_and_keeps_records() {
    let model = ScriptedModel::new(vec![Ok(TAP), Err("connection reset")]);
    let device = Arc::new(RecordingDevice::new());
    let result = task_loop(model, device).run("Search", None, 10, None).await;

    assert!(!result.success);
    assert!(!result.finished);
    let error = result.error.expect("error is set");
    assert!(error.contains("connection reset"), "{error}");
    assert_eq!(result.records.len(), 1);
    assert_eq!(result.steps, 1);
}

#[tokio::test]
async fn undecodable_reply_is_a_failed_step() {
    let model = ScriptedModel::new(vec![
        Ok("I am not sure what to do."),
        Ok("do(action=\"Fly\", element=[1,2])"),
        Ok("finish(message=\"ok\")"),
    ]);
    let device = Arc::new(RecordingDevice::new());
    let result = task_loop(model, device.clone()).run("Search", None, 10, None).await;

    assert!(result.success);
    assert_eq!(result.records.len(), 3);
    assert!(!result.records[0].success);
    assert!(result.records[0].action.is_none());
    assert!(result.records[0].message.as_deref().unwrap().starts_with("Failed to parse action"));
    assert!(!result.records[1].success);
    // only the finish reached the device
    assert_eq!(device.commands().len(), 1);
}

#[tokio::test]
async fn dispatch_error_is_a_failed_step() {
    let model = ScriptedModel::new(vec![Ok(TAP)]);
    let device = Arc::new(RecordingDevice {
        fail_dispatch: true,
        ..RecordingDevice::new()
    });
    let result = task_loop(model, device).run("Search", None, 1, None).await;

    assert!(result.error.is_none());
    assert!(!result.records[0].success);
    assert!(result.records[0].message.as_deref().unwrap().contains("device offline"));
}

#[tokio::test]
async fn finish_directive_ends_task_when_device_does_not() {
    let model = ScriptedModel::new(vec![Ok(TAP), Ok(FINISH), Ok("do(action=\"Back\")")]);
    let device = Arc::new(RecordingDevice {
        plain_outcomes: true,
        ..RecordingDevice::new()
    });
    let result = task_loop(model, device.clone()).run("Search", None, 5, None).await;

    assert!(result.finished);
    assert!(result.success);
    assert_eq!(result.steps, 2);
    assert_eq!(result.message.as_deref(), Some("Task completed."));
    // the Back after finish was never requested
    assert_eq!(device.commands().len(), 2);
}

#[tokio::test]
async fn finish_with_failed_dispatch_ends_unsuccessfully() {
    let model = ScriptedModel::new(vec![Ok(TAP), Ok(FINISH), Ok("do(action=\"Back\")")]);
    let device = Arc::new(RecordingDevice {
        fail_dispatch: true,
        ..RecordingDevice::new()
    });
    let result = task_loop(model, device.clone()).run("Search", None, 5, None).await;

    assert!(result.finished);
    assert!(!result.success);
    assert!(result.error.is_none());
    assert_eq!(result.steps, 2);
    assert_eq!(result.message.as_deref(), Some("Task completed."));
    assert!(!result.records[1].success);
    assert_eq!(device.commands().len(), 2);
}

#[tokio::test]
async fn conversation_shape() {
    let model = ScriptedModel::new(vec![Ok(TAP), Ok(TAP)]);
    let device = Arc::new(RecordingDevice::new());
    task_loop(model.clone(), device).run("Open Wi-Fi", None, 2, None).await;

    let calls = model.conversations();
    assert_eq!(calls.len(), 2);

    let first = &calls[0];
    assert_eq!(first.len(), 2);
    assert_eq!(first[0].role, "system");
    assert!(first[1].has_image());
    assert_eq!(first[1].text(), "Open Wi-Fi\n\n{\"current_app\":\"Settings\"}");

    let second = &calls[1];
    assert_eq!(second.len(), 4);
    assert_eq!(second[0], first[0]);
    // consumed user turn was collapsed to text
    assert!(!second[1].has_image());
    assert_eq!(second[1].text(), first[1].text());
    assert_eq!(second[2].role, "assistant");
    assert_eq!(
        second[2].text(),
        "<think>The search box is at the top.</think><answer>do(action=\"Tap\", element=[500,100])</answer>"
    );
    assert!(second[3].has_image());
    assert!(second[3].text().starts_with("** Screen Info **"));
}

#[tokio::test]
async fn declined_confirmation_ends_task() {
    let model = ScriptedModel::new(vec![
        Ok("do(action=\"Tap\", element=[500,900], message=\"Pay 20 USD\")"),
        Ok(TAP),
    ]);
    let device = Arc::new(RecordingDevice {
        decline_sensitive: true,
        ..RecordingDevice::new()
    });
    let result = task_loop(model, device).run("Buy", None, 10, None).await;

    assert!(result.finished);
    assert!(!result.success);
    assert_eq!(result.steps, 1);
    assert_eq!(result.message.as_deref(), Some("User cancelled sensitive operation"));
}

#[tokio::test]
async fn screenshot_failure_uses_placeholder() {
    let model = ScriptedModel::new(vec![Ok(TAP)]);
    let device = Arc::new(RecordingDevice {
        screenshot_fails: true,
        ..RecordingDevice::new()
    });
    let result = task_loop(model.clone(), device.clone()).run("Search", None, 1, None).await;

    assert!(result.error.is_none());
    assert!(model.conversations()[0][1].has_image());
    let (_, w, h) = device.dispatched.lock().unwrap()[0].clone();
    assert_eq!((w, h), (1080, 2400));
}

#[tokio::test]
async fn observer_sees_every_step() {
    let model = ScriptedModel::new(vec![Ok(TAP), Ok(TAP), Ok("finish(message=\"done\")")]);
    let device = Arc::new(RecordingDevice::new());
    let mut seen: Vec<u32> = Vec::new();
    let mut observe = |r: &StepRecord| seen.push(r.step);
    let result = task_loop(model, device).run("Search", None, 10, Some(&mut observe)).await;

    assert!(result.success);
    assert_eq!(seen, vec![1, 2, 3]);
}

#[tokio::test]
async fn consecutive_failure_ceiling() {
    let model = ScriptedModel::new(vec![Ok("???"), Ok("???"), Ok(TAP)]);
    let device = Arc::new(RecordingDevice::new());
    let config = AgentConfig {
        max_consecutive_failures: Some(2),
        ..quiet_config()
    };
    let result = TaskLoop::new(model, device, config).run("Search", None, 10, None).await;

    assert!(!result.success);
    assert_eq!(result.records.len(), 2);
    assert!(result.error.unwrap().contains("2 consecutive"));
}

#[tokio::test]
async fn stop_flag_cancels_before_next_step() {
    let model = ScriptedModel::new(vec![Ok(TAP), Ok(TAP)]);
    let device = Arc::new(RecordingDevice::new());
    let stop = Arc::new(AtomicBool::new(false));
    let runner = task_loop(model, device).with_stop_flag(stop.clone());

    let flag = stop.clone();
    let mut cancel_after_first = move |_: &StepRecord| flag.store(true, Ordering::SeqCst);
    let result = runner.run("Search", None, 10, Some(&mut cancel_after_first)).await;

    assert_eq!(result.records.len(), 1);
    assert_eq!(result.error.as_deref(), Some("Task cancelled"));
}

#[tokio::test]
async fn history_file_written_per_run() {
    let dir = tempfile::tempdir().unwrap();
    let model = ScriptedModel::new(vec![Ok(TAP), Ok("finish(message=\"done\")")]);
    let device = Arc::new(RecordingDevice::new());
    let config = AgentConfig {
        record_history: true,
        ..quiet_config()
    };
    let result = TaskLoop::new(model, device, config)
        .with_history_dir(dir.path())
        .run("Search", Some("emulator-5554"), 10, None)
        .await;
    assert!(result.success);

    let files: Vec<_> = std::fs::read_dir(dir.path()).unwrap().collect();
    assert_eq!(files.len(), 1);
    let text = std::fs::read_to_string(files[0].as_ref().unwrap().path()).unwrap();
    let kinds: Vec<String> = text
        .lines()
        .map(|l| serde_json::from_str::<serde_json::Value>(l).unwrap()["kind"].as_str().unwrap().to_string())
        .collect();
    assert_eq!(kinds, vec!["task", "step", "step", "result"]);
}
