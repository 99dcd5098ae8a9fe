// Command dispatcher: maps decoded commands onto ADB input primitives.
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;

use crate::action::types::{Command, DurationArg, DEFAULT_LONG_PRESS_MS, DEFAULT_WAIT_SECONDS};
use crate::errors::DroidClawResult;
use crate::executor::adb::Adb;
use crate::executor::apps::AppRegistry;
use crate::executor::coordinator::{pair_to_pixels, to_pixels};
use crate::executor::input;
use crate::executor::safety::requires_confirmation;
use crate::executor::text_input;
use crate::executor::traits::{ActionOutcome, DeviceController, Interaction};
use crate::perception::screenshot;
use crate::perception::types::Screenshot;

/// Reported when the foreground package is not in the app table.
pub const HOME_SCREEN_LABEL: &str = "System Home";

/// `DeviceController` backed by a local `adb` binary.
pub struct AdbController {
    adb: Adb,
    apps: AppRegistry,
    interaction: Arc<dyn Interaction>,
}

impl AdbController {
    pub fn new(adb: Adb, apps: AppRegistry, interaction: Arc<dyn Interaction>) -> Self {
        Self {
            adb,
            apps,
            interaction,
        }
    }

    pub fn apps(&self) -> &AppRegistry {
        &self.apps
    }

    async fn execute(
        &self,
        adb: &Adb,
        command: &Command,
        width: u32,
        height: u32,
    ) -> ActionOutcome {
        match command {
            Command::Launch { app } => {
                let Some(package) = self.apps.package_for(app) else {
                    return ActionOutcome::failed(format!("App not found: {app}"));
                };
                report(input::launch(adb, &package).await, || format!("Launched {app}"), "Launch")
            }

            Command::Tap { point, .. } => {
                if let Some(message) = requires_confirmation(command) {
                    if !self.interaction.confirm(message).await {
                        tracing::info!(message, "sensitive tap declined");
                        return ActionOutcome::finished(false, "User cancelled sensitive operation");
                    }
                }
                let (x, y) = to_pixels(*point, width, height);
                report(input::tap(adb, x, y).await, || format!("Tapped ({x},{y})"), "Tap")
            }

            Command::DoubleTap { point } => {
                let (x, y) = to_pixels(*point, width, height);
                report(
                    input::double_tap(adb, x, y).await,
                    || format!("Double-tapped ({x},{y})"),
                    "Double tap",
                )
            }

            Command::LongPress { point, duration } => {
                let (x, y) = to_pixels(*point, width, height);
                let duration_ms = duration
                    .as_ref()
                    .and_then(DurationArg::as_millis)
                    .unwrap_or(DEFAULT_LONG_PRESS_MS);
                report(
                    input::long_press(adb, x, y, duration_ms).await,
                    || format!("Long-pressed ({x},{y}) for {duration_ms}ms"),
                    "Long press",
                )
            }

            Command::Swipe { from, to } => {
                let (start, end) = pair_to_pixels(*from, *to, width, height);
                report(
                    input::swipe(adb, start, end).await,
                    || format!("Swiped {start:?} → {end:?}"),
                    "Swipe",
                )
            }

            Command::Type { text, .. } => report(
                text_input::type_text(adb, text).await,
                || format!("Typed {} chars", text.chars().count()),
                "Type",
            ),

            Command::Back => report(input::back(adb).await, || "Pressed back".to_string(), "Back"),

            Command::Home => report(input::home(adb).await, || "Pressed home".to_string(), "Home"),

            Command::Wait { duration } => {
                let duration_seconds = duration
                    .as_ref()
                    .and_then(DurationArg::as_seconds)
                    .unwrap_or(DEFAULT_WAIT_SECONDS);
                tokio::time::sleep(Duration::from_secs_f64(duration_seconds)).await;
                ActionOutcome::ok_with(format!("Waited {duration_seconds}s"))
            }

            Command::TakeOver { reason } => {
                self.interaction.take_over(reason).await;
                ActionOutcome::ok_with(format!("Human takeover completed: {reason}"))
            }

            Command::Interact => ActionOutcome::ok_with("User interaction required"),

            Command::Note { text } => ActionOutcome::ok_with(format!("Noted: {text}")),

            Command::CallApi { instruction } => {
                ActionOutcome::ok_with(format!("API call recorded: {instruction}"))
            }

            Command::Finish { message } => ActionOutcome::finished(true, message.clone()),
        }
    }
}

fn report(
    result: DroidClawResult<()>,
    on_success: impl FnOnce() -> String,
    what: &str,
) -> ActionOutcome {
    match result {
        Ok(()) => ActionOutcome::ok_with(on_success()),
        Err(e) => ActionOutcome::failed(format!("{what} failed: {e}")),
    }
}

#[async_trait]
impl DeviceController for AdbController {
    async fn capture_screen(&self, device_id: Option<&str>) -> DroidClawResult<Screenshot> {
        screenshot::capture(&self.adb.for_device(device_id)).await
    }

    async fn current_app(&self, device_id: Option<&str>) -> DroidClawResult<String> {
        let package = input::focused_package(&self.adb.for_device(device_id)).await?;
        Ok(package
            .and_then(|p| self.apps.name_for(&p))
            .unwrap_or_else(|| HOME_SCREEN_LABEL.to_string()))
    }

    async fn dispatch(
        &self,
        command: &Command,
        device_id: Option<&str>,
        width: u32,
        height: u32,
    ) -> DroidClawResult<ActionOutcome> {
        let adb = self.adb.for_device(device_id);
        let outcome = self.execute(&adb, command, width, height).await;
        tracing::info!(
            action = command.name(),
            success = outcome.success,
            should_finish = outcome.should_finish,
            msg = outcome.message.as_deref().unwrap_or(""),
            "action dispatched"
        );
        Ok(outcome)
    }
}
