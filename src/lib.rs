pub mod action;
pub mod agent_engine;
pub mod config;
pub mod errors;
pub mod executor;
pub mod llm;
pub mod perception;

use std::sync::Arc;

use crate::agent_engine::TaskLoop;
use crate::config::AppConfig;
use crate::errors::DroidClawResult;
use crate::executor::adb::Adb;
use crate::executor::apps::AppRegistry;
use crate::executor::{AdbController, Interaction};
use crate::llm::providers::OpenAiCompatibleClient;

/// Install the global `tracing` subscriber. `RUST_LOG` overrides the default
/// `info` filter.
pub fn init_tracing() {
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .with_writer(std::io::stderr)
        .init();
}

/// Device controller for the configured `adb` binary and app table.
pub fn build_controller(config: &AppConfig, interaction: Arc<dyn Interaction>) -> AdbController {
    let adb = Adb::new(config.device.adb_path.clone(), config.device.device_id.clone());
    AdbController::new(adb, AppRegistry::with_extra(&config.apps), interaction)
}

/// Wire the OpenAI-compatible client and the ADB controller into a task loop.
pub fn build_task_loop(
    config: &AppConfig,
    interaction: Arc<dyn Interaction>,
) -> DroidClawResult<TaskLoop> {
    let model = OpenAiCompatibleClient::new(config.model.model.clone(), config.model.clone())?;
    tracing::info!(
        base_url = %config.model.base_url,
        model = %config.model.model,
        stream = config.model.stream,
        "model client ready"
    );
    let controller = build_controller(config, interaction);
    Ok(TaskLoop::new(
        Arc::new(model),
        Arc::new(controller),
        config.agent.clone(),
    ))
}
