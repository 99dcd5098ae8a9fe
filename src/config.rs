use std::collections::HashMap;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::errors::{DroidClawError, DroidClawResult};

#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub model: ModelConfig,
    #[serde(default)]
    pub agent: AgentConfig,
    #[serde(default)]
    pub device: DeviceConfig,
    /// Extra app name → package id entries, merged over the built-in table.
    #[serde(default)]
    pub apps: HashMap<String, String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ModelConfig {
    /// OpenAI-compatible base URL, e.g. `http://localhost:8000/v1`.
    #[serde(default = "default_base_url")]
    pub base_url: String,
    #[serde(default = "default_model")]
    pub model: String,
    /// Falls back to env var `DROIDCLAW_API_KEY` when absent.
    #[serde(default)]
    pub api_key: Option<String>,
    #[serde(default)]
    pub temperature: f64,
    #[serde(default = "default_top_p")]
    pub top_p: f64,
    #[serde(default = "default_frequency_penalty")]
    pub frequency_penalty: f64,
    #[serde(default = "default_max_tokens")]
    pub max_tokens: u32,
    /// Use SSE streaming for completions.
    #[serde(default = "default_true")]
    pub stream: bool,
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            base_url: default_base_url(),
            model: default_model(),
            api_key: None,
            temperature: 0.0,
            top_p: default_top_p(),
            frequency_penalty: default_frequency_penalty(),
            max_tokens: default_max_tokens(),
            stream: true,
            timeout_secs: default_timeout_secs(),
        }
    }
}

impl ModelConfig {
    pub fn resolved_api_key(&self) -> String {
        std::env::var("DROIDCLAW_API_KEY")
            .ok()
            .filter(|k| !k.is_empty())
            .or_else(|| self.api_key.clone())
            .unwrap_or_else(|| "EMPTY".to_string())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AgentConfig {
    #[serde(default = "default_max_steps")]
    pub max_steps: u32,
    /// Pause after every dispatched action so the device UI can settle.
    #[serde(default = "default_settle_delay_ms")]
    pub settle_delay_ms: u64,
    /// Abort the task after this many failed steps in a row. Unset = never.
    #[serde(default)]
    pub max_consecutive_failures: Option<u32>,
    /// Write a JSONL audit file per task.
    #[serde(default = "default_true")]
    pub record_history: bool,
    /// Overrides the built-in system prompt.
    #[serde(default)]
    pub system_prompt: Option<String>,
}

impl Default for AgentConfig {
    fn default() -> Self {
        Self {
            max_steps: default_max_steps(),
            settle_delay_ms: default_settle_delay_ms(),
            max_consecutive_failures: None,
            record_history: true,
            system_prompt: None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeviceConfig {
    /// ADB serial; `None` targets the only connected device.
    #[serde(default)]
    pub device_id: Option<String>,
    #[serde(default = "default_adb_path")]
    pub adb_path: String,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            device_id: None,
            adb_path: default_adb_path(),
        }
    }
}

fn default_base_url() -> String {
    "http://localhost:8000/v1".to_string()
}

fn default_model() -> String {
    "autoglm-phone-9b".to_string()
}

fn default_top_p() -> f64 {
    0.85
}

fn default_frequency_penalty() -> f64 {
    0.2
}

fn default_max_tokens() -> u32 {
    3000
}

fn default_timeout_secs() -> u64 {
    120
}

fn default_max_steps() -> u32 {
    100
}

fn default_settle_delay_ms() -> u64 {
    1000
}

fn default_adb_path() -> String {
    "adb".to_string()
}

fn default_true() -> bool {
    true
}

fn resolve_config_path() -> Option<PathBuf> {
    if let Ok(exe) = std::env::current_exe() {
        if let Some(parent) = exe.parent() {
            let candidate = parent.join("config.toml");
            if candidate.exists() {
                tracing::debug!(path = %candidate.display(), "config found next to executable");
                return Some(candidate);
            }
        }
    }

    let candidate = std::env::current_dir().ok()?.join("config.toml");
    if candidate.exists() {
        tracing::debug!(path = %candidate.display(), "config found in working directory");
        return Some(candidate);
    }

    None
}

/// Load `config.toml` from an explicit path, or from the executable directory /
/// working directory. A missing implicit config yields defaults.
pub fn load_config(explicit: Option<&Path>) -> DroidClawResult<AppConfig> {
    let path = match explicit {
        Some(p) if p.exists() => p.to_path_buf(),
        Some(p) => {
            return Err(DroidClawError::Config(format!(
                "config file not found: {}",
                p.display()
            )))
        }
        None => match resolve_config_path() {
            Some(p) => p,
            None => {
                tracing::info!("no config.toml found; using defaults");
                return Ok(AppConfig::default());
            }
        },
    };
    let content = std::fs::read_to_string(&path)?;
    let config = parse_config(&content)?;
    tracing::info!(path = %path.display(), model = %config.model.model, "config loaded");
    Ok(config)
}

pub fn parse_config(content: &str) -> DroidClawResult<AppConfig> {
    let config: AppConfig = toml::from_str(content)?;
    if config.agent.max_steps == 0 {
        return Err(DroidClawError::Config("agent.max_steps must be at least 1".into()));
    }
    Ok(config)
}

pub fn save_config(config: &AppConfig, path: &Path) -> DroidClawResult<()> {
    let content = toml::to_string_pretty(config)?;
    std::fs::write(path, content)?;
    tracing::info!(path = %path.display(), "config saved");
    Ok(())
}
