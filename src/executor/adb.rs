//! Thin async wrapper around the `adb` executable.

use std::process::Output;

use tokio::process::Command;

use crate::errors::{DroidClawError, DroidClawResult};

#[derive(Debug, Clone)]
pub struct Adb {
    adb_path: String,
    device_id: Option<String>,
}

impl Adb {
    pub fn new(adb_path: impl Into<String>, device_id: Option<String>) -> Self {
        Self {
            adb_path: adb_path.into(),
            device_id,
        }
    }

    /// Same binary, different target device.
    pub fn for_device(&self, device_id: Option<&str>) -> Self {
        Self {
            adb_path: self.adb_path.clone(),
            device_id: device_id.map(str::to_string).or_else(|| self.device_id.clone()),
        }
    }

    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Full argument vector including the `-s <serial>` prefix when targeted.
    pub fn build_args<S: AsRef<str>>(&self, args: &[S]) -> Vec<String> {
        let mut full = Vec::with_capacity(args.len() + 2);
        if let Some(id) = &self.device_id {
            full.push("-s".to_string());
            full.push(id.clone());
        }
        full.extend(args.iter().map(|a| a.as_ref().to_string()));
        full
    }

    pub async fn run<S: AsRef<str>>(&self, args: &[S]) -> DroidClawResult<Output> {
        let full = self.build_args(args);
        tracing::debug!(adb = %self.adb_path, args = ?full, "adb");
        let output = Command::new(&self.adb_path)
            .args(&full)
            .output()
            .await
            .map_err(|e| DroidClawError::Device(format!("failed to spawn {}: {e}", self.adb_path)))?;
        Ok(output)
    }

    /// Runs `args` and returns stdout; a non-zero exit status is an error.
    pub async fn run_checked<S: AsRef<str>>(&self, args: &[S]) -> DroidClawResult<String> {
        let output = self.run(args).await?;
        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            return Err(DroidClawError::Device(format!(
                "adb {} exited with {}: {}",
                args.iter().map(|a| a.as_ref()).collect::<Vec<_>>().join(" "),
                output.status,
                stderr.trim()
            )));
        }
        Ok(stdout)
    }

    /// `adb shell <args...>`; stdout and stderr are merged since many device
    /// tools report failures on stdout.
    pub async fn shell<S: AsRef<str>>(&self, args: &[S]) -> DroidClawResult<String> {
        let mut full = vec!["shell".to_string()];
        full.extend(args.iter().map(|a| a.as_ref().to_string()));
        let output = self.run(&full).await?;
        let mut text = String::from_utf8_lossy(&output.stdout).into_owned();
        text.push_str(&String::from_utf8_lossy(&output.stderr));
        if !output.status.success() {
            return Err(DroidClawError::Device(format!(
                "adb shell {} exited with {}: {}",
                full[1..].join(" "),
                output.status,
                text.trim()
            )));
        }
        Ok(text)
    }
}

/// A device line from `adb devices -l`.
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct DeviceInfo {
    pub serial: String,
    pub state: String,
    pub model: Option<String>,
}

pub async fn list_devices(adb_path: &str) -> DroidClawResult<Vec<DeviceInfo>> {
    let out = Adb::new(adb_path, None).run_checked(&["devices", "-l"]).await?;
    Ok(parse_devices(&out))
}

pub fn parse_devices(output: &str) -> Vec<DeviceInfo> {
    output
        .lines()
        .skip_while(|l| !l.starts_with("List of devices"))
        .skip(1)
        .filter_map(|line| {
            let mut parts = line.split_whitespace();
            let serial = parts.next()?.to_string();
            let state = parts.next()?.to_string();
            let model = parts
                .find_map(|p| p.strip_prefix("model:"))
                .map(str::to_string);
            Some(DeviceInfo { serial, state, model })
        })
        .collect()
}
