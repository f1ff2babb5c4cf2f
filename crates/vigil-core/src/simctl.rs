//! Interface to Apple's `xcrun simctl` command-line tool.
//!
//! [`Simctl`] is the reference [`DeviceProvider`], [`ScreenshotProvider`] and
//! [`LogProvider`] for iOS Simulators. Every call spawns `xcrun` and parses
//! its output; nothing is cached between calls.
//!
//! # Requirements
//!
//! Xcode must be installed for `xcrun simctl` to be available.
//!
//! # Example
//!
//! ```no_run
//! use vigil_core::simctl::Simctl;
//!
//! # async fn run() -> Result<(), vigil_core::simctl::SimctlError> {
//! for device in Simctl::list_devices().await? {
//!     println!("{}: {} ({})", device.name, device.udid, device.state);
//! }
//! # Ok(())
//! # }
//! ```

use std::collections::HashMap;
use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::process::Command;
use tracing::debug;

use crate::device::{
    DeviceInfo, DeviceProvider, LogEntry, LogProvider, LogQuery, ScreenshotInfo, ScreenshotProvider,
};
use crate::error::VerifyError;

/// Window used for log queries that carry no `since`.
const DEFAULT_LOG_WINDOW: &str = "1m";

const LOG_TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S%.f%z";

/// Errors that can occur when interacting with simctl.
#[derive(Error, Debug)]
pub enum SimctlError {
    /// A simctl command failed to execute successfully.
    #[error("Command execution failed: {0}")]
    CommandFailed(String),

    /// Failed to parse JSON output from simctl.
    #[error("JSON parse error: {0}")]
    JsonParse(#[from] serde_json::Error),

    /// An I/O error occurred while executing the command.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Represents an iOS Simulator device.
///
/// This struct contains information about a simulator device as reported
/// by `xcrun simctl list devices -j`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SimulatorDevice {
    /// The unique device identifier (UDID) for this simulator.
    pub udid: String,

    /// The human-readable name of the device (e.g., "iPhone 15 Pro").
    pub name: String,

    /// The current state of the device (e.g., "Booted", "Shutdown").
    pub state: String,

    /// The device type identifier (e.g., "com.apple.CoreSimulator.SimDeviceType.iPhone-15-Pro").
    #[serde(rename = "deviceTypeIdentifier")]
    pub device_type: Option<String>,

    /// Human-readable runtime, derived from the runtime key (e.g. "iOS 17.0").
    #[serde(skip_deserializing, default)]
    pub runtime: Option<String>,
}

impl From<SimulatorDevice> for DeviceInfo {
    fn from(device: SimulatorDevice) -> Self {
        DeviceInfo {
            id: device.udid,
            name: device.name,
            state: device.state,
            os_version: device.runtime,
        }
    }
}

#[derive(Debug, Deserialize)]
struct DeviceList {
    devices: HashMap<String, Vec<SimulatorDevice>>,
}

/// One record of `log show --style json`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawLogRecord {
    timestamp: String,
    #[serde(default)]
    process_image_path: Option<String>,
    #[serde(default)]
    message_type: Option<String>,
    #[serde(default)]
    event_message: Option<String>,
}

/// Turns `com.apple.CoreSimulator.SimRuntime.iOS-17-0` into `iOS 17.0`.
fn runtime_name(key: &str) -> Option<String> {
    let tail = key.rsplit('.').next()?;
    let (platform, version) = tail.split_once('-')?;
    Some(format!("{} {}", platform, version.replace('-', ".")))
}

/// Reverse-DNS shape: three or more non-empty components, the first all
/// lowercase letters (`com`, `org`, `io`...).
fn looks_like_bundle_id(filter: &str) -> bool {
    let parts: Vec<&str> = filter.split('.').collect();
    parts.len() >= 3
        && parts.iter().all(|p| !p.is_empty())
        && parts[0].chars().all(|c| c.is_ascii_lowercase())
}

/// `log show` predicate for a process filter. A bundle id matches either
/// the subsystem or the executable named by its last component; anything
/// else is matched as a process name.
fn process_predicate(filter: &str) -> String {
    let quoted = |s: &str| format!("\"{}\"", s.replace('"', "\\\""));
    match filter.rsplit_once('.') {
        Some((_, executable)) if looks_like_bundle_id(filter) => format!(
            "subsystem == {} OR process == {}",
            quoted(filter),
            quoted(executable)
        ),
        _ => format!("process == {}", quoted(filter)),
    }
}

async fn run_xcrun(args: &[&str]) -> Result<Vec<u8>, SimctlError> {
    debug!(args = ?args, "xcrun");
    let output = Command::new("xcrun").args(args).output().await?;

    if !output.status.success() {
        return Err(SimctlError::CommandFailed(
            String::from_utf8_lossy(&output.stderr).trim().to_string(),
        ));
    }
    Ok(output.stdout)
}

/// Wrapper for `xcrun simctl` commands.
#[derive(Debug, Clone, Copy, Default)]
pub struct Simctl;

impl Simctl {
    /// Lists all available iOS Simulator devices, regardless of state.
    ///
    /// # Errors
    ///
    /// - [`SimctlError::Io`] if the command fails to execute
    /// - [`SimctlError::CommandFailed`] if simctl returns a non-zero exit code
    /// - [`SimctlError::JsonParse`] if the output cannot be parsed as JSON
    pub async fn list_devices() -> Result<Vec<SimulatorDevice>, SimctlError> {
        let stdout = run_xcrun(&["simctl", "list", "devices", "-j"]).await?;
        Self::parse_device_list(&stdout)
    }

    /// Writes a PNG screenshot of the simulator screen to `path`.
    pub async fn screenshot_to(udid: &str, path: &Path) -> Result<u64, SimctlError> {
        let path_str = path.to_string_lossy();
        run_xcrun(&["simctl", "io", udid, "screenshot", path_str.as_ref()]).await?;
        let metadata = tokio::fs::metadata(path).await?;
        Ok(metadata.len())
    }

    /// Runs `log show` inside the simulator and parses the result.
    pub async fn log_show(query: &LogQuery) -> Result<Vec<LogEntry>, SimctlError> {
        let args = Self::log_show_args(query);
        let arg_refs: Vec<&str> = args.iter().map(String::as_str).collect();
        let stdout = run_xcrun(&arg_refs).await?;
        let mut entries = Self::parse_log_output(&stdout)?;

        if let Some(level) = query.level.as_deref() {
            if !matches!(level.to_ascii_lowercase().as_str(), "debug" | "info") {
                entries.retain(|e| e.level.eq_ignore_ascii_case(level));
            }
        }
        if let Some(limit) = query.limit {
            if entries.len() > limit {
                entries.drain(..entries.len() - limit);
            }
        }
        Ok(entries)
    }

    /// Builds the argument list for `xcrun simctl spawn <udid> log show`.
    pub fn log_show_args(query: &LogQuery) -> Vec<String> {
        let mut args: Vec<String> = ["simctl", "spawn", query.device_id.as_str(), "log", "show", "--style", "json"]
            .iter()
            .map(|s| s.to_string())
            .collect();

        match query.since {
            Some(since) => {
                args.push("--start".to_string());
                args.push(since.format("%Y-%m-%d %H:%M:%S%z").to_string());
            }
            None => {
                args.push("--last".to_string());
                args.push(DEFAULT_LOG_WINDOW.to_string());
            }
        }

        match query.level.as_deref().map(str::to_ascii_lowercase).as_deref() {
            Some("debug") => {
                args.push("--info".to_string());
                args.push("--debug".to_string());
            }
            Some("info") => args.push("--info".to_string()),
            _ => {}
        }

        if let Some(ref process) = query.process_filter {
            args.push("--predicate".to_string());
            args.push(process_predicate(process));
        }
        args
    }

    /// Parses device list JSON into a flat vector of devices.
    ///
    /// Exposed for testing. Each device's `runtime` is filled in from the
    /// runtime key it was listed under.
    pub fn parse_device_list(json: &[u8]) -> Result<Vec<SimulatorDevice>, SimctlError> {
        let device_list: DeviceList = serde_json::from_slice(json)?;
        let mut devices: Vec<SimulatorDevice> = device_list
            .devices
            .into_iter()
            .flat_map(|(runtime, devices)| {
                let name = runtime_name(&runtime);
                devices.into_iter().map(move |mut d| {
                    d.runtime = name.clone();
                    d
                })
            })
            .collect();
        // HashMap order is arbitrary; keep listings stable.
        devices.sort_by(|a, b| b.runtime.cmp(&a.runtime).then_with(|| a.name.cmp(&b.name)));
        Ok(devices)
    }

    /// Parses `log show --style json` output into log entries.
    ///
    /// Records with an unparseable timestamp are skipped. The process name
    /// is the last path component of `processImagePath`.
    pub fn parse_log_output(json: &[u8]) -> Result<Vec<LogEntry>, SimctlError> {
        if json.iter().all(u8::is_ascii_whitespace) {
            return Ok(Vec::new());
        }
        let records: Vec<RawLogRecord> = serde_json::from_slice(json)?;
        Ok(records
            .into_iter()
            .filter_map(|record| {
                let timestamp = DateTime::parse_from_str(&record.timestamp, LOG_TIMESTAMP_FORMAT)
                    .ok()?
                    .with_timezone(&Utc);
                let process = record
                    .process_image_path
                    .as_deref()
                    .and_then(|p| p.rsplit('/').next())
                    .unwrap_or_default()
                    .to_string();
                Some(LogEntry {
                    timestamp,
                    process,
                    level: record.message_type.unwrap_or_else(|| "Default".to_string()),
                    message: record.event_message.unwrap_or_default(),
                })
            })
            .collect())
    }
}

#[async_trait]
impl DeviceProvider for Simctl {
    async fn list_running_devices(&self) -> Result<Vec<DeviceInfo>, VerifyError> {
        let devices = Self::list_devices()
            .await
            .map_err(|e| VerifyError::DeviceQuery(e.to_string()))?;
        Ok(devices
            .into_iter()
            .map(DeviceInfo::from)
            .filter(DeviceInfo::is_ready)
            .collect())
    }

    async fn get_device(&self, id: &str) -> Result<Option<DeviceInfo>, VerifyError> {
        let devices = Self::list_devices()
            .await
            .map_err(|e| VerifyError::DeviceQuery(e.to_string()))?;
        Ok(devices.into_iter().find(|d| d.udid == id).map(DeviceInfo::from))
    }
}

#[async_trait]
impl ScreenshotProvider for Simctl {
    async fn screenshot(&self, device_id: &str, output_path: &Path) -> Result<ScreenshotInfo, VerifyError> {
        let size = Self::screenshot_to(device_id, output_path)
            .await
            .map_err(|e| VerifyError::Capture(format!("screenshot: {}", e)))?;
        Ok(ScreenshotInfo {
            path: output_path.to_path_buf(),
            size,
        })
    }
}

#[async_trait]
impl LogProvider for Simctl {
    async fn system_log(&self, query: &LogQuery) -> Result<Vec<LogEntry>, VerifyError> {
        Self::log_show(query)
            .await
            .map_err(|e| VerifyError::LogRetrieval(e.to_string()))
    }
}
