//! Collaborator traits.
//!
//! The verification engine never talks to a device directly. Everything it
//! needs from the outside world goes through the traits in this module:
//!
//! - [`DeviceProvider`] - list running devices and look one up by id
//! - [`UiInspector`] - capture a fresh UI hierarchy snapshot
//! - [`ScreenshotProvider`] - write a screenshot to disk
//! - [`ArtifactStore`] - hand out per-assertion artifact directories
//! - [`LogProvider`] - fetch a window of the system log
//!
//! Reference implementations backed by `xcrun simctl` and `axe` live in
//! [`simctl`](crate::simctl), [`axe`](crate::axe) and
//! [`artifacts`](crate::artifacts). Tests substitute scripted mocks.

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::element::UIElement;
use crate::error::VerifyError;

/// Device state reported as ready for inspection.
pub const READY_STATE: &str = "Booted";

/// A device or simulator as reported by a [`DeviceProvider`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeviceInfo {
    pub id: String,
    pub name: String,
    pub state: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub os_version: Option<String>,
}

impl DeviceInfo {
    pub fn is_ready(&self) -> bool {
        self.state == READY_STATE
    }
}

/// Metadata about one captured snapshot.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SnapshotStats {
    pub element_count: usize,
    pub captured_at: DateTime<Utc>,
    pub duration_ms: u64,
}

/// A fresh, independent UI hierarchy capture.
#[derive(Debug, Clone, PartialEq)]
pub struct UiSnapshot {
    pub tree: UIElement,
    pub stats: SnapshotStats,
}

impl UiSnapshot {
    /// Wraps a tree captured just now, filling in the stats from the tree.
    pub fn new(tree: UIElement, duration_ms: u64) -> Self {
        let stats = SnapshotStats {
            element_count: tree.count(),
            captured_at: Utc::now(),
            duration_ms,
        };
        Self { tree, stats }
    }
}

/// A screenshot written to disk.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ScreenshotInfo {
    pub path: PathBuf,
    /// File size in bytes.
    pub size: u64,
}

/// Parameters for a system log query.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LogQuery {
    pub device_id: String,
    /// Only entries at or after this instant. `None` lets the provider pick
    /// its own default window.
    pub since: Option<DateTime<Utc>>,
    /// Restrict to a single process (usually the app's executable name).
    pub process_filter: Option<String>,
    pub level: Option<String>,
    /// Keep at most this many of the most recent entries.
    pub limit: Option<usize>,
}

/// One system log line.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogEntry {
    pub timestamp: DateTime<Utc>,
    pub process: String,
    pub level: String,
    pub message: String,
}

impl LogEntry {
    pub fn new(process: impl Into<String>, level: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            timestamp: Utc::now(),
            process: process.into(),
            level: level.into(),
            message: message.into(),
        }
    }
}

/// Enumerates devices.
#[async_trait]
pub trait DeviceProvider: Send + Sync {
    /// Devices currently in the ready state.
    async fn list_running_devices(&self) -> Result<Vec<DeviceInfo>, VerifyError>;

    /// Looks up a device by id regardless of its state.
    async fn get_device(&self, id: &str) -> Result<Option<DeviceInfo>, VerifyError>;
}

/// Captures the UI hierarchy of a device.
///
/// Must be safe to call repeatedly; each call returns an independent tree.
#[async_trait]
pub trait UiInspector: Send + Sync {
    async fn inspect(&self, device_id: &str, session_id: Option<&str>) -> Result<UiSnapshot, VerifyError>;
}

/// Captures screenshots.
#[async_trait]
pub trait ScreenshotProvider: Send + Sync {
    async fn screenshot(&self, device_id: &str, output_path: &Path) -> Result<ScreenshotInfo, VerifyError>;
}

/// Allocates artifact directories.
///
/// `snapshot_directory` must be idempotent and create parents as needed.
#[async_trait]
pub trait ArtifactStore: Send + Sync {
    async fn snapshot_directory(&self, session_id: &str, assertion_id: &str) -> Result<PathBuf, VerifyError>;
}

/// Retrieves system log entries, already windowed by the query.
#[async_trait]
pub trait LogProvider: Send + Sync {
    async fn system_log(&self, query: &LogQuery) -> Result<Vec<LogEntry>, VerifyError>;
}

/// Resolves the device an assertion runs against.
///
/// An explicit id must exist and be ready. Without one, the first running
/// device is used.
pub async fn resolve_device(
    devices: &dyn DeviceProvider,
    device_id: Option<&str>,
) -> Result<DeviceInfo, VerifyError> {
    match device_id {
        Some(id) => {
            let device = devices
                .get_device(id)
                .await?
                .ok_or_else(|| VerifyError::DeviceNotFound(id.to_string()))?;
            if !device.is_ready() {
                return Err(VerifyError::DeviceNotReady {
                    id: device.id,
                    state: device.state,
                });
            }
            Ok(device)
        }
        None => devices
            .list_running_devices()
            .await?
            .into_iter()
            .next()
            .ok_or(VerifyError::NoBootedDevice),
    }
}
