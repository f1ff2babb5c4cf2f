//! Shared test helpers for vigil-core integration tests.
//!
//! Scripted stand-ins for every collaborator trait, plus a [`Harness`]
//! that wires them into a [`Verifier`] and keeps handles for inspection.

#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use vigil_core::device::{
    ArtifactStore, DeviceInfo, DeviceProvider, LogEntry, LogProvider, LogQuery, ScreenshotInfo, ScreenshotProvider,
    UiInspector, UiSnapshot,
};
use vigil_core::{Collaborators, UIElement, Verifier, VerifyError, VigilConfig};

pub const DEVICE_ID: &str = "SIM-0001";

pub fn booted(id: &str) -> DeviceInfo {
    DeviceInfo {
        id: id.to_string(),
        name: "iPhone 15".to_string(),
        state: "Booted".to_string(),
        os_version: Some("iOS 17.0".to_string()),
    }
}

// ---------------------------------------------------------------------------
// Devices
// ---------------------------------------------------------------------------

pub struct StaticDevices(pub Vec<DeviceInfo>);

#[async_trait]
impl DeviceProvider for StaticDevices {
    async fn list_running_devices(&self) -> Result<Vec<DeviceInfo>, VerifyError> {
        Ok(self.0.iter().filter(|d| d.is_ready()).cloned().collect())
    }

    async fn get_device(&self, id: &str) -> Result<Option<DeviceInfo>, VerifyError> {
        Ok(self.0.iter().find(|d| d.id == id).cloned())
    }
}

// ---------------------------------------------------------------------------
// UI snapshots
// ---------------------------------------------------------------------------

/// Hands out trees in order, repeating the last one once the script runs out.
pub struct ScriptedInspector {
    trees: Mutex<VecDeque<UIElement>>,
    last: Mutex<UIElement>,
    failure: Option<String>,
    /// 1-based call number that fails; `None` with `failure` set fails every call.
    fail_on: Option<usize>,
    latency: Option<Duration>,
    calls: AtomicUsize,
}

impl ScriptedInspector {
    pub fn new(trees: Vec<UIElement>) -> Self {
        Self {
            trees: Mutex::new(trees.into()),
            last: Mutex::new(UIElement::new("Application")),
            failure: None,
            fail_on: None,
            latency: None,
            calls: AtomicUsize::new(0),
        }
    }

    pub fn failing(message: &str) -> Self {
        Self {
            failure: Some(message.to_string()),
            ..Self::new(Vec::new())
        }
    }

    /// Fails only the `call`-th snapshot; the trees are served otherwise.
    pub fn failing_on_call(mut self, call: usize, message: &str) -> Self {
        self.failure = Some(message.to_string());
        self.fail_on = Some(call);
        self
    }

    /// Each snapshot takes `ms` of (paused) clock time.
    pub fn with_latency(mut self, ms: u64) -> Self {
        self.latency = Some(Duration::from_millis(ms));
        self
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl UiInspector for ScriptedInspector {
    async fn inspect(&self, _device_id: &str, _session_id: Option<&str>) -> Result<UiSnapshot, VerifyError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        if let Some(latency) = self.latency {
            tokio::time::sleep(latency).await;
        }
        if let Some(ref message) = self.failure {
            if self.fail_on.map_or(true, |n| n == call) {
                return Err(VerifyError::Snapshot(message.clone()));
            }
        }
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.trees.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(UiSnapshot::new(last.clone(), 1))
    }
}

// ---------------------------------------------------------------------------
// Screenshots and artifacts
// ---------------------------------------------------------------------------

#[derive(Default)]
pub struct RecordingScreenshots {
    pub taken: Mutex<Vec<PathBuf>>,
    pub fail: bool,
}

#[async_trait]
impl ScreenshotProvider for RecordingScreenshots {
    async fn screenshot(&self, _device_id: &str, output_path: &Path) -> Result<ScreenshotInfo, VerifyError> {
        if self.fail {
            return Err(VerifyError::Capture("simctl io screenshot exited with 1".to_string()));
        }
        self.taken.lock().unwrap().push(output_path.to_path_buf());
        Ok(ScreenshotInfo {
            path: output_path.to_path_buf(),
            size: 1024,
        })
    }
}

/// Hands out directory paths without touching the filesystem.
#[derive(Default)]
pub struct MemoryArtifacts {
    pub fail: bool,
    pub requested: Mutex<Vec<(String, String)>>,
}

#[async_trait]
impl ArtifactStore for MemoryArtifacts {
    async fn snapshot_directory(&self, session_id: &str, assertion_id: &str) -> Result<PathBuf, VerifyError> {
        if self.fail {
            return Err(VerifyError::ArtifactDirectory("read-only file system".to_string()));
        }
        self.requested
            .lock()
            .unwrap()
            .push((session_id.to_string(), assertion_id.to_string()));
        Ok(PathBuf::from("/artifacts").join(session_id).join(assertion_id))
    }
}

// ---------------------------------------------------------------------------
// System log
// ---------------------------------------------------------------------------

/// Returns scripted log windows in order, repeating the last, and records
/// every query it receives.
pub struct StaticLogs {
    windows: Mutex<VecDeque<Vec<LogEntry>>>,
    last: Mutex<Vec<LogEntry>>,
    fail_on: Option<usize>,
    pub queries: Mutex<Vec<LogQuery>>,
}

impl StaticLogs {
    pub fn new(entries: Vec<LogEntry>) -> Self {
        Self::sequence(vec![entries])
    }

    pub fn sequence(windows: Vec<Vec<LogEntry>>) -> Self {
        Self {
            windows: Mutex::new(windows.into()),
            last: Mutex::new(Vec::new()),
            fail_on: None,
            queries: Mutex::new(Vec::new()),
        }
    }

    /// Fails the `call`-th fetch (1-based) without consuming a window.
    pub fn failing_on_call(mut self, call: usize) -> Self {
        self.fail_on = Some(call);
        self
    }

    pub fn messages(messages: &[&str]) -> Self {
        Self::new(entries("MyApp", messages))
    }
}

#[async_trait]
impl LogProvider for StaticLogs {
    async fn system_log(&self, query: &LogQuery) -> Result<Vec<LogEntry>, VerifyError> {
        let call = {
            let mut queries = self.queries.lock().unwrap();
            queries.push(query.clone());
            queries.len()
        };
        if self.fail_on == Some(call) {
            return Err(VerifyError::LogRetrieval("log show exited with 1".to_string()));
        }
        let mut last = self.last.lock().unwrap();
        if let Some(next) = self.windows.lock().unwrap().pop_front() {
            *last = next;
        }
        Ok(last.clone())
    }
}

pub fn entries(process: &str, messages: &[&str]) -> Vec<LogEntry> {
    messages
        .iter()
        .map(|m| LogEntry::new(process, "Default", *m))
        .collect()
}

// ---------------------------------------------------------------------------
// Harness
// ---------------------------------------------------------------------------

/// A verifier wired to mocks, with handles kept for assertions on calls.
pub struct Harness {
    pub verifier: Verifier,
    pub inspector: Arc<ScriptedInspector>,
    pub screenshots: Arc<RecordingScreenshots>,
    pub artifacts: Arc<MemoryArtifacts>,
    pub logs: Arc<StaticLogs>,
}

pub struct HarnessBuilder {
    devices: Vec<DeviceInfo>,
    inspector: ScriptedInspector,
    screenshots: RecordingScreenshots,
    artifacts: MemoryArtifacts,
    logs: StaticLogs,
    config: VigilConfig,
}

impl HarnessBuilder {
    pub fn devices(mut self, devices: Vec<DeviceInfo>) -> Self {
        self.devices = devices;
        self
    }

    pub fn trees(mut self, trees: Vec<UIElement>) -> Self {
        self.inspector = ScriptedInspector::new(trees);
        self
    }

    pub fn inspector(mut self, inspector: ScriptedInspector) -> Self {
        self.inspector = inspector;
        self
    }

    pub fn logs(mut self, logs: StaticLogs) -> Self {
        self.logs = logs;
        self
    }

    pub fn failing_screenshots(mut self) -> Self {
        self.screenshots.fail = true;
        self
    }

    pub fn failing_artifacts(mut self) -> Self {
        self.artifacts.fail = true;
        self
    }

    pub fn config(mut self, config: VigilConfig) -> Self {
        self.config = config;
        self
    }

    pub fn build(self) -> Harness {
        let inspector = Arc::new(self.inspector);
        let screenshots = Arc::new(self.screenshots);
        let artifacts = Arc::new(self.artifacts);
        let logs = Arc::new(self.logs);
        let collaborators = Collaborators {
            devices: Arc::new(StaticDevices(self.devices)),
            inspector: inspector.clone(),
            screenshots: screenshots.clone(),
            artifacts: artifacts.clone(),
            logs: logs.clone(),
        };
        Harness {
            verifier: Verifier::new(collaborators).with_config(self.config),
            inspector,
            screenshots,
            artifacts,
            logs,
        }
    }
}

impl Harness {
    /// One booted device, an empty tree, an empty log and screenshots off.
    pub fn builder() -> HarnessBuilder {
        HarnessBuilder {
            devices: vec![booted(DEVICE_ID)],
            inspector: ScriptedInspector::new(Vec::new()),
            screenshots: RecordingScreenshots::default(),
            artifacts: MemoryArtifacts::default(),
            logs: StaticLogs::new(Vec::new()),
            config: VigilConfig {
                capture_on_failure: false,
                ..VigilConfig::default()
            },
        }
    }

    pub fn with_tree(tree: UIElement) -> Harness {
        Self::builder().trees(vec![tree]).build()
    }

    pub fn screenshot_count(&self) -> usize {
        self.screenshots.taken.lock().unwrap().len()
    }
}

/// An application root holding `children`.
pub fn app(children: Vec<UIElement>) -> UIElement {
    UIElement::new("Application").with_children(children)
}
