//! The assertion entry point.
//!
//! A [`Verifier`] owns the collaborator handles and the configured
//! defaults. The assertion methods themselves live in
//! [`assertions`](crate::assertions); this module holds the plumbing they
//! share: device resolution, snapshot capture, poll option resolution and
//! post-poll artifact capture.

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use serde::Serialize;
use tracing::{debug, info, warn};

use crate::artifacts::FsArtifactStore;
use crate::assertions::AssertionOptions;
use crate::axe::Axe;
use crate::config::VigilConfig;
use crate::device::{
    self, ArtifactStore, DeviceInfo, DeviceProvider, LogProvider, ScreenshotProvider, UiInspector, UiSnapshot,
};
use crate::error::VerifyError;
use crate::poll::{CheckError, PollOptions, PollOutcome};
use crate::result::{ResultBuilder, VerificationResult};
use crate::simctl::Simctl;

/// Handles to every external collaborator the engine uses.
#[derive(Clone)]
pub struct Collaborators {
    pub devices: Arc<dyn DeviceProvider>,
    pub inspector: Arc<dyn UiInspector>,
    pub screenshots: Arc<dyn ScreenshotProvider>,
    pub artifacts: Arc<dyn ArtifactStore>,
    pub logs: Arc<dyn LogProvider>,
}

/// Runs assertions against a device.
///
/// Cheap to clone; holds no mutable state, so independent assertions may
/// run concurrently on clones or through a shared reference.
#[derive(Clone)]
pub struct Verifier {
    collaborators: Collaborators,
    config: VigilConfig,
}

impl Verifier {
    pub fn new(collaborators: Collaborators) -> Self {
        Self {
            collaborators,
            config: VigilConfig::default(),
        }
    }

    pub fn with_config(mut self, config: VigilConfig) -> Self {
        self.config = config;
        self
    }

    /// A verifier wired to the iOS Simulator through `xcrun simctl` and
    /// `axe`, writing artifacts under the configured artifact root.
    pub fn simulator(config: VigilConfig) -> Self {
        let simctl = Arc::new(Simctl);
        let collaborators = Collaborators {
            devices: simctl.clone(),
            inspector: Arc::new(Axe),
            screenshots: simctl.clone(),
            artifacts: Arc::new(FsArtifactStore::new(config.artifact_root())),
            logs: simctl,
        };
        Self::new(collaborators).with_config(config)
    }

    pub fn config(&self) -> &VigilConfig {
        &self.config
    }

    pub fn collaborators(&self) -> &Collaborators {
        &self.collaborators
    }

    pub(crate) async fn resolve_device(&self, options: &AssertionOptions) -> Result<DeviceInfo, VerifyError> {
        let device = device::resolve_device(self.collaborators.devices.as_ref(), options.device_id.as_deref()).await?;
        debug!(device_id = %device.id, device_name = %device.name, "resolved device");
        Ok(device)
    }

    pub(crate) async fn snapshot(&self, device_id: &str, options: &AssertionOptions) -> Result<UiSnapshot, VerifyError> {
        self.collaborators
            .inspector
            .inspect(device_id, Some(options.session_id.as_str()))
            .await
    }

    /// Sorts a collaborator error raised inside a poll check.
    ///
    /// The first attempt's error aborts the poll, as do errors that cannot
    /// clear up. A retryable error on a later attempt only fails that attempt.
    pub(crate) fn check_error(err: VerifyError, attempt: u32) -> CheckError<VerifyError> {
        if attempt > 1 && err.is_retryable() {
            warn!(attempt, error = %err, "check failed, retrying");
            CheckError::Transient(err.to_string())
        } else {
            CheckError::Fatal(err)
        }
    }

    /// Poll options for an assertion: per-call overrides, else config defaults.
    pub(crate) fn poll_options(&self, options: &AssertionOptions, description: &str) -> PollOptions {
        let timeout = options.timeout_ms.unwrap_or(self.config.timeout_ms);
        let interval = options.poll_interval_ms.unwrap_or(self.config.poll_interval_ms);
        let mut poll = PollOptions::new(Duration::from_millis(timeout))
            .with_interval(Duration::from_millis(interval))
            .with_description(description);
        if let Some(ref token) = options.cancel {
            poll = poll.with_cancel(token.clone());
        }
        poll
    }

    /// Builds the result and captures a screenshot if the capture policy
    /// asks for one.
    ///
    /// A screenshot failure is logged and ignored. Failing to create the
    /// artifact directory is an infrastructure error.
    pub(crate) async fn finish<T: Serialize>(
        &self,
        builder: ResultBuilder,
        outcome: PollOutcome<T>,
        pass_message: impl Into<String>,
        device_id: &str,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<T>, VerifyError> {
        let mut result = builder.build(outcome, pass_message);

        let capture = if result.passed {
            options.capture_on_success.unwrap_or(self.config.capture_on_success)
        } else {
            options.capture_on_failure.unwrap_or(self.config.capture_on_failure)
        };
        if capture {
            if let Some(path) = self.capture(&result, device_id, &options.session_id).await? {
                result.artifacts.push(path);
            }
        }

        info!(
            status = result.status.name(),
            attempts = result.attempts.len(),
            duration_ms = result.duration_ms,
            "assertion finished"
        );
        Ok(result)
    }

    async fn capture<T>(
        &self,
        result: &VerificationResult<T>,
        device_id: &str,
        session_id: &str,
    ) -> Result<Option<PathBuf>, VerifyError> {
        let dir = self
            .collaborators
            .artifacts
            .snapshot_directory(session_id, &result.id.to_string())
            .await?;
        let path = dir.join(format!(
            "{}-{}.png",
            result.assertion_type.name(),
            result.status.name()
        ));

        match self.collaborators.screenshots.screenshot(device_id, &path).await {
            Ok(info) => {
                debug!(path = %info.path.display(), size = info.size, "captured screenshot");
                Ok(Some(info.path))
            }
            Err(e) => {
                warn!(error = %e, "screenshot capture failed");
                Ok(None)
            }
        }
    }
}
