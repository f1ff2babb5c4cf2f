//! Infrastructure errors.
//!
//! A [`VerifyError`] means an assertion could not be evaluated at all: the
//! device was missing, a snapshot could not be taken, a pattern did not
//! compile. Assertions that were evaluated and not satisfied are never
//! errors; they come back as a [`VerificationResult`](crate::result::VerificationResult)
//! with status `failed` or `timeout`.

use thiserror::Error;

/// Errors that abort an assertion before a verdict can be reached.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum VerifyError {
    /// No device is currently running.
    #[error("No booted device found")]
    NoBootedDevice,

    /// An explicit device id did not resolve to a known device.
    #[error("Device not found: {0}")]
    DeviceNotFound(String),

    /// The device exists but is not ready for inspection.
    #[error("Device {id} is not ready (state: {state})")]
    DeviceNotReady { id: String, state: String },

    /// Listing or querying devices failed.
    #[error("Device query failed: {0}")]
    DeviceQuery(String),

    /// The UI hierarchy could not be captured.
    #[error("Snapshot failed: {0}")]
    Snapshot(String),

    /// System log retrieval failed.
    #[error("Log retrieval failed: {0}")]
    LogRetrieval(String),

    /// A screenshot could not be taken.
    #[error("Capture failed: {0}")]
    Capture(String),

    /// The artifact directory could not be created.
    #[error("Artifact directory error: {0}")]
    ArtifactDirectory(String),

    /// A caller-supplied regex did not compile.
    #[error("Invalid pattern '{pattern}': {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// A named screen was not present in the supplied catalog.
    #[error("Screen not found: {0}")]
    ScreenNotFound(String),
}

impl VerifyError {
    /// Stable machine-readable code, used in JSON output.
    pub fn code(&self) -> &'static str {
        match self {
            VerifyError::NoBootedDevice => "DEVICE_NOT_BOOTED",
            VerifyError::DeviceNotFound(_) => "DEVICE_NOT_FOUND",
            VerifyError::DeviceNotReady { .. } => "DEVICE_NOT_READY",
            VerifyError::DeviceQuery(_) => "DEVICE_QUERY_FAILED",
            VerifyError::Snapshot(_) => "SNAPSHOT_FAILED",
            VerifyError::LogRetrieval(_) => "LOG_RETRIEVAL_FAILED",
            VerifyError::Capture(_) => "CAPTURE_FAILED",
            VerifyError::ArtifactDirectory(_) => "ARTIFACT_DIRECTORY_FAILED",
            VerifyError::InvalidPattern { .. } => "INVALID_PATTERN",
            VerifyError::ScreenNotFound(_) => "SCREEN_NOT_FOUND",
        }
    }

    /// Whether a later attempt could succeed where this one failed.
    /// Only collaborator reads qualify; device and input errors do not clear up.
    pub fn is_retryable(&self) -> bool {
        matches!(self, VerifyError::Snapshot(_) | VerifyError::LogRetrieval(_))
    }

    pub(crate) fn invalid_pattern(pattern: &str, err: regex::Error) -> Self {
        VerifyError::InvalidPattern {
            pattern: pattern.to_string(),
            reason: err.to_string(),
        }
    }
}
