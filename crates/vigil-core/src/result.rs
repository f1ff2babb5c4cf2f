//! Verification results and the builder that produces them.

use std::path::PathBuf;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::poll::{PollOutcome, VerificationAttempt};

/// Terminal status of an assertion.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VerificationStatus {
    Passed,
    Failed,
    Timeout,
}

impl VerificationStatus {
    pub fn name(&self) -> &'static str {
        match self {
            VerificationStatus::Passed => "passed",
            VerificationStatus::Failed => "failed",
            VerificationStatus::Timeout => "timeout",
        }
    }
}

/// The kind of assertion that produced a result.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AssertionType {
    Visible,
    NotVisible,
    Text,
    Value,
    Enabled,
    Disabled,
    Selected,
    NotSelected,
    Hittable,
    NotHittable,
    LogContains,
    NoErrors,
    NoCrash,
    Screen,
}

impl AssertionType {
    pub fn name(&self) -> &'static str {
        match self {
            AssertionType::Visible => "visible",
            AssertionType::NotVisible => "not-visible",
            AssertionType::Text => "text",
            AssertionType::Value => "value",
            AssertionType::Enabled => "enabled",
            AssertionType::Disabled => "disabled",
            AssertionType::Selected => "selected",
            AssertionType::NotSelected => "not-selected",
            AssertionType::Hittable => "hittable",
            AssertionType::NotHittable => "not-hittable",
            AssertionType::LogContains => "log-contains",
            AssertionType::NoErrors => "no-errors",
            AssertionType::NoCrash => "no-crash",
            AssertionType::Screen => "screen",
        }
    }
}

/// The inner verdict of an assertion that was evaluated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationResult<T> {
    pub id: Uuid,
    pub assertion_type: AssertionType,
    /// Human-readable description of what was checked.
    pub target: String,
    pub status: VerificationStatus,
    pub passed: bool,
    pub message: String,
    pub started_at: DateTime<Utc>,
    pub duration_ms: u64,
    pub attempts: Vec<VerificationAttempt>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub device_id: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub artifacts: Vec<PathBuf>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T: Serialize> VerificationResult<T> {
    /// Replaces the typed payload with its JSON form, so results of
    /// different assertion kinds can be collected together.
    pub fn erase(self) -> VerificationResult<serde_json::Value> {
        let data = self.data.as_ref().and_then(|d| serde_json::to_value(d).ok());
        VerificationResult {
            id: self.id,
            assertion_type: self.assertion_type,
            target: self.target,
            status: self.status,
            passed: self.passed,
            message: self.message,
            started_at: self.started_at,
            duration_ms: self.duration_ms,
            attempts: self.attempts,
            session_id: self.session_id,
            device_id: self.device_id,
            artifacts: self.artifacts,
            data,
        }
    }
}

/// Collects the metadata of one assertion run and turns its
/// [`PollOutcome`] into a [`VerificationResult`].
///
/// Status rules:
/// - the outcome passed: `passed`
/// - the loop was cancelled: `failed`
/// - the poll ran out of budget, or elapsed time reached the configured
///   timeout: `timeout`
/// - otherwise: `failed`
///
/// Builders created without a timeout (single-shot checks) never report
/// `timeout`.
#[derive(Debug, Clone)]
pub struct ResultBuilder {
    id: Uuid,
    assertion_type: AssertionType,
    target: String,
    started_at: DateTime<Utc>,
    timeout: Option<Duration>,
    session_id: Option<String>,
    device_id: Option<String>,
}

impl ResultBuilder {
    pub fn new(assertion_type: AssertionType, target: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            assertion_type,
            target: target.into(),
            started_at: Utc::now(),
            timeout: None,
            session_id: None,
            device_id: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn with_session(mut self, session_id: Option<String>) -> Self {
        self.session_id = session_id;
        self
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    /// Builds the final result. `pass_message` is used only when the
    /// outcome passed; failure messages come from the last attempt's error.
    pub fn build<T>(self, outcome: PollOutcome<T>, pass_message: impl Into<String>) -> VerificationResult<T> {
        let elapsed_ms = outcome.duration.as_millis() as u64;
        let reason = outcome
            .attempts
            .last()
            .and_then(|a| a.error.clone())
            .unwrap_or_else(|| "condition not met".to_string());

        let (status, message) = if outcome.passed {
            (VerificationStatus::Passed, pass_message.into())
        } else if outcome.cancelled {
            (VerificationStatus::Failed, format!("Cancelled after {}ms: {}", elapsed_ms, reason))
        } else if outcome.exhausted || self.timeout.map_or(false, |t| outcome.duration >= t) {
            (VerificationStatus::Timeout, format!("Timeout after {}ms: {}", elapsed_ms, reason))
        } else {
            (VerificationStatus::Failed, reason)
        };

        VerificationResult {
            id: self.id,
            assertion_type: self.assertion_type,
            target: self.target,
            status,
            passed: outcome.passed,
            message,
            started_at: self.started_at,
            duration_ms: elapsed_ms,
            attempts: outcome.attempts,
            session_id: self.session_id,
            device_id: self.device_id,
            artifacts: Vec::new(),
            data: outcome.last_data,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn attempt(number: u32, error: Option<&str>) -> VerificationAttempt {
        VerificationAttempt {
            attempt: number,
            timestamp: Utc::now(),
            passed: error.is_none(),
            duration_ms: 0,
            elapsed_ms: 0,
            error: error.map(str::to_string),
            data: None,
        }
    }

    fn outcome(passed: bool, duration_ms: u64, cancelled: bool) -> PollOutcome<u32> {
        PollOutcome {
            passed,
            duration: Duration::from_millis(duration_ms),
            attempts: vec![attempt(1, if passed { None } else { Some("element not found") })],
            last_data: Some(1),
            cancelled,
            exhausted: false,
        }
    }

    #[test]
    fn passed_uses_pass_message() {
        let result = ResultBuilder::new(AssertionType::Visible, "identifier \"a\"")
            .with_timeout(Duration::from_millis(500))
            .build(outcome(true, 10, false), "Element is visible");
        assert_eq!(result.status, VerificationStatus::Passed);
        assert!(result.passed);
        assert_eq!(result.message, "Element is visible");
        assert_eq!(result.data, Some(1));
    }

    #[test]
    fn timeout_when_budget_reached() {
        let result = ResultBuilder::new(AssertionType::Selected, "tab1")
            .with_timeout(Duration::from_millis(500))
            .build(outcome(false, 500, false), "");
        assert_eq!(result.status, VerificationStatus::Timeout);
        assert_eq!(result.message, "Timeout after 500ms: element not found");
    }

    #[test]
    fn exhausted_poll_times_out_short_of_budget() {
        let exhausted = PollOutcome { exhausted: true, ..outcome(false, 420, false) };
        let result = ResultBuilder::new(AssertionType::Selected, "tab1")
            .with_timeout(Duration::from_millis(500))
            .build(exhausted, "");
        assert_eq!(result.status, VerificationStatus::Timeout);
        assert_eq!(result.message, "Timeout after 420ms: element not found");
    }

    #[test]
    fn failed_when_check_fails_without_exhausting() {
        let result = ResultBuilder::new(AssertionType::Selected, "tab1")
            .with_timeout(Duration::from_millis(500))
            .build(outcome(false, 420, false), "");
        assert_eq!(result.status, VerificationStatus::Failed);
        assert_eq!(result.message, "element not found");
    }

    #[test]
    fn single_shot_never_times_out() {
        let result = ResultBuilder::new(AssertionType::NoErrors, "system log")
            .build(outcome(false, 60_000, false), "");
        assert_eq!(result.status, VerificationStatus::Failed);
    }

    #[test]
    fn cancellation_reports_failed() {
        let result = ResultBuilder::new(AssertionType::Visible, "a")
            .with_timeout(Duration::from_millis(100))
            .build(outcome(false, 200, true), "");
        assert_eq!(result.status, VerificationStatus::Failed);
        assert!(result.message.starts_with("Cancelled after 200ms"));
    }

    #[test]
    fn serializes_status_lowercase_and_erases_payload() {
        let result = ResultBuilder::new(AssertionType::NotVisible, "ghost")
            .with_session(Some("s1".into()))
            .build(outcome(true, 0, false), "ok");
        let json = serde_json::to_value(&result).unwrap();
        assert_eq!(json["status"], "passed");
        assert_eq!(json["assertion_type"], "not-visible");
        assert_eq!(json["session_id"], "s1");

        let erased = result.erase();
        assert_eq!(erased.data, Some(serde_json::json!(1)));
    }
}
