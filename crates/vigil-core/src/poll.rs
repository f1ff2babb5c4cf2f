//! The polling core.
//!
//! [`poll_until`] drives an async check on a fixed interval until it passes,
//! the timeout budget is spent, or the caller's [`CancellationToken`] fires.
//! Every attempt is recorded in order. There is no backoff: the interval is
//! constant, and the loop stops early when one more interval would overrun
//! the budget.
//!
//! Time is measured with [`tokio::time::Instant`], so tests running on a
//! paused clock see exact, deterministic durations.

use std::future::Future;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::debug;

/// Default delay between attempts.
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 500;

/// Default total budget for a polled assertion.
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Options controlling a poll loop.
#[derive(Debug, Clone)]
pub struct PollOptions {
    pub timeout: Duration,
    pub poll_interval: Duration,
    /// Used only in log output.
    pub description: Option<String>,
    pub cancel: Option<CancellationToken>,
}

impl Default for PollOptions {
    fn default() -> Self {
        Self::new(Duration::from_millis(DEFAULT_TIMEOUT_MS))
    }
}

impl PollOptions {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            description: None,
            cancel: None,
        }
    }

    pub fn from_millis(timeout_ms: u64, poll_interval_ms: u64) -> Self {
        Self::new(Duration::from_millis(timeout_ms))
            .with_interval(Duration::from_millis(poll_interval_ms))
    }

    pub fn with_interval(mut self, poll_interval: Duration) -> Self {
        self.poll_interval = poll_interval;
        self
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    fn is_cancelled(&self) -> bool {
        self.cancel.as_ref().map_or(false, CancellationToken::is_cancelled)
    }
}

/// What a single check reports back to the loop.
#[derive(Debug, Clone, PartialEq)]
pub struct CheckOutcome<T> {
    pub passed: bool,
    pub error: Option<String>,
    pub data: Option<T>,
}

impl<T> CheckOutcome<T> {
    pub fn pass(data: T) -> Self {
        Self { passed: true, error: None, data: Some(data) }
    }

    pub fn fail(reason: impl Into<String>, data: T) -> Self {
        Self { passed: false, error: Some(reason.into()), data: Some(data) }
    }

    pub fn fail_without_data(reason: impl Into<String>) -> Self {
        Self { passed: false, error: Some(reason.into()), data: None }
    }
}

/// A check that could not produce a verdict.
///
/// `Transient` is recorded as a failed attempt and polling continues.
/// `Fatal` aborts the loop and is handed back to the caller unchanged.
#[derive(Debug, Clone, PartialEq)]
pub enum CheckError<E> {
    Transient(String),
    Fatal(E),
}

impl<E> CheckError<E> {
    pub fn transient(message: impl Into<String>) -> Self {
        CheckError::Transient(message.into())
    }
}

impl<E> From<E> for CheckError<E> {
    fn from(err: E) -> Self {
        CheckError::Fatal(err)
    }
}

/// One iteration of a poll loop.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VerificationAttempt {
    /// 1-based, strictly increasing.
    pub attempt: u32,
    pub timestamp: DateTime<Utc>,
    pub passed: bool,
    /// How long this attempt's check took.
    pub duration_ms: u64,
    /// Time since the loop started, measured when the attempt finished.
    pub elapsed_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,
}

/// The result of a finished poll loop.
#[derive(Debug, Clone)]
pub struct PollOutcome<T> {
    pub passed: bool,
    pub duration: Duration,
    pub attempts: Vec<VerificationAttempt>,
    /// Data from the most recent attempt that produced any.
    pub last_data: Option<T>,
    pub cancelled: bool,
    /// The loop stopped because another interval would overrun the timeout.
    pub exhausted: bool,
}

struct Recorder<T> {
    start: Instant,
    attempts: Vec<VerificationAttempt>,
    last_data: Option<T>,
}

impl<T: Serialize> Recorder<T> {
    fn new() -> Self {
        Self { start: Instant::now(), attempts: Vec::new(), last_data: None }
    }

    /// Runs one check and records it. Returns whether it passed.
    async fn attempt<E, Fut>(&mut self, fut: Fut) -> Result<bool, E>
    where
        Fut: Future<Output = Result<CheckOutcome<T>, CheckError<E>>>,
    {
        let number = self.attempts.len() as u32 + 1;
        let timestamp = Utc::now();
        let attempt_start = Instant::now();

        let (passed, error, data) = match fut.await {
            Ok(outcome) => (outcome.passed, outcome.error, outcome.data),
            Err(CheckError::Transient(message)) => (false, Some(message), None),
            Err(CheckError::Fatal(err)) => {
                debug!(attempt = number, "check aborted");
                return Err(err);
            }
        };

        let duration_ms = attempt_start.elapsed().as_millis() as u64;
        let elapsed_ms = self.start.elapsed().as_millis() as u64;
        debug!(attempt = number, passed, duration_ms, error = error.as_deref(), "poll attempt");

        let json = data.as_ref().and_then(|d| serde_json::to_value(d).ok());
        self.attempts.push(VerificationAttempt {
            attempt: number,
            timestamp,
            passed,
            duration_ms,
            elapsed_ms,
            error,
            data: json,
        });
        if data.is_some() {
            self.last_data = data;
        }
        Ok(passed)
    }

    fn finish(self, passed: bool, cancelled: bool) -> PollOutcome<T> {
        PollOutcome {
            passed,
            duration: self.start.elapsed(),
            attempts: self.attempts,
            last_data: self.last_data,
            cancelled,
            exhausted: false,
        }
    }

    fn exhaust(self) -> PollOutcome<T> {
        PollOutcome { exhausted: true, ..self.finish(false, false) }
    }
}

/// Polls `check` until it passes, the timeout is exhausted, or the
/// cancellation token fires.
///
/// At least one attempt always runs, even when `timeout` is shorter than
/// `poll_interval`. After a failed attempt the loop stops if sleeping one
/// more interval would exceed the timeout.
///
/// A [`CheckError::Fatal`] aborts immediately and is returned as `Err`.
pub async fn poll_until<T, E, F, Fut>(mut check: F, options: &PollOptions) -> Result<PollOutcome<T>, E>
where
    T: Serialize,
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<CheckOutcome<T>, CheckError<E>>>,
{
    let mut recorder = Recorder::new();
    debug!(
        description = options.description.as_deref(),
        timeout_ms = options.timeout.as_millis() as u64,
        interval_ms = options.poll_interval.as_millis() as u64,
        "polling started"
    );

    loop {
        if recorder.attempt(check()).await? {
            return Ok(recorder.finish(true, false));
        }
        if options.is_cancelled() {
            return Ok(recorder.finish(false, true));
        }
        if recorder.start.elapsed() + options.poll_interval > options.timeout {
            return Ok(recorder.exhaust());
        }

        match options.cancel {
            Some(ref token) => {
                tokio::select! {
                    biased;
                    _ = token.cancelled() => {
                        return Ok(recorder.finish(false, true));
                    }
                    _ = tokio::time::sleep(options.poll_interval) => {}
                }
            }
            None => tokio::time::sleep(options.poll_interval).await,
        }
    }
}

/// Runs `check` exactly once and records it like a poll loop would.
pub async fn check_once<T, E, Fut>(check: Fut) -> Result<PollOutcome<T>, E>
where
    T: Serialize,
    Fut: Future<Output = Result<CheckOutcome<T>, CheckError<E>>>,
{
    let mut recorder = Recorder::new();
    let passed = recorder.attempt(check).await?;
    Ok(recorder.finish(passed, false))
}
