//! The assertion catalog.
//!
//! Every assertion is a method on [`Verifier`] and follows the same shape:
//! resolve the device, then poll a check that snapshots the UI, locates the
//! target and evaluates a predicate, then build the result and capture
//! artifacts. Infrastructure problems surface as `Err(VerifyError)`; an
//! unsatisfied condition is an `Ok` result with status `failed` or
//! `timeout`.
//!
//! - [`visibility`] - visible / not visible
//! - [`state`] - enabled, selected and hittable, plus their negations
//! - [`text`] - label/value text and value emptiness
//! - [`screen`] - composite screen definitions
//! - [`logs`] - system log scanning: no errors, log contains, no crash

pub mod logs;
pub mod screen;
pub mod state;
pub mod text;
pub mod visibility;

use serde::{Deserialize, Serialize};
use tokio_util::sync::CancellationToken;
use tracing::{info_span, Instrument};

use crate::element::UIElement;
use crate::error::VerifyError;
use crate::matcher::{find_target, TargetMatch};
use crate::poll::{poll_until, CheckError, CheckOutcome};
use crate::result::{AssertionType, ResultBuilder, VerificationResult};
use crate::target::{ElementTarget, MatchedBy};
use crate::verifier::Verifier;

/// Session id used when the caller does not supply one.
pub const DEFAULT_SESSION_ID: &str = "default";

/// Options shared by every assertion.
#[derive(Debug, Clone)]
pub struct AssertionOptions {
    /// Correlation id; also names the artifact directory.
    pub session_id: String,
    /// Explicit device. When absent, the first running device is used.
    pub device_id: Option<String>,
    /// App context. Used for log filtering only, never for matching.
    pub bundle_id: Option<String>,
    pub timeout_ms: Option<u64>,
    pub poll_interval_ms: Option<u64>,
    pub capture_on_failure: Option<bool>,
    pub capture_on_success: Option<bool>,
    pub cancel: Option<CancellationToken>,
    /// For enabled/disabled, selected and hittable checks: report an
    /// invisible element as "not visible" before looking at the flag.
    pub require_visible: bool,
}

impl Default for AssertionOptions {
    fn default() -> Self {
        Self {
            session_id: DEFAULT_SESSION_ID.to_string(),
            device_id: None,
            bundle_id: None,
            timeout_ms: None,
            poll_interval_ms: None,
            capture_on_failure: None,
            capture_on_success: None,
            cancel: None,
            require_visible: true,
        }
    }
}

impl AssertionOptions {
    pub fn new(session_id: impl Into<String>) -> Self {
        Self {
            session_id: session_id.into(),
            ..Self::default()
        }
    }

    pub fn with_device(mut self, device_id: impl Into<String>) -> Self {
        self.device_id = Some(device_id.into());
        self
    }

    pub fn with_bundle_id(mut self, bundle_id: impl Into<String>) -> Self {
        self.bundle_id = Some(bundle_id.into());
        self
    }

    pub fn with_polling(mut self, timeout_ms: u64, poll_interval_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self.poll_interval_ms = Some(poll_interval_ms);
        self
    }

    pub fn with_timeout_ms(mut self, timeout_ms: u64) -> Self {
        self.timeout_ms = Some(timeout_ms);
        self
    }

    pub fn with_capture(mut self, on_failure: bool, on_success: bool) -> Self {
        self.capture_on_failure = Some(on_failure);
        self.capture_on_success = Some(on_success);
        self
    }

    pub fn with_cancel(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn with_require_visible(mut self, require_visible: bool) -> Self {
        self.require_visible = require_visible;
        self
    }

    /// Whether the caller supplied any polling override.
    pub fn has_polling(&self) -> bool {
        self.timeout_ms.is_some() || self.poll_interval_ms.is_some()
    }
}

/// Payload of the visibility and state assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementAssertionData {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<MatchedBy>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<UIElement>,
}

impl ElementAssertionData {
    pub(crate) fn from_match(found: &TargetMatch<'_>) -> Self {
        Self {
            found: found.is_found(),
            matched_by: found.matched_by,
            element: found.element.map(UIElement::detached),
        }
    }
}

pub(crate) const REASON_NOT_FOUND: &str = "element not found";
pub(crate) const REASON_NOT_VISIBLE: &str = "element is not visible";

impl Verifier {
    /// Shared driver for assertions about a single element.
    ///
    /// `evaluate` sees the match against each fresh snapshot and decides
    /// the attempt's verdict.
    pub(crate) async fn run_element_assertion<T, F>(
        &self,
        assertion_type: AssertionType,
        target: &ElementTarget,
        options: &AssertionOptions,
        pass_message: String,
        evaluate: F,
    ) -> Result<VerificationResult<T>, VerifyError>
    where
        T: Serialize,
        F: Fn(TargetMatch<'_>) -> CheckOutcome<T>,
    {
        let description = target.to_string();
        let span = info_span!(
            "assertion",
            kind = assertion_type.name(),
            target = %description,
            session = %options.session_id,
        );

        async {
            let device = self.resolve_device(options).await?;
            let poll = self.poll_options(options, &description);
            let builder = ResultBuilder::new(assertion_type, description.as_str())
                .with_timeout(poll.timeout)
                .with_session(Some(options.session_id.clone()))
                .with_device(device.id.as_str());

            let device_id = device.id.as_str();
            let evaluate = &evaluate;
            let mut attempt = 0;
            let outcome = poll_until(
                || {
                    attempt += 1;
                    let n = attempt;
                    async move {
                        let snapshot = self
                            .snapshot(device_id, options)
                            .await
                            .map_err(|e| Verifier::check_error(e, n))?;
                        Ok::<_, CheckError<VerifyError>>(evaluate(find_target(&snapshot.tree, target)))
                    }
                },
                &poll,
            )
            .await?;

            self.finish(builder, outcome, pass_message, device_id, options).await
        }
        .instrument(span)
        .await
    }
}
