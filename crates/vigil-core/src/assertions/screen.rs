//! Composite screen assertions.
//!
//! A [`ScreenDefinition`] describes a screen as lists of element specs per
//! category. Every poll attempt evaluates all of them against one snapshot
//! and aggregates the results:
//!
//! - `require_all = true`: every check must pass.
//! - `require_all = false`: each category that has specs needs at least one
//!   passing check; empty categories are satisfied.
//!
//! Enabled and disabled checks require visibility first, so a hidden
//! element is reported as "not visible" rather than as being in the wrong
//! state.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use super::state::ElementFlag;
use super::{AssertionOptions, REASON_NOT_FOUND, REASON_NOT_VISIBLE};
use crate::element::UIElement;
use crate::error::VerifyError;
use crate::matcher::find_target;
use crate::poll::{poll_until, CheckError, CheckOutcome};
use crate::result::{AssertionType, ResultBuilder, VerificationResult};
use crate::target::ElementTarget;
use crate::verifier::Verifier;

/// Declarative description of a screen.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ScreenDefinition {
    #[serde(default)]
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub visible: Vec<ElementTarget>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub not_visible: Vec<ElementTarget>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub enabled: Vec<ElementTarget>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub disabled: Vec<ElementTarget>,
}

impl ScreenDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            ..Self::default()
        }
    }

    pub fn with_visible(mut self, target: ElementTarget) -> Self {
        self.visible.push(target);
        self
    }

    pub fn with_not_visible(mut self, target: ElementTarget) -> Self {
        self.not_visible.push(target);
        self
    }

    pub fn with_enabled(mut self, target: ElementTarget) -> Self {
        self.enabled.push(target);
        self
    }

    pub fn with_disabled(mut self, target: ElementTarget) -> Self {
        self.disabled.push(target);
        self
    }

    pub fn total_specs(&self) -> usize {
        self.visible.len() + self.not_visible.len() + self.enabled.len() + self.disabled.len()
    }
}

/// Parses a screen catalog from JSON.
///
/// Accepts either an array of definitions or an object keyed by screen
/// name. In the keyed form a definition without a `name` takes its key.
pub fn parse_catalog(json: &str) -> Result<HashMap<String, ScreenDefinition>, serde_json::Error> {
    let value: serde_json::Value = serde_json::from_str(json)?;
    let screens = if value.is_array() {
        let list: Vec<ScreenDefinition> = serde_json::from_value(value)?;
        list.into_iter().map(|s| (s.name.clone(), s)).collect()
    } else {
        let map: HashMap<String, ScreenDefinition> = serde_json::from_value(value)?;
        map.into_iter()
            .map(|(key, mut screen)| {
                if screen.name.is_empty() {
                    screen.name = key.clone();
                }
                (key, screen)
            })
            .collect()
    };
    Ok(screens)
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum CheckCategory {
    Visible,
    NotVisible,
    Enabled,
    Disabled,
}

impl CheckCategory {
    pub fn name(&self) -> &'static str {
        match self {
            CheckCategory::Visible => "visible",
            CheckCategory::NotVisible => "notVisible",
            CheckCategory::Enabled => "enabled",
            CheckCategory::Disabled => "disabled",
        }
    }
}

impl fmt::Display for CheckCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// One row of a screen evaluation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ElementCheckResult {
    pub spec: ElementTarget,
    pub category: CheckCategory,
    pub passed: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub element: Option<UIElement>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// Payload of the screen assertion.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ScreenAssertionData {
    pub screen: String,
    pub require_all: bool,
    pub passed: bool,
    pub checks: Vec<ElementCheckResult>,
    pub total_checks: usize,
    pub passed_checks: usize,
    pub failed_checks: usize,
    pub summary: String,
}

impl ScreenAssertionData {
    /// `"<spec>: <reason>"` for every failing check, joined with `"; "`.
    pub fn failure_details(&self) -> String {
        self.checks
            .iter()
            .filter(|c| !c.passed)
            .map(|c| format!("{}: {}", c.spec, c.reason.as_deref().unwrap_or("failed")))
            .collect::<Vec<_>>()
            .join("; ")
    }
}

fn check_spec(tree: &UIElement, spec: &ElementTarget, category: CheckCategory) -> ElementCheckResult {
    let found = find_target(tree, spec);
    let reason = match category {
        CheckCategory::Visible => match found.element {
            None => Some(REASON_NOT_FOUND.to_string()),
            Some(el) if !el.visible => Some(REASON_NOT_VISIBLE.to_string()),
            Some(_) => None,
        },
        CheckCategory::NotVisible => match found.element {
            Some(el) if el.visible => Some("element is visible".to_string()),
            _ => None,
        },
        CheckCategory::Enabled => ElementFlag::Enabled.check(found.element, true, true),
        CheckCategory::Disabled => ElementFlag::Enabled.check(found.element, false, true),
    };
    ElementCheckResult {
        spec: spec.clone(),
        category,
        passed: reason.is_none(),
        element: found.element.map(UIElement::detached),
        reason,
    }
}

fn summarize(screen: &str, checks: &[ElementCheckResult], passed: bool) -> String {
    let total = checks.len();
    let passed_checks = checks.iter().filter(|c| c.passed).count();
    let verdict = if passed { "matched" } else { "did not match" };
    let failing: Vec<String> = checks
        .iter()
        .filter(|c| !c.passed)
        .map(|c| format!("{} {}", c.category, c.spec))
        .collect();
    if failing.is_empty() {
        format!("Screen {} {}: {}/{} checks passed", screen, verdict, passed_checks, total)
    } else {
        format!(
            "Screen {} {}: {}/{} checks passed; failing: {}",
            screen,
            verdict,
            passed_checks,
            total,
            failing.join(", ")
        )
    }
}

/// Evaluates every spec of `screen` against one snapshot.
pub fn evaluate_screen(tree: &UIElement, screen: &ScreenDefinition, require_all: bool) -> ScreenAssertionData {
    let groups = [
        (CheckCategory::Visible, &screen.visible),
        (CheckCategory::NotVisible, &screen.not_visible),
        (CheckCategory::Enabled, &screen.enabled),
        (CheckCategory::Disabled, &screen.disabled),
    ];

    let checks: Vec<ElementCheckResult> = groups
        .iter()
        .flat_map(|(category, specs)| specs.iter().map(move |spec| check_spec(tree, spec, *category)))
        .collect();

    let passed = if require_all {
        checks.iter().all(|c| c.passed)
    } else {
        groups
            .iter()
            .filter(|(_, specs)| !specs.is_empty())
            .all(|(category, _)| checks.iter().any(|c| c.category == *category && c.passed))
    };

    let total_checks = checks.len();
    let passed_checks = checks.iter().filter(|c| c.passed).count();
    ScreenAssertionData {
        screen: screen.name.clone(),
        require_all,
        passed,
        summary: summarize(&screen.name, &checks, passed),
        total_checks,
        passed_checks,
        failed_checks: total_checks - passed_checks,
        checks,
    }
}

impl Verifier {
    /// Passes once the current UI satisfies `screen` under the
    /// `require_all` policy.
    pub async fn assert_screen(
        &self,
        screen: &ScreenDefinition,
        require_all: bool,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ScreenAssertionData>, VerifyError> {
        let description = format!("screen {}", screen.name);
        let span = info_span!(
            "assertion",
            kind = AssertionType::Screen.name(),
            target = %description,
            session = %options.session_id,
        );

        async {
            let device = self.resolve_device(options).await?;
            let poll = self.poll_options(options, &description);
            let builder = ResultBuilder::new(AssertionType::Screen, description.as_str())
                .with_timeout(poll.timeout)
                .with_session(Some(options.session_id.clone()))
                .with_device(device.id.as_str());

            let device_id = device.id.as_str();
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
                        let data = evaluate_screen(&snapshot.tree, screen, require_all);
                        let outcome = if data.passed {
                            CheckOutcome::pass(data)
                        } else {
                            CheckOutcome::fail(data.failure_details(), data)
                        };
                        Ok::<_, CheckError<VerifyError>>(outcome)
                    }
                },
                &poll,
            )
            .await?;

            let pass_message = outcome
                .last_data
                .as_ref()
                .map(|d| d.summary.clone())
                .unwrap_or_else(|| format!("Screen {} matched", screen.name));
            self.finish(builder, outcome, pass_message, device_id, options).await
        }
        .instrument(span)
        .await
    }

    /// Looks `name` up in `screens` and asserts it.
    ///
    /// An unknown name is [`VerifyError::ScreenNotFound`].
    pub async fn assert_screen_by_name(
        &self,
        name: &str,
        screens: &HashMap<String, ScreenDefinition>,
        require_all: bool,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ScreenAssertionData>, VerifyError> {
        let screen = screens
            .get(name)
            .ok_or_else(|| VerifyError::ScreenNotFound(name.to_string()))?;
        self.assert_screen(screen, require_all, options).await
    }
}
