//! Text and value assertions.
//!
//! Text compares an element's label and value against an expectation and
//! passes when either matches. Value compares only the value field and adds
//! the `empty` / `notEmpty` modes. Comparisons are case-sensitive unless
//! the expectation says otherwise. A regex that fails to compile is
//! reported as [`VerifyError::InvalidPattern`] before any polling starts.

use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};

use super::{AssertionOptions, REASON_NOT_FOUND};
use crate::error::VerifyError;
use crate::poll::CheckOutcome;
use crate::result::{AssertionType, VerificationResult};
use crate::target::{ElementTarget, MatchedBy};
use crate::verifier::Verifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum TextMatchMode {
    #[default]
    Exact,
    Contains,
    Regex,
    StartsWith,
    EndsWith,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ValueMatchMode {
    #[default]
    Exact,
    Contains,
    Regex,
    StartsWith,
    EndsWith,
    Empty,
    NotEmpty,
}

impl TextMatchMode {
    pub fn name(&self) -> &'static str {
        ValueMatchMode::from(*self).name()
    }
}

impl ValueMatchMode {
    pub fn name(&self) -> &'static str {
        match self {
            ValueMatchMode::Exact => "exact",
            ValueMatchMode::Contains => "contains",
            ValueMatchMode::Regex => "regex",
            ValueMatchMode::StartsWith => "startsWith",
            ValueMatchMode::EndsWith => "endsWith",
            ValueMatchMode::Empty => "empty",
            ValueMatchMode::NotEmpty => "notEmpty",
        }
    }

    /// Whether this mode compares against an expected string.
    pub fn takes_expected(&self) -> bool {
        !matches!(self, ValueMatchMode::Empty | ValueMatchMode::NotEmpty)
    }
}

impl From<TextMatchMode> for ValueMatchMode {
    fn from(mode: TextMatchMode) -> Self {
        match mode {
            TextMatchMode::Exact => ValueMatchMode::Exact,
            TextMatchMode::Contains => ValueMatchMode::Contains,
            TextMatchMode::Regex => ValueMatchMode::Regex,
            TextMatchMode::StartsWith => ValueMatchMode::StartsWith,
            TextMatchMode::EndsWith => ValueMatchMode::EndsWith,
        }
    }
}

/// Expected text for [`Verifier::assert_text`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TextExpectation {
    pub expected: String,
    #[serde(default)]
    pub mode: TextMatchMode,
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

/// Expected value for [`Verifier::assert_value`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValueExpectation {
    /// Ignored by the `empty` and `notEmpty` modes.
    #[serde(default)]
    pub expected: String,
    #[serde(default)]
    pub mode: ValueMatchMode,
    #[serde(default = "default_case_sensitive")]
    pub case_sensitive: bool,
}

fn default_case_sensitive() -> bool {
    true
}

impl TextExpectation {
    pub fn new(expected: impl Into<String>, mode: TextMatchMode) -> Self {
        Self { expected: expected.into(), mode, case_sensitive: true }
    }

    pub fn exact(expected: impl Into<String>) -> Self {
        Self::new(expected, TextMatchMode::Exact)
    }

    pub fn contains(expected: impl Into<String>) -> Self {
        Self::new(expected, TextMatchMode::Contains)
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self::new(pattern, TextMatchMode::Regex)
    }

    pub fn ignore_case(mut self) -> Self {
        self.case_sensitive = false;
        self
    }
}

impl ValueExpectation {
    pub fn new(expected: impl Into<String>, mode: ValueMatchMode) -> Self {
        Self { expected: expected.into(), mode, case_sensitive: true }
    }

    pub fn exact(expected: impl Into<String>) -> Self {
        Self::new(expected, ValueMatchMode::Exact)
    }

    pub fn empty() -> Self {
        Self::new("", ValueMatchMode::Empty)
    }

    pub fn not_empty() -> Self {
        Self::new("", ValueMatchMode::NotEmpty)
    }

    pub fn ignore_case(mut self) -> Self {
        self.case_sensitive = false;
        self
    }
}

/// Payload of the text and value assertions.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TextAssertionData {
    pub found: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub matched_by: Option<MatchedBy>,
    pub expected: String,
    /// The text that was compared; for text assertions, the label when it
    /// matched or no value exists, otherwise the value.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub actual: Option<String>,
    pub mode: String,
    pub case_sensitive: bool,
}

enum Rule {
    Exact(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Regex(Regex),
    Empty,
    NotEmpty,
}

/// A compiled expectation.
pub(crate) struct Comparator {
    rule: Rule,
    case_sensitive: bool,
}

impl Comparator {
    pub(crate) fn compile(mode: ValueMatchMode, expected: &str, case_sensitive: bool) -> Result<Self, VerifyError> {
        let folded = if case_sensitive { expected.to_string() } else { expected.to_lowercase() };
        let rule = match mode {
            ValueMatchMode::Exact => Rule::Exact(folded),
            ValueMatchMode::Contains => Rule::Contains(folded),
            ValueMatchMode::StartsWith => Rule::StartsWith(folded),
            ValueMatchMode::EndsWith => Rule::EndsWith(folded),
            ValueMatchMode::Regex => Rule::Regex(
                RegexBuilder::new(expected)
                    .case_insensitive(!case_sensitive)
                    .build()
                    .map_err(|e| VerifyError::invalid_pattern(expected, e))?,
            ),
            ValueMatchMode::Empty => Rule::Empty,
            ValueMatchMode::NotEmpty => Rule::NotEmpty,
        };
        Ok(Self { rule, case_sensitive })
    }

    pub(crate) fn matches(&self, actual: &str) -> bool {
        let folded;
        let actual_cmp = if self.case_sensitive || matches!(self.rule, Rule::Regex(_)) {
            actual
        } else {
            folded = actual.to_lowercase();
            folded.as_str()
        };
        match &self.rule {
            Rule::Exact(e) => actual_cmp == e,
            Rule::Contains(e) => actual_cmp.contains(e.as_str()),
            Rule::StartsWith(e) => actual_cmp.starts_with(e.as_str()),
            Rule::EndsWith(e) => actual_cmp.ends_with(e.as_str()),
            Rule::Regex(re) => re.is_match(actual_cmp),
            Rule::Empty => actual.is_empty(),
            Rule::NotEmpty => !actual.is_empty(),
        }
    }
}

impl Verifier {
    /// Passes once the target's label or value satisfies `expectation`.
    pub async fn assert_text(
        &self,
        target: &ElementTarget,
        expectation: &TextExpectation,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<TextAssertionData>, VerifyError> {
        let comparator = Comparator::compile(expectation.mode.into(), &expectation.expected, expectation.case_sensitive)?;
        let mode = expectation.mode.name();
        let comparator = &comparator;

        self.run_element_assertion(
            AssertionType::Text,
            target,
            options,
            format!("Text of {} {} \"{}\"", target, mode, expectation.expected),
            |found| {
                let mut data = TextAssertionData {
                    found: found.is_found(),
                    matched_by: found.matched_by,
                    expected: expectation.expected.clone(),
                    actual: None,
                    mode: mode.to_string(),
                    case_sensitive: expectation.case_sensitive,
                };
                let Some(el) = found.element else {
                    return CheckOutcome::fail(REASON_NOT_FOUND, data);
                };

                let label_hit = el.label.as_deref().filter(|l| comparator.matches(l));
                let value_hit = el.value.as_deref().filter(|v| comparator.matches(v));
                match label_hit.or(value_hit) {
                    Some(hit) => {
                        data.actual = Some(hit.to_string());
                        CheckOutcome::pass(data)
                    }
                    None => {
                        data.actual = el.label.clone().or_else(|| el.value.clone());
                        let reason = format!(
                            "text mismatch: expected {} \"{}\", got {}",
                            mode,
                            expectation.expected,
                            quoted(data.actual.as_deref())
                        );
                        CheckOutcome::fail(reason, data)
                    }
                }
            },
        )
        .await
    }

    /// Passes once the target's value satisfies `expectation`. A missing
    /// value is treated as the empty string.
    pub async fn assert_value(
        &self,
        target: &ElementTarget,
        expectation: &ValueExpectation,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<TextAssertionData>, VerifyError> {
        let comparator = Comparator::compile(expectation.mode, &expectation.expected, expectation.case_sensitive)?;
        let mode = expectation.mode.name();
        let comparator = &comparator;
        let pass_message = if expectation.mode.takes_expected() {
            format!("Value of {} {} \"{}\"", target, mode, expectation.expected)
        } else {
            format!("Value of {} is {}", target, mode)
        };

        self.run_element_assertion(
            AssertionType::Value,
            target,
            options,
            pass_message,
            |found| {
                let mut data = TextAssertionData {
                    found: found.is_found(),
                    matched_by: found.matched_by,
                    expected: expectation.expected.clone(),
                    actual: None,
                    mode: mode.to_string(),
                    case_sensitive: expectation.case_sensitive,
                };
                let Some(el) = found.element else {
                    return CheckOutcome::fail(REASON_NOT_FOUND, data);
                };

                let actual = el.value.as_deref().unwrap_or_default();
                data.actual = el.value.clone();
                if comparator.matches(actual) {
                    return CheckOutcome::pass(data);
                }
                let reason = match expectation.mode {
                    ValueMatchMode::Empty => format!("value is not empty: \"{}\"", actual),
                    ValueMatchMode::NotEmpty => "value is empty".to_string(),
                    _ => format!(
                        "value mismatch: expected {} \"{}\", got {}",
                        mode,
                        expectation.expected,
                        quoted(el.value.as_deref())
                    ),
                };
                CheckOutcome::fail(reason, data)
            },
        )
        .await
    }
}

fn quoted(value: Option<&str>) -> String {
    match value {
        Some(v) => format!("\"{}\"", v),
        None => "nothing".to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn cmp(mode: ValueMatchMode, expected: &str, case_sensitive: bool) -> Comparator {
        Comparator::compile(mode, expected, case_sensitive).unwrap()
    }

    #[test]
    fn exact_is_case_sensitive_by_default() {
        assert!(cmp(ValueMatchMode::Exact, "Welcome", true).matches("Welcome"));
        assert!(!cmp(ValueMatchMode::Exact, "Welcome", true).matches("welcome"));
        assert!(cmp(ValueMatchMode::Exact, "Welcome", false).matches("WELCOME"));
    }

    #[test]
    fn substring_modes() {
        assert!(cmp(ValueMatchMode::Contains, "come", true).matches("Welcome back"));
        assert!(cmp(ValueMatchMode::StartsWith, "Wel", true).matches("Welcome"));
        assert!(!cmp(ValueMatchMode::StartsWith, "wel", true).matches("Welcome"));
        assert!(cmp(ValueMatchMode::EndsWith, "BACK", false).matches("Welcome back"));
    }

    #[test]
    fn regex_mode_honors_case_flag() {
        assert!(cmp(ValueMatchMode::Regex, r"^\d+ items?$", true).matches("3 items"));
        assert!(!cmp(ValueMatchMode::Regex, "^total", true).matches("Total: 4"));
        assert!(cmp(ValueMatchMode::Regex, "^total", false).matches("Total: 4"));
    }

    #[test]
    fn empty_modes_ignore_expected() {
        assert!(cmp(ValueMatchMode::Empty, "ignored", true).matches(""));
        assert!(!cmp(ValueMatchMode::Empty, "", true).matches("x"));
        assert!(cmp(ValueMatchMode::NotEmpty, "", true).matches("x"));
    }

    #[test]
    fn invalid_regex_is_rejected() {
        match Comparator::compile(ValueMatchMode::Regex, "(unclosed", true) {
            Err(VerifyError::InvalidPattern { pattern, .. }) => assert_eq!(pattern, "(unclosed"),
            _ => panic!("expected InvalidPattern"),
        }
    }

    #[test]
    fn modes_deserialize_camel_case() {
        let exp: ValueExpectation = serde_json::from_str(r#"{"mode": "notEmpty"}"#).unwrap();
        assert_eq!(exp.mode, ValueMatchMode::NotEmpty);
        assert!(exp.case_sensitive);
        let exp: TextExpectation =
            serde_json::from_str(r#"{"expected": "Hi", "mode": "startsWith", "caseSensitive": false}"#).unwrap();
        assert_eq!(exp.mode, TextMatchMode::StartsWith);
        assert!(!exp.case_sensitive);
    }
}
