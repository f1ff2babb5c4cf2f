//! Step interpreter.
//!
//! A [`Step`] is one assertion to run. Steps come either as JSON (tagged by
//! `"assert"`) or as a single line of text:
//!
//! ```text
//! visible #login_button
//! not-visible @"Loading"
//! enabled type:Button
//! text @Title = "Welcome"
//! text #status contains ready ignore-case
//! value #email not-empty
//! screen Login
//! screen Home any
//! log-contains "Loaded 3 items"
//! log-contains "Loaded \d+ items" regex
//! no-errors
//! no-crash
//! ```
//!
//! Targets use the [`ElementTarget`] shorthand; a quoted target is text.
//! [`parse_script`] reads one step per line, skipping blank lines and `//`
//! comments, and tolerates a leading markdown `- ` bullet.

use std::collections::HashMap;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::assertions::logs::{LogExpectation, LogScanOptions, LogWindow};
use crate::assertions::screen::ScreenDefinition;
use crate::assertions::text::{TextExpectation, TextMatchMode, ValueExpectation, ValueMatchMode};
use crate::assertions::AssertionOptions;
use crate::error::VerifyError;
use crate::result::{AssertionType, VerificationResult};
use crate::target::{ElementTarget, TargetParseError};
use crate::verifier::Verifier;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StepError {
    #[error("empty step")]
    Empty,

    #[error("unknown assertion '{0}'")]
    UnknownAssertion(String),

    #[error("'{step}' needs {what}")]
    Missing { step: String, what: &'static str },

    #[error("unknown operator '{0}'")]
    UnknownOperator(String),

    #[error("unexpected argument '{0}'")]
    Unexpected(String),

    #[error("unterminated string")]
    UnterminatedString,

    #[error("invalid target: {0}")]
    Target(#[from] TargetParseError),
}

/// A step that failed to parse, with its 1-based line number.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("line {line}: {error}")]
pub struct ScriptError {
    pub line: usize,
    #[source]
    pub error: StepError,
}

fn default_true() -> bool {
    true
}

/// One assertion to run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "assert", rename_all = "kebab-case", rename_all_fields = "camelCase")]
pub enum Step {
    Visible { target: ElementTarget },
    NotVisible { target: ElementTarget },
    Enabled { target: ElementTarget },
    Disabled { target: ElementTarget },
    Selected { target: ElementTarget },
    NotSelected { target: ElementTarget },
    Hittable { target: ElementTarget },
    NotHittable { target: ElementTarget },
    Text {
        target: ElementTarget,
        #[serde(flatten)]
        expectation: TextExpectation,
    },
    Value {
        target: ElementTarget,
        #[serde(flatten)]
        expectation: ValueExpectation,
    },
    Screen {
        name: String,
        #[serde(default = "default_true")]
        require_all: bool,
    },
    LogContains {
        #[serde(flatten)]
        expectation: LogExpectation,
    },
    NoErrors {
        #[serde(flatten)]
        scan: LogScanOptions,
    },
    NoCrash {
        #[serde(default)]
        window: LogWindow,
    },
}

#[derive(Debug, Clone, PartialEq, Eq)]
struct Word {
    text: String,
    /// The word started with a quote.
    quoted: bool,
}

/// Splits a step line into words. Quotes group words and may appear inside
/// a word (`@"Sign In"`); backslash escapes the next character in quotes.
fn split_words(line: &str) -> Result<Vec<Word>, StepError> {
    let mut words = Vec::new();
    let mut chars = line.chars().peekable();

    while let Some(&ch) = chars.peek() {
        if ch.is_whitespace() {
            chars.next();
            continue;
        }

        let mut word = Word { text: String::new(), quoted: ch == '"' || ch == '\'' };
        while let Some(&c) = chars.peek() {
            match c {
                c if c.is_whitespace() => break,
                '"' | '\'' => {
                    let quote = c;
                    chars.next();
                    loop {
                        match chars.next() {
                            Some('\\') => match chars.next() {
                                Some(escaped) if escaped == quote || escaped == '\\' => word.text.push(escaped),
                                Some(other) => {
                                    word.text.push('\\');
                                    word.text.push(other);
                                }
                                None => return Err(StepError::UnterminatedString),
                            },
                            Some(c) if c == quote => break,
                            Some(c) => word.text.push(c),
                            None => return Err(StepError::UnterminatedString),
                        }
                    }
                }
                _ => {
                    word.text.push(c);
                    chars.next();
                }
            }
        }
        words.push(word);
    }
    Ok(words)
}

fn to_target(word: &Word) -> Result<ElementTarget, StepError> {
    if word.quoted {
        Ok(ElementTarget::by_text(word.text.clone()))
    } else {
        Ok(ElementTarget::parse(&word.text)?)
    }
}

fn is_ignore_case(word: &str) -> bool {
    matches!(word, "ignore-case" | "ignoreCase" | "nocase" | "-i")
}

fn value_mode(op: &str) -> Option<ValueMatchMode> {
    let mode = match op {
        "=" | "==" | "equals" | "is" => ValueMatchMode::Exact,
        "contains" | "~" => ValueMatchMode::Contains,
        "matches" | "regex" | "=~" => ValueMatchMode::Regex,
        "starts-with" | "startsWith" => ValueMatchMode::StartsWith,
        "ends-with" | "endsWith" => ValueMatchMode::EndsWith,
        "empty" => ValueMatchMode::Empty,
        "not-empty" | "notEmpty" => ValueMatchMode::NotEmpty,
        _ => return None,
    };
    Some(mode)
}

fn text_mode(op: &str) -> Option<TextMatchMode> {
    match value_mode(op)? {
        ValueMatchMode::Exact => Some(TextMatchMode::Exact),
        ValueMatchMode::Contains => Some(TextMatchMode::Contains),
        ValueMatchMode::Regex => Some(TextMatchMode::Regex),
        ValueMatchMode::StartsWith => Some(TextMatchMode::StartsWith),
        ValueMatchMode::EndsWith => Some(TextMatchMode::EndsWith),
        ValueMatchMode::Empty | ValueMatchMode::NotEmpty => None,
    }
}

/// Consumes trailing flag words, returning whether `ignore-case` was present
/// and rejecting anything else that isn't in `allowed`.
fn trailing_flags<'a>(rest: &'a [Word], allowed: &[&str]) -> Result<(bool, Vec<&'a str>), StepError> {
    let mut ignore_case = false;
    let mut flags = Vec::new();
    for word in rest {
        if !word.quoted && is_ignore_case(&word.text) {
            ignore_case = true;
        } else if !word.quoted && allowed.contains(&word.text.as_str()) {
            flags.push(word.text.as_str());
        } else {
            return Err(StepError::Unexpected(word.text.clone()));
        }
    }
    Ok((ignore_case, flags))
}

impl Step {
    /// Parses the one-line textual form.
    pub fn parse(line: &str) -> Result<Self, StepError> {
        let words = split_words(line)?;
        let (head, args) = words.split_first().ok_or(StepError::Empty)?;
        let keyword = head.text.as_str();

        let missing = |what: &'static str| StepError::Missing { step: keyword.to_string(), what };
        let single_target = |args: &[Word]| -> Result<ElementTarget, StepError> {
            match args {
                [] => Err(missing("a target")),
                [target] => to_target(target),
                [_, extra, ..] => Err(StepError::Unexpected(extra.text.clone())),
            }
        };

        let step = match keyword {
            "visible" => Step::Visible { target: single_target(args)? },
            "not-visible" => Step::NotVisible { target: single_target(args)? },
            "enabled" => Step::Enabled { target: single_target(args)? },
            "disabled" => Step::Disabled { target: single_target(args)? },
            "selected" => Step::Selected { target: single_target(args)? },
            "not-selected" => Step::NotSelected { target: single_target(args)? },
            "hittable" => Step::Hittable { target: single_target(args)? },
            "not-hittable" => Step::NotHittable { target: single_target(args)? },
            "text" => {
                let [target, op, expected, rest @ ..] = args else {
                    return Err(missing("a target, an operator and the expected text"));
                };
                let mode = text_mode(&op.text).ok_or_else(|| StepError::UnknownOperator(op.text.clone()))?;
                let (ignore_case, _) = trailing_flags(rest, &[])?;
                let mut expectation = TextExpectation::new(expected.text.clone(), mode);
                expectation.case_sensitive = !ignore_case;
                Step::Text { target: to_target(target)?, expectation }
            }
            "value" => {
                let [target, op, rest @ ..] = args else {
                    return Err(missing("a target and an operator"));
                };
                let mode = value_mode(&op.text).ok_or_else(|| StepError::UnknownOperator(op.text.clone()))?;
                let (expected, rest) = if mode.takes_expected() {
                    let (expected, rest) = rest.split_first().ok_or_else(|| missing("the expected value"))?;
                    (expected.text.clone(), rest)
                } else {
                    (String::new(), rest)
                };
                let (ignore_case, _) = trailing_flags(rest, &[])?;
                let mut expectation = ValueExpectation::new(expected, mode);
                expectation.case_sensitive = !ignore_case;
                Step::Value { target: to_target(target)?, expectation }
            }
            "screen" => {
                let (name, rest) = args.split_first().ok_or_else(|| missing("a screen name"))?;
                let (_, flags) = trailing_flags(rest, &["any", "all"])?;
                Step::Screen {
                    name: name.text.clone(),
                    require_all: !flags.contains(&"any"),
                }
            }
            "log-contains" => {
                let (pattern, rest) = args.split_first().ok_or_else(|| missing("a pattern"))?;
                let (ignore_case, flags) = trailing_flags(rest, &["regex"])?;
                let mut expectation = if flags.contains(&"regex") {
                    LogExpectation::regex(pattern.text.clone())
                } else {
                    LogExpectation::substring(pattern.text.clone())
                };
                expectation.case_sensitive = !ignore_case;
                Step::LogContains { expectation }
            }
            "no-errors" => match args {
                [] => Step::NoErrors { scan: LogScanOptions::default() },
                [extra, ..] => return Err(StepError::Unexpected(extra.text.clone())),
            },
            "no-crash" => match args {
                [] => Step::NoCrash { window: LogWindow::default() },
                [extra, ..] => return Err(StepError::Unexpected(extra.text.clone())),
            },
            other => return Err(StepError::UnknownAssertion(other.to_string())),
        };
        Ok(step)
    }

    pub fn assertion_type(&self) -> AssertionType {
        match self {
            Step::Visible { .. } => AssertionType::Visible,
            Step::NotVisible { .. } => AssertionType::NotVisible,
            Step::Enabled { .. } => AssertionType::Enabled,
            Step::Disabled { .. } => AssertionType::Disabled,
            Step::Selected { .. } => AssertionType::Selected,
            Step::NotSelected { .. } => AssertionType::NotSelected,
            Step::Hittable { .. } => AssertionType::Hittable,
            Step::NotHittable { .. } => AssertionType::NotHittable,
            Step::Text { .. } => AssertionType::Text,
            Step::Value { .. } => AssertionType::Value,
            Step::Screen { .. } => AssertionType::Screen,
            Step::LogContains { .. } => AssertionType::LogContains,
            Step::NoErrors { .. } => AssertionType::NoErrors,
            Step::NoCrash { .. } => AssertionType::NoCrash,
        }
    }

    /// Runs the step, returning the result with its payload as JSON.
    pub async fn run(
        &self,
        verifier: &Verifier,
        screens: &HashMap<String, ScreenDefinition>,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<serde_json::Value>, VerifyError> {
        let result = match self {
            Step::Visible { target } => verifier.assert_visible(target, options).await?.erase(),
            Step::NotVisible { target } => verifier.assert_not_visible(target, options).await?.erase(),
            Step::Enabled { target } => verifier.assert_enabled(target, options).await?.erase(),
            Step::Disabled { target } => verifier.assert_disabled(target, options).await?.erase(),
            Step::Selected { target } => verifier.assert_selected(target, options).await?.erase(),
            Step::NotSelected { target } => verifier.assert_not_selected(target, options).await?.erase(),
            Step::Hittable { target } => verifier.assert_hittable(target, options).await?.erase(),
            Step::NotHittable { target } => verifier.assert_not_hittable(target, options).await?.erase(),
            Step::Text { target, expectation } => verifier.assert_text(target, expectation, options).await?.erase(),
            Step::Value { target, expectation } => verifier.assert_value(target, expectation, options).await?.erase(),
            Step::Screen { name, require_all } => verifier
                .assert_screen_by_name(name, screens, *require_all, options)
                .await?
                .erase(),
            Step::LogContains { expectation } => verifier.assert_log_contains(expectation, options).await?.erase(),
            Step::NoErrors { scan } => verifier.assert_no_errors(scan, options).await?.erase(),
            Step::NoCrash { window } => verifier.assert_no_crash(window, options).await?.erase(),
        };
        Ok(result)
    }
}

impl FromStr for Step {
    type Err = StepError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

/// Parses a script of one step per line.
///
/// Returns each step with its 1-based line number.
pub fn parse_script(source: &str) -> Result<Vec<(usize, Step)>, ScriptError> {
    let mut steps = Vec::new();
    for (index, raw) in source.lines().enumerate() {
        let mut line = raw.trim();
        if let Some(rest) = line.strip_prefix("- ") {
            line = rest.trim();
        }
        if line.is_empty() || line.starts_with("//") {
            continue;
        }
        let step = Step::parse(line).map_err(|error| ScriptError { line: index + 1, error })?;
        steps.push((index + 1, step));
    }
    Ok(steps)
}
