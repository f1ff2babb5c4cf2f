//! System log assertions and the pattern scanner behind them.
//!
//! The [`LogScanner`] walks an already windowed list of log entries. Each
//! entry whose message matches an ignore pattern is skipped; otherwise the
//! error patterns are tried in order and the first hit is recorded along
//! with up to `context_lines` neighbouring messages on each side.
//! Collection stops at `max_errors`, counting does not.
//!
//! `assert_no_errors` and `assert_no_crash` run a single check unless the
//! caller supplies polling overrides. `assert_log_contains` always polls,
//! since the line it waits for may not have been written yet.

use chrono::{DateTime, Utc};
use regex::{Regex, RegexBuilder};
use serde::{Deserialize, Serialize};
use tracing::{info_span, Instrument};

use super::AssertionOptions;
use crate::device::{LogEntry, LogQuery};
use crate::error::VerifyError;
use crate::poll::{check_once, poll_until, CheckError, CheckOutcome};
use crate::result::{AssertionType, ResultBuilder, VerificationResult};
use crate::verifier::Verifier;

/// Built-in error patterns, tried in this order.
pub const DEFAULT_ERROR_PATTERNS: &[&str] = &[
    r"(?i)\berror\b",
    r"(?i)\bfail(?:ed|ure|ing)?\b",
    r"(?i)\bexception\b",
    r"(?i)\bcrash(?:ed|es|ing)?\b",
    r"(?i)\bfatal\b",
    r"\bSIG(?:ABRT|SEGV|BUS|ILL|FPE|KILL|TRAP)\b",
    r"\bEXC_[A-Z_]+\b",
    r"(?i)\b(?:http(?:/\d(?:\.\d)?)?|(?:status|response)(?:\s*code)?|returned|responded\s+with)\s*[:=]?\s*[45]\d{2}\b",
    r"(?i)\b(?:network|connection)\s+(?:error|lost|refused|unavailable)\b",
    r"(?i)\btimed?\s*out\b",
    r"(?i)\bout of memory\b",
];

/// Built-in patterns for lines that look like errors but are benign.
pub const DEFAULT_IGNORE_PATTERNS: &[&str] = &[
    r"(?i)\berror\s*[:=]\s*(?:nil|null|none|\(null\))",
    r"(?i)\bno errors?\b",
    r"(?i)\b0 errors?\b",
    r"(?i)\berrors?\s*[:=]\s*0\b",
    r"(?i)\bwithout (?:any )?errors?\b",
    r"(?i)^\s*\[?debug\]?[:\s]",
];

/// Patterns that indicate the app crashed or was killed.
pub const CRASH_PATTERNS: &[&str] = &[
    r"(?i)terminating app due to uncaught exception",
    r"\bEXC_BAD_ACCESS\b",
    r"\bSIG(?:SEGV|ABRT|KILL|BUS)\b",
    r"(?i)\bcrashed\b",
    r"Fatal error",
    r"(?i)\b0x8badf00d\b",
];

pub const DEFAULT_MAX_ERRORS: usize = 10;
pub const DEFAULT_CONTEXT_LINES: usize = 2;

/// How caller-supplied patterns combine with the built-in set.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PatternMode {
    /// Built-in patterns followed by custom ones.
    #[default]
    Extend,
    /// Custom patterns only.
    Replace,
    /// Built-in patterns only; custom ones are ignored.
    Default,
}

/// Which slice of the system log to fetch.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogWindow {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub since: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub level: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<usize>,
}

impl LogWindow {
    pub fn since(since: DateTime<Utc>) -> Self {
        Self {
            since: Some(since),
            ..Self::default()
        }
    }

    fn query(&self, device_id: &str, process_filter: Option<String>) -> LogQuery {
        LogQuery {
            device_id: device_id.to_string(),
            since: self.since,
            process_filter,
            level: self.level.clone(),
            limit: self.limit,
        }
    }
}

/// Options for [`Verifier::assert_no_errors`] and the point functions.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogScanOptions {
    #[serde(default)]
    pub window: LogWindow,
    #[serde(default)]
    pub error_patterns: Vec<String>,
    #[serde(default)]
    pub error_mode: PatternMode,
    #[serde(default)]
    pub ignore_patterns: Vec<String>,
    #[serde(default)]
    pub ignore_mode: PatternMode,
    #[serde(default = "default_max_errors")]
    pub max_errors: usize,
    #[serde(default = "default_context_lines")]
    pub context_lines: usize,
}

fn default_max_errors() -> usize {
    DEFAULT_MAX_ERRORS
}

fn default_context_lines() -> usize {
    DEFAULT_CONTEXT_LINES
}

impl Default for LogScanOptions {
    fn default() -> Self {
        Self {
            window: LogWindow::default(),
            error_patterns: Vec::new(),
            error_mode: PatternMode::Extend,
            ignore_patterns: Vec::new(),
            ignore_mode: PatternMode::Extend,
            max_errors: DEFAULT_MAX_ERRORS,
            context_lines: DEFAULT_CONTEXT_LINES,
        }
    }
}

/// One log scan hit.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MatchedError {
    pub entry: LogEntry,
    pub pattern: String,
    pub matched_text: String,
    /// Messages of the neighbouring entries, in log order, excluding the hit.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub context: Vec<String>,
}

/// What one scan found.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ScanReport {
    /// Collected hits, at most `max_errors`.
    pub errors: Vec<MatchedError>,
    /// Every hit, including those past the cap.
    pub total_matches: usize,
    pub total_scanned: usize,
}

fn compile_set(defaults: &[&str], custom: &[String], mode: PatternMode) -> Result<Vec<(String, Regex)>, VerifyError> {
    let mut compiled = Vec::new();
    if mode != PatternMode::Replace {
        for pattern in defaults {
            let re = Regex::new(pattern).map_err(|e| VerifyError::invalid_pattern(pattern, e))?;
            compiled.push((pattern.to_string(), re));
        }
    }
    if mode != PatternMode::Default {
        for pattern in custom {
            let re = RegexBuilder::new(pattern)
                .case_insensitive(true)
                .build()
                .map_err(|e| VerifyError::invalid_pattern(pattern, e))?;
            compiled.push((pattern.clone(), re));
        }
    }
    Ok(compiled)
}

/// Compiled error and ignore pattern sets.
#[derive(Debug, Clone)]
pub struct LogScanner {
    errors: Vec<(String, Regex)>,
    ignores: Vec<(String, Regex)>,
    max_errors: usize,
    context_lines: usize,
}

impl LogScanner {
    /// Resolves and compiles the pattern sets. Custom patterns are
    /// case-insensitive.
    pub fn new(options: &LogScanOptions) -> Result<Self, VerifyError> {
        Ok(Self {
            errors: compile_set(DEFAULT_ERROR_PATTERNS, &options.error_patterns, options.error_mode)?,
            ignores: compile_set(DEFAULT_IGNORE_PATTERNS, &options.ignore_patterns, options.ignore_mode)?,
            max_errors: options.max_errors,
            context_lines: options.context_lines,
        })
    }

    /// Scanner for the crash pattern set, with no ignore list.
    pub fn crash(max_errors: usize, context_lines: usize) -> Result<Self, VerifyError> {
        Ok(Self {
            errors: compile_set(CRASH_PATTERNS, &[], PatternMode::Default)?,
            ignores: Vec::new(),
            max_errors,
            context_lines,
        })
    }

    pub fn error_patterns(&self) -> Vec<String> {
        self.errors.iter().map(|(p, _)| p.clone()).collect()
    }

    pub fn ignore_patterns(&self) -> Vec<String> {
        self.ignores.iter().map(|(p, _)| p.clone()).collect()
    }

    fn is_ignored(&self, message: &str) -> bool {
        self.ignores.iter().any(|(_, re)| re.is_match(message))
    }

    /// The first error pattern that hits `message`, with the matched text.
    fn first_hit<'a>(&'a self, message: &'a str) -> Option<(&'a str, &'a str)> {
        if self.is_ignored(message) {
            return None;
        }
        self.errors
            .iter()
            .find_map(|(pattern, re)| re.find(message).map(|m| (pattern.as_str(), m.as_str())))
    }

    fn context(&self, entries: &[LogEntry], index: usize) -> Vec<String> {
        let start = index.saturating_sub(self.context_lines);
        let end = (index + self.context_lines + 1).min(entries.len());
        (start..end)
            .filter(|&i| i != index)
            .map(|i| entries[i].message.clone())
            .collect()
    }

    pub fn scan(&self, entries: &[LogEntry]) -> ScanReport {
        let mut report = ScanReport {
            total_scanned: entries.len(),
            ..ScanReport::default()
        };
        for (index, entry) in entries.iter().enumerate() {
            let Some((pattern, text)) = self.first_hit(&entry.message) else {
                continue;
            };
            report.total_matches += 1;
            if report.errors.len() < self.max_errors {
                report.errors.push(MatchedError {
                    entry: entry.clone(),
                    pattern: pattern.to_string(),
                    matched_text: text.to_string(),
                    context: self.context(entries, index),
                });
            }
        }
        report
    }

    /// Number of non-ignored entries that hit an error pattern, uncapped.
    pub fn count(&self, entries: &[LogEntry]) -> usize {
        entries.iter().filter(|e| self.first_hit(&e.message).is_some()).count()
    }

    pub fn has_match(&self, entries: &[LogEntry]) -> bool {
        entries.iter().any(|e| self.first_hit(&e.message).is_some())
    }
}

/// Counts error entries with the given options.
pub fn count_errors(entries: &[LogEntry], options: &LogScanOptions) -> Result<usize, VerifyError> {
    Ok(LogScanner::new(options)?.count(entries))
}

/// Whether any entry hits an error pattern with the given options.
pub fn has_error_pattern(entries: &[LogEntry], options: &LogScanOptions) -> Result<bool, VerifyError> {
    Ok(LogScanner::new(options)?.has_match(entries))
}

/// Payload of [`Verifier::assert_no_errors`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoErrorsAssertionData {
    /// Number of collected errors (capped at `max_errors`).
    pub error_count: usize,
    /// Number of matching entries, uncapped.
    pub total_matches: usize,
    pub errors: Vec<MatchedError>,
    pub total_logs_scanned: usize,
    pub error_patterns: Vec<String>,
    pub ignore_patterns: Vec<String>,
    pub has_errors: bool,
}

/// Payload of [`Verifier::assert_no_crash`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NoCrashAssertionData {
    pub crash_count: usize,
    pub crashes: Vec<MatchedError>,
    pub total_logs_scanned: usize,
    pub crash_patterns: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub process_filter: Option<String>,
}

/// What [`Verifier::assert_log_contains`] looks for.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LogExpectation {
    pub pattern: String,
    /// Treat `pattern` as a regex instead of a substring.
    #[serde(default)]
    pub regex: bool,
    #[serde(default = "default_true")]
    pub case_sensitive: bool,
    #[serde(default)]
    pub window: LogWindow,
    #[serde(default = "default_max_errors")]
    pub max_matches: usize,
}

fn default_true() -> bool {
    true
}

impl LogExpectation {
    pub fn substring(pattern: impl Into<String>) -> Self {
        Self {
            pattern: pattern.into(),
            regex: false,
            case_sensitive: true,
            window: LogWindow::default(),
            max_matches: DEFAULT_MAX_ERRORS,
        }
    }

    pub fn regex(pattern: impl Into<String>) -> Self {
        Self {
            regex: true,
            ..Self::substring(pattern)
        }
    }

    pub fn ignore_case(mut self) -> Self {
        self.case_sensitive = false;
        self
    }

    fn compile(&self) -> Result<Regex, VerifyError> {
        let source = if self.regex { self.pattern.clone() } else { regex::escape(&self.pattern) };
        RegexBuilder::new(&source)
            .case_insensitive(!self.case_sensitive)
            .build()
            .map_err(|e| VerifyError::invalid_pattern(&self.pattern, e))
    }
}

/// Payload of [`Verifier::assert_log_contains`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogContainsAssertionData {
    pub pattern: String,
    pub match_count: usize,
    /// Matching entries, at most `max_matches`.
    pub matches: Vec<LogEntry>,
    pub total_logs_scanned: usize,
}

impl Verifier {
    /// Shared driver for log assertions: fetch the window, evaluate, and
    /// either check once or poll.
    #[allow(clippy::too_many_arguments)]
    async fn run_log_assertion<T, F, M>(
        &self,
        assertion_type: AssertionType,
        description: &str,
        query_window: &LogWindow,
        process_filter: Option<String>,
        polled: bool,
        options: &AssertionOptions,
        evaluate: F,
        pass_message: M,
    ) -> Result<VerificationResult<T>, VerifyError>
    where
        T: Serialize,
        F: Fn(&[LogEntry]) -> CheckOutcome<T>,
        M: FnOnce(Option<&T>) -> String,
    {
        let span = info_span!(
            "assertion",
            kind = assertion_type.name(),
            target = %description,
            session = %options.session_id,
            bundle_id = options.bundle_id.as_deref(),
        );

        async {
            let device = self.resolve_device(options).await?;
            let query = query_window.query(&device.id, process_filter);
            let mut builder = ResultBuilder::new(assertion_type, description)
                .with_session(Some(options.session_id.clone()))
                .with_device(device.id.as_str());

            let query = &query;
            let evaluate = &evaluate;
            let check = |attempt: u32| async move {
                let entries = self
                    .collaborators()
                    .logs
                    .system_log(query)
                    .await
                    .map_err(|e| Verifier::check_error(e, attempt))?;
                Ok::<_, CheckError<VerifyError>>(evaluate(&entries))
            };

            let outcome = if polled {
                let poll = self.poll_options(options, description);
                builder = builder.with_timeout(poll.timeout);
                let mut attempt = 0;
                poll_until(
                    || {
                        attempt += 1;
                        check(attempt)
                    },
                    &poll,
                )
                .await?
            } else {
                check_once(check(1)).await?
            };

            let message = pass_message(outcome.last_data.as_ref());
            self.finish(builder, outcome, message, &device.id, options).await
        }
        .instrument(span)
        .await
    }

    /// Passes when the log window contains no error entries.
    ///
    /// Runs a single check unless `options` carries polling overrides, in
    /// which case it waits for the errors to clear.
    pub async fn assert_no_errors(
        &self,
        scan: &LogScanOptions,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<NoErrorsAssertionData>, VerifyError> {
        let scanner = LogScanner::new(scan)?;
        let error_patterns = scanner.error_patterns();
        let ignore_patterns = scanner.ignore_patterns();

        self.run_log_assertion(
            AssertionType::NoErrors,
            "system log",
            &scan.window,
            scan.window.process_filter.clone(),
            options.has_polling(),
            options,
            |entries| {
                let report = scanner.scan(entries);
                let has_errors = report.total_matches > 0;
                let reason = report.errors.first().map(|first| {
                    format!(
                        "Found {} error(s) in {} log entries; first: \"{}\" in: {}",
                        report.total_matches, report.total_scanned, first.matched_text, first.entry.message
                    )
                });
                let data = NoErrorsAssertionData {
                    error_count: report.errors.len(),
                    total_matches: report.total_matches,
                    errors: report.errors,
                    total_logs_scanned: report.total_scanned,
                    error_patterns: error_patterns.clone(),
                    ignore_patterns: ignore_patterns.clone(),
                    has_errors,
                };
                match reason {
                    Some(reason) => CheckOutcome::fail(reason, data),
                    // Matches exist but max_errors is zero.
                    None if has_errors => CheckOutcome::fail(
                        format!("Found {} error(s) in {} log entries", data.total_matches, data.total_logs_scanned),
                        data,
                    ),
                    None => CheckOutcome::pass(data),
                }
            },
            |data| {
                let scanned = data.map_or(0, |d| d.total_logs_scanned);
                format!("No errors found in {} log entries", scanned)
            },
        )
        .await
    }

    /// Passes once an entry in the log window matches `expectation`.
    pub async fn assert_log_contains(
        &self,
        expectation: &LogExpectation,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<LogContainsAssertionData>, VerifyError> {
        let re = expectation.compile()?;
        let description = format!("log contains \"{}\"", expectation.pattern);

        self.run_log_assertion(
            AssertionType::LogContains,
            &description,
            &expectation.window,
            expectation.window.process_filter.clone(),
            true,
            options,
            |entries| {
                let hits: Vec<&LogEntry> = entries.iter().filter(|e| re.is_match(&e.message)).collect();
                let data = LogContainsAssertionData {
                    pattern: expectation.pattern.clone(),
                    match_count: hits.len(),
                    matches: hits.iter().take(expectation.max_matches).map(|e| (*e).clone()).collect(),
                    total_logs_scanned: entries.len(),
                };
                if data.match_count > 0 {
                    CheckOutcome::pass(data)
                } else {
                    let reason = format!(
                        "no log entry matched \"{}\" ({} entries scanned)",
                        expectation.pattern, data.total_logs_scanned
                    );
                    CheckOutcome::fail(reason, data)
                }
            },
            |data| {
                let count = data.map_or(0, |d| d.match_count);
                format!("Found {} log entries matching \"{}\"", count, expectation.pattern)
            },
        )
        .await
    }

    /// Passes when the log window shows no sign of a crash.
    ///
    /// When `options.bundle_id` is set and the window has no process filter
    /// of its own, the bundle id is passed to the log collaborator as the
    /// process filter.
    pub async fn assert_no_crash(
        &self,
        window: &LogWindow,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<NoCrashAssertionData>, VerifyError> {
        let scanner = LogScanner::crash(DEFAULT_MAX_ERRORS, DEFAULT_CONTEXT_LINES)?;
        let crash_patterns = scanner.error_patterns();
        let process_filter = window.process_filter.clone().or_else(|| options.bundle_id.clone());
        let description = match process_filter {
            Some(ref p) => format!("no crash in {}", p),
            None => "no crash".to_string(),
        };

        self.run_log_assertion(
            AssertionType::NoCrash,
            &description,
            window,
            process_filter.clone(),
            options.has_polling(),
            options,
            |entries| {
                let report = scanner.scan(entries);
                let reason = report.errors.first().map(|first| {
                    format!("Detected crash: \"{}\" in: {}", first.matched_text, first.entry.message)
                });
                let data = NoCrashAssertionData {
                    crash_count: report.total_matches,
                    crashes: report.errors,
                    total_logs_scanned: report.total_scanned,
                    crash_patterns: crash_patterns.clone(),
                    process_filter: process_filter.clone(),
                };
                match reason {
                    Some(reason) => CheckOutcome::fail(reason, data),
                    None => CheckOutcome::pass(data),
                }
            },
            |data| {
                let scanned = data.map_or(0, |d| d.total_logs_scanned);
                format!("No crash detected in {} log entries", scanned)
            },
        )
        .await
    }
}
