//! Element selectors.
//!
//! An [`ElementTarget`] names the element an assertion acts on. Callers
//! that accept shorthand strings parse them once at the boundary with
//! [`ElementTarget::parse`]; the rest of the engine only sees the
//! normalized form.
//!
//! | Shorthand        | Meaning                         |
//! |------------------|---------------------------------|
//! | `#login_button`  | accessibility identifier        |
//! | `@Sign In`       | accessibility label             |
//! | `"Welcome"`      | text (label or value)           |
//! | `type:Button`    | element type                    |
//! | `id:`, `label:`, `text:` | explicit category prefixes |
//! | `login_button`   | bare word, treated as identifier |

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::element::UIElement;

/// Errors from parsing a shorthand target string.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum TargetParseError {
    #[error("empty element target")]
    Empty,

    #[error("empty value after '{0}' in element target")]
    MissingValue(String),

    #[error("unterminated quote in element target: {0}")]
    UnterminatedQuote(String),
}

/// Which selector category produced a match.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum MatchedBy {
    Identifier,
    Label,
    Text,
    Type,
    Query,
}

impl MatchedBy {
    pub fn name(&self) -> &'static str {
        match self {
            MatchedBy::Identifier => "identifier",
            MatchedBy::Label => "label",
            MatchedBy::Text => "text",
            MatchedBy::Type => "type",
            MatchedBy::Query => "query",
        }
    }
}

/// A structured query, evaluated as a conjunction of its present predicates.
///
/// Contains-predicates are case-sensitive substring tests.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ElementQuery {
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub value_contains: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enabled: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub selected: Option<bool>,
}

fn field_contains(field: &Option<String>, needle: &Option<String>) -> bool {
    match needle {
        None => true,
        Some(n) => field.as_deref().map_or(false, |f| f.contains(n.as_str())),
    }
}

impl ElementQuery {
    /// A query with no predicates never matches anything.
    pub fn is_empty(&self) -> bool {
        self.element_type.is_none()
            && self.identifier_contains.is_none()
            && self.label_contains.is_none()
            && self.value_contains.is_none()
            && self.enabled.is_none()
            && self.selected.is_none()
    }

    pub fn matches(&self, element: &UIElement) -> bool {
        if self.is_empty() {
            return false;
        }
        if let Some(ref typ) = self.element_type {
            if element.element_type.as_deref() != Some(typ.as_str()) {
                return false;
            }
        }
        if self.enabled.map_or(false, |e| e != element.enabled) {
            return false;
        }
        if self.selected.map_or(false, |s| s != element.selected) {
            return false;
        }
        field_contains(&element.identifier, &self.identifier_contains)
            && field_contains(&element.label, &self.label_contains)
            && field_contains(&element.value, &self.value_contains)
    }
}

impl fmt::Display for ElementQuery {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref t) = self.element_type {
            parts.push(format!("type={}", t));
        }
        if let Some(ref s) = self.identifier_contains {
            parts.push(format!("identifier~\"{}\"", s));
        }
        if let Some(ref s) = self.label_contains {
            parts.push(format!("label~\"{}\"", s));
        }
        if let Some(ref s) = self.value_contains {
            parts.push(format!("value~\"{}\"", s));
        }
        if let Some(e) = self.enabled {
            parts.push(format!("enabled={}", e));
        }
        if let Some(s) = self.selected {
            parts.push(format!("selected={}", s));
        }
        write!(f, "{{{}}}", parts.join(", "))
    }
}

/// Selector for a UI element.
///
/// Any combination of categories may be set; the matcher tries them in the
/// fixed order identifier, label, text, type, query.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ElementTarget {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub identifier: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub text: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub element_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub query: Option<ElementQuery>,
}

impl ElementTarget {
    pub fn by_identifier(identifier: impl Into<String>) -> Self {
        Self {
            identifier: Some(identifier.into()),
            ..Self::default()
        }
    }

    pub fn by_label(label: impl Into<String>) -> Self {
        Self {
            label: Some(label.into()),
            ..Self::default()
        }
    }

    pub fn by_text(text: impl Into<String>) -> Self {
        Self {
            text: Some(text.into()),
            ..Self::default()
        }
    }

    pub fn by_type(element_type: impl Into<String>) -> Self {
        Self {
            element_type: Some(element_type.into()),
            ..Self::default()
        }
    }

    pub fn by_query(query: ElementQuery) -> Self {
        Self {
            query: Some(query),
            ..Self::default()
        }
    }

    /// True when no selector category is present.
    pub fn is_empty(&self) -> bool {
        self.identifier.is_none()
            && self.label.is_none()
            && self.text.is_none()
            && self.element_type.is_none()
            && self.query.as_ref().map_or(true, ElementQuery::is_empty)
    }

    /// Parses a shorthand target string. See the module docs for the syntax.
    pub fn parse(input: &str) -> Result<Self, TargetParseError> {
        let s = input.trim();
        if s.is_empty() {
            return Err(TargetParseError::Empty);
        }

        if let Some(rest) = s.strip_prefix('#') {
            return non_empty("#", rest).map(Self::by_identifier);
        }
        if let Some(rest) = s.strip_prefix('@') {
            return non_empty("@", rest).map(Self::by_label);
        }
        if let Some(quote) = s.chars().next().filter(|c| *c == '"' || *c == '\'') {
            let inner = &s[1..];
            return match inner.strip_suffix(quote) {
                Some(text) => Ok(Self::by_text(text)),
                None => Err(TargetParseError::UnterminatedQuote(s.to_string())),
            };
        }
        if let Some(rest) = s.strip_prefix("id:") {
            return non_empty("id:", rest).map(Self::by_identifier);
        }
        if let Some(rest) = s.strip_prefix("label:") {
            return non_empty("label:", rest).map(Self::by_label);
        }
        if let Some(rest) = s.strip_prefix("text:") {
            return non_empty("text:", rest).map(Self::by_text);
        }
        if let Some(rest) = s.strip_prefix("type:") {
            return non_empty("type:", rest).map(Self::by_type);
        }

        Ok(Self::by_identifier(s))
    }
}

fn non_empty(prefix: &str, rest: &str) -> Result<String, TargetParseError> {
    let rest = rest.trim();
    if rest.is_empty() {
        Err(TargetParseError::MissingValue(prefix.to_string()))
    } else {
        Ok(rest.to_string())
    }
}

impl FromStr for ElementTarget {
    type Err = TargetParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::parse(s)
    }
}

impl fmt::Display for ElementTarget {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut parts = Vec::new();
        if let Some(ref id) = self.identifier {
            parts.push(format!("identifier \"{}\"", id));
        }
        if let Some(ref label) = self.label {
            parts.push(format!("label \"{}\"", label));
        }
        if let Some(ref text) = self.text {
            parts.push(format!("text \"{}\"", text));
        }
        if let Some(ref typ) = self.element_type {
            parts.push(format!("type {}", typ));
        }
        if let Some(ref query) = self.query {
            parts.push(format!("query {}", query));
        }
        if parts.is_empty() {
            write!(f, "<empty target>")
        } else {
            write!(f, "{}", parts.join(" / "))
        }
    }
}
