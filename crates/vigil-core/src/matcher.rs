//! Element matching against a UI snapshot.
//!
//! [`find_target`] resolves an [`ElementTarget`] to at most one node using a
//! fixed priority: identifier, label, text, type, then the structured query.
//! Categories are tried in that order and never combined: the first present
//! category that yields a match decides the result.
//!
//! Identifier and label selectors support glob wildcards (`*` and `?`).

use crate::element::UIElement;
use crate::target::{ElementTarget, MatchedBy};

/// Result of resolving a target against a tree.
#[derive(Debug, Clone, Copy)]
pub struct TargetMatch<'a> {
    pub element: Option<&'a UIElement>,
    pub matched_by: Option<MatchedBy>,
}

impl<'a> TargetMatch<'a> {
    fn none() -> Self {
        Self { element: None, matched_by: None }
    }

    fn found(element: &'a UIElement, matched_by: MatchedBy) -> Self {
        Self { element: Some(element), matched_by: Some(matched_by) }
    }

    pub fn is_found(&self) -> bool {
        self.element.is_some()
    }
}

/// Returns true if the pattern contains glob wildcard characters (`*` or `?`).
fn has_wildcard(pattern: &str) -> bool {
    pattern.contains('*') || pattern.contains('?')
}

/// Matches a string against a glob pattern with `*` (any chars) and `?` (single char).
///
/// When the pattern has no wildcards, falls back to exact equality.
pub fn glob_match(pattern: &str, text: &str) -> bool {
    if !has_wildcard(pattern) {
        return pattern == text;
    }

    let pat: Vec<char> = pattern.chars().collect();
    let txt: Vec<char> = text.chars().collect();
    let (plen, tlen) = (pat.len(), txt.len());

    // dp[i][j] = pattern[..i] matches text[..j]
    let mut dp = vec![vec![false; tlen + 1]; plen + 1];
    dp[0][0] = true;

    for i in 1..=plen {
        if pat[i - 1] == '*' {
            dp[i][0] = dp[i - 1][0];
        }
    }

    for i in 1..=plen {
        for j in 1..=tlen {
            if pat[i - 1] == '*' {
                dp[i][j] = dp[i - 1][j] || dp[i][j - 1];
            } else if pat[i - 1] == '?' || pat[i - 1] == txt[j - 1] {
                dp[i][j] = dp[i - 1][j - 1];
            }
        }
    }

    dp[plen][tlen]
}

/// Depth-first, pre-order search for the first node satisfying `pred`.
fn search<'a, P>(elements: &'a [UIElement], pred: &P) -> Option<&'a UIElement>
where
    P: Fn(&UIElement) -> bool,
{
    for element in elements {
        if pred(element) {
            return Some(element);
        }
        if let Some(found) = search(&element.children, pred) {
            return Some(found);
        }
    }
    None
}

fn collect<'a, P>(elements: &'a [UIElement], pred: &P, out: &mut Vec<&'a UIElement>)
where
    P: Fn(&UIElement) -> bool,
{
    for element in elements {
        if pred(element) {
            out.push(element);
        }
        collect(&element.children, pred, out);
    }
}

/// Finds the first element whose identifier matches (glob-aware).
pub fn find_by_identifier<'a>(tree: &'a UIElement, identifier: &str) -> Option<&'a UIElement> {
    search(std::slice::from_ref(tree), &|el: &UIElement| {
        el.identifier.as_deref().map_or(false, |id| glob_match(identifier, id))
    })
}

/// Finds the first element whose label matches (glob-aware).
pub fn find_by_label<'a>(tree: &'a UIElement, label: &str) -> Option<&'a UIElement> {
    search(std::slice::from_ref(tree), &|el: &UIElement| {
        el.label.as_deref().map_or(false, |l| glob_match(label, l))
    })
}

/// Collects every element whose label or value equals `text`, in document order.
pub fn find_all_by_text<'a>(tree: &'a UIElement, text: &str) -> Vec<&'a UIElement> {
    let mut out = Vec::new();
    collect(
        std::slice::from_ref(tree),
        &|el: &UIElement| el.label.as_deref() == Some(text) || el.value.as_deref() == Some(text),
        &mut out,
    );
    out
}

/// Finds the first element of the given type.
pub fn find_by_type<'a>(tree: &'a UIElement, element_type: &str) -> Option<&'a UIElement> {
    search(std::slice::from_ref(tree), &|el: &UIElement| {
        el.element_type.as_deref() == Some(element_type)
    })
}

/// Resolves `target` against `tree`.
///
/// Returns an empty [`TargetMatch`] when no present category matches; this
/// is the "element not found" condition, which callers report separately
/// from an element that was found but failed a state predicate.
pub fn find_target<'a>(tree: &'a UIElement, target: &ElementTarget) -> TargetMatch<'a> {
    if let Some(ref identifier) = target.identifier {
        if let Some(el) = find_by_identifier(tree, identifier) {
            return TargetMatch::found(el, MatchedBy::Identifier);
        }
    }
    if let Some(ref label) = target.label {
        if let Some(el) = find_by_label(tree, label) {
            return TargetMatch::found(el, MatchedBy::Label);
        }
    }
    if let Some(ref text) = target.text {
        if let Some(el) = find_all_by_text(tree, text).into_iter().next() {
            return TargetMatch::found(el, MatchedBy::Text);
        }
    }
    if let Some(ref element_type) = target.element_type {
        if let Some(el) = find_by_type(tree, element_type) {
            return TargetMatch::found(el, MatchedBy::Type);
        }
    }
    if let Some(ref query) = target.query {
        if let Some(el) = search(std::slice::from_ref(tree), &|el: &UIElement| query.matches(el)) {
            return TargetMatch::found(el, MatchedBy::Query);
        }
    }
    TargetMatch::none()
}
