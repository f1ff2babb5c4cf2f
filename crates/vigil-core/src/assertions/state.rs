//! Enabled, selected and hittable assertions.
//!
//! All six share one shape: the element must exist, must be visible when
//! `require_visible` is set, and only then is the flag compared. The three
//! failure reasons stay distinct so callers can tell "missing" from
//! "hidden" from "wrong state".

use super::{AssertionOptions, ElementAssertionData, REASON_NOT_FOUND, REASON_NOT_VISIBLE};
use crate::element::UIElement;
use crate::error::VerifyError;
use crate::poll::CheckOutcome;
use crate::result::{AssertionType, VerificationResult};
use crate::target::ElementTarget;
use crate::verifier::Verifier;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ElementFlag {
    Enabled,
    Selected,
    Hittable,
}

impl ElementFlag {
    pub(crate) fn read(self, element: &UIElement) -> bool {
        match self {
            ElementFlag::Enabled => element.enabled,
            ElementFlag::Selected => element.selected,
            ElementFlag::Hittable => element.is_hittable(),
        }
    }

    pub(crate) fn describe(self, state: bool) -> &'static str {
        match (self, state) {
            (ElementFlag::Enabled, true) => "enabled",
            (ElementFlag::Enabled, false) => "disabled",
            (ElementFlag::Selected, true) => "selected",
            (ElementFlag::Selected, false) => "not selected",
            (ElementFlag::Hittable, true) => "hittable",
            (ElementFlag::Hittable, false) => "not hittable",
        }
    }

    /// Evaluates the flag against an already located element.
    ///
    /// Returns the failure reason, or `None` when the check passes.
    pub(crate) fn check(self, element: Option<&UIElement>, expected: bool, require_visible: bool) -> Option<String> {
        match element {
            None => Some(REASON_NOT_FOUND.to_string()),
            Some(el) if require_visible && !el.visible => Some(REASON_NOT_VISIBLE.to_string()),
            Some(el) => {
                let actual = self.read(el);
                (actual != expected).then(|| format!("element is {}", self.describe(actual)))
            }
        }
    }
}

impl Verifier {
    async fn assert_flag(
        &self,
        assertion_type: AssertionType,
        flag: ElementFlag,
        expected: bool,
        target: &ElementTarget,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ElementAssertionData>, VerifyError> {
        let require_visible = options.require_visible;
        self.run_element_assertion(
            assertion_type,
            target,
            options,
            format!("Element {} is {}", target, flag.describe(expected)),
            move |found| {
                let data = ElementAssertionData::from_match(&found);
                match flag.check(found.element, expected, require_visible) {
                    Some(reason) => CheckOutcome::fail(reason, data),
                    None => CheckOutcome::pass(data),
                }
            },
        )
        .await
    }

    pub async fn assert_enabled(
        &self,
        target: &ElementTarget,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ElementAssertionData>, VerifyError> {
        self.assert_flag(AssertionType::Enabled, ElementFlag::Enabled, true, target, options).await
    }

    pub async fn assert_disabled(
        &self,
        target: &ElementTarget,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ElementAssertionData>, VerifyError> {
        self.assert_flag(AssertionType::Disabled, ElementFlag::Enabled, false, target, options).await
    }

    pub async fn assert_selected(
        &self,
        target: &ElementTarget,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ElementAssertionData>, VerifyError> {
        self.assert_flag(AssertionType::Selected, ElementFlag::Selected, true, target, options).await
    }

    pub async fn assert_not_selected(
        &self,
        target: &ElementTarget,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ElementAssertionData>, VerifyError> {
        self.assert_flag(AssertionType::NotSelected, ElementFlag::Selected, false, target, options).await
    }

    /// Passes once the element is visible, enabled, has a non-zero frame
    /// and is not reported unhittable by the backend.
    pub async fn assert_hittable(
        &self,
        target: &ElementTarget,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ElementAssertionData>, VerifyError> {
        self.assert_flag(AssertionType::Hittable, ElementFlag::Hittable, true, target, options).await
    }

    pub async fn assert_not_hittable(
        &self,
        target: &ElementTarget,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ElementAssertionData>, VerifyError> {
        self.assert_flag(AssertionType::NotHittable, ElementFlag::Hittable, false, target, options).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn reasons_are_distinct() {
        let hidden = UIElement::new("Button").with_visible(false);
        let disabled = UIElement::new("Button").with_enabled(false);

        assert_eq!(ElementFlag::Enabled.check(None, true, true).as_deref(), Some(REASON_NOT_FOUND));
        assert_eq!(ElementFlag::Enabled.check(Some(&hidden), true, true).as_deref(), Some(REASON_NOT_VISIBLE));
        assert_eq!(
            ElementFlag::Enabled.check(Some(&disabled), true, true).as_deref(),
            Some("element is disabled")
        );
        assert_eq!(ElementFlag::Enabled.check(Some(&disabled), false, true), None);
    }

    #[test]
    fn require_visible_can_be_disabled() {
        let hidden = UIElement::new("Tab").with_visible(false).with_selected(true);
        assert_eq!(ElementFlag::Selected.check(Some(&hidden), true, false), None);
        assert!(ElementFlag::Selected.check(Some(&hidden), true, true).is_some());
    }

    #[test]
    fn hittable_flag_uses_derived_predicate() {
        let no_frame = UIElement::new("Button");
        assert_eq!(
            ElementFlag::Hittable.check(Some(&no_frame), true, true).as_deref(),
            Some("element is not hittable")
        );
        assert_eq!(ElementFlag::Hittable.check(Some(&no_frame), false, true), None);
    }
}
