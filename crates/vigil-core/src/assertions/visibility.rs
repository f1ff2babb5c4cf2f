//! Visible / not-visible assertions.

use super::{AssertionOptions, ElementAssertionData, REASON_NOT_FOUND, REASON_NOT_VISIBLE};
use crate::error::VerifyError;
use crate::poll::CheckOutcome;
use crate::result::{AssertionType, VerificationResult};
use crate::target::ElementTarget;
use crate::verifier::Verifier;

impl Verifier {
    /// Passes once the target exists and is visible.
    pub async fn assert_visible(
        &self,
        target: &ElementTarget,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ElementAssertionData>, VerifyError> {
        self.run_element_assertion(
            AssertionType::Visible,
            target,
            options,
            format!("Element {} is visible", target),
            |found| {
                let data = ElementAssertionData::from_match(&found);
                match found.element {
                    None => CheckOutcome::fail(REASON_NOT_FOUND, data),
                    Some(el) if !el.visible => CheckOutcome::fail(REASON_NOT_VISIBLE, data),
                    Some(_) => CheckOutcome::pass(data),
                }
            },
        )
        .await
    }

    /// Passes once the target is absent or hidden.
    pub async fn assert_not_visible(
        &self,
        target: &ElementTarget,
        options: &AssertionOptions,
    ) -> Result<VerificationResult<ElementAssertionData>, VerifyError> {
        self.run_element_assertion(
            AssertionType::NotVisible,
            target,
            options,
            format!("Element {} is not visible", target),
            |found| {
                let data = ElementAssertionData::from_match(&found);
                match found.element {
                    Some(el) if el.visible => CheckOutcome::fail("element is visible", data),
                    _ => CheckOutcome::pass(data),
                }
            },
        )
        .await
    }
}
