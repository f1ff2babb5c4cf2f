//! Element assertions run end to end against scripted collaborators.

mod common;

use std::collections::HashMap;

use tokio_util::sync::CancellationToken;

use common::{app, Harness, ScriptedInspector, DEVICE_ID};
use vigil_core::assertions::screen::ScreenDefinition;
use vigil_core::assertions::text::{TextExpectation, ValueExpectation};
use vigil_core::assertions::logs::{LogExpectation, LogScanOptions, LogWindow};
use vigil_core::target::MatchedBy;
use vigil_core::{AssertionOptions, AssertionType, ElementFrame, ElementTarget, UIElement, VerificationStatus, VerifyError};

fn button(id: &str) -> UIElement {
    UIElement::new("Button")
        .with_identifier(id)
        .with_frame(ElementFrame::new(10.0, 10.0, 100.0, 44.0))
}

fn quick() -> AssertionOptions {
    AssertionOptions::default().with_polling(500, 100)
}

#[tokio::test(start_paused = true)]
async fn visible_element_passes_on_first_attempt() {
    let harness = Harness::with_tree(app(vec![button("login_button")]));

    let result = harness
        .verifier
        .assert_visible(&ElementTarget::by_identifier("login_button"), &AssertionOptions::default())
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Passed);
    assert!(result.passed);
    assert_eq!(result.attempts.len(), 1);
    assert_eq!(result.assertion_type, AssertionType::Visible);
    assert_eq!(result.device_id.as_deref(), Some(DEVICE_ID));
    assert_eq!(result.session_id.as_deref(), Some("default"));
    let data = result.data.unwrap();
    assert!(data.found);
    assert_eq!(data.matched_by, Some(MatchedBy::Identifier));
}

#[tokio::test(start_paused = true)]
async fn absent_element_is_not_visible() {
    let harness = Harness::with_tree(app(Vec::new()));

    let result = harness
        .verifier
        .assert_not_visible(&ElementTarget::by_identifier("ghost"), &AssertionOptions::default())
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Passed);
    assert!(!result.data.unwrap().found);
}

#[tokio::test(start_paused = true)]
async fn hidden_element_is_not_visible() {
    let harness = Harness::with_tree(app(vec![button("spinner").with_visible(false)]));

    let result = harness
        .verifier
        .assert_not_visible(&ElementTarget::by_identifier("spinner"), &quick())
        .await
        .unwrap();

    assert!(result.passed);
    assert!(result.data.unwrap().found);
}

#[tokio::test(start_paused = true)]
async fn unselected_tab_times_out() {
    let harness = Harness::with_tree(app(vec![button("tab1").with_selected(false)]));

    let result = harness
        .verifier
        .assert_selected(&ElementTarget::by_identifier("tab1"), &quick())
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Timeout);
    assert!(!result.passed);
    assert_eq!(result.attempts.len(), 6);
    assert_eq!(result.message, "Timeout after 500ms: element is not selected");
    let numbers: Vec<u32> = result.attempts.iter().map(|a| a.attempt).collect();
    assert_eq!(numbers, vec![1, 2, 3, 4, 5, 6]);
    assert!(result.attempts.windows(2).all(|w| w[0].elapsed_ms <= w[1].elapsed_ms));
}

#[tokio::test(start_paused = true)]
async fn timeout_not_a_multiple_of_interval_still_times_out() {
    let harness = Harness::with_tree(app(vec![button("tab1").with_selected(false)]));
    let options = AssertionOptions::default().with_polling(450, 100);

    let result = harness
        .verifier
        .assert_selected(&ElementTarget::by_identifier("tab1"), &options)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Timeout);
    assert_eq!(result.attempts.len(), 5);
    assert_eq!(result.duration_ms, 400);
    assert_eq!(result.message, "Timeout after 400ms: element is not selected");
}

#[tokio::test(start_paused = true)]
async fn slow_snapshots_still_report_timeout() {
    let harness = Harness::builder()
        .inspector(ScriptedInspector::new(vec![app(Vec::new())]).with_latency(30))
        .build();

    let result = harness
        .verifier
        .assert_visible(&ElementTarget::by_identifier("missing"), &quick())
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Timeout);
    assert!(result.duration_ms < 500);
    assert_eq!(result.attempts.len(), 4);
    assert!(result.message.ends_with("element not found"));
}

#[tokio::test(start_paused = true)]
async fn snapshot_error_mid_poll_is_retried() {
    let harness = Harness::builder()
        .inspector(
            ScriptedInspector::new(vec![app(Vec::new()), app(vec![button("done")])])
                .failing_on_call(2, "axe describe-ui timed out"),
        )
        .build();

    let result = harness
        .verifier
        .assert_visible(&ElementTarget::by_identifier("done"), &quick())
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Passed);
    assert_eq!(result.attempts.len(), 3);
    assert!(!result.attempts[1].passed);
    assert!(result.attempts[1].error.as_deref().unwrap().contains("axe describe-ui timed out"));
    assert_eq!(harness.inspector.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn element_appearing_later_passes() {
    let harness = Harness::builder()
        .trees(vec![app(Vec::new()), app(Vec::new()), app(vec![button("done")])])
        .build();

    let result = harness
        .verifier
        .assert_visible(&ElementTarget::by_identifier("done"), &quick())
        .await
        .unwrap();

    assert!(result.passed);
    assert_eq!(result.attempts.len(), 3);
    assert!(!result.attempts[0].passed);
    assert_eq!(result.attempts[0].error.as_deref(), Some("element not found"));
    assert_eq!(harness.inspector.calls(), 3);
}

#[tokio::test(start_paused = true)]
async fn cancellation_stops_polling_as_failed() {
    let harness = Harness::with_tree(app(Vec::new()));
    let token = CancellationToken::new();
    let options = AssertionOptions::default().with_polling(5000, 100).with_cancel(token.clone());

    let canceller = tokio::spawn(async move {
        tokio::time::sleep(std::time::Duration::from_millis(250)).await;
        token.cancel();
    });

    let result = harness
        .verifier
        .assert_visible(&ElementTarget::by_identifier("never"), &options)
        .await
        .unwrap();
    canceller.await.unwrap();

    assert_eq!(result.status, VerificationStatus::Failed);
    assert!(result.message.starts_with("Cancelled after 250ms"));
    assert_eq!(result.attempts.len(), 3);
}

#[tokio::test(start_paused = true)]
async fn state_reasons_distinguish_missing_hidden_and_wrong_state() {
    let harness = Harness::with_tree(app(vec![
        button("hidden").with_visible(false),
        button("off").with_enabled(false),
    ]));
    let options = AssertionOptions::default().with_polling(100, 100);

    let missing = harness
        .verifier
        .assert_enabled(&ElementTarget::by_identifier("nope"), &options)
        .await
        .unwrap();
    let hidden = harness
        .verifier
        .assert_enabled(&ElementTarget::by_identifier("hidden"), &options)
        .await
        .unwrap();
    let disabled = harness
        .verifier
        .assert_enabled(&ElementTarget::by_identifier("off"), &options)
        .await
        .unwrap();

    assert!(missing.message.ends_with("element not found"));
    assert!(hidden.message.ends_with("element is not visible"));
    assert!(disabled.message.ends_with("element is disabled"));

    let passed = harness
        .verifier
        .assert_disabled(&ElementTarget::by_identifier("off"), &options)
        .await
        .unwrap();
    assert!(passed.passed);
}

#[tokio::test(start_paused = true)]
async fn hittable_requires_a_frame() {
    let harness = Harness::with_tree(app(vec![
        button("ok"),
        UIElement::new("Button").with_identifier("frameless"),
    ]));
    let options = AssertionOptions::default().with_polling(100, 100);

    let ok = harness
        .verifier
        .assert_hittable(&ElementTarget::by_identifier("ok"), &options)
        .await
        .unwrap();
    let frameless = harness
        .verifier
        .assert_not_hittable(&ElementTarget::by_identifier("frameless"), &options)
        .await
        .unwrap();

    assert!(ok.passed);
    assert!(frameless.passed);
}

#[tokio::test(start_paused = true)]
async fn text_matches_label_or_value() {
    let harness = Harness::with_tree(app(vec![
        UIElement::new("StaticText").with_identifier("title").with_label("Welcome back"),
        UIElement::new("TextField").with_identifier("email").with_label("Email").with_value("a@b.co"),
    ]));
    let options = AssertionOptions::default().with_polling(100, 100);

    let title = harness
        .verifier
        .assert_text(&ElementTarget::by_identifier("title"), &TextExpectation::contains("welcome").ignore_case(), &options)
        .await
        .unwrap();
    assert!(title.passed);
    assert_eq!(title.data.unwrap().actual.as_deref(), Some("Welcome back"));

    let email = harness
        .verifier
        .assert_text(&ElementTarget::by_identifier("email"), &TextExpectation::regex(r"^\w+@\w+\.co$"), &options)
        .await
        .unwrap();
    assert!(email.passed);
    assert_eq!(email.data.unwrap().actual.as_deref(), Some("a@b.co"));

    let wrong = harness
        .verifier
        .assert_text(&ElementTarget::by_identifier("title"), &TextExpectation::exact("Goodbye"), &options)
        .await
        .unwrap();
    assert!(!wrong.passed);
    assert!(wrong.message.contains("text mismatch"));
}

#[tokio::test(start_paused = true)]
async fn missing_value_counts_as_empty() {
    let harness = Harness::with_tree(app(vec![UIElement::new("TextField").with_identifier("search")]));
    let options = AssertionOptions::default().with_polling(100, 100);

    let empty = harness
        .verifier
        .assert_value(&ElementTarget::by_identifier("search"), &ValueExpectation::empty(), &options)
        .await
        .unwrap();
    let not_empty = harness
        .verifier
        .assert_value(&ElementTarget::by_identifier("search"), &ValueExpectation::not_empty(), &options)
        .await
        .unwrap();

    assert!(empty.passed);
    assert!(!not_empty.passed);
    assert!(not_empty.message.ends_with("value is empty"));
}

#[tokio::test(start_paused = true)]
async fn invalid_regex_is_an_infrastructure_error() {
    let harness = Harness::with_tree(app(Vec::new()));

    let err = harness
        .verifier
        .assert_text(&ElementTarget::by_identifier("x"), &TextExpectation::regex("("), &quick())
        .await
        .unwrap_err();

    assert_eq!(err.code(), "INVALID_PATTERN");
    assert_eq!(harness.inspector.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn snapshot_failure_is_an_infrastructure_error() {
    let harness = Harness::builder()
        .inspector(ScriptedInspector::failing("axe exited with 1"))
        .build();

    let err = harness
        .verifier
        .assert_visible(&ElementTarget::by_identifier("x"), &quick())
        .await
        .unwrap_err();

    assert_eq!(err, VerifyError::Snapshot("axe exited with 1".to_string()));
}

#[tokio::test(start_paused = true)]
async fn every_assertion_reports_missing_device_as_error() {
    let harness = Harness::builder().devices(Vec::new()).build();
    let v = &harness.verifier;
    let o = &quick();
    let t = &ElementTarget::by_identifier("x");
    let mut screens = HashMap::new();
    screens.insert("Home".to_string(), ScreenDefinition::new("Home").with_visible(t.clone()));

    let errors = vec![
        v.assert_visible(t, o).await.map(|_| ()),
        v.assert_not_visible(t, o).await.map(|_| ()),
        v.assert_enabled(t, o).await.map(|_| ()),
        v.assert_disabled(t, o).await.map(|_| ()),
        v.assert_selected(t, o).await.map(|_| ()),
        v.assert_not_selected(t, o).await.map(|_| ()),
        v.assert_hittable(t, o).await.map(|_| ()),
        v.assert_not_hittable(t, o).await.map(|_| ()),
        v.assert_text(t, &TextExpectation::exact("x"), o).await.map(|_| ()),
        v.assert_value(t, &ValueExpectation::exact("x"), o).await.map(|_| ()),
        v.assert_screen_by_name("Home", &screens, true, o).await.map(|_| ()),
        v.assert_no_errors(&LogScanOptions::default(), o).await.map(|_| ()),
        v.assert_log_contains(&LogExpectation::substring("x"), o).await.map(|_| ()),
        v.assert_no_crash(&LogWindow::default(), o).await.map(|_| ()),
    ];

    for result in errors {
        assert_eq!(result, Err(VerifyError::NoBootedDevice));
    }
    assert_eq!(harness.inspector.calls(), 0);
}

#[tokio::test(start_paused = true)]
async fn explicit_device_must_exist() {
    let harness = Harness::with_tree(app(Vec::new()));
    let options = quick().with_device("OTHER");

    let err = harness
        .verifier
        .assert_visible(&ElementTarget::by_identifier("x"), &options)
        .await
        .unwrap_err();

    assert_eq!(err.code(), "DEVICE_NOT_FOUND");
}

#[tokio::test(start_paused = true)]
async fn failure_captures_screenshot_by_default_policy() {
    let harness = Harness::with_tree(app(Vec::new()));
    let options = AssertionOptions::new("checkout").with_polling(200, 100).with_capture(true, false);

    let result = harness
        .verifier
        .assert_visible(&ElementTarget::by_identifier("pay"), &options)
        .await
        .unwrap();

    assert_eq!(result.status, VerificationStatus::Timeout);
    assert_eq!(result.artifacts.len(), 1);
    let expected = std::path::PathBuf::from("/artifacts")
        .join("checkout")
        .join(result.id.to_string())
        .join("visible-timeout.png");
    assert_eq!(result.artifacts[0], expected);
    assert_eq!(harness.screenshot_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn success_is_not_captured_unless_asked() {
    let harness = Harness::with_tree(app(vec![button("ok")]));
    let target = ElementTarget::by_identifier("ok");

    let quiet = harness
        .verifier
        .assert_visible(&target, &quick().with_capture(true, false))
        .await
        .unwrap();
    assert!(quiet.artifacts.is_empty());

    let loud = harness
        .verifier
        .assert_visible(&target, &quick().with_capture(false, true))
        .await
        .unwrap();
    assert_eq!(loud.artifacts.len(), 1);
    assert!(loud.artifacts[0].ends_with("visible-passed.png"));
}

#[tokio::test(start_paused = true)]
async fn screenshot_failure_only_drops_the_artifact() {
    let harness = Harness::builder()
        .trees(vec![app(Vec::new())])
        .failing_screenshots()
        .build();

    let result = harness
        .verifier
        .assert_visible(&ElementTarget::by_identifier("x"), &quick().with_capture(true, false))
        .await
        .unwrap();

    assert!(!result.passed);
    assert!(result.artifacts.is_empty());
}

#[tokio::test(start_paused = true)]
async fn artifact_directory_failure_is_an_infrastructure_error() {
    let harness = Harness::builder()
        .trees(vec![app(Vec::new())])
        .failing_artifacts()
        .build();

    let err = harness
        .verifier
        .assert_visible(&ElementTarget::by_identifier("x"), &quick().with_capture(true, false))
        .await
        .unwrap_err();

    assert_eq!(err.code(), "ARTIFACT_DIRECTORY_FAILED");
}

#[tokio::test(start_paused = true)]
async fn label_match_reports_matched_by() {
    let harness = Harness::with_tree(app(vec![UIElement::new("Button").with_label("Sign In")]));

    let result = harness
        .verifier
        .assert_visible(&ElementTarget::by_label("Sign*"), &quick())
        .await
        .unwrap();

    assert!(result.passed);
    assert_eq!(result.data.unwrap().matched_by, Some(MatchedBy::Label));
}
