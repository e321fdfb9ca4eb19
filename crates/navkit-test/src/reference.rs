//! Reference navigation sequences, run end to end through the gateway.

use crate::embedder::{EmbedderCall, EmbedderProfile};
use crate::scenario::ScenarioRunner;
use navkit_core::{InterceptConfig, PageTransition};
use navkit_engine::{Decision, DecisionReason, NavigationParams, PendingAction, PromptResponse};
use navkit_intent::ResolvedHandler;
use pretty_assertions::assert_eq;

const PLAY_INTENT: &str = "intent://play/app#Intent;package=com.example;end";
const PLAY_INTENT_WITH_FALLBACK: &str = "intent://play/app#Intent;package=com.example;\
S.browser_fallback_url=https%3A%2F%2Fexample.com%2Fapp;end";

fn play_profile() -> EmbedderProfile {
    EmbedderProfile::new()
        .with_history(&["https://news.example/"])
        .resolve(
            "//play/",
            vec![ResolvedHandler::specialized("com.example", "play")],
        )
}

#[test]
fn test_typed_web_url_without_handlers_continues() {
    let mut runner = ScenarioRunner::with_profile(EmbedderProfile::new());
    let verdict = runner.navigate(
        NavigationParams::new("https://example.com").with_transition(PageTransition::typed()),
    );
    assert_eq!(verdict.decision, Decision::Continue);
    assert!(runner.embedder().calls().is_empty());
}

#[test]
fn test_link_to_launch_uri_with_specialized_handler_launches() {
    let mut runner = ScenarioRunner::with_profile(play_profile());
    let verdict = runner.navigate(NavigationParams::new(PLAY_INTENT).with_gesture());

    assert_eq!(verdict.reason, DecisionReason::Launch);
    let Decision::LaunchExternal { request, proxy } = &verdict.decision else {
        panic!("expected a launch, got {:?}", verdict.decision);
    };
    assert!(!proxy);
    assert_eq!(request.package.as_deref(), Some("com.example"));
    assert_eq!(
        request.application_id.as_deref(),
        Some(InterceptConfig::default().application_package.as_str())
    );

    let dispatched = runner.embedder().dispatched();
    assert_eq!(dispatched.len(), 1);
    assert_eq!(dispatched[0].data.as_deref(), Some("//play/app"));
    // The surface had history before the link, so nothing closes.
    assert!(!runner.gateway().has_deferred_work());
}

#[test]
fn test_incognito_launch_waits_for_confirmation() {
    let mut runner = ScenarioRunner::with_profile(play_profile().incognito());
    let verdict = runner.navigate(NavigationParams::new(PLAY_INTENT).with_gesture());

    assert_eq!(verdict.reason, DecisionReason::IncognitoConfirmation);
    assert!(matches!(
        verdict.decision,
        Decision::AsyncAction {
            action: PendingAction::IncognitoConfirmation { .. }
        }
    ));
    assert!(runner.embedder().dispatched().is_empty());
    assert_eq!(runner.gateway().pending_prompts(), 1);

    let decision = runner.answer(PromptResponse::Accept).unwrap();
    assert!(decision.is_launch());
    assert_eq!(runner.embedder().dispatched().len(), 1);
    assert_eq!(runner.gateway().pending_prompts(), 0);
}

#[test]
fn test_declined_incognito_launch_loads_fallback_in_place() {
    let mut runner = ScenarioRunner::with_profile(play_profile().incognito());
    let verdict =
        runner.navigate(NavigationParams::new(PLAY_INTENT_WITH_FALLBACK).with_gesture());
    assert!(verdict.decision.is_async());

    let decision = runner.answer(PromptResponse::Decline).unwrap();
    assert_eq!(decision, Decision::Continue);
    assert!(runner.embedder().dispatched().is_empty());
    assert_eq!(
        runner.embedder().loaded_urls(),
        vec!["https://example.com/app".to_string()]
    );
}

#[test]
fn test_typed_redirect_chain_on_one_host_continues() {
    let profile = EmbedderProfile::new().resolve(
        "https://a.example/",
        vec![ResolvedHandler::generic(crate::BROWSER_PACKAGE)],
    );
    let mut runner = ScenarioRunner::with_profile(profile);

    let first = runner.navigate(
        NavigationParams::new("https://a.example/start").with_transition(PageTransition::typed()),
    );
    assert_eq!(first.decision, Decision::Continue);

    for hop in ["https://a.example/step1", "https://a.example/step2"] {
        let verdict = runner.navigate(
            NavigationParams::new(hop)
                .with_transition(PageTransition::typed())
                .redirect(),
        );
        assert_eq!(verdict.decision, Decision::Continue, "{hop}");
        assert!(runner.gateway().tracker().is_on_effective_chain());
    }
    assert!(runner.embedder().calls().is_empty());
}

fn form_config() -> InterceptConfig {
    InterceptConfig {
        block_form_redirects_without_gesture: true,
        ..Default::default()
    }
}

fn special_profile() -> EmbedderProfile {
    EmbedderProfile::new()
        .with_history(&["https://shop.example/"])
        .resolve(
            "example://",
            vec![ResolvedHandler::generic("com.example")],
        )
}

#[test]
fn test_form_submission_without_gesture_continues() {
    let mut runner = ScenarioRunner::new(form_config(), special_profile());
    let verdict = runner.navigate(
        NavigationParams::new("example://special").with_transition(PageTransition::form_submit()),
    );
    assert_eq!(verdict.decision, Decision::Continue);
    // A form submission only becomes eligible once it redirects.
    assert_eq!(verdict.reason, DecisionReason::NotEligible);
}

#[test]
fn test_form_redirect_without_gesture_needs_one() {
    let mut runner = ScenarioRunner::new(form_config(), special_profile());
    runner.navigate(
        NavigationParams::new("https://shop.example/checkout")
            .with_transition(PageTransition::form_submit()),
    );
    let verdict = runner.navigate(
        NavigationParams::new("example://special")
            .with_transition(PageTransition::form_submit())
            .redirect(),
    );
    assert_eq!(verdict.reason, DecisionReason::FormRedirectWithoutGesture);

    let mut permissive = ScenarioRunner::with_profile(special_profile());
    permissive.navigate(
        NavigationParams::new("https://shop.example/checkout")
            .with_transition(PageTransition::form_submit()),
    );
    let verdict = permissive.navigate(
        NavigationParams::new("example://special")
            .with_transition(PageTransition::form_submit())
            .redirect(),
    );
    assert!(verdict.decision.is_launch());
    assert!(matches!(
        permissive.embedder().calls().last(),
        Some(EmbedderCall::Dispatch { package: None, .. })
    ));
}
