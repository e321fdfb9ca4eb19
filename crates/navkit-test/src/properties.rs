//! Safety properties of the engine, checked over families of navigations.

use crate::embedder::EmbedderProfile;
use crate::scenario::ScenarioRunner;
use crate::BROWSER_PACKAGE;
use navkit_core::PageTransition;
use navkit_engine::{Decision, DecisionReason, NavigationParams, NavigationProvenance};
use navkit_intent::ResolvedHandler;
use pretty_assertions::assert_eq;
use std::time::Instant;

/// Targets that every launch-happy profile below can leave for.
const LEAVING_URLS: &[&str] = &[
    "https://www.youtube.com/watch?v=1",
    "tel:5551234",
    "wtai://wp/mc;5551234",
    "intent://play/app#Intent;package=com.example;end",
    "intent://scan/#Intent;scheme=zxing;package=com.zxing;end",
];

fn launching_profile() -> EmbedderProfile {
    EmbedderProfile::new()
        .with_history(&["https://news.example/"])
        .with_marketplace()
        .resolve(
            "https://www.youtube.com/",
            vec![
                ResolvedHandler::specialized("com.youtube", "www.youtube.com"),
                ResolvedHandler::generic(BROWSER_PACKAGE),
            ],
        )
        .resolve("tel:", vec![ResolvedHandler::generic("com.dialer")])
        .resolve(
            "//play/",
            vec![ResolvedHandler::specialized("com.example", "play")],
        )
}

#[test]
fn test_every_target_launches_when_allowed() {
    for url in LEAVING_URLS {
        let mut runner = ScenarioRunner::with_profile(launching_profile());
        let verdict = runner.navigate(NavigationParams::new(*url).with_gesture());
        assert!(verdict.decision.is_launch(), "{url}: {:?}", verdict.reason);
        assert_eq!(runner.embedder().dispatched().len(), 1, "{url}");
    }
}

#[test]
fn test_no_launch_without_provenance() {
    let transitions = [PageTransition::link(), PageTransition::from_external_app()];
    for url in LEAVING_URLS {
        for transition in transitions {
            let mut runner = ScenarioRunner::with_profile(launching_profile());
            // A redirect before any user-initiated navigation leaves the
            // provenance unclassified.
            let verdict = runner.navigate(
                NavigationParams::new(*url)
                    .with_transition(transition)
                    .redirect(),
            );
            assert_eq!(
                runner.gateway().tracker().provenance(),
                NavigationProvenance::None
            );
            assert!(!verdict.decision.is_launch(), "{url} via {transition:?}");
            assert!(runner.embedder().dispatched().is_empty());
        }
    }
}

#[test]
fn test_no_launch_without_provenance_from_custom_tab() {
    let mut profile = launching_profile();
    profile.instant_app_hosts.push("shop.example".into());
    let mut runner = ScenarioRunner::with_profile(profile);
    runner.launch("https://shop.example/", true, false).unwrap();

    let verdict = runner.navigate(
        NavigationParams::new("https://shop.example/item")
            .with_transition(PageTransition::from_external_app())
            .redirect(),
    );
    assert_eq!(verdict.reason, DecisionReason::UnclassifiedLink);
    assert!(runner.embedder().dispatched().is_empty());
}

#[test]
fn test_private_mode_never_launches_without_confirmation() {
    for url in LEAVING_URLS {
        let mut runner = ScenarioRunner::with_profile(launching_profile().incognito());
        let verdict = runner.navigate(NavigationParams::new(*url).with_gesture());
        assert!(!verdict.decision.is_launch(), "{url}");
        assert!(runner.embedder().dispatched().is_empty(), "{url}");
        if verdict.decision.is_async() {
            assert_eq!(verdict.reason, DecisionReason::IncognitoConfirmation);
            assert!(verdict.prompt.is_some());
        }
    }
}

#[test]
fn test_private_mode_never_launches_a_fallback_web_app() {
    let mut profile = launching_profile().incognito().resolve(
        "https://app.example/",
        vec![ResolvedHandler::specialized("com.app", "app.example")],
    );
    profile.web_apps.push("com.app".into());
    let url = "intent://missing#Intent;scheme=gone;\
S.browser_fallback_url=https%3A%2F%2Fapp.example%2F;end";

    let mut runner = ScenarioRunner::with_profile(profile.clone());
    let verdict = runner.navigate(NavigationParams::new(url).with_gesture());
    assert_eq!(verdict.reason, DecisionReason::FallbackClobber);
    assert!(runner.embedder().dispatched().is_empty());

    profile.incognito = false;
    let mut runner = ScenarioRunner::with_profile(profile);
    let verdict = runner.navigate(NavigationParams::new(url).with_gesture());
    assert_eq!(verdict.reason, DecisionReason::FallbackWebApp);
    assert_eq!(runner.embedder().dispatched().len(), 1);
}

#[test]
fn test_redirect_chain_is_monotonic() {
    let mut runner = ScenarioRunner::with_profile(EmbedderProfile::new());
    runner.navigate(NavigationParams::new("https://a.example/").with_gesture());
    let provenance = runner.gateway().tracker().provenance();
    assert_eq!(provenance, NavigationProvenance::Other);
    assert!(!runner.gateway().tracker().is_on_effective_chain());

    for hop in 0..4 {
        runner.navigate(NavigationParams::new(format!("https://a.example/{hop}")).redirect());
        let tracker = runner.gateway().tracker();
        assert!(tracker.is_on_effective_chain());
        assert_eq!(tracker.provenance(), provenance);
    }

    // Only the next user-initiated navigation ends the chain.
    runner.navigate(
        NavigationParams::new("https://b.example/")
            .with_transition(PageTransition::typed())
            .with_user_interaction(Instant::now()),
    );
    let tracker = runner.gateway().tracker();
    assert!(!tracker.is_on_effective_chain());
    assert_eq!(tracker.provenance(), NavigationProvenance::FromUserTyping);
}

#[test]
fn test_launch_request_update_is_idempotent() {
    let mut runner = ScenarioRunner::with_profile(EmbedderProfile::new());
    for _ in 0..2 {
        runner.launch("https://a.example/", false, false).unwrap();
        let tracker = runner.gateway().tracker();
        assert!(tracker.has_launch_request());
        assert!(!tracker.is_from_custom_tab_launch());
        assert_eq!(tracker.provenance(), NavigationProvenance::None);
        assert!(!tracker.is_on_navigation());
    }
}

#[test]
fn test_unresolvable_request_never_silently_continues() {
    let with_fallback = "intent://x#Intent;scheme=gone;package=com.gone;\
S.browser_fallback_url=https%3A%2F%2Ffallback.example%2F;end";
    let mut runner = ScenarioRunner::with_profile(launching_profile());
    let verdict = runner.navigate(NavigationParams::new(with_fallback).with_gesture());
    assert_eq!(
        verdict.decision,
        Decision::ClobberWithFallback {
            url: "https://fallback.example/".into(),
            referrer: None,
        }
    );

    let with_package = "intent://x#Intent;scheme=gone;package=com.gone;end";
    let mut runner = ScenarioRunner::with_profile(launching_profile());
    let verdict = runner.navigate(NavigationParams::new(with_package).with_gesture());
    assert_eq!(verdict.reason, DecisionReason::Marketplace);
    let request = verdict.decision.launch_request().unwrap();
    assert!(request
        .data
        .as_deref()
        .unwrap()
        .starts_with("market://details?id=com.gone"));
}

#[test]
fn test_marketplace_fallback_url_opens_marketplace() {
    let url = "intent://x#Intent;scheme=gone;S.browser_fallback_url=\
https%3A%2F%2Fplay.google.com%2Fstore%2Fapps%2Fdetails%3Fid%3Dcom.gone;end";
    let mut runner = ScenarioRunner::with_profile(launching_profile());
    let verdict = runner.navigate(NavigationParams::new(url).with_gesture());
    assert_eq!(verdict.reason, DecisionReason::FallbackMarketplace);
    assert!(verdict.decision.is_launch());

    // Without a marketplace the listing loads in place.
    let mut runner = ScenarioRunner::with_profile(
        EmbedderProfile::new().with_history(&["https://news.example/"]),
    );
    let verdict = runner.navigate(NavigationParams::new(url).with_gesture());
    assert_eq!(verdict.reason, DecisionReason::FallbackClobber);
}
