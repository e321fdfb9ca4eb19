//! Integration tests for the interception gateway's side effects.

use navkit_core::{InterceptConfig, PageTransition};
use navkit_engine::{
    Decision, DecisionReason, InterceptGateway, NavigationParams, NavigationProvenance,
    PendingAction, PromptId, PromptResponse,
};
use navkit_intent::ResolvedHandler;
use navkit_test::{EmbedderCall, EmbedderProfile, MockEmbedder, ScenarioRunner, BROWSER_PACKAGE};
use pretty_assertions::assert_eq;
use std::path::PathBuf;
use std::time::Instant;

const FALLBACK_INTENT: &str = "intent://x#Intent;scheme=gone;\
S.browser_fallback_url=https%3A%2F%2Ffallback.example%2F;end";

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter("navkit_engine=trace")
        .with_test_writer()
        .try_init();
}

fn youtube(profile: EmbedderProfile) -> EmbedderProfile {
    profile.resolve(
        "https://www.youtube.com/",
        vec![
            ResolvedHandler::specialized("com.youtube", "www.youtube.com"),
            ResolvedHandler::generic(BROWSER_PACKAGE),
        ],
    )
}

fn dialer(profile: EmbedderProfile) -> EmbedderProfile {
    profile.resolve("tel:", vec![ResolvedHandler::generic("com.dialer")])
}

#[test]
fn test_launch_from_fresh_surface_closes_it_later() {
    init_tracing();
    let mut runner = ScenarioRunner::with_profile(dialer(EmbedderProfile::new()));
    let verdict = runner.navigate(NavigationParams::new("tel:123").with_gesture());
    assert!(verdict.decision.is_launch());

    // Never closed from inside the navigation callback.
    assert!(!runner.embedder().closed());
    assert!(runner.gateway().has_deferred_work());
    assert_eq!(runner.gateway().run_deferred(), 1);
    assert!(runner.embedder().closed());
    assert!(!runner.gateway().has_deferred_work());
}

#[test]
fn test_launch_prunes_history_of_the_redirect_chain() {
    init_tracing();
    let profile = youtube(EmbedderProfile::new()).with_history(&["https://news.example/"]);
    let mut runner = ScenarioRunner::with_profile(profile);

    let verdict = runner.navigate_and_commit(
        NavigationParams::new("https://redirector.example/").with_gesture(),
    );
    assert_eq!(verdict.reason, DecisionReason::NoResolver);
    assert_eq!(runner.embedder().history().len(), 2);

    let verdict = runner.navigate(NavigationParams::new("https://www.youtube.com/watch").redirect());
    assert!(verdict.decision.is_launch());
    assert_eq!(
        runner.embedder().history(),
        vec!["https://news.example/".to_string()]
    );
    assert!(runner
        .embedder()
        .calls()
        .contains(&EmbedderCall::RemoveHistoryEntry { index: 1 }));
    assert_eq!(runner.gateway().run_deferred(), 0);
}

#[test]
fn test_fallback_clobber_clears_history_once_committed() {
    init_tracing();
    let profile = youtube(EmbedderProfile::new()).with_history(&["https://a.example/"]);
    let mut runner = ScenarioRunner::with_profile(profile);

    runner.navigate_and_commit(NavigationParams::new("https://r.example/").with_gesture());
    let verdict = runner.navigate(NavigationParams::new(FALLBACK_INTENT).redirect());
    assert_eq!(verdict.reason, DecisionReason::FallbackClobber);
    assert_eq!(
        verdict.decision,
        Decision::ClobberWithFallback {
            url: "https://fallback.example/".into(),
            referrer: None,
        }
    );

    assert!(runner.embedder().loaded_urls().is_empty());
    assert_eq!(runner.gateway().run_deferred(), 1);
    assert_eq!(
        runner.embedder().loaded_urls(),
        vec!["https://fallback.example/".to_string()]
    );

    runner.embedder().commit("https://fallback.example/");
    runner.gateway().on_navigation_finished(true, true);
    assert_eq!(
        runner.embedder().history(),
        vec![
            "https://a.example/".to_string(),
            "https://fallback.example/".to_string()
        ]
    );

    // The rest of the chain stays in the surface.
    let verdict = runner.navigate(NavigationParams::new("https://www.youtube.com/").redirect());
    assert_eq!(verdict.reason, DecisionReason::RedirectStaysInApp);

    // A new user navigation starts over.
    let verdict = runner.navigate(
        NavigationParams::new("https://www.youtube.com/")
            .with_gesture()
            .with_user_interaction(Instant::now()),
    );
    assert!(verdict.decision.is_launch());
}

#[test]
fn test_unfinished_or_subframe_commits_keep_history() {
    let profile = EmbedderProfile::new().with_history(&["https://a.example/"]);
    let mut runner = ScenarioRunner::with_profile(profile);
    runner.navigate_and_commit(NavigationParams::new("https://r.example/").with_gesture());
    runner.navigate(NavigationParams::new(FALLBACK_INTENT).redirect());
    runner.gateway().run_deferred();
    runner.embedder().commit("https://fallback.example/");

    runner.gateway().on_navigation_finished(false, true);
    runner.gateway().on_navigation_finished(true, false);
    assert_eq!(runner.embedder().history().len(), 3);

    runner.gateway().on_navigation_finished(true, true);
    assert_eq!(runner.embedder().history().len(), 2);
}

#[test]
fn test_failed_dispatch_falls_back() {
    init_tracing();
    let profile = EmbedderProfile::new()
        .with_history(&["https://news.example/"])
        .resolve(
            "//play/",
            vec![ResolvedHandler::specialized("com.example", "play")],
        )
        .failing_dispatch("com.example");
    let mut runner = ScenarioRunner::with_profile(profile.clone());
    let verdict = runner.navigate(
        NavigationParams::new(
            "intent://play/app#Intent;package=com.example;\
S.browser_fallback_url=https%3A%2F%2Fexample.com%2Fapp;end",
        )
        .with_gesture(),
    );
    assert_eq!(verdict.reason, DecisionReason::FallbackClobber);
    assert!(runner.embedder().dispatched().is_empty());
    runner.gateway().run_deferred();
    assert_eq!(
        runner.embedder().loaded_urls(),
        vec!["https://example.com/app".to_string()]
    );

    let mut runner = ScenarioRunner::with_profile(profile);
    let verdict = runner.navigate(
        NavigationParams::new("intent://play/app#Intent;package=com.example;end").with_gesture(),
    );
    assert_eq!(verdict.decision, Decision::Continue);
    assert_eq!(verdict.reason, DecisionReason::DispatchFailed);
    assert!(!verdict.is_intercepted());
}

fn dispatch_calls(runner: &ScenarioRunner) -> usize {
    runner
        .embedder()
        .calls()
        .iter()
        .filter(|call| matches!(call, EmbedderCall::Dispatch { .. }))
        .count()
}

fn web_app_fallback_profile(host: &str, package: &str) -> EmbedderProfile {
    let mut profile = EmbedderProfile::new()
        .with_history(&["https://news.example/"])
        .resolve(
            &format!("https://{host}/"),
            vec![ResolvedHandler::specialized(package, host)],
        )
        .rejecting_dispatch(package);
    profile.web_apps.push(package.to_string());
    profile
}

#[test]
fn test_rejected_fallback_web_app_loads_fallback_in_place() {
    init_tracing();
    let mut runner =
        ScenarioRunner::with_profile(web_app_fallback_profile("app.example", "com.app"));
    let verdict = runner.navigate(
        NavigationParams::new(
            "intent://x#Intent;scheme=gone;S.browser_fallback_url=https%3A%2F%2Fapp.example%2F;end",
        )
        .with_gesture(),
    );

    assert_eq!(
        verdict.decision,
        Decision::ClobberWithFallback {
            url: "https://app.example/".into(),
            referrer: None,
        }
    );
    assert_eq!(verdict.reason, DecisionReason::FallbackClobber);
    assert_eq!(dispatch_calls(&runner), 1);
    assert!(runner.embedder().dispatched().is_empty());
    runner.gateway().run_deferred();
    assert_eq!(
        runner.embedder().loaded_urls(),
        vec!["https://app.example/".to_string()]
    );
}

#[test]
fn test_rejected_fallback_web_app_moves_on_to_marketplace() {
    init_tracing();
    let url = "intent://x#Intent;scheme=gone;S.browser_fallback_url=\
https%3A%2F%2Fplay.google.com%2Fstore%2Fapps%2Fdetails%3Fid%3Dcom.gone;end";
    let profile = web_app_fallback_profile("play.google.com", "com.play").with_marketplace();

    let mut runner = ScenarioRunner::with_profile(profile.clone());
    let verdict = runner.navigate(NavigationParams::new(url).with_gesture());
    assert_eq!(verdict.reason, DecisionReason::FallbackMarketplace);
    assert!(verdict.decision.is_launch());
    assert_eq!(dispatch_calls(&runner), 2);
    assert_eq!(runner.embedder().dispatched().len(), 1);

    // A failing listing still ends in the clobber, without a third try.
    let mut runner = ScenarioRunner::with_profile(profile.failing_dispatch("market://"));
    let verdict = runner.navigate(NavigationParams::new(url).with_gesture());
    assert_eq!(verdict.reason, DecisionReason::FallbackClobber);
    assert_eq!(dispatch_calls(&runner), 2);
    assert!(runner.embedder().dispatched().is_empty());
}

#[test]
fn test_rejected_launch_without_fallback_continues() {
    let profile = EmbedderProfile::new()
        .with_history(&["https://news.example/"])
        .resolve(
            "//play/",
            vec![ResolvedHandler::specialized("com.example", "play")],
        )
        .rejecting_dispatch("com.example");
    let mut runner = ScenarioRunner::with_profile(profile);
    let verdict = runner.navigate(
        NavigationParams::new("intent://play/app#Intent;package=com.example;end").with_gesture(),
    );
    assert_eq!(verdict.decision, Decision::Continue);
    assert_eq!(verdict.reason, DecisionReason::DispatchFailed);
    assert_eq!(dispatch_calls(&runner), 1);
}

#[test]
fn test_dispatch_back_to_the_browser_continues() {
    let profile = EmbedderProfile::new()
        .with_history(&["https://news.example/"])
        .resolve("//self", vec![ResolvedHandler::generic(BROWSER_PACKAGE)]);
    let mut runner = ScenarioRunner::with_profile(profile);
    let verdict = runner.navigate(
        NavigationParams::new("intent://self#Intent;package=org.navkit.browser;end")
            .with_gesture(),
    );
    assert_eq!(verdict.reason, DecisionReason::DispatchHandledInternally);
    assert!(!verdict.is_intercepted());
}

#[test]
fn test_unavailable_prompt_continues() {
    let mut profile = dialer(EmbedderProfile::new().incognito());
    profile.prompts_unavailable = true;
    let mut runner = ScenarioRunner::with_profile(profile);
    let verdict = runner.navigate(NavigationParams::new("tel:123").with_gesture());
    assert_eq!(verdict.decision, Decision::Continue);
    assert_eq!(verdict.reason, DecisionReason::PromptUnavailable);
    assert!(verdict.prompt.is_none());
    assert_eq!(runner.gateway().pending_prompts(), 0);
}

#[test]
fn test_confirmed_incognito_launch_closes_fresh_surface() {
    let mut runner = ScenarioRunner::with_profile(dialer(EmbedderProfile::new().incognito()));
    let verdict = runner.navigate(NavigationParams::new("tel:123").with_gesture());
    let prompt = verdict.prompt.unwrap();
    assert!(matches!(
        runner.embedder().calls().as_slice(),
        [EmbedderCall::ConfirmIncognito { prompt: raw, data: Some(data) }]
            if *raw == prompt.raw() && data == "tel:123"
    ));

    let decision = runner.answer(PromptResponse::Accept).unwrap();
    assert!(decision.is_launch());
    assert!(runner.embedder().closed());
    assert!(!runner.gateway().has_deferred_work());

    // Each prompt is answered once.
    assert!(runner
        .gateway()
        .resolve_prompt(prompt, PromptResponse::Accept)
        .is_err());
}

#[test]
fn test_unknown_prompt_is_rejected() {
    let mut runner = ScenarioRunner::with_profile(EmbedderProfile::new());
    assert!(runner
        .gateway()
        .resolve_prompt(PromptId::new(), PromptResponse::Decline)
        .is_err());
}

fn storage_config() -> InterceptConfig {
    InterceptConfig {
        private_data_dir: PathBuf::from("/data/navkit"),
        ..Default::default()
    }
}

fn storage_profile() -> EmbedderProfile {
    let mut profile = EmbedderProfile::new().with_history(&["https://news.example/"]);
    profile.storage_permission = false;
    profile.can_request_storage_permission = true;
    profile
}

#[test]
fn test_storage_access_prompt_loads_on_accept() {
    let mut runner = ScenarioRunner::new(storage_config(), storage_profile());
    let verdict = runner.navigate(NavigationParams::new("file:///sdcard/doc.html").with_gesture());
    assert_eq!(verdict.reason, DecisionReason::StorageAccessRequired);
    assert!(matches!(
        verdict.decision,
        Decision::AsyncAction {
            action: PendingAction::StorageAccess { .. }
        }
    ));

    let decision = runner.answer(PromptResponse::Accept).unwrap();
    assert_eq!(decision, Decision::Continue);
    assert_eq!(
        runner.embedder().loaded_urls(),
        vec!["file:///sdcard/doc.html".to_string()]
    );
}

#[test]
fn test_storage_access_decline_closes_fresh_surface() {
    let mut profile = storage_profile();
    profile.history.clear();
    let mut runner = ScenarioRunner::new(storage_config(), profile);
    runner.navigate(NavigationParams::new("file:///sdcard/doc.html").with_gesture());
    runner.answer(PromptResponse::Decline).unwrap();
    assert!(runner.embedder().closed());
    assert!(runner.embedder().loaded_urls().is_empty());
}

#[test]
fn test_private_files_need_no_grant() {
    let mut runner = ScenarioRunner::new(storage_config(), storage_profile());
    let verdict = runner.navigate(
        NavigationParams::new("file:///data/navkit/offline/page.html").with_gesture(),
    );
    assert!(!verdict.decision.is_async());
}

fn gateway(profile: EmbedderProfile) -> InterceptGateway<MockEmbedder> {
    InterceptGateway::new(MockEmbedder::new(profile), InterceptConfig::default())
}

#[test]
fn test_load_url_from_request() {
    // Loads the first web URL in place.
    let current = gateway(EmbedderProfile::new());
    assert!(current.load_url_from_request(
        Some("https://ref.example/"),
        Some("//play/app"),
        Some("https://example.com/"),
        false,
        false,
    ));
    assert_eq!(
        current.delegate().calls(),
        vec![EmbedderCall::LoadUrl {
            url: "https://example.com/".into(),
            referrer: Some("https://ref.example/".into()),
        }]
    );

    // Nothing loadable.
    assert!(!current.load_url_from_request(None, Some("tel:1"), None, false, false));

    // A closing surface hands the URL to a new one.
    let mut profile = EmbedderProfile::new();
    profile.supports_new_surfaces = true;
    let closing = gateway(profile);
    assert!(!closing.load_url_from_request(None, Some("https://example.com/"), None, true, true));
    assert_eq!(
        closing.delegate().calls(),
        vec![
            EmbedderCall::LoadUrlInNewSurface {
                url: "https://example.com/".into(),
                incognito: true,
            },
            EmbedderCall::CloseSurface,
        ]
    );

    // No surface at all.
    let mut profile = EmbedderProfile::new();
    profile.can_load_in_current_surface = false;
    let stuck = gateway(profile);
    assert!(!stuck.load_url_from_request(None, Some("https://example.com/"), None, false, false));
    assert!(stuck.delegate().calls().is_empty());
}

#[test]
fn test_should_intercept_does_not_act() {
    let mut gateway = gateway(youtube(
        EmbedderProfile::new().with_history(&["https://news.example/"]),
    ));
    let verdict =
        gateway.should_intercept(&NavigationParams::new("https://www.youtube.com/").with_gesture());
    assert!(verdict.decision.is_launch());
    assert!(gateway.delegate().calls().is_empty());
    assert!(!gateway.has_deferred_work());
}

#[test]
fn test_should_intercept_records_the_chain_state() {
    let mut gateway = gateway(EmbedderProfile::new().with_history(&["https://news.example/"]));
    let verdict = gateway.should_intercept(&NavigationParams::new(FALLBACK_INTENT).with_gesture());
    assert_eq!(verdict.reason, DecisionReason::FallbackClobber);
    assert!(gateway.delegate().calls().is_empty());
    assert!(!gateway.has_deferred_work());

    assert_eq!(gateway.tracker().provenance(), NavigationProvenance::Other);
    assert!(gateway.tracker().should_not_override_url_loading());
}

#[test]
fn test_fallback_in_subframe_is_not_loaded() {
    let mut runner =
        ScenarioRunner::with_profile(EmbedderProfile::new().with_history(&["https://a.example/"]));
    let verdict = runner.navigate(
        NavigationParams::new(FALLBACK_INTENT)
            .with_gesture()
            .subframe(),
    );
    assert_eq!(verdict.reason, DecisionReason::FallbackInSubframe);
    assert!(!runner.gateway().has_deferred_work());
}

#[test]
fn test_clobber_without_surface_continues() {
    let mut profile = EmbedderProfile::new().with_history(&["https://a.example/"]);
    profile.has_valid_surface = false;
    let mut runner = ScenarioRunner::with_profile(profile);
    let verdict = runner.navigate(NavigationParams::new(FALLBACK_INTENT).with_gesture());
    assert_eq!(verdict.reason, DecisionReason::NoValidSurface);
    assert!(!verdict.is_intercepted());
}

#[test]
fn test_typed_redirect_to_external_protocol_may_leave() {
    let mut runner = ScenarioRunner::with_profile(dialer(
        EmbedderProfile::new().with_history(&["https://a.example/"]),
    ));
    runner.navigate(
        NavigationParams::new("https://short.example/call")
            .with_transition(PageTransition::typed()),
    );
    let verdict = runner.navigate(
        NavigationParams::new("tel:123")
            .with_transition(PageTransition::typed())
            .redirect(),
    );
    assert!(verdict.decision.is_launch());
}
