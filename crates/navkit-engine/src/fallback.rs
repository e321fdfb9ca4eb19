//! Browser fallback URLs.
//!
//! A launch URI may name a web page to show when it cannot be launched. The
//! fallback is considered whenever the pipeline decides to continue, and
//! again after a launch that failed. A launch made for the fallback itself
//! is never retried: a failed web app moves on to the marketplace listing,
//! and a failed listing to loading the fallback page in place.

use crate::decision::{Decision, DecisionReason, Verdict};
use crate::delegate::NavigationDelegate;
use crate::event::NavigationEvent;
use crate::policy::{is_already_in_web_app, marketplace, sole_web_app};
use crate::redirect::RedirectTracker;
use navkit_core::InterceptConfig;
use navkit_intent::market::play_store_app_and_referrer;
use navkit_intent::{parse_uri, specialized_handlers};
use tracing::debug;

/// Which launches the fallback URL may still turn into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum FallbackLaunch {
    WebAppOrMarketplace,
    Marketplace,
    Nothing,
}

impl FallbackLaunch {
    /// What is left once a launch decided for `reason` did not happen.
    pub(crate) fn after_failed(reason: DecisionReason) -> Self {
        match reason {
            DecisionReason::FallbackWebApp => Self::Marketplace,
            DecisionReason::FallbackMarketplace => Self::Nothing,
            _ => Self::WebAppOrMarketplace,
        }
    }
}

/// Apply the fallback URL carried by `verdict`, if it still applies.
pub(crate) fn apply_fallback(
    config: &InterceptConfig,
    event: &NavigationEvent,
    tracker: &mut RedirectTracker,
    delegate: &dyn NavigationDelegate,
    verdict: Verdict,
    launch: FallbackLaunch,
) -> Verdict {
    if !verdict.decision.is_continue() || tracker.should_not_override_url_loading() {
        return verdict;
    }
    let Some(fallback_url) = verdict.fallback_url.clone() else {
        return verdict;
    };
    debug!(fallback = %fallback_url, reason = ?verdict.reason, ?launch, "Considering fallback URL");

    if verdict.can_launch_external_fallback && launch != FallbackLaunch::Nothing {
        if let Some((decision, reason)) =
            fallback_launch(config, event, delegate, &fallback_url, launch)
        {
            return verdict.replace(decision, reason);
        }
    }

    if !event.is_main_frame {
        return verdict.replace(Decision::Continue, DecisionReason::FallbackInSubframe);
    }

    tracker.set_should_not_override_on_chain();
    verdict.replace(
        Decision::ClobberWithFallback {
            url: fallback_url,
            referrer: event.referrer.clone(),
        },
        DecisionReason::FallbackClobber,
    )
}

/// The fallback page itself may belong to an installed web app, or be a
/// marketplace listing.
fn fallback_launch(
    config: &InterceptConfig,
    event: &NavigationEvent,
    delegate: &dyn NavigationDelegate,
    fallback_url: &str,
    launch: FallbackLaunch,
) -> Option<(Decision, DecisionReason)> {
    if launch == FallbackLaunch::WebAppOrMarketplace {
        if let Some(found) = fallback_web_app(config, event, delegate, fallback_url) {
            return Some(found);
        }
    }

    let (package, referrer) = play_store_app_and_referrer(fallback_url)?;
    let (decision, reason) = marketplace(
        config,
        event,
        delegate,
        &package,
        referrer.as_deref(),
        DecisionReason::FallbackMarketplace,
    );
    // An unavailable marketplace still leaves the clobber.
    (!decision.is_continue()).then_some((decision, reason))
}

fn fallback_web_app(
    config: &InterceptConfig,
    event: &NavigationEvent,
    delegate: &dyn NavigationDelegate,
    fallback_url: &str,
) -> Option<(Decision, DecisionReason)> {
    let mut request = parse_uri(fallback_url).ok()?;
    request.sanitize_for_query();
    let handlers = delegate.resolve_handlers(&request);
    if is_already_in_web_app(event, &handlers) {
        return None;
    }
    let specialized = specialized_handlers(&handlers, None, config.handles_instant_apps_internally);
    request.package = Some(sole_web_app(delegate, &specialized)?);
    Some((
        Decision::LaunchExternal {
            request,
            proxy: false,
        },
        DecisionReason::FallbackWebApp,
    ))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_failed_fallback_launches_narrow() {
        assert_eq!(
            FallbackLaunch::after_failed(DecisionReason::Launch),
            FallbackLaunch::WebAppOrMarketplace
        );
        assert_eq!(
            FallbackLaunch::after_failed(DecisionReason::FallbackWebApp),
            FallbackLaunch::Marketplace
        );
        assert_eq!(
            FallbackLaunch::after_failed(DecisionReason::FallbackMarketplace),
            FallbackLaunch::Nothing
        );
    }
}
