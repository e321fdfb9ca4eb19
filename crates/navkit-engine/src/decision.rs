//! Decisions and the reasons behind them.

use crate::delegate::PromptId;
use navkit_intent::DispatchRequest;
use serde::Serialize;

/// What to do with a navigation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Decision {
    /// Let the navigation proceed in the surface.
    Continue,
    /// Replace the navigation with a same-surface load of `url`.
    ClobberWithFallback {
        url: String,
        referrer: Option<String>,
    },
    /// Hand the navigation to another application.
    LaunchExternal {
        request: DispatchRequest,
        proxy: bool,
    },
    /// Wait for the user; the answer arrives later.
    AsyncAction { action: PendingAction },
}

impl Decision {
    pub fn is_continue(&self) -> bool {
        matches!(self, Decision::Continue)
    }

    pub fn is_launch(&self) -> bool {
        matches!(self, Decision::LaunchExternal { .. })
    }

    pub fn is_async(&self) -> bool {
        matches!(self, Decision::AsyncAction { .. })
    }

    /// Short name of the variant, as used in logs and scenario files.
    pub fn kind(&self) -> &'static str {
        match self {
            Decision::Continue => "continue",
            Decision::ClobberWithFallback { .. } => "clobber",
            Decision::LaunchExternal { .. } => "launch",
            Decision::AsyncAction { .. } => "async",
        }
    }

    /// The dispatch request of a launch.
    pub fn launch_request(&self) -> Option<&DispatchRequest> {
        match self {
            Decision::LaunchExternal { request, .. } => Some(request),
            _ => None,
        }
    }
}

/// An asynchronous flow the user has to answer.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "prompt", rename_all = "snake_case")]
pub enum PendingAction {
    /// Warn before leaving private mode for another application.
    IncognitoConfirmation {
        request: DispatchRequest,
        proxy: bool,
        fallback_url: Option<String>,
        referrer: Option<String>,
        close_surface: bool,
    },
    /// Ask for shared-storage access before loading a `file:` URL.
    StorageAccess {
        url: String,
        referrer: Option<String>,
        close_surface: bool,
    },
}

/// The answer to a prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PromptResponse {
    /// Leave private mode, or grant access.
    Accept,
    /// Stay, deny, or dismiss.
    Decline,
}

/// The rule that fixed a decision.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, serde::Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DecisionReason {
    MalformedUrl,
    AutoSubframe,
    Backgrounded,
    BackgroundTab,
    ForwardBack,
    DelegatedHandler,
    InternalPdfDownload,
    StorageAccessRequired,
    ExternalRequestsDisabled,
    UnclassifiedLink,
    InstantAppRedirect,
    RedirectStaysInApp,
    NotEligible,
    FormRedirectWithoutGesture,
    NavigationFromUserTyping,
    InternalPageLink,
    LegacyDialer,
    UnsupportedLegacyScheme,
    InternalScheme,
    ContentScheme,
    FileDataInLaunchRequest,
    PairingCode,
    StayInIncognito,
    NoResolverFallback,
    NoResolver,
    Marketplace,
    MarketplaceUnavailable,
    InstantAppLink,
    NoSpecializedHandler,
    SameHostResolvers,
    DirectInstantAppBlocked,
    TrustBoundary,
    IncognitoConfirmation,
    IncognitoTargetingSelf,
    AlreadyInWebApp,
    SoleWebApp,
    Launch,
    FallbackWebApp,
    FallbackMarketplace,
    FallbackInSubframe,
    FallbackClobber,
    DispatchFailed,
    DispatchHandledInternally,
    PromptUnavailable,
    NoValidSurface,
}

/// A decision plus its reason.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Verdict {
    pub decision: Decision,
    pub reason: DecisionReason,
    /// Prompt presented for an [`Decision::AsyncAction`].
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prompt: Option<PromptId>,
    #[serde(skip)]
    pub(crate) fallback_url: Option<String>,
    #[serde(skip)]
    pub(crate) can_launch_external_fallback: bool,
}

impl Verdict {
    pub fn new(decision: Decision, reason: DecisionReason) -> Self {
        Self {
            decision,
            reason,
            prompt: None,
            fallback_url: None,
            can_launch_external_fallback: false,
        }
    }

    pub fn proceed(reason: DecisionReason) -> Self {
        Self::new(Decision::Continue, reason)
    }

    /// Anything but `Continue` takes the navigation away from the surface.
    pub fn is_intercepted(&self) -> bool {
        !self.decision.is_continue()
    }

    /// Same fallback context, different outcome.
    pub(crate) fn replace(&self, decision: Decision, reason: DecisionReason) -> Self {
        Self {
            decision,
            reason,
            prompt: None,
            fallback_url: self.fallback_url.clone(),
            can_launch_external_fallback: self.can_launch_external_fallback,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intercepted() {
        assert!(!Verdict::proceed(DecisionReason::NoResolver).is_intercepted());
        let clobber = Verdict::new(
            Decision::ClobberWithFallback {
                url: "https://example.com/".into(),
                referrer: None,
            },
            DecisionReason::FallbackClobber,
        );
        assert!(clobber.is_intercepted());
    }

    #[test]
    fn test_verdict_serializes_tagged() {
        let verdict = Verdict::new(
            Decision::LaunchExternal {
                request: DispatchRequest::view("tel:123"),
                proxy: false,
            },
            DecisionReason::LegacyDialer,
        );
        let json = serde_json::to_value(&verdict).unwrap();
        assert_eq!(json["decision"]["type"], "launch_external");
        assert_eq!(json["reason"], "legacy_dialer");
        assert_eq!(json["decision"]["request"]["data"], "tel:123");
        assert!(json.get("prompt").is_none());
    }
}
