//! Redirect State Tracker.
//!
//! One tracker per browsing surface. It classifies how the current
//! navigation sequence started and follows that classification through
//! server redirects and client-side immediate navigations, until the next
//! user-initiated navigation resets it.

use navkit_core::{PageTransition, TransitionKind};
use navkit_intent::{DispatchRequest, ResolverSet};
use std::time::Instant;
use tracing::trace;

/// How the current navigation sequence started.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum NavigationProvenance {
    /// Nothing classified since the last reset.
    #[default]
    None,
    /// Started by another application's launch request.
    FromExternalLaunch,
    /// Typed into the address bar.
    FromUserTyping,
    /// A link followed without a user gesture.
    FromLinkNoGesture,
    /// A reload or a back/forward navigation.
    FromReload,
    /// Anything else the user started.
    Other,
}

/// Transition metadata of one navigation, fed to [`RedirectTracker::update_navigation`].
#[derive(Debug, Clone, Copy)]
pub struct TransitionUpdate {
    pub transition: PageTransition,
    pub is_redirect: bool,
    pub has_user_gesture: bool,
    /// When the user last interacted with the surface.
    pub last_user_interaction: Option<Instant>,
    /// Last committed history index before this navigation.
    pub history_index: Option<usize>,
    /// When this navigation was seen.
    pub at: Instant,
}

impl TransitionUpdate {
    pub fn new(transition: PageTransition) -> Self {
        Self {
            transition,
            is_redirect: false,
            has_user_gesture: false,
            last_user_interaction: None,
            history_index: None,
            at: Instant::now(),
        }
    }

    pub fn redirect(mut self) -> Self {
        self.is_redirect = true;
        self
    }

    pub fn with_gesture(mut self) -> Self {
        self.has_user_gesture = true;
        self
    }

    pub fn with_history_index(mut self, index: usize) -> Self {
        self.history_index = Some(index);
        self
    }

    pub fn with_user_interaction(mut self, at: Instant) -> Self {
        self.last_user_interaction = Some(at);
        self
    }

    pub fn at(mut self, at: Instant) -> Self {
        self.at = at;
        self
    }
}

/// The external launch request that opened this surface.
#[derive(Debug, Clone)]
struct LaunchRecord {
    /// Sanitized copy, used to query resolvers again later.
    request: DispatchRequest,
    heading_to_self: bool,
    /// Filled on first use.
    cached_resolvers: Option<ResolverSet>,
}

/// Redirect-chain state of one browsing surface.
#[derive(Debug, Clone, Default)]
pub struct RedirectTracker {
    provenance: NavigationProvenance,
    on_effective_chain: bool,
    last_navigation_at: Option<Instant>,
    should_not_override_on_chain: bool,
    history_index_before_navigation: Option<usize>,
    is_custom_tab: bool,
    launch: Option<LaunchRecord>,
}

impl RedirectTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record the external launch request that (re)opened this surface.
    ///
    /// Resets all state. Only VIEW requests are remembered. When the request
    /// comes from a custom tab that forwards to external applications it is
    /// never treated as heading to the embedder itself.
    pub fn update_launch_request(
        &mut self,
        request: Option<&DispatchRequest>,
        application_package: &str,
        is_custom_tab: bool,
        send_to_external_apps: bool,
    ) {
        self.clear();

        let Some(request) = request.filter(|request| request.is_view()) else {
            return;
        };

        self.is_custom_tab = is_custom_tab;
        let heading_to_self = !(is_custom_tab && send_to_external_apps)
            && (request.package.as_deref() == Some(application_package)
                || request
                    .component
                    .as_ref()
                    .is_some_and(|component| component.package == application_package));

        let mut sanitized = request.clone();
        sanitized.selector = None;
        sanitized.sanitize_for_query();

        trace!(heading_to_self, is_custom_tab, "Launch request recorded");
        self.launch = Some(LaunchRecord {
            request: sanitized,
            heading_to_self,
            cached_resolvers: None,
        });
    }

    /// Forget the launch request and everything tied to it.
    pub fn clear_launch_history(&mut self) {
        self.launch = None;
        self.is_custom_tab = false;
    }

    /// Reset to the freshly-created state.
    pub fn clear(&mut self) {
        *self = Self::default();
    }

    /// Process one navigation. Must run before the navigation is evaluated.
    pub fn update_navigation(&mut self, update: TransitionUpdate) {
        let previous = self.last_navigation_at.replace(update.at);
        let transition = update.transition;
        let from_external_app = transition.is_link_from_external_app();

        let user_initiated = !update.is_redirect
            && (transition.forward_back
                || (!transition.is_link() && !transition.is_form_submit())
                || previous.is_none()
                || from_external_app
                || match (update.last_user_interaction, previous) {
                    (Some(interaction), Some(previous)) => interaction > previous,
                    _ => false,
                });

        if user_initiated {
            self.provenance = if from_external_app && self.launch.is_some() {
                NavigationProvenance::FromExternalLaunch
            } else {
                self.clear_launch_history();
                if transition.is_typed() {
                    NavigationProvenance::FromUserTyping
                } else if transition.kind == TransitionKind::Reload
                    || transition.forward_back
                {
                    NavigationProvenance::FromReload
                } else if transition.is_link() && !update.has_user_gesture {
                    NavigationProvenance::FromLinkNoGesture
                } else {
                    NavigationProvenance::Other
                }
            };
            self.on_effective_chain = false;
            self.should_not_override_on_chain = false;
            self.history_index_before_navigation = update.history_index;
            trace!(provenance = ?self.provenance, "User-initiated navigation");
        } else if self.provenance != NavigationProvenance::None {
            self.on_effective_chain = true;
            trace!(provenance = ?self.provenance, "Continuing redirect chain");
        }
    }

    pub fn provenance(&self) -> NavigationProvenance {
        self.provenance
    }

    /// Inside the redirect chain of a user-initiated navigation.
    pub fn is_on_effective_chain(&self) -> bool {
        self.on_effective_chain
    }

    pub fn is_on_effective_external_launch_chain(&self) -> bool {
        self.provenance == NavigationProvenance::FromExternalLaunch && self.on_effective_chain
    }

    /// Whether the navigation must stay in the browsing surface.
    ///
    /// True when the launch request explicitly targeted the embedder and the
    /// navigation can be rendered, or when the navigation type alone keeps it
    /// in.
    pub fn should_stay_in_app(
        &self,
        is_external_protocol: bool,
        is_for_trusted_calling_app: bool,
    ) -> bool {
        let heading_to_self = self
            .launch
            .as_ref()
            .is_some_and(|launch| launch.heading_to_self);
        (heading_to_self && !is_external_protocol)
            || self.should_navigation_type_stay_in_app(is_for_trusted_calling_app)
    }

    /// Reloads never leave. Links without a gesture stay unless they lead
    /// back to the application that opened this surface.
    pub fn should_navigation_type_stay_in_app(&self, is_for_trusted_calling_app: bool) -> bool {
        match self.provenance {
            NavigationProvenance::FromReload => true,
            NavigationProvenance::FromLinkNoGesture => !is_for_trusted_calling_app,
            _ => false,
        }
    }

    /// Whether `candidates` contains a resolver the original launch request
    /// did not have. `resolve` queries resolvers for the recorded request and
    /// runs at most once per launch.
    pub fn has_new_resolver<F>(&mut self, candidates: &ResolverSet, resolve: F) -> bool
    where
        F: FnOnce(&DispatchRequest) -> ResolverSet,
    {
        let Some(launch) = self.launch.as_mut() else {
            return true;
        };
        let cached = launch
            .cached_resolvers
            .get_or_insert_with(|| resolve(&launch.request));
        cached.is_empty() || !candidates.is_subset_of(cached)
    }

    /// Keep every further navigation of this chain inside the surface.
    pub fn set_should_not_override_on_chain(&mut self) {
        self.should_not_override_on_chain = true;
    }

    pub fn should_not_override_url_loading(&self) -> bool {
        self.should_not_override_on_chain
    }

    pub fn is_navigation_from_user_typing(&self) -> bool {
        self.provenance == NavigationProvenance::FromUserTyping
    }

    pub fn is_from_custom_tab_launch(&self) -> bool {
        self.is_custom_tab
    }

    pub fn has_launch_request(&self) -> bool {
        self.launch.is_some()
    }

    /// History index recorded when the current sequence began.
    pub fn history_index_before_navigation(&self) -> Option<usize> {
        self.history_index_before_navigation
    }

    /// At least one navigation was processed since the last reset.
    pub fn is_on_navigation(&self) -> bool {
        self.last_navigation_at.is_some()
    }
}
