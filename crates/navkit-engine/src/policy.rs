//! Policy Evaluation Pipeline.
//!
//! An ordered list of guards. Each guard either fixes the decision or
//! passes the navigation on to the next one; the final fallthrough is an
//! external launch. Evaluation is synchronous and never fails: anything
//! unexpected resolves to `Continue`.

use crate::decision::{Decision, DecisionReason, PendingAction, Verdict};
use crate::delegate::NavigationDelegate;
use crate::event::NavigationEvent;
use crate::redirect::{NavigationProvenance, RedirectTracker};
use navkit_core::{InterceptConfig, TransitionKind};
use navkit_intent::market::{self, WTAI_MAKE_CALL_PREFIX};
use navkit_intent::url_util;
use navkit_intent::{
    parse_uri, specialized_handlers, DispatchRequest, LaunchFlags, RequestMetadata,
    ResolvedHandler, ResolverSet, EXTRA_BROWSER_FALLBACK_URL,
};
use std::mem;
use tracing::{debug, trace, warn};

type Outcome = (Decision, DecisionReason);

fn proceed(reason: DecisionReason) -> Outcome {
    (Decision::Continue, reason)
}

/// Decides what happens to each navigation of a surface.
#[derive(Debug, Clone, Default)]
pub struct NavigationPolicy {
    config: InterceptConfig,
}

impl NavigationPolicy {
    pub fn new(config: InterceptConfig) -> Self {
        Self { config }
    }

    pub fn config(&self) -> &InterceptConfig {
        &self.config
    }

    /// Evaluate one navigation.
    ///
    /// The tracker must already have seen this navigation. Returns the
    /// decision before fallback handling; see
    /// [`InterceptGateway`](crate::InterceptGateway) for the complete flow.
    pub fn evaluate(
        &self,
        event: &NavigationEvent,
        tracker: &mut RedirectTracker,
        delegate: &dyn NavigationDelegate,
    ) -> Verdict {
        trace!(url = %event.url, transition = ?event.transition, "Evaluating navigation");

        let request = match parse_uri(&event.url) {
            Ok(request) => request,
            Err(err) => {
                warn!(url = %event.url, error = %err, "Unparseable navigation target");
                return Verdict::proceed(DecisionReason::MalformedUrl);
            }
        };
        let fallback_url = request
            .fallback_url()
            .filter(|url| url_util::is_valid_for_fallback_navigation(url))
            .map(str::to_string);

        let mut evaluation = Evaluation {
            config: &self.config,
            event,
            tracker,
            delegate,
            request,
            fallback_url,
            is_external_protocol: false,
            incoming_redirect: false,
            can_launch_external_fallback: false,
        };
        let (decision, reason) = evaluation.run();

        debug!(url = %event.url, ?reason, decision = decision.kind(), "Navigation decided");
        Verdict {
            decision,
            reason,
            prompt: None,
            fallback_url: evaluation.fallback_url,
            can_launch_external_fallback: evaluation.can_launch_external_fallback,
        }
    }
}

/// State of one evaluation.
struct Evaluation<'a> {
    config: &'a InterceptConfig,
    event: &'a NavigationEvent,
    tracker: &'a mut RedirectTracker,
    delegate: &'a dyn NavigationDelegate,
    request: DispatchRequest,
    fallback_url: Option<String>,
    is_external_protocol: bool,
    incoming_redirect: bool,
    can_launch_external_fallback: bool,
}

impl Evaluation<'_> {
    fn run(&mut self) -> Outcome {
        self.request.sanitize_for_query();

        if let Some(outcome) = self.suppressed() {
            return outcome;
        }
        if let Some(outcome) = self.delegated() {
            return outcome;
        }

        self.is_external_protocol = !url_util::is_accepted_scheme(&self.event.url);

        if !self.is_external_protocol && url_util::is_pdf_download(&self.event.url) {
            return proceed(DecisionReason::InternalPdfDownload);
        }
        if let Some(outcome) = self.storage_access() {
            return outcome;
        }
        if let Some(outcome) = self.disabled() {
            return outcome;
        }

        self.incoming_redirect = (self.event.transition.is_link_from_external_app()
            && self.event.is_redirect)
            || self.tracker.is_on_effective_external_launch_chain();

        if let Some(outcome) = self.unclassified_link() {
            return outcome;
        }
        if let Some(outcome) = self.custom_tab_instant_app() {
            return outcome;
        }
        if let Some(outcome) = self.redirect_stays_in_app() {
            return outcome;
        }
        if let Some(outcome) = self.ineligible() {
            return outcome;
        }
        if let Some(outcome) = self.scheme_denylist() {
            return outcome;
        }
        if self.event.incognito && !self.is_external_protocol {
            return proceed(DecisionReason::StayInIncognito);
        }

        if market::is_unpinned_sms(&self.request) {
            let handlers = self.delegate.resolve_handlers(&self.request);
            let default_package = self.delegate.default_sms_package();
            self.request.package = market::default_sms_package(default_package.as_deref(), &handlers);
        }

        self.can_launch_external_fallback = !self.event.incognito;

        let handlers = self.delegate.resolve_handlers(&self.request);
        if handlers.is_empty() {
            return self.unresolvable();
        }
        self.request.remove_extra(EXTRA_BROWSER_FALLBACK_URL);

        let specialized = specialized_handlers(
            &handlers,
            None,
            self.config.handles_instant_apps_internally,
        );
        trace!(handlers = handlers.len(), specialized = specialized.len(), "Resolved handlers");

        if let Some(outcome) = self.no_specialized_handler(&specialized) {
            return outcome;
        }
        if let Some(outcome) = self.same_host(&handlers) {
            return outcome;
        }

        let is_direct_instant_app =
            self.is_external_protocol && self.delegate.is_instant_app_request(&self.request);
        let proxy = is_direct_instant_app && self.is_search_results_referrer();
        if is_direct_instant_app && !proxy {
            return proceed(DecisionReason::DirectInstantAppBlocked);
        }

        self.prepare_request(&specialized);

        if let Some(outcome) = self.trust_boundary(&handlers) {
            return outcome;
        }
        if let Some(outcome) = self.private_mode(proxy) {
            return outcome;
        }
        if let Some(outcome) = self.web_app(&handlers, &specialized, proxy) {
            return outcome;
        }

        (
            Decision::LaunchExternal {
                request: mem::take(&mut self.request),
                proxy,
            },
            DecisionReason::Launch,
        )
    }

    /// Navigations nobody should act on.
    fn suppressed(&self) -> Option<Outcome> {
        let transition = self.event.transition;
        if transition.kind == TransitionKind::AutoSubframe {
            return Some(proceed(DecisionReason::AutoSubframe));
        }
        if self.event.application_must_be_in_foreground && !self.delegate.is_foreground() {
            return Some(proceed(DecisionReason::Backgrounded));
        }
        if self.event.is_background_tab {
            return Some(proceed(DecisionReason::BackgroundTab));
        }
        if transition.forward_back {
            return Some(proceed(DecisionReason::ForwardBack));
        }
        None
    }

    fn delegated(&self) -> Option<Outcome> {
        if !self.delegate.is_delegated_request(&self.request) {
            return None;
        }
        let taken = self.delegate.handle_delegated_request(
            self.event,
            &self.request,
            self.fallback_url.as_deref(),
        );
        debug!(taken, "Request handed to delegated handler");
        Some(proceed(DecisionReason::DelegatedHandler))
    }

    /// `file:` URLs outside our private storage need a storage grant first.
    fn storage_access(&self) -> Option<Outcome> {
        let url = &self.event.url;
        if !url_util::is_file_scheme(url)
            || !self.delegate.has_valid_surface()
            || url.starts_with(&self.config.private_data_url_prefix())
            || self.delegate.has_storage_permission()
            || !self.delegate.can_request_storage_permission()
        {
            return None;
        }
        let action = PendingAction::StorageAccess {
            url: url.clone(),
            referrer: self.event.referrer.clone(),
            close_surface: self.event.should_close_contents_on_launch,
        };
        Some((
            Decision::AsyncAction { action },
            DecisionReason::StorageAccessRequired,
        ))
    }

    fn disabled(&self) -> Option<Outcome> {
        if self.config.disable_external_requests {
            debug!("External requests disabled by switch");
            return Some(proceed(DecisionReason::ExternalRequestsDisabled));
        }
        if self
            .delegate
            .should_disable_external_requests_for_url(&self.event.url)
        {
            debug!(url = %self.event.url, "External requests disabled for URL");
            return Some(proceed(DecisionReason::ExternalRequestsDisabled));
        }
        None
    }

    /// Nothing classified yet: without a gesture there is no provenance that
    /// could justify leaving.
    fn unclassified_link(&self) -> Option<Outcome> {
        (self.tracker.provenance() == NavigationProvenance::None
            && self.event.transition.is_link()
            && !self.event.has_user_gesture)
            .then(|| proceed(DecisionReason::UnclassifiedLink))
    }

    /// A custom tab redirected by its launcher into a page an instant app
    /// can show.
    fn custom_tab_instant_app(&self) -> Option<Outcome> {
        if !self.tracker.is_from_custom_tab_launch()
            || self.is_external_protocol
            || !self.incoming_redirect
            || self.tracker.should_navigation_type_stay_in_app(false)
        {
            return None;
        }
        let request = self.delegate.instant_app_request(
            &self.event.url,
            self.event.referrer.as_deref(),
            true,
            self.is_search_results_referrer(),
        )?;
        Some(self.launch_or_confirm(request, false, DecisionReason::InstantAppRedirect))
    }

    fn redirect_stays_in_app(&self) -> Option<Outcome> {
        let trusted = self.delegate.is_trusted_calling_application(&self.request);
        if self
            .tracker
            .should_stay_in_app(self.is_external_protocol, trusted)
            || self.tracker.should_not_override_url_loading()
        {
            return Some(proceed(DecisionReason::RedirectStaysInApp));
        }
        None
    }

    /// Only links, form redirects and incoming redirects may leave.
    fn ineligible(&self) -> Option<Outcome> {
        let event = self.event;
        if event.is_typed_redirect_to_external_protocol(self.is_external_protocol) {
            return None;
        }
        let form_redirect = event.is_redirect_from_form_submit();
        if !event.is_link_not_from_external_app() && !self.incoming_redirect && !form_redirect {
            return Some(proceed(DecisionReason::NotEligible));
        }
        if form_redirect
            && !self.incoming_redirect
            && !event.has_user_gesture
            && self.config.block_form_redirects_without_gesture
        {
            return Some(proceed(DecisionReason::FormRedirectWithoutGesture));
        }
        if self.tracker.is_navigation_from_user_typing() {
            return Some(proceed(DecisionReason::NavigationFromUserTyping));
        }
        None
    }

    /// Schemes and URL shapes that never launch anything, plus the legacy
    /// dialer.
    fn scheme_denylist(&self) -> Option<Outcome> {
        let url = &self.event.url;

        if self.event.transition.is_link()
            && self
                .event
                .referrer
                .as_deref()
                .is_some_and(url_util::is_internal_page)
            && url_util::is_http_or_https(url)
        {
            return Some(proceed(DecisionReason::InternalPageLink));
        }

        if url.starts_with(WTAI_MAKE_CALL_PREFIX) {
            if let Some(request) = market::dial_request(url) {
                return Some(self.launch_or_confirm(request, false, DecisionReason::LegacyDialer));
            }
        }
        if market::is_wtai(url) {
            return Some(proceed(DecisionReason::UnsupportedLegacyScheme));
        }

        // Launch URIs are judged by the data they carry.
        let has_intent_scheme = url_util::has_intent_scheme(url);
        let target = if has_intent_scheme {
            self.request.data.as_deref()
        } else {
            Some(url.as_str())
        };
        if target.is_some_and(url_util::is_internal_scheme) {
            return Some(proceed(DecisionReason::InternalScheme));
        }
        if target.is_some_and(url_util::is_content_scheme) {
            return Some(proceed(DecisionReason::ContentScheme));
        }
        if has_intent_scheme && self.request.data_scheme().as_deref() == Some("file") {
            return Some(proceed(DecisionReason::FileDataInLaunchRequest));
        }
        if url_util::is_youtube_pairing_code(url) {
            return Some(proceed(DecisionReason::PairingCode));
        }
        None
    }

    fn unresolvable(&self) -> Outcome {
        if self.fallback_url.is_some() {
            return proceed(DecisionReason::NoResolverFallback);
        }
        match self.request.package.as_deref() {
            Some(package) => marketplace(
                self.config,
                self.event,
                self.delegate,
                package,
                self.request.market_referrer(),
                DecisionReason::Marketplace,
            ),
            None => proceed(DecisionReason::NoResolver),
        }
    }

    /// Web URLs only leave for a specialized handler, or an instant app.
    fn no_specialized_handler(&self, specialized: &[String]) -> Option<Outcome> {
        if self.is_external_protocol || !specialized.is_empty() {
            return None;
        }
        let url = &self.event.url;
        let referrer = self.event.referrer.as_deref();
        let serp = self.is_search_results_referrer();
        if self.incoming_redirect {
            if let Some(request) = self.delegate.instant_app_request(url, referrer, true, serp) {
                return Some(self.launch_or_confirm(
                    request,
                    false,
                    DecisionReason::InstantAppRedirect,
                ));
            }
        } else if self.event.is_link_not_from_external_app() && !self.event.incognito {
            if let Some(request) = self.delegate.instant_app_request(url, referrer, false, serp) {
                return Some(self.launch_or_confirm(request, false, DecisionReason::InstantAppLink));
            }
        }
        Some(proceed(DecisionReason::NoSpecializedHandler))
    }

    /// Browsing within one host stays in the surface when the previous page
    /// already offered every handler the new one does.
    fn same_host(&self, handlers: &[ResolvedHandler]) -> Option<Outcome> {
        let transition = self.event.transition;
        if self.is_external_protocol || !(transition.is_link() || transition.is_form_submit()) {
            return None;
        }
        let previous = self
            .delegate
            .last_committed_url()
            .or_else(|| self.event.referrer.clone())?;
        let previous_host = url_util::host_of(&previous)?;
        if url_util::host_of(&self.event.url)? != previous_host {
            return None;
        }

        let mut previous_request = parse_uri(&previous).ok()?;
        previous_request.sanitize_for_query();
        let previous_handlers =
            ResolverSet::from_handlers(&self.delegate.resolve_handlers(&previous_request));
        ResolverSet::from_handlers(handlers)
            .is_subset_of(&previous_handlers)
            .then(|| proceed(DecisionReason::SameHostResolvers))
    }

    fn prepare_request(&mut self, specialized: &[String]) {
        let event = self.event;
        let request = &mut self.request;
        request.application_id = Some(self.config.application_package.clone());
        if event.open_in_new_surface {
            request.create_new_surface = true;
        }
        request.flags |= LaunchFlags::NEW_TASK | LaunchFlags::CLEAR_TOP;
        request.specialized_handlers = specialized.to_vec();
        if let Some(referrer) = &event.referrer {
            request.referrer = Some(referrer.clone());
        }
        if event.incognito {
            request.incognito_url = Some(event.url.clone());
        }
        request.metadata = Some(RequestMetadata {
            has_user_gesture: event.has_user_gesture,
            renderer_initiated: event.renderer_initiated,
            initiator_origin: event.initiator_origin.clone(),
        });
    }

    /// A redirect coming back from the launching application may only leave
    /// for a handler the launch request did not already offer.
    fn trust_boundary(&mut self, handlers: &[ResolvedHandler]) -> Option<Outcome> {
        if !self.incoming_redirect
            || self.is_external_protocol
            || self.tracker.is_from_custom_tab_launch()
        {
            return None;
        }
        let delegate = self.delegate;
        let has_new_resolver = self
            .tracker
            .has_new_resolver(&ResolverSet::from_handlers(handlers), |request| {
                ResolverSet::from_handlers(&delegate.resolve_handlers(request))
            });
        (!has_new_resolver).then(|| proceed(DecisionReason::TrustBoundary))
    }

    fn private_mode(&mut self, proxy: bool) -> Option<Outcome> {
        if !self.event.incognito {
            return None;
        }
        if !self.delegate.is_same_application(&self.request) {
            let request = mem::take(&mut self.request);
            return Some((
                self.incognito_confirmation(request, proxy),
                DecisionReason::IncognitoConfirmation,
            ));
        }

        let target = self
            .request
            .data
            .as_deref()
            .filter(|data| url_util::is_accepted_scheme(data))
            .map(str::to_string)
            .or_else(|| self.fallback_url.clone());
        Some(match target {
            Some(url) => (
                Decision::ClobberWithFallback {
                    url,
                    referrer: self.event.referrer.clone(),
                },
                DecisionReason::IncognitoTargetingSelf,
            ),
            None => proceed(DecisionReason::IncognitoTargetingSelf),
        })
    }

    fn web_app(
        &mut self,
        handlers: &[ResolvedHandler],
        specialized: &[String],
        proxy: bool,
    ) -> Option<Outcome> {
        if is_already_in_web_app(self.event, handlers) {
            return Some(proceed(DecisionReason::AlreadyInWebApp));
        }
        let package = sole_web_app(self.delegate, specialized)?;
        self.request.package = Some(package);
        Some((
            Decision::LaunchExternal {
                request: mem::take(&mut self.request),
                proxy,
            },
            DecisionReason::SoleWebApp,
        ))
    }

    fn launch_or_confirm(
        &self,
        request: DispatchRequest,
        proxy: bool,
        reason: DecisionReason,
    ) -> Outcome {
        if self.event.incognito && !self.delegate.is_same_application(&request) {
            return (
                self.incognito_confirmation(request, proxy),
                DecisionReason::IncognitoConfirmation,
            );
        }
        (Decision::LaunchExternal { request, proxy }, reason)
    }

    fn incognito_confirmation(&self, request: DispatchRequest, proxy: bool) -> Decision {
        incognito_confirmation(self.event, request, proxy, self.fallback_url.clone())
    }

    fn is_search_results_referrer(&self) -> bool {
        url_util::is_search_results_referrer(self.delegate.last_committed_url().as_deref())
    }
}

pub(crate) fn incognito_confirmation(
    event: &NavigationEvent,
    request: DispatchRequest,
    proxy: bool,
    fallback_url: Option<String>,
) -> Decision {
    Decision::AsyncAction {
        action: PendingAction::IncognitoConfirmation {
            request,
            proxy,
            fallback_url,
            referrer: event.referrer.clone(),
            close_surface: event.should_close_contents_on_launch,
        },
    }
}

/// Send the user to the marketplace listing of `package`.
pub(crate) fn marketplace(
    config: &InterceptConfig,
    event: &NavigationEvent,
    delegate: &dyn NavigationDelegate,
    package: &str,
    market_referrer: Option<&str>,
    reason: DecisionReason,
) -> Outcome {
    let market_referrer = market_referrer
        .filter(|referrer| !referrer.is_empty())
        .unwrap_or(config.application_package.as_str());
    let request = market::market_request(
        package,
        market_referrer,
        &config.market_package,
        event.referrer.as_deref(),
    );
    if delegate.resolve_handlers(&request).is_empty() {
        debug!(package, "No marketplace installed");
        return proceed(DecisionReason::MarketplaceUnavailable);
    }
    if event.incognito {
        return (
            incognito_confirmation(event, request, false, None),
            DecisionReason::IncognitoConfirmation,
        );
    }
    (
        Decision::LaunchExternal {
            request,
            proxy: false,
        },
        reason,
    )
}

pub(crate) fn is_already_in_web_app(event: &NavigationEvent, handlers: &[ResolvedHandler]) -> bool {
    event
        .web_app_package
        .as_deref()
        .is_some_and(|package| handlers.iter().any(|handler| handler.package() == package))
}

/// The package of the only specialized handler, when it is a web app.
pub(crate) fn sole_web_app(
    delegate: &dyn NavigationDelegate,
    specialized: &[String],
) -> Option<String> {
    match specialized {
        [package] if delegate.is_valid_web_app(package) => Some(package.clone()),
        _ => None,
    }
}
