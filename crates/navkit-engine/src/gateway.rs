//! Interception Gateway.
//!
//! The entry point the embedding browser calls for every navigation. It
//! keeps the redirect tracker current, runs the policy, applies fallback
//! URLs and carries the decision out: dispatching launches, presenting
//! prompts, scheduling same-surface loads and pruning history.

use crate::decision::{Decision, DecisionReason, PendingAction, PromptResponse, Verdict};
use crate::deferred::{DeferredAction, DeferredQueue};
use crate::delegate::{DispatchOutcome, NavigationDelegate, PromptId};
use crate::event::{NavigationEvent, NavigationParams};
use crate::fallback::{apply_fallback, FallbackLaunch};
use crate::policy::NavigationPolicy;
use crate::redirect::{RedirectTracker, TransitionUpdate};
use navkit_core::{InterceptConfig, NavKitError, NavKitResult, SurfaceId};
use navkit_intent::url_util;
use navkit_intent::DispatchRequest;
use std::collections::HashMap;
use tracing::{debug, info, warn};

/// Navigation interception for one browsing surface.
pub struct InterceptGateway<D: NavigationDelegate> {
    surface: SurfaceId,
    delegate: D,
    policy: NavigationPolicy,
    tracker: RedirectTracker,
    deferred: DeferredQueue,
    pending: HashMap<PromptId, PendingAction>,
    clear_history_on_commit: bool,
}

impl<D: NavigationDelegate> InterceptGateway<D> {
    pub fn new(delegate: D, config: InterceptConfig) -> Self {
        Self {
            surface: SurfaceId::new(),
            delegate,
            policy: NavigationPolicy::new(config),
            tracker: RedirectTracker::new(),
            deferred: DeferredQueue::new(),
            pending: HashMap::new(),
            clear_history_on_commit: false,
        }
    }

    pub fn surface(&self) -> SurfaceId {
        self.surface
    }

    pub fn delegate(&self) -> &D {
        &self.delegate
    }

    pub fn config(&self) -> &InterceptConfig {
        self.policy.config()
    }

    pub fn tracker(&self) -> &RedirectTracker {
        &self.tracker
    }

    /// Number of prompts waiting for an answer.
    pub fn pending_prompts(&self) -> usize {
        self.pending.len()
    }

    /// Whether deferred work is waiting for [`Self::run_deferred`].
    pub fn has_deferred_work(&self) -> bool {
        !self.deferred.is_empty()
    }

    /// The surface was (re)opened by another application's launch request.
    pub fn on_external_launch_received(
        &mut self,
        request: Option<&DispatchRequest>,
        is_custom_tab: bool,
        send_to_external_apps: bool,
    ) {
        let application_package = self.policy.config().application_package.clone();
        self.tracker.update_launch_request(
            request,
            &application_package,
            is_custom_tab,
            send_to_external_apps,
        );
    }

    /// Decide on a navigation without acting on the decision.
    ///
    /// Nothing is dispatched, presented or loaded, but the call is not free
    /// of state: the tracker records the navigation, and a decision to load
    /// the fallback URL in place marks the rest of the redirect chain as not
    /// overridable. Call this at most once per navigation and never together
    /// with [`Self::handle_navigation`].
    pub fn should_intercept(&mut self, params: &NavigationParams) -> Verdict {
        let event = self.begin(params);
        self.decide(&event)
    }

    /// Decide on a navigation and carry the decision out.
    ///
    /// The navigation must be cancelled when the returned verdict
    /// [`is_intercepted`](Verdict::is_intercepted).
    pub fn handle_navigation(&mut self, params: &NavigationParams) -> Verdict {
        let event = self.begin(params);
        let verdict = self.decide(&event);
        let verdict = self.execute(&event, verdict);
        debug!(
            surface = self.surface.0,
            url = %event.url,
            reason = ?verdict.reason,
            decision = verdict.decision.kind(),
            "Navigation handled"
        );
        verdict
    }

    /// A navigation finished. Clears the history left behind a replaced
    /// navigation once the replacement commits.
    pub fn on_navigation_finished(&mut self, committed: bool, is_main_frame: bool) {
        if !self.clear_history_on_commit || !committed || !is_main_frame {
            return;
        }
        self.clear_history_on_commit = false;

        let Some(last) = self.delegate.last_committed_index() else {
            return;
        };
        let floor = self
            .tracker
            .history_index_before_navigation()
            .map_or(0, |before| before + 1);
        for index in (floor..last).rev() {
            self.remove_history_entry(index);
        }
    }

    /// Deliver the user's answer to a prompt.
    ///
    /// Returns `LaunchExternal` when the answer launched the request and
    /// `Continue` otherwise.
    pub fn resolve_prompt(
        &mut self,
        prompt: PromptId,
        response: PromptResponse,
    ) -> NavKitResult<Decision> {
        let action = self.pending.remove(&prompt).ok_or_else(|| {
            NavKitError::presentation(format!("No pending prompt {}", prompt.raw()))
        })?;
        debug!(prompt = prompt.raw(), ?response, "Prompt answered");

        match action {
            PendingAction::IncognitoConfirmation {
                request,
                proxy,
                fallback_url,
                referrer,
                close_surface,
            } => {
                if response == PromptResponse::Accept {
                    match self.delegate.dispatch(&request, proxy) {
                        Ok(DispatchOutcome::Launched) => {
                            info!(
                                surface = self.surface.0,
                                data = ?request.data,
                                "Launched after private-mode confirmation"
                            );
                            if close_surface && self.config().close_surface_on_incognito_launch {
                                self.delegate.close_surface();
                            }
                            return Ok(Decision::LaunchExternal { request, proxy });
                        }
                        Ok(DispatchOutcome::HandledInternally) => {
                            debug!("Confirmed launch handled internally");
                        }
                        Err(err) => {
                            warn!(error = %err, "Confirmed launch failed");
                        }
                    }
                }
                self.load_url_from_request(
                    referrer.as_deref(),
                    fallback_url.as_deref(),
                    request.data.as_deref(),
                    close_surface,
                    true,
                );
                Ok(Decision::Continue)
            }
            PendingAction::StorageAccess {
                url,
                referrer,
                close_surface,
            } => {
                match response {
                    PromptResponse::Accept => {
                        if self.delegate.has_valid_surface() {
                            let incognito = self.delegate.is_incognito();
                            self.load_url_from_request(
                                referrer.as_deref(),
                                Some(&url),
                                None,
                                close_surface,
                                incognito,
                            );
                        }
                    }
                    PromptResponse::Decline => {
                        if close_surface {
                            self.delegate.close_surface();
                        }
                    }
                }
                Ok(Decision::Continue)
            }
        }
    }

    /// Load the first of `primary` and `alternate` the surface can render.
    ///
    /// Loads in a new surface when the current one cannot load, or is about
    /// to close. Returns whether the current surface loaded the URL.
    pub fn load_url_from_request(
        &self,
        referrer: Option<&str>,
        primary: Option<&str>,
        alternate: Option<&str>,
        close_surface: bool,
        incognito: bool,
    ) -> bool {
        let supports_new = self.delegate.supports_creating_new_surfaces();
        let can_load_current = self.delegate.can_load_url_in_current_surface();
        if !supports_new && !can_load_current {
            return false;
        }
        let load_in_new = supports_new && (!can_load_current || close_surface);

        let Some(url) = [primary, alternate]
            .into_iter()
            .flatten()
            .find(|url| url_util::is_accepted_scheme(url))
        else {
            return false;
        };

        if load_in_new {
            self.delegate.load_url_in_new_surface(url, incognito);
            if close_surface {
                self.delegate.close_surface();
            }
            return false;
        }
        self.delegate.load_url(url, referrer);
        true
    }

    /// Run deferred surface work. Call once the navigation callback that
    /// produced it has returned. Returns how many actions ran.
    pub fn run_deferred(&mut self) -> usize {
        let actions = self.deferred.drain();
        for action in &actions {
            match action {
                DeferredAction::LoadUrl { url, referrer } => {
                    if self.delegate.has_valid_surface() {
                        self.delegate.load_url(url, referrer.as_deref());
                    } else {
                        debug!(url = %url, "Surface gone, dropping deferred load");
                    }
                }
                DeferredAction::CloseSurface => self.delegate.close_surface(),
            }
        }
        actions.len()
    }

    fn begin(&mut self, params: &NavigationParams) -> NavigationEvent {
        let history_index = self.delegate.last_committed_index();
        self.tracker.update_navigation(TransitionUpdate {
            history_index,
            is_redirect: params.is_redirect,
            has_user_gesture: params.has_user_gesture,
            last_user_interaction: params.last_user_interaction,
            ..TransitionUpdate::new(params.transition)
        });

        let should_close = history_index.is_none()
            || (self.tracker.is_on_navigation()
                && self.tracker.history_index_before_navigation().is_none());

        NavigationEvent::from_params(params)
            .incognito(self.delegate.is_incognito())
            .must_be_in_foreground(self.policy.config().application_must_be_in_foreground)
            .close_contents_on_launch(should_close)
            .in_web_app(self.delegate.web_app_package())
    }

    fn decide(&mut self, event: &NavigationEvent) -> Verdict {
        let verdict = self
            .policy
            .evaluate(event, &mut self.tracker, &self.delegate);
        apply_fallback(
            self.policy.config(),
            event,
            &mut self.tracker,
            &self.delegate,
            verdict,
            FallbackLaunch::WebAppOrMarketplace,
        )
    }

    fn execute(&mut self, event: &NavigationEvent, verdict: Verdict) -> Verdict {
        match &verdict.decision {
            Decision::Continue => verdict,
            Decision::ClobberWithFallback { url, referrer } => {
                if !self.delegate.has_valid_surface() {
                    warn!(url = %url, "No surface to load the fallback in");
                    return verdict.replace(Decision::Continue, DecisionReason::NoValidSurface);
                }
                self.post(DeferredAction::LoadUrl {
                    url: url.clone(),
                    referrer: referrer.clone(),
                });
                self.clear_history_on_commit = true;
                verdict
            }
            Decision::LaunchExternal { request, proxy } => {
                match self.delegate.dispatch(request, *proxy) {
                    Ok(DispatchOutcome::Launched) => {
                        info!(
                            surface = self.surface.0,
                            data = ?request.data,
                            package = ?request.package,
                            "Launched external handler"
                        );
                        self.on_launched(event);
                        verdict
                    }
                    Ok(DispatchOutcome::HandledInternally) => {
                        debug!("Launch handled internally");
                        self.recover(event, &verdict, DecisionReason::DispatchHandledInternally)
                    }
                    Err(err) => {
                        warn!(error = %err, "External launch failed");
                        self.recover(event, &verdict, DecisionReason::DispatchFailed)
                    }
                }
            }
            Decision::AsyncAction { action } => {
                let prompt = PromptId::new();
                let shown = match action {
                    PendingAction::IncognitoConfirmation { request, .. } => {
                        self.delegate.confirm_incognito_launch(prompt, request)
                    }
                    PendingAction::StorageAccess { .. } => {
                        self.delegate.request_storage_access(prompt)
                    }
                };
                if let Err(err) = shown {
                    warn!(error = %err, "Prompt could not be shown");
                    return self.recover(event, &verdict, DecisionReason::PromptUnavailable);
                }

                self.pending.insert(prompt, action.clone());
                if !event.should_close_contents_on_launch && event.is_main_frame {
                    self.prune_history();
                }
                Verdict {
                    prompt: Some(prompt),
                    ..verdict
                }
            }
        }
    }

    /// The decided action did not happen: the navigation continues, unless
    /// the fallback URL takes over.
    ///
    /// Each failed fallback launch narrows what the fallback may still
    /// become, so recovery ends at the clobber at the latest.
    fn recover(
        &mut self,
        event: &NavigationEvent,
        failed: &Verdict,
        reason: DecisionReason,
    ) -> Verdict {
        let verdict = apply_fallback(
            self.policy.config(),
            event,
            &mut self.tracker,
            &self.delegate,
            failed.replace(Decision::Continue, reason),
            FallbackLaunch::after_failed(failed.reason),
        );
        debug!(reason = ?verdict.reason, decision = verdict.decision.kind(), "Recovered");
        self.execute(event, verdict)
    }

    fn on_launched(&mut self, event: &NavigationEvent) {
        if !event.is_main_frame {
            return;
        }
        if event.should_close_contents_on_launch {
            self.post(DeferredAction::CloseSurface);
        } else {
            self.prune_history();
        }
    }

    /// Drop the entries the launching navigation sequence added.
    fn prune_history(&mut self) {
        let (Some(before), Some(last)) = (
            self.tracker.history_index_before_navigation(),
            self.delegate.last_committed_index(),
        ) else {
            return;
        };
        for index in (before + 1..=last).rev() {
            self.remove_history_entry(index);
        }
    }

    fn remove_history_entry(&self, index: usize) {
        if !self.delegate.remove_history_entry(index) {
            debug!(index, "History entry not removed");
        }
    }

    fn post(&self, action: DeferredAction) {
        debug!(?action, "Deferring");
        self.deferred.post(action);
    }
}
