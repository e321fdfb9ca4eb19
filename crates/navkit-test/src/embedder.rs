//! # Mock Embedder
//!
//! A scripted [`NavigationDelegate`] that records every side effect, for
//! driving the gateway without a browser.

use navkit_core::{NavKitError, NavKitResult};
use navkit_engine::{DispatchError, DispatchOutcome, NavigationDelegate, NavigationEvent, PromptId};
use navkit_intent::{url_util, DispatchRequest, ResolvedHandler};
use serde::{Deserialize, Serialize};
use std::cell::RefCell;

/// Package identity the mock uses for the browser itself.
pub const BROWSER_PACKAGE: &str = "org.navkit.browser";

/// Handlers answered for requests whose data starts with `prefix`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HandlerRule {
    pub prefix: String,
    pub handlers: Vec<ResolvedHandler>,
}

/// Everything about the environment a scenario can script.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EmbedderProfile {
    pub application_package: String,
    pub handlers: Vec<HandlerRule>,
    pub incognito: bool,
    pub foreground: bool,
    pub has_valid_surface: bool,
    pub can_load_in_current_surface: bool,
    pub supports_new_surfaces: bool,
    pub storage_permission: bool,
    pub can_request_storage_permission: bool,
    /// Packages counted as the application that opened the surface.
    pub trusted_calling_packages: Vec<String>,
    /// URL prefixes the embedder disables external requests for.
    pub disabled_url_prefixes: Vec<String>,
    /// URL prefixes owned by a delegated integration.
    pub delegated_url_prefixes: Vec<String>,
    /// Hosts an instant app can show.
    pub instant_app_hosts: Vec<String>,
    /// Packages that are instant apps when addressed directly.
    pub instant_app_packages: Vec<String>,
    pub web_apps: Vec<String>,
    pub web_app_package: Option<String>,
    pub default_sms_package: Option<String>,
    /// Data or package prefixes whose dispatch fails.
    pub dispatch_failures: Vec<String>,
    /// Data or package prefixes the platform refuses to launch.
    pub dispatch_rejections: Vec<String>,
    pub prompts_unavailable: bool,
    /// Committed history entries, oldest first.
    pub history: Vec<String>,
}

impl Default for EmbedderProfile {
    fn default() -> Self {
        Self {
            application_package: BROWSER_PACKAGE.to_string(),
            handlers: Vec::new(),
            incognito: false,
            foreground: true,
            has_valid_surface: true,
            can_load_in_current_surface: true,
            supports_new_surfaces: false,
            storage_permission: true,
            can_request_storage_permission: false,
            trusted_calling_packages: Vec::new(),
            disabled_url_prefixes: Vec::new(),
            delegated_url_prefixes: Vec::new(),
            instant_app_hosts: Vec::new(),
            instant_app_packages: Vec::new(),
            web_apps: Vec::new(),
            web_app_package: None,
            default_sms_package: None,
            dispatch_failures: Vec::new(),
            dispatch_rejections: Vec::new(),
            prompts_unavailable: false,
            history: Vec::new(),
        }
    }
}

impl EmbedderProfile {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn resolve(mut self, prefix: &str, handlers: Vec<ResolvedHandler>) -> Self {
        self.handlers.push(HandlerRule {
            prefix: prefix.to_string(),
            handlers,
        });
        self
    }

    /// The marketplace resolves `market://` requests.
    pub fn with_marketplace(self) -> Self {
        self.resolve(
            "market://",
            vec![ResolvedHandler::generic("com.android.vending")],
        )
    }

    pub fn incognito(mut self) -> Self {
        self.incognito = true;
        self
    }

    pub fn with_history(mut self, urls: &[&str]) -> Self {
        self.history = urls.iter().map(|url| url.to_string()).collect();
        self
    }

    pub fn failing_dispatch(mut self, prefix: &str) -> Self {
        self.dispatch_failures.push(prefix.to_string());
        self
    }

    pub fn rejecting_dispatch(mut self, prefix: &str) -> Self {
        self.dispatch_rejections.push(prefix.to_string());
        self
    }
}

/// One recorded side effect.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum EmbedderCall {
    Dispatch {
        data: Option<String>,
        package: Option<String>,
        proxy: bool,
    },
    LoadUrl {
        url: String,
        referrer: Option<String>,
    },
    LoadUrlInNewSurface {
        url: String,
        incognito: bool,
    },
    CloseSurface,
    ConfirmIncognito {
        prompt: u64,
        data: Option<String>,
    },
    RequestStorageAccess {
        prompt: u64,
    },
    RemoveHistoryEntry {
        index: usize,
    },
    Delegated {
        url: String,
    },
}

/// Recording [`NavigationDelegate`].
#[derive(Debug, Default)]
pub struct MockEmbedder {
    profile: EmbedderProfile,
    history: RefCell<Vec<String>>,
    calls: RefCell<Vec<EmbedderCall>>,
    dispatched: RefCell<Vec<DispatchRequest>>,
}

impl MockEmbedder {
    pub fn new(profile: EmbedderProfile) -> Self {
        let history = RefCell::new(profile.history.clone());
        Self {
            profile,
            history,
            calls: RefCell::new(Vec::new()),
            dispatched: RefCell::new(Vec::new()),
        }
    }

    pub fn profile(&self) -> &EmbedderProfile {
        &self.profile
    }

    /// A navigation to `url` committed.
    pub fn commit(&self, url: &str) {
        self.history.borrow_mut().push(url.to_string());
    }

    pub fn history(&self) -> Vec<String> {
        self.history.borrow().clone()
    }

    pub fn calls(&self) -> Vec<EmbedderCall> {
        self.calls.borrow().clone()
    }

    pub fn take_calls(&self) -> Vec<EmbedderCall> {
        self.calls.borrow_mut().drain(..).collect()
    }

    /// Requests that were actually launched.
    pub fn dispatched(&self) -> Vec<DispatchRequest> {
        self.dispatched.borrow().clone()
    }

    pub fn closed(&self) -> bool {
        self.calls
            .borrow()
            .iter()
            .any(|call| matches!(call, EmbedderCall::CloseSurface))
    }

    pub fn loaded_urls(&self) -> Vec<String> {
        self.calls
            .borrow()
            .iter()
            .filter_map(|call| match call {
                EmbedderCall::LoadUrl { url, .. } => Some(url.clone()),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: EmbedderCall) {
        self.calls.borrow_mut().push(call);
    }

    fn matches_prefix(prefixes: &[String], value: Option<&str>) -> bool {
        value.is_some_and(|value| prefixes.iter().any(|prefix| value.starts_with(prefix.as_str())))
    }
}

impl NavigationDelegate for MockEmbedder {
    fn resolve_handlers(&self, request: &DispatchRequest) -> Vec<ResolvedHandler> {
        let Some(data) = request.data.as_deref() else {
            return Vec::new();
        };
        let Some(rule) = self
            .profile
            .handlers
            .iter()
            .find(|rule| !rule.prefix.is_empty() && data.starts_with(rule.prefix.as_str()))
        else {
            return Vec::new();
        };
        // An explicit package narrows resolution to that package.
        rule.handlers
            .iter()
            .filter(|handler| {
                request
                    .package
                    .as_deref()
                    .is_none_or(|package| handler.package() == package)
            })
            .cloned()
            .collect()
    }

    fn dispatch(
        &self,
        request: &DispatchRequest,
        proxy: bool,
    ) -> Result<DispatchOutcome, DispatchError> {
        self.record(EmbedderCall::Dispatch {
            data: request.data.clone(),
            package: request.package.clone(),
            proxy,
        });
        let failures = &self.profile.dispatch_failures;
        if Self::matches_prefix(failures, request.data.as_deref())
            || Self::matches_prefix(failures, request.package.as_deref())
        {
            return Err(DispatchError::receiver_vanished(
                request.data.clone().unwrap_or_default(),
            ));
        }
        let rejections = &self.profile.dispatch_rejections;
        if Self::matches_prefix(rejections, request.data.as_deref())
            || Self::matches_prefix(rejections, request.package.as_deref())
        {
            return Err(DispatchError::security_rejected(
                request.package.clone().unwrap_or_default(),
            ));
        }
        if self.is_same_application(request) {
            return Ok(DispatchOutcome::HandledInternally);
        }
        self.dispatched.borrow_mut().push(request.clone());
        Ok(DispatchOutcome::Launched)
    }

    fn is_foreground(&self) -> bool {
        self.profile.foreground
    }

    fn is_incognito(&self) -> bool {
        self.profile.incognito
    }

    fn has_valid_surface(&self) -> bool {
        self.profile.has_valid_surface
    }

    fn load_url(&self, url: &str, referrer: Option<&str>) {
        self.record(EmbedderCall::LoadUrl {
            url: url.to_string(),
            referrer: referrer.map(str::to_string),
        });
    }

    fn load_url_in_new_surface(&self, url: &str, incognito: bool) {
        self.record(EmbedderCall::LoadUrlInNewSurface {
            url: url.to_string(),
            incognito,
        });
    }

    fn close_surface(&self) {
        self.record(EmbedderCall::CloseSurface);
    }

    fn can_load_url_in_current_surface(&self) -> bool {
        self.profile.can_load_in_current_surface
    }

    fn supports_creating_new_surfaces(&self) -> bool {
        self.profile.supports_new_surfaces
    }

    fn confirm_incognito_launch(
        &self,
        prompt: PromptId,
        request: &DispatchRequest,
    ) -> NavKitResult<()> {
        if self.profile.prompts_unavailable {
            return Err(NavKitError::presentation("no window for the prompt"));
        }
        self.record(EmbedderCall::ConfirmIncognito {
            prompt: prompt.raw(),
            data: request.data.clone(),
        });
        Ok(())
    }

    fn request_storage_access(&self, prompt: PromptId) -> NavKitResult<()> {
        if self.profile.prompts_unavailable {
            return Err(NavKitError::presentation("no window for the prompt"));
        }
        self.record(EmbedderCall::RequestStorageAccess {
            prompt: prompt.raw(),
        });
        Ok(())
    }

    fn has_storage_permission(&self) -> bool {
        self.profile.storage_permission
    }

    fn can_request_storage_permission(&self) -> bool {
        self.profile.can_request_storage_permission
    }

    fn is_same_application(&self, request: &DispatchRequest) -> bool {
        let own = self.profile.application_package.as_str();
        request.package.as_deref() == Some(own)
            || request
                .component
                .as_ref()
                .is_some_and(|component| component.package == own)
    }

    fn is_trusted_calling_application(&self, request: &DispatchRequest) -> bool {
        let handlers = self.resolve_handlers(request);
        handlers.iter().any(|handler| {
            self.profile
                .trusted_calling_packages
                .iter()
                .any(|package| package == handler.package())
        })
    }

    fn should_disable_external_requests_for_url(&self, url: &str) -> bool {
        Self::matches_prefix(&self.profile.disabled_url_prefixes, Some(url))
    }

    fn is_delegated_request(&self, request: &DispatchRequest) -> bool {
        Self::matches_prefix(&self.profile.delegated_url_prefixes, request.data.as_deref())
    }

    fn handle_delegated_request(
        &self,
        event: &NavigationEvent,
        _request: &DispatchRequest,
        _fallback_url: Option<&str>,
    ) -> bool {
        self.record(EmbedderCall::Delegated {
            url: event.url.clone(),
        });
        true
    }

    fn is_instant_app_request(&self, request: &DispatchRequest) -> bool {
        request.package.as_deref().is_some_and(|package| {
            self.profile
                .instant_app_packages
                .iter()
                .any(|instant| instant == package)
        })
    }

    fn instant_app_request(
        &self,
        url: &str,
        _referrer: Option<&str>,
        _is_redirect: bool,
        _is_search_results_referrer: bool,
    ) -> Option<DispatchRequest> {
        let host = url_util::host_of(url)?;
        self.profile
            .instant_app_hosts
            .iter()
            .any(|instant| *instant == host)
            .then(|| DispatchRequest::view(url).with_package(format!("instant.{host}")))
    }

    fn last_committed_url(&self) -> Option<String> {
        self.history.borrow().last().cloned()
    }

    fn last_committed_index(&self) -> Option<usize> {
        self.history.borrow().len().checked_sub(1)
    }

    fn remove_history_entry(&self, index: usize) -> bool {
        self.record(EmbedderCall::RemoveHistoryEntry { index });
        let mut history = self.history.borrow_mut();
        if index >= history.len() {
            return false;
        }
        history.remove(index);
        true
    }

    fn default_sms_package(&self) -> Option<String> {
        self.profile.default_sms_package.clone()
    }

    fn is_valid_web_app(&self, package: &str) -> bool {
        self.profile.web_apps.iter().any(|web_app| web_app == package)
    }

    fn web_app_package(&self) -> Option<String> {
        self.profile.web_app_package.clone()
    }
}
