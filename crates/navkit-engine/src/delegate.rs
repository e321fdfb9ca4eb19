//! The capability surface the embedder provides.

use crate::error::DispatchError;
use crate::event::NavigationEvent;
use navkit_core::NavKitResult;
use navkit_intent::{DispatchRequest, ResolvedHandler};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};

/// Identifier of a pending asynchronous prompt.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PromptId(u64);

impl PromptId {
    pub fn new() -> Self {
        static COUNTER: AtomicU64 = AtomicU64::new(1);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }

    pub fn raw(&self) -> u64 {
        self.0
    }
}

impl Default for PromptId {
    fn default() -> Self {
        Self::new()
    }
}

/// Result of a dispatch that did not fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchOutcome {
    /// Another application was started.
    Launched,
    /// The only receiver was the embedder itself; nothing was started.
    HandledInternally,
}

/// Everything the interception engine needs from the embedding browser.
///
/// Queries must not block. The prompt hooks return as soon as the prompt is
/// shown; the answer comes back through
/// [`InterceptGateway::resolve_prompt`](crate::InterceptGateway::resolve_prompt).
pub trait NavigationDelegate {
    /// Installed applications able to handle `request`.
    fn resolve_handlers(&self, request: &DispatchRequest) -> Vec<ResolvedHandler>;

    /// Start the receiver of `request`. `proxy` routes it through the
    /// authenticated instant-app proxy.
    fn dispatch(
        &self,
        request: &DispatchRequest,
        proxy: bool,
    ) -> Result<DispatchOutcome, DispatchError>;

    fn is_foreground(&self) -> bool {
        true
    }

    fn is_incognito(&self) -> bool {
        false
    }

    fn has_valid_surface(&self) -> bool {
        true
    }

    /// Load `url` in the current surface.
    fn load_url(&self, url: &str, referrer: Option<&str>);

    fn load_url_in_new_surface(&self, _url: &str, _incognito: bool) {}

    fn close_surface(&self);

    fn can_load_url_in_current_surface(&self) -> bool {
        true
    }

    fn supports_creating_new_surfaces(&self) -> bool {
        false
    }

    /// Show the "leaving private mode" warning.
    fn confirm_incognito_launch(
        &self,
        prompt: PromptId,
        request: &DispatchRequest,
    ) -> NavKitResult<()>;

    /// Ask for read access to shared storage.
    fn request_storage_access(&self, prompt: PromptId) -> NavKitResult<()>;

    fn has_storage_permission(&self) -> bool {
        true
    }

    fn can_request_storage_permission(&self) -> bool {
        false
    }

    /// Whether the embedder itself would handle `request`.
    fn is_same_application(&self, request: &DispatchRequest) -> bool;

    /// Whether `request` leads back to the application that opened this
    /// surface.
    fn is_trusted_calling_application(&self, _request: &DispatchRequest) -> bool {
        false
    }

    /// Embedder policy switching external requests off for `url`.
    fn should_disable_external_requests_for_url(&self, _url: &str) -> bool {
        false
    }

    /// Whether `request` belongs to an integration that handles it out of
    /// band (an assistant or automation flow).
    fn is_delegated_request(&self, _request: &DispatchRequest) -> bool {
        false
    }

    /// Hand a delegated request over. Returns whether it was taken.
    fn handle_delegated_request(
        &self,
        _event: &NavigationEvent,
        _request: &DispatchRequest,
        _fallback_url: Option<&str>,
    ) -> bool {
        false
    }

    fn is_instant_app_request(&self, _request: &DispatchRequest) -> bool {
        false
    }

    /// The launch request of an instant app able to show `url`, if any.
    fn instant_app_request(
        &self,
        _url: &str,
        _referrer: Option<&str>,
        _is_redirect: bool,
        _is_search_results_referrer: bool,
    ) -> Option<DispatchRequest> {
        None
    }

    /// Last committed URL of the surface.
    fn last_committed_url(&self) -> Option<String> {
        None
    }

    /// Index of the last committed history entry; `None` when nothing
    /// committed yet.
    fn last_committed_index(&self) -> Option<usize> {
        None
    }

    fn remove_history_entry(&self, _index: usize) -> bool {
        false
    }

    fn default_sms_package(&self) -> Option<String> {
        None
    }

    /// Whether `package` is a valid installed web app.
    fn is_valid_web_app(&self, _package: &str) -> bool {
        false
    }

    /// Package of the installed web app shown in this surface, if any.
    fn web_app_package(&self) -> Option<String> {
        None
    }
}
