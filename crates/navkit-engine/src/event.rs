//! Navigation descriptors.

use navkit_core::PageTransition;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// What the embedding surface reports for one navigation attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct NavigationParams {
    pub url: String,
    pub referrer: Option<String>,
    pub transition: PageTransition,
    pub is_redirect: bool,
    pub is_main_frame: bool,
    pub has_user_gesture: bool,
    pub renderer_initiated: bool,
    /// Navigating in a tab that is not shown.
    pub is_background_tab: bool,
    /// The navigation asked for a new surface (e.g. `target=_blank`).
    pub open_in_new_surface: bool,
    pub initiator_origin: Option<String>,
    /// Last user interaction with the surface.
    #[serde(skip)]
    pub last_user_interaction: Option<Instant>,
}

impl Default for NavigationParams {
    fn default() -> Self {
        Self {
            url: String::new(),
            referrer: None,
            transition: PageTransition::default(),
            is_redirect: false,
            is_main_frame: true,
            has_user_gesture: false,
            renderer_initiated: false,
            is_background_tab: false,
            open_in_new_surface: false,
            initiator_origin: None,
            last_user_interaction: None,
        }
    }
}

impl NavigationParams {
    /// A main-frame link navigation to `url`.
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            ..Default::default()
        }
    }

    pub fn with_transition(mut self, transition: PageTransition) -> Self {
        self.transition = transition;
        self
    }

    pub fn with_referrer(mut self, referrer: impl Into<String>) -> Self {
        self.referrer = Some(referrer.into());
        self
    }

    pub fn redirect(mut self) -> Self {
        self.is_redirect = true;
        self
    }

    pub fn with_gesture(mut self) -> Self {
        self.has_user_gesture = true;
        self
    }

    pub fn subframe(mut self) -> Self {
        self.is_main_frame = false;
        self
    }

    pub fn background_tab(mut self) -> Self {
        self.is_background_tab = true;
        self
    }

    pub fn in_new_surface(mut self) -> Self {
        self.open_in_new_surface = true;
        self
    }

    pub fn with_user_interaction(mut self, at: Instant) -> Self {
        self.last_user_interaction = Some(at);
        self
    }
}

/// Immutable description of one navigation attempt, as evaluated by the
/// policy.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct NavigationEvent {
    pub url: String,
    pub referrer: Option<String>,
    pub transition: PageTransition,
    pub is_redirect: bool,
    pub is_main_frame: bool,
    pub has_user_gesture: bool,
    pub renderer_initiated: bool,
    pub incognito: bool,
    pub application_must_be_in_foreground: bool,
    pub is_background_tab: bool,
    pub open_in_new_surface: bool,
    pub initiator_origin: Option<String>,
    /// Close the surface instead of pruning history after a launch.
    pub should_close_contents_on_launch: bool,
    /// Package of the installed web app currently shown in the surface.
    pub web_app_package: Option<String>,
}

impl NavigationEvent {
    pub fn from_params(params: &NavigationParams) -> Self {
        Self {
            url: params.url.clone(),
            referrer: params.referrer.clone(),
            transition: params.transition,
            is_redirect: params.is_redirect,
            is_main_frame: params.is_main_frame,
            has_user_gesture: params.has_user_gesture,
            renderer_initiated: params.renderer_initiated,
            is_background_tab: params.is_background_tab,
            open_in_new_surface: params.open_in_new_surface,
            initiator_origin: params.initiator_origin.clone(),
            ..Default::default()
        }
    }

    pub fn incognito(mut self, incognito: bool) -> Self {
        self.incognito = incognito;
        self
    }

    pub fn must_be_in_foreground(mut self, required: bool) -> Self {
        self.application_must_be_in_foreground = required;
        self
    }

    pub fn close_contents_on_launch(mut self, close: bool) -> Self {
        self.should_close_contents_on_launch = close;
        self
    }

    pub fn in_web_app(mut self, package: Option<String>) -> Self {
        self.web_app_package = package;
        self
    }

    /// Typed (or from the address bar), redirecting somewhere the surface
    /// cannot render.
    pub fn is_typed_redirect_to_external_protocol(&self, is_external_protocol: bool) -> bool {
        self.transition.is_typed() && self.is_redirect && is_external_protocol
    }

    pub fn is_redirect_from_form_submit(&self) -> bool {
        self.transition.is_form_submit() && self.is_redirect
    }

    /// An ordinary link, not handed over by another application.
    pub fn is_link_not_from_external_app(&self) -> bool {
        self.transition.is_link() && !self.transition.from_external_app
    }
}

impl From<NavigationParams> for NavigationEvent {
    fn from(params: NavigationParams) -> Self {
        Self::from_params(&params)
    }
}
