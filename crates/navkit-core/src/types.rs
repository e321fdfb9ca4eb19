//! Common types used throughout NavKit

use serde::{Deserialize, Serialize};
use std::fmt;

/// Unique identifier for a browsing surface (a tab or an equivalent unit of
/// browsing context).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SurfaceId(pub u64);

impl SurfaceId {
    pub fn new() -> Self {
        use std::sync::atomic::{AtomicU64, Ordering};
        static COUNTER: AtomicU64 = AtomicU64::new(0);
        Self(COUNTER.fetch_add(1, Ordering::Relaxed))
    }
}

impl Default for SurfaceId {
    fn default() -> Self {
        Self::new()
    }
}

/// Core transition kind of a navigation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransitionKind {
    /// The user followed a link.
    #[default]
    Link,
    /// The user typed the URL (or picked a suggestion) in the address bar.
    Typed,
    /// A form was submitted.
    FormSubmit,
    /// The page was reloaded.
    Reload,
    /// A subframe navigation the user did not request (e.g. an ad frame).
    AutoSubframe,
    /// A top-level navigation the user did not request.
    AutoToplevel,
    /// Anything else (bookmarks, generated, keyword, ...).
    Other,
}

/// How a navigation came about: the core kind plus qualifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct PageTransition {
    pub kind: TransitionKind,
    /// Back/forward through session history.
    pub forward_back: bool,
    /// The navigation was launched by an external application's request.
    pub from_external_app: bool,
    /// The navigation came from the address bar.
    pub from_address_bar: bool,
}

impl PageTransition {
    pub fn new(kind: TransitionKind) -> Self {
        Self {
            kind,
            ..Default::default()
        }
    }

    pub fn link() -> Self {
        Self::new(TransitionKind::Link)
    }

    pub fn typed() -> Self {
        Self::new(TransitionKind::Typed)
    }

    pub fn form_submit() -> Self {
        Self::new(TransitionKind::FormSubmit)
    }

    pub fn reload() -> Self {
        Self::new(TransitionKind::Reload)
    }

    /// A link navigation handed to us by another application.
    pub fn from_external_app() -> Self {
        Self::link().with_from_external_app()
    }

    pub fn with_forward_back(mut self) -> Self {
        self.forward_back = true;
        self
    }

    pub fn with_from_external_app(mut self) -> Self {
        self.from_external_app = true;
        self
    }

    pub fn with_from_address_bar(mut self) -> Self {
        self.from_address_bar = true;
        self
    }

    pub fn is_link(&self) -> bool {
        self.kind == TransitionKind::Link
    }

    pub fn is_form_submit(&self) -> bool {
        self.kind == TransitionKind::FormSubmit
    }

    /// Typed in, or otherwise originating from the address bar.
    pub fn is_typed(&self) -> bool {
        self.kind == TransitionKind::Typed || self.from_address_bar
    }

    /// A link handed over by another application.
    pub fn is_link_from_external_app(&self) -> bool {
        self.is_link() && self.from_external_app
    }
}

/// Identity of an installed application component able to handle a launch
/// request.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct ResolverIdentity {
    pub package: String,
    pub component: String,
}

impl ResolverIdentity {
    pub fn new(package: impl Into<String>, component: impl Into<String>) -> Self {
        Self {
            package: package.into(),
            component: component.into(),
        }
    }
}

impl fmt::Display for ResolverIdentity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.package, self.component)
    }
}
