//! The external-launch payload.

use navkit_core::ResolverIdentity;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::ops::{BitAnd, BitOr, BitOrAssign};

/// Display the data to the user.
pub const ACTION_VIEW: &str = "android.intent.action.VIEW";
/// Start as a main entry point.
pub const ACTION_MAIN: &str = "android.intent.action.MAIN";
/// Dial a number.
pub const ACTION_DIAL: &str = "android.intent.action.DIAL";
/// Receivers that can be safely invoked from a browser.
pub const CATEGORY_BROWSABLE: &str = "android.intent.category.BROWSABLE";

/// Extra carrying the URL to load if no receiver exists.
pub const EXTRA_BROWSER_FALLBACK_URL: &str = "browser_fallback_url";
/// Extra carrying the referrer for the marketplace listing.
pub const EXTRA_MARKET_REFERRER: &str = "market_referrer";

/// Launch flags of a dispatch request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct LaunchFlags(u32);

impl LaunchFlags {
    pub const GRANT_READ_URI_PERMISSION: Self = Self(0x0000_0001);
    pub const GRANT_WRITE_URI_PERMISSION: Self = Self(0x0000_0002);
    pub const EXCLUDE_STOPPED_PACKAGES: Self = Self(0x0000_0010);
    pub const MATCH_EXTERNAL: Self = Self(0x0000_0800);
    pub const LAUNCH_ADJACENT: Self = Self(0x0000_1000);
    pub const RETAIN_IN_RECENTS: Self = Self(0x0000_2000);
    pub const NEW_DOCUMENT: Self = Self(0x0008_0000);
    pub const CLEAR_TOP: Self = Self(0x0400_0000);
    pub const MULTIPLE_TASK: Self = Self(0x0800_0000);
    pub const NEW_TASK: Self = Self(0x1000_0000);
    pub const SINGLE_TOP: Self = Self(0x2000_0000);

    /// Flags that untrusted content may set when starting a receiver.
    pub const ALLOWED: Self = Self(
        Self::EXCLUDE_STOPPED_PACKAGES.0
            | Self::CLEAR_TOP.0
            | Self::SINGLE_TOP.0
            | Self::MATCH_EXTERNAL.0
            | Self::NEW_TASK.0
            | Self::MULTIPLE_TASK.0
            | Self::NEW_DOCUMENT.0
            | Self::RETAIN_IN_RECENTS.0
            | Self::LAUNCH_ADJACENT.0,
    );

    pub const fn empty() -> Self {
        Self(0)
    }

    pub const fn from_bits(bits: u32) -> Self {
        Self(bits)
    }

    pub const fn bits(&self) -> u32 {
        self.0
    }

    pub const fn contains(&self, other: Self) -> bool {
        self.0 & other.0 == other.0
    }

    pub fn insert(&mut self, other: Self) {
        self.0 |= other.0;
    }
}

impl BitOr for LaunchFlags {
    type Output = Self;

    fn bitor(self, rhs: Self) -> Self {
        Self(self.0 | rhs.0)
    }
}

impl BitOrAssign for LaunchFlags {
    fn bitor_assign(&mut self, rhs: Self) {
        self.0 |= rhs.0;
    }
}

impl BitAnd for LaunchFlags {
    type Output = Self;

    fn bitand(self, rhs: Self) -> Self {
        Self(self.0 & rhs.0)
    }
}

/// A typed extra value.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "value", rename_all = "snake_case")]
pub enum ExtraValue {
    String(String),
    Bool(bool),
    Int(i32),
    Long(i64),
    Float(f32),
    Double(f64),
    Short(i16),
    Char(char),
}

impl ExtraValue {
    pub fn as_str(&self) -> Option<&str> {
        match self {
            ExtraValue::String(s) => Some(s),
            _ => None,
        }
    }
}

/// Provenance of the navigation that produced a dispatch, attached for the
/// receiving side.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RequestMetadata {
    pub has_user_gesture: bool,
    pub renderer_initiated: bool,
    pub initiator_origin: Option<String>,
}

/// The embedder-facing payload describing an external-application launch.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct DispatchRequest {
    pub action: Option<String>,
    /// Target URI.
    pub data: Option<String>,
    pub mime_type: Option<String>,
    /// Explicit target application.
    pub package: Option<String>,
    /// Explicit target component. Always cleared by sanitization.
    pub component: Option<ResolverIdentity>,
    pub categories: BTreeSet<String>,
    pub flags: LaunchFlags,
    pub extras: BTreeMap<String, ExtraValue>,
    pub selector: Option<Box<DispatchRequest>>,

    /// Packages of the specialized resolvers seen when the dispatch was
    /// prepared.
    pub specialized_handlers: Vec<String>,
    pub referrer: Option<String>,
    /// Set in private mode so the receiver can warn before loading it.
    pub incognito_url: Option<String>,
    /// The embedder's own package, so a round trip lands in the same surface.
    pub application_id: Option<String>,
    pub create_new_surface: bool,
    pub metadata: Option<RequestMetadata>,
}

impl DispatchRequest {
    /// A VIEW request for the given URI.
    pub fn view(data: impl Into<String>) -> Self {
        Self {
            action: Some(ACTION_VIEW.to_string()),
            data: Some(data.into()),
            ..Default::default()
        }
    }

    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = Some(package.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.categories.insert(category.into());
        self
    }

    pub fn with_extra(mut self, key: impl Into<String>, value: ExtraValue) -> Self {
        self.extras.insert(key.into(), value);
        self
    }

    pub fn is_view(&self) -> bool {
        self.action.as_deref() == Some(ACTION_VIEW)
    }

    /// Lowercased scheme of the data URI, if it has one.
    pub fn data_scheme(&self) -> Option<String> {
        self.data.as_deref().and_then(crate::url_util::scheme_of)
    }

    pub fn string_extra(&self, key: &str) -> Option<&str> {
        self.extras.get(key).and_then(ExtraValue::as_str)
    }

    pub fn fallback_url(&self) -> Option<&str> {
        self.string_extra(EXTRA_BROWSER_FALLBACK_URL)
    }

    pub fn market_referrer(&self) -> Option<&str> {
        self.string_extra(EXTRA_MARKET_REFERRER)
            .filter(|referrer| !referrer.is_empty())
    }

    pub fn remove_extra(&mut self, key: &str) -> Option<ExtraValue> {
        self.extras.remove(key)
    }

    /// Strip everything untrusted content must not control before the
    /// request is used to query resolvers: unsafe flags, explicit components.
    /// Also restricts resolution to browsable receivers.
    pub fn sanitize_for_query(&mut self) {
        self.flags = self.flags & LaunchFlags::ALLOWED;
        self.categories.insert(CATEGORY_BROWSABLE.to_string());
        self.component = None;
        if let Some(selector) = self.selector.as_mut() {
            selector.categories.insert(CATEGORY_BROWSABLE.to_string());
            selector.component = None;
        }
    }

    /// Whether `other` resolves to the same receivers as `self`: the fields
    /// that take part in resolution are identical.
    pub fn resolution_matches(&self, other: &DispatchRequest) -> bool {
        self.action == other.action
            && self.data == other.data
            && self.mime_type == other.mime_type
            && self.package == other.package
            && self.component == other.component
            && self.categories == other.categories
            && match (&self.selector, &other.selector) {
                (None, None) => true,
                (Some(a), Some(b)) => a.resolution_matches(b),
                _ => false,
            }
    }
}
