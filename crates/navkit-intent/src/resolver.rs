//! Resolver query results and their classification.

use navkit_core::ResolverIdentity;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// The scope an installed handler declared for the request it matched.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct HandlerFilter {
    /// Host authorities; `*` is a wildcard.
    pub hosts: Vec<String>,
    /// Path patterns.
    pub paths: Vec<String>,
}

impl HandlerFilter {
    pub fn for_host(host: impl Into<String>) -> Self {
        Self {
            hosts: vec![host.into()],
            paths: Vec::new(),
        }
    }

    pub fn wildcard() -> Self {
        Self::for_host("*")
    }

    /// Scoped to specific hosts or paths rather than every URL of a scheme.
    pub fn is_narrow(&self) -> bool {
        if self.hosts.is_empty() && self.paths.is_empty() {
            return false;
        }
        !self.hosts.iter().any(|host| host == "*")
    }
}

/// One entry of a resolver query answer.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResolvedHandler {
    pub identity: ResolverIdentity,
    #[serde(default)]
    pub filter: Option<HandlerFilter>,
    /// The platform's instant-app resolver.
    #[serde(default)]
    pub is_instant_app: bool,
}

impl ResolvedHandler {
    pub fn new(identity: ResolverIdentity) -> Self {
        Self {
            identity,
            filter: None,
            is_instant_app: false,
        }
    }

    /// A handler declaring a narrow filter.
    pub fn specialized(package: &str, host: &str) -> Self {
        Self {
            identity: ResolverIdentity::new(package, format!("{package}.Main")),
            filter: Some(HandlerFilter::for_host(host)),
            is_instant_app: false,
        }
    }

    /// A handler matching every URL of its scheme.
    pub fn generic(package: &str) -> Self {
        Self {
            identity: ResolverIdentity::new(package, format!("{package}.Main")),
            filter: Some(HandlerFilter::wildcard()),
            is_instant_app: false,
        }
    }

    pub fn with_instant_app(mut self) -> Self {
        self.is_instant_app = true;
        self
    }

    pub fn package(&self) -> &str {
        &self.identity.package
    }

    /// Whether this handler is narrowly scoped. With `filter_package`, only
    /// handlers of that package can qualify.
    pub fn is_specialized(&self, filter_package: Option<&str>) -> bool {
        if !self.filter.as_ref().is_some_and(HandlerFilter::is_narrow) {
            return false;
        }
        filter_package
            .filter(|package| !package.is_empty())
            .is_none_or(|package| package == self.package())
    }
}

/// Packages of the specialized handlers in `handlers`, one entry per
/// handler.
///
/// When the embedder launches instant apps itself, the instant-app resolver
/// is never counted.
pub fn specialized_handlers(
    handlers: &[ResolvedHandler],
    filter_package: Option<&str>,
    handles_instant_apps_internally: bool,
) -> Vec<String> {
    handlers
        .iter()
        .filter(|handler| !(handles_instant_apps_internally && handler.is_instant_app))
        .filter(|handler| handler.is_specialized(filter_package))
        .map(|handler| handler.package().to_string())
        .collect()
}

/// A set of resolver identities, used for containment checks across
/// navigations.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ResolverSet(BTreeSet<ResolverIdentity>);

impl ResolverSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_handlers(handlers: &[ResolvedHandler]) -> Self {
        handlers.iter().map(|handler| handler.identity.clone()).collect()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn contains(&self, identity: &ResolverIdentity) -> bool {
        self.0.contains(identity)
    }

    pub fn contains_package(&self, package: &str) -> bool {
        self.0.iter().any(|identity| identity.package == package)
    }

    /// Whether every identity of `self` is also in `other`.
    pub fn is_subset_of(&self, other: &ResolverSet) -> bool {
        self.0.is_subset(&other.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = &ResolverIdentity> {
        self.0.iter()
    }
}

impl FromIterator<ResolverIdentity> for ResolverSet {
    fn from_iter<I: IntoIterator<Item = ResolverIdentity>>(iter: I) -> Self {
        Self(iter.into_iter().collect())
    }
}
