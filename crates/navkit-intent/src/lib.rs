//! # NavKit Intent
//!
//! The abstract external-launch payload ([`DispatchRequest`]) and everything
//! needed to build it safely from a navigation URL:
//!
//! - parsing `intent:` and `android-app:` launch URIs ([`parse`])
//! - sanitizing requests before resolver queries
//! - classifying resolvers as specialized or generic ([`resolver`])
//! - marketplace, dialer and SMS helpers ([`market`])
//! - URL predicates used by the policy guards ([`url_util`])

pub mod market;
pub mod parse;
pub mod request;
pub mod resolver;
pub mod url_util;

pub use parse::{parse_uri, IntentParseError};
pub use request::{
    DispatchRequest, ExtraValue, LaunchFlags, RequestMetadata, ACTION_DIAL, ACTION_MAIN,
    ACTION_VIEW, CATEGORY_BROWSABLE, EXTRA_BROWSER_FALLBACK_URL, EXTRA_MARKET_REFERRER,
};
pub use resolver::{specialized_handlers, HandlerFilter, ResolvedHandler, ResolverSet};
