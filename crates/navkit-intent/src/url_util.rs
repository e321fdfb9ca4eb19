//! URL predicates shared by the policy guards.
//!
//! These work on raw strings: navigation targets are frequently not valid
//! URLs (`intent:` fragments, legacy schemes), and a failed parse must never
//! turn into a launch.

use url::Url;

/// Schemes the browsing surface handles itself.
pub const ACCEPTED_SCHEMES: &[&str] = &[
    "about",
    "data",
    "file",
    "http",
    "https",
    "inline",
    "javascript",
];

/// Internal pages that never leave the browser.
pub const INTERNAL_SCHEME_PREFIXES: &[&str] =
    &["about:", "chrome:", "chrome-native:", "devtools:"];

pub const CONTENT_SCHEME_PREFIX: &str = "content:";
pub const FILE_SCHEME_PREFIX: &str = "file:";
pub const INTENT_SCHEME_PREFIX: &str = "intent:";
pub const APP_SCHEME_PREFIX: &str = "android-app:";
pub const INTERNAL_PAGE_PREFIX: &str = "chrome://";
pub const SEARCH_RESULTS_HOST: &str = "www.google.com";

const PDF_EXTENSION: &str = "pdf";
const YOUTUBE_HOST: &str = "youtube.com";
const PAIRING_CODE_PARAM: &str = "pairingCode";

/// The lowercased scheme of `uri`, if it starts with a syntactically valid
/// one (`ALPHA *( ALPHA / DIGIT / "+" / "-" / "." ) ":"`).
pub fn scheme_of(uri: &str) -> Option<String> {
    let colon = uri.find(':')?;
    let scheme = &uri[..colon];
    let mut chars = scheme.chars();
    let first = chars.next()?;
    if !first.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '+' | '-' | '.')) {
        return None;
    }
    Some(scheme.to_ascii_lowercase())
}

/// Whether the browsing surface can load `url` without outside help.
pub fn is_accepted_scheme(url: &str) -> bool {
    scheme_of(url).is_some_and(|scheme| ACCEPTED_SCHEMES.contains(&scheme.as_str()))
}

/// Only web URLs may replace a navigation.
pub fn is_valid_for_fallback_navigation(url: &str) -> bool {
    matches!(scheme_of(url).as_deref(), Some("http" | "https"))
}

pub fn is_http_or_https(url: &str) -> bool {
    is_valid_for_fallback_navigation(url)
}

/// Whether `url` starts with an `intent:` or `android-app:` scheme.
pub fn has_intent_scheme(url: &str) -> bool {
    starts_with_ignore_case(url, INTENT_SCHEME_PREFIX)
        || starts_with_ignore_case(url, APP_SCHEME_PREFIX)
}

pub fn is_internal_scheme(url: &str) -> bool {
    INTERNAL_SCHEME_PREFIXES
        .iter()
        .any(|prefix| starts_with_ignore_case(url, prefix))
}

pub fn is_internal_page(url: &str) -> bool {
    starts_with_ignore_case(url, INTERNAL_PAGE_PREFIX)
}

pub fn is_content_scheme(url: &str) -> bool {
    starts_with_ignore_case(url, CONTENT_SCHEME_PREFIX)
}

pub fn is_file_scheme(url: &str) -> bool {
    starts_with_ignore_case(url, FILE_SCHEME_PREFIX)
}

/// A PDF download the browser renders itself.
pub fn is_pdf_download(url: &str) -> bool {
    path_extension(url).is_some_and(|extension| extension == PDF_EXTENSION)
}

/// TV pairing links carry a `pairingCode` but are meant for the web page,
/// not the video app.
pub fn is_youtube_pairing_code(url: &str) -> bool {
    let Ok(parsed) = Url::parse(url) else {
        return false;
    };
    if !matches!(parsed.scheme(), "http" | "https") {
        return false;
    }
    let Some(host) = parsed.host_str() else {
        return false;
    };
    if host != YOUTUBE_HOST && !host.ends_with(".youtube.com") {
        return false;
    }
    parsed
        .query_pairs()
        .any(|(key, value)| key == PAIRING_CODE_PARAM && !value.is_empty())
}

/// Lowercased host of `url`, if it parses and has one.
pub fn host_of(url: &str) -> Option<String> {
    Url::parse(url)
        .ok()
        .and_then(|parsed| parsed.host_str().map(str::to_ascii_lowercase))
}

/// Whether `referrer` is the search results page.
pub fn is_search_results_referrer(referrer: Option<&str>) -> bool {
    referrer
        .and_then(host_of)
        .is_some_and(|host| host == SEARCH_RESULTS_HOST)
}

/// The extension of the final path segment, lowercased.
pub fn path_extension(url: &str) -> Option<String> {
    let parsed = Url::parse(url).ok()?;
    let last = parsed.path_segments()?.next_back()?;
    let (_, extension) = last.rsplit_once('.')?;
    Some(extension.to_ascii_lowercase())
}

fn starts_with_ignore_case(haystack: &str, prefix: &str) -> bool {
    haystack
        .get(..prefix.len())
        .is_some_and(|head| head.eq_ignore_ascii_case(prefix))
}
