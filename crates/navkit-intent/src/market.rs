//! Marketplace, dialer and SMS helpers.

use crate::request::{DispatchRequest, ExtraValue, LaunchFlags, CATEGORY_BROWSABLE};
use crate::resolver::ResolvedHandler;
use url::Url;

pub const PLAY_HOSTNAME: &str = "play.google.com";
const PLAY_APP_PATH: &str = "/store/apps/details";
const PLAY_PACKAGE_PARAM: &str = "id";
const PLAY_REFERRER_PARAM: &str = "referrer";

/// Legacy phone dialer scheme.
pub const WTAI_PREFIX: &str = "wtai://wp/";
/// The "make call" function of the legacy dialer scheme.
pub const WTAI_MAKE_CALL_PREFIX: &str = "wtai://wp/mc;";

pub const SMS_SCHEME: &str = "sms";

/// Extra naming the page that asked for the launch.
pub const EXTRA_REFERRER: &str = "android.intent.extra.REFERRER";

/// The package id and referrer of a marketplace listing URL
/// (`https://play.google.com/store/apps/details?id=..&referrer=..`).
pub fn play_store_app_and_referrer(url: &str) -> Option<(String, Option<String>)> {
    let parsed = Url::parse(url).ok()?;
    if parsed.host_str() != Some(PLAY_HOSTNAME) || !parsed.path().starts_with(PLAY_APP_PATH) {
        return None;
    }
    let mut package = None;
    let mut referrer = None;
    for (key, value) in parsed.query_pairs() {
        match key.as_ref() {
            PLAY_PACKAGE_PARAM if package.is_none() => package = Some(value.into_owned()),
            PLAY_REFERRER_PARAM if referrer.is_none() => referrer = Some(value.into_owned()),
            _ => {}
        }
    }
    let package = package.filter(|package| !package.is_empty())?;
    Some((package, referrer.filter(|referrer| !referrer.is_empty())))
}

/// A request opening the marketplace listing of `package`.
///
/// `market_referrer` arrives percent-encoded from the launch URI; it is
/// decoded once and re-encoded as a query value.
pub fn market_request(
    package: &str,
    market_referrer: &str,
    market_package: &str,
    navigation_referrer: Option<&str>,
) -> DispatchRequest {
    let referrer = urlencoding::decode(market_referrer)
        .map(|decoded| decoded.into_owned())
        .unwrap_or_else(|_| market_referrer.to_string());
    let uri = format!(
        "market://details?{PLAY_PACKAGE_PARAM}={}&{PLAY_REFERRER_PARAM}={}",
        urlencoding::encode(package),
        urlencoding::encode(&referrer),
    );

    let mut request = DispatchRequest::view(uri)
        .with_category(CATEGORY_BROWSABLE)
        .with_package(market_package);
    request.flags.insert(LaunchFlags::NEW_TASK);
    if let Some(navigation_referrer) = navigation_referrer {
        request = request.with_extra(
            EXTRA_REFERRER,
            ExtraValue::String(navigation_referrer.to_string()),
        );
    }
    request
}

/// `wtai://wp/mc;<number>` as a VIEW of `tel:<number>`. `None` for any
/// other URL.
pub fn dial_request(url: &str) -> Option<DispatchRequest> {
    let number = url.strip_prefix(WTAI_MAKE_CALL_PREFIX)?;
    Some(DispatchRequest::view(format!("tel:{number}")))
}

pub fn is_wtai(url: &str) -> bool {
    url.starts_with(WTAI_PREFIX)
}

/// Whether `request` is an `sms:` VIEW with no explicit receiver.
pub fn is_unpinned_sms(request: &DispatchRequest) -> bool {
    request.package.is_none() && request.data_scheme().as_deref() == Some(SMS_SCHEME)
}

/// The default SMS package, if it actually resolves the request.
pub fn default_sms_package(
    default_package: Option<&str>,
    handlers: &[ResolvedHandler],
) -> Option<String> {
    let default_package = default_package?;
    handlers
        .iter()
        .any(|handler| handler.package() == default_package)
        .then(|| default_package.to_string())
}
