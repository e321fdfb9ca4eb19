//! Parsing of navigation URLs into dispatch requests.
//!
//! Supported forms:
//!
//! - any ordinary URL: a VIEW request of the URL itself
//! - `intent:<data>#Intent;key=value;...;end`
//! - `android-app://<package>[/<scheme>/<host>[/<path>]][#Intent;...;end]`
//!
//! Anything malformed is an error; callers treat errors as "do not
//! intercept".

use crate::request::{DispatchRequest, ExtraValue, LaunchFlags, ACTION_MAIN, ACTION_VIEW};
use navkit_core::ResolverIdentity;
use thiserror::Error;
use tracing::trace;

const INTENT_SCHEME_PREFIX: &str = "intent:";
const APP_SCHEME_PREFIX: &str = "android-app:";
const FRAGMENT_MARKER: &str = "#Intent;";

/// Reasons a launch URI is rejected.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum IntentParseError {
    #[error("launch URI is missing its `end` terminator")]
    MissingEnd,

    #[error("malformed segment `{0}`")]
    MalformedSegment(String),

    #[error("invalid launch flags `{0}`")]
    BadFlags(String),

    #[error("invalid component `{0}`")]
    BadComponent(String),

    #[error("invalid extra `{key}`: {reason}")]
    BadExtra { key: String, reason: String },

    #[error("invalid percent-encoding in `{0}`")]
    BadEncoding(String),

    #[error("android-app URI has no package")]
    MissingPackage,
}

/// Parse a navigation URL into a dispatch request.
pub fn parse_uri(uri: &str) -> Result<DispatchRequest, IntentParseError> {
    let is_intent = uri.starts_with(INTENT_SCHEME_PREFIX);
    let is_app = uri.starts_with(APP_SCHEME_PREFIX);
    if !is_intent && !is_app {
        return Ok(DispatchRequest::view(uri));
    }

    let fragment_at = uri.rfind('#');
    let has_intent_fragment = fragment_at.is_some_and(|at| uri[at..].starts_with(FRAGMENT_MARKER));
    if is_intent && !has_intent_fragment {
        // A bare `intent:` URL is just a VIEW of itself.
        return Ok(DispatchRequest::view(uri));
    }

    let mut request = DispatchRequest::default();
    let mut scheme = None;
    let data_end = match fragment_at {
        Some(at) if has_intent_fragment => {
            let fields = &uri[at + FRAGMENT_MARKER.len()..];
            scheme = parse_fields(fields, &mut request)?;
            at
        }
        _ => uri.len(),
    };

    let data = &uri[..data_end];
    if is_intent {
        let mut data = data[INTENT_SCHEME_PREFIX.len()..].to_string();
        if let Some(scheme) = scheme {
            data = format!("{scheme}:{data}");
        }
        if !data.is_empty() {
            request.data = Some(data);
        }
        if request.action.is_none() {
            request.action = Some(ACTION_VIEW.to_string());
        }
    } else {
        apply_app_uri(&data[APP_SCHEME_PREFIX.len()..], &mut request)?;
    }

    trace!(data = ?request.data, package = ?request.package, "Parsed launch URI");
    Ok(request)
}

/// Parse the `key=value;` list after `#Intent;`. Returns the `scheme=`
/// value of the base request, if present.
fn parse_fields(
    fields: &str,
    base: &mut DispatchRequest,
) -> Result<Option<String>, IntentParseError> {
    let mut scheme = None;
    let mut selector: Option<DispatchRequest> = None;
    let mut rest = fields;

    loop {
        if rest.starts_with("end") {
            break;
        }
        let semi = rest.find(';').ok_or(IntentParseError::MissingEnd)?;
        let segment = &rest[..semi];
        rest = &rest[semi + 1..];

        if segment == "SEL" {
            selector.get_or_insert_with(DispatchRequest::default);
            continue;
        }

        let in_selector = selector.is_some();
        let target = match selector.as_mut() {
            Some(selector) => selector,
            None => &mut *base,
        };

        let (key, raw_value) = segment
            .split_once('=')
            .ok_or_else(|| IntentParseError::MalformedSegment(segment.to_string()))?;
        let value = decode(raw_value)?;

        match key {
            "action" => target.action = Some(value),
            "category" => {
                target.categories.insert(value);
            }
            "type" => target.mime_type = Some(value),
            "launchFlags" => target.flags = parse_flags(&value)?,
            "package" => target.package = Some(value),
            "component" => target.component = Some(parse_component(&value)?),
            "scheme" => {
                if in_selector {
                    target.data = Some(format!("{value}:"));
                } else {
                    scheme = Some(value);
                }
            }
            "sourceBounds" => {}
            _ => {
                let (extra_key, extra) = parse_extra(key, value)?;
                target.extras.insert(extra_key, extra);
            }
        }
    }

    if let Some(selector) = selector {
        // An explicit package already pins the receiver; the selector is
        // dropped in that case.
        if base.package.is_none() {
            base.selector = Some(Box::new(selector));
        }
    }
    Ok(scheme)
}

fn apply_app_uri(rest: &str, request: &mut DispatchRequest) -> Result<(), IntentParseError> {
    let rest = rest
        .strip_prefix("//")
        .ok_or_else(|| IntentParseError::MalformedSegment(rest.to_string()))?;
    let mut parts = rest.splitn(3, '/');
    let package = parts.next().unwrap_or_default();
    if package.is_empty() {
        return Err(IntentParseError::MissingPackage);
    }
    request.package = Some(package.to_string());

    match parts.next().filter(|s| !s.is_empty()) {
        Some(scheme) => {
            let remainder = parts.next().unwrap_or_default();
            request.data = Some(format!("{scheme}://{remainder}"));
            if request.action.is_none() {
                request.action = Some(ACTION_VIEW.to_string());
            }
        }
        None => {
            if request.action.is_none() {
                request.action = Some(ACTION_MAIN.to_string());
            }
        }
    }
    Ok(())
}

fn decode(raw: &str) -> Result<String, IntentParseError> {
    urlencoding::decode(raw)
        .map(|decoded| decoded.into_owned())
        .map_err(|_| IntentParseError::BadEncoding(raw.to_string()))
}

fn parse_flags(value: &str) -> Result<LaunchFlags, IntentParseError> {
    let bad = || IntentParseError::BadFlags(value.to_string());
    let bits = match value
        .strip_prefix("0x")
        .or_else(|| value.strip_prefix("0X"))
    {
        Some(hex) => u32::from_str_radix(hex, 16).map_err(|_| bad())?,
        None => {
            // Decimal values may be negative when the top bit is set.
            let signed: i64 = value.parse().map_err(|_| bad())?;
            u32::try_from(signed)
                .or_else(|_| i32::try_from(signed).map(|v| v as u32))
                .map_err(|_| bad())?
        }
    };
    Ok(LaunchFlags::from_bits(bits))
}

fn parse_component(value: &str) -> Result<ResolverIdentity, IntentParseError> {
    let (package, class) = value
        .split_once('/')
        .filter(|(package, class)| !package.is_empty() && !class.is_empty())
        .ok_or_else(|| IntentParseError::BadComponent(value.to_string()))?;
    let class = if class.starts_with('.') {
        format!("{package}{class}")
    } else {
        class.to_string()
    };
    Ok(ResolverIdentity::new(package, class))
}

fn parse_extra(key: &str, value: String) -> Result<(String, ExtraValue), IntentParseError> {
    let (prefix, name) = key
        .split_once('.')
        .filter(|(prefix, _)| prefix.len() == 1)
        .ok_or_else(|| IntentParseError::MalformedSegment(key.to_string()))?;
    let name = decode(name)?;
    let bad = |reason: &str| IntentParseError::BadExtra {
        key: name.clone(),
        reason: reason.to_string(),
    };

    let extra = match prefix {
        "S" => ExtraValue::String(value),
        "B" => ExtraValue::Bool(value.eq_ignore_ascii_case("true")),
        "i" => ExtraValue::Int(value.parse().map_err(|_| bad("not an int"))?),
        "l" => ExtraValue::Long(value.parse().map_err(|_| bad("not a long"))?),
        "f" => ExtraValue::Float(value.parse().map_err(|_| bad("not a float"))?),
        "d" => ExtraValue::Double(value.parse().map_err(|_| bad("not a double"))?),
        "s" => ExtraValue::Short(value.parse().map_err(|_| bad("not a short"))?),
        "c" => {
            let mut chars = value.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => ExtraValue::Char(c),
                _ => return Err(bad("not a single char")),
            }
        }
        _ => return Err(IntentParseError::MalformedSegment(key.to_string())),
    };
    Ok((name, extra))
}
