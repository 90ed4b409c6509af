//! The `replace_text` action.

use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use hyper::HeaderMap;
use regex::Regex;
use tracing::{debug, warn};

use super::config::{ReplaceTarget, ReplaceTextConfig};
use super::ActionContext;

/// Replace every occurrence of `pattern` in `text`.
///
/// Regex replacements expand `$1`-style group references. An invalid regex
/// leaves the text unchanged, as does an empty pattern.
pub fn replace_text(text: &str, pattern: &str, replacement: &str, use_regex: bool) -> String {
    if pattern.is_empty() {
        return text.to_string();
    }
    if !use_regex {
        return text.replace(pattern, replacement);
    }
    match Regex::new(pattern) {
        Ok(re) => re.replace_all(text, replacement).into_owned(),
        Err(e) => {
            warn!("Invalid replace_text pattern '{}': {}", pattern, e);
            text.to_string()
        }
    }
}

pub fn apply(config: &ReplaceTextConfig, ctx: &mut ActionContext<'_>) {
    let replace = |text: &str| {
        replace_text(text, &config.pattern, &config.replacement, config.use_regex)
    };
    let header_key = config.header_key.as_deref().unwrap_or("");

    match config.target {
        ReplaceTarget::RequestBody => match ctx.request_mut() {
            Some(request) => {
                let body = replace(&request.body_text());
                request.body = body.into();
                sync_content_length(&mut request.headers, request.body.len());
            }
            None => debug!("replace_text: request is read-only after the response"),
        },
        ReplaceTarget::ResponseBody => {
            if let Some(response) = ctx.response_mut() {
                let body = replace(&response.body_text());
                response.set_body(body);
            }
        }
        ReplaceTarget::RequestHeader => match ctx.request_mut() {
            Some(request) => replace_header(&mut request.headers, header_key, replace),
            None => debug!("replace_text: request is read-only after the response"),
        },
        ReplaceTarget::ResponseHeader => {
            if let Some(response) = ctx.response_mut() {
                replace_header(&mut response.headers, header_key, replace);
            }
        }
    }
}

/// Rewrites a header only when it is present with a non-empty value.
fn replace_header(headers: &mut HeaderMap, key: &str, replace: impl Fn(&str) -> String) {
    let Ok(name) = HeaderName::from_bytes(key.as_bytes()) else {
        warn!("replace_text: invalid header name '{}'", key);
        return;
    };
    let current = match headers.get(&name).and_then(|v| v.to_str().ok()) {
        Some(value) if !value.is_empty() => value.to_string(),
        _ => return,
    };
    match HeaderValue::from_str(&replace(&current)) {
        Ok(value) => {
            headers.insert(name, value);
        }
        Err(e) => warn!("replace_text: replacement is not a valid header value: {}", e),
    }
}

fn sync_content_length(headers: &mut HeaderMap, len: usize) {
    if headers.contains_key(CONTENT_LENGTH) {
        headers.insert(CONTENT_LENGTH, HeaderValue::from(len));
    }
}
