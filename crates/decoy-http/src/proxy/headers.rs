//! Reserved Decoy headers.
//!
//! Every header whose name starts with [`RESERVED_PREFIX`] belongs to Decoy.
//! An inbound request carrying one has already passed through a Decoy
//! instance, so forwarding it again would loop.

use hyper::header::{HeaderName, HeaderValue};
use hyper::HeaderMap;

use crate::exchange::ResponseData;

pub const RESERVED_PREFIX: &str = "decoy-";

/// Set on every outbound proxied request.
pub static DECOY_LOOP_DETECT: HeaderName = HeaderName::from_static("decoy-loop-detect");
/// `mock` or `proxy`, set on responses served in proxy mode.
pub static DECOY_RESPONSE_TYPE: HeaderName = HeaderName::from_static("decoy-response-type");
/// Upstream round-trip in milliseconds, set on forwarded responses.
pub static DECOY_LATENCY_MS: HeaderName = HeaderName::from_static("decoy-latency-ms");

pub static VALUE_TRUE: HeaderValue = HeaderValue::from_static("true");
pub static VALUE_MOCK: HeaderValue = HeaderValue::from_static("mock");
pub static VALUE_PROXY: HeaderValue = HeaderValue::from_static("proxy");

/// Whether any header name falls under the reserved prefix.
pub fn has_reserved_header(headers: &HeaderMap) -> bool {
    headers
        .keys()
        .any(|name| name.as_str().starts_with(RESERVED_PREFIX))
}

/// Extension trait for inserting Decoy headers.
pub trait DecoyHeadersExt {
    /// Insert a header with a static name and value.
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue);

    /// Insert a header with a static name and dynamic string value.
    /// Returns false if the value couldn't be converted to a valid header value.
    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool;
}

impl DecoyHeadersExt for HeaderMap {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        self.insert(name.clone(), value.clone());
    }

    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool {
        match HeaderValue::from_str(value) {
            Ok(header_value) => {
                self.insert(name.clone(), header_value);
                true
            }
            Err(_) => false,
        }
    }
}

impl DecoyHeadersExt for ResponseData {
    fn set_header(&mut self, name: &HeaderName, value: &HeaderValue) {
        self.headers.set_header(name, value);
    }

    fn set_header_value(&mut self, name: &HeaderName, value: &str) -> bool {
        self.headers.set_header_value(name, value)
    }
}
