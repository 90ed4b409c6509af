//! Response construction for mock answers and error envelopes.

mod builder;

pub use builder::ResponseBuilder;

use hyper::header::CONTENT_TYPE;
use serde_json::json;
use std::collections::HashMap;
use tracing::warn;

use crate::error::DecoyError;
use crate::exchange::ResponseData;
use crate::model::MockResponse;

/// Render an error as the `{"error": true, "message": ...}` envelope.
pub fn error_response(error: &DecoyError) -> ResponseData {
    let body = json!({
        "error": true,
        "message": error.to_string(),
    });

    ResponseBuilder::new(error.status())
        .header(CONTENT_TYPE.as_str(), "application/json")
        .body(body.to_string())
        .build()
}

/// Build the HTTP answer for a configured mock response.
pub fn mock_response(response: &MockResponse) -> ResponseData {
    ResponseBuilder::from_code(response.status_code)
        .merge_headers(configured_headers(response))
        .body(response.body.clone())
        .build()
}

fn configured_headers(response: &MockResponse) -> HashMap<String, String> {
    let Some(raw) = response.headers.as_deref().map(str::trim) else {
        return HashMap::new();
    };
    if raw.is_empty() {
        return HashMap::new();
    }

    match serde_json::from_str::<HashMap<String, serde_json::Value>>(raw) {
        Ok(headers) => headers
            .into_iter()
            .map(|(name, value)| match value {
                serde_json::Value::String(s) => (name, s),
                other => (name, other.to_string()),
            })
            .collect(),
        Err(e) => {
            warn!(
                "Ignoring malformed headers of response {}: {}",
                response.id, e
            );
            HashMap::new()
        }
    }
}
