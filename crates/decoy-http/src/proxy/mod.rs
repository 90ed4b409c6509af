//! Proxy and forwarder execution.
//!
//! # Module Structure
//!
//! - `client` - pooled outbound client (HTTP/1.1, rustls)
//! - `forwarding` - request rewriting, loop prevention and timeouts
//! - `headers` - reserved `decoy-*` headers
//! - `tls` - upstream certificate verifier

mod client;
mod forwarding;
mod headers;
mod tls;

#[allow(unused_imports)]
pub use client::{create_http_client, HttpClient};
#[allow(unused_imports)]
pub use forwarding::{join_paths, ProxyExecutor};
#[allow(unused_imports)]
pub use headers::{
    has_reserved_header, DecoyHeadersExt, DECOY_LATENCY_MS, DECOY_LOOP_DETECT,
    DECOY_RESPONSE_TYPE, RESERVED_PREFIX, VALUE_MOCK, VALUE_PROXY, VALUE_TRUE,
};
