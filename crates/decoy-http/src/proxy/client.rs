//! Outbound HTTP client used by proxy and forwarder modes.

use super::tls::NoVerifier;
use crate::config::ProxyConfig;
use http_body_util::combinators::BoxBody;
use hyper::body::Bytes;
use hyper_util::client::legacy::connect::HttpConnector;
use hyper_util::client::legacy::Client;
use hyper_util::rt::TokioExecutor;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

/// Type alias for the HTTP client used by the proxy executor.
pub type HttpClient =
    Client<hyper_rustls::HttpsConnector<HttpConnector>, BoxBody<Bytes, hyper::Error>>;

/// Create the shared pooled client.
///
/// Plain HTTP and HTTPS upstreams are both accepted; upstream certificates
/// are not verified.
pub fn create_http_client(config: &ProxyConfig) -> Result<HttpClient, rustls::Error> {
    let mut http_connector = HttpConnector::new();
    http_connector.enforce_http(false);
    http_connector.set_connect_timeout(Some(config.timeout()));

    let tls_config = rustls::ClientConfig::builder_with_provider(Arc::new(
        rustls::crypto::ring::default_provider(),
    ))
    .with_safe_default_protocol_versions()?
    .dangerous()
    .with_custom_certificate_verifier(Arc::new(NoVerifier))
    .with_no_client_auth();

    let https_connector = hyper_rustls::HttpsConnectorBuilder::new()
        .with_tls_config(tls_config)
        .https_or_http()
        .enable_http1()
        .wrap_connector(http_connector);

    let http_client = Client::builder(TokioExecutor::new())
        .pool_idle_timeout(Duration::from_secs(config.pool_idle_timeout_secs))
        .pool_max_idle_per_host(config.max_idle_per_host)
        .build(https_connector);

    info!(
        "Upstream client configured (HTTP/1.1, TLS verification disabled): max_idle={}, idle_timeout={}s, timeout={}s",
        config.max_idle_per_host, config.pool_idle_timeout_secs, config.timeout_secs
    );

    Ok(http_client)
}
