//! HTTP front end.
//!
//! Accepts HTTP/1.1 connections, derives the project alias from the Host
//! header or the first path segment, buffers the body and hands the request
//! to the [`Engine`].

use bytes::Bytes;
use http_body_util::{BodyExt, Full};
use hyper::body::Body;
use hyper::header::CONTENT_TYPE;
use hyper::server::conn::http1;
use hyper::service::service_fn;
use hyper::{Method, Request, Response, StatusCode};
use hyper_util::rt::TokioIo;
use serde_json::json;
use std::convert::Infallible;
use std::fmt::Display;
use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use tokio::net::TcpListener;
use tracing::{debug, error, info};

use crate::engine::Engine;
use crate::error::DecoyError;
use crate::exchange::RequestData;
use crate::metrics;
use crate::response::{error_response, ResponseBuilder};

pub const HEALTH_PATH: &str = "/__decoy/health";
const DEFAULT_ALIAS: &str = "default";

pub struct DecoyServer {
    addr: SocketAddr,
    engine: Arc<Engine>,
}

impl DecoyServer {
    pub fn new(addr: SocketAddr, engine: Arc<Engine>) -> Self {
        Self { addr, engine }
    }

    /// Bind the configured address and serve until the task is dropped.
    pub async fn run(self) -> Result<(), anyhow::Error> {
        let listener = TcpListener::bind(self.addr).await?;
        self.serve(listener).await
    }

    /// Serve on an already bound listener.
    pub async fn serve(self, listener: TcpListener) -> Result<(), anyhow::Error> {
        info!("Decoy listening on http://{}", listener.local_addr()?);

        loop {
            let (stream, peer) = listener.accept().await?;
            let io = TokioIo::new(stream);
            let engine = Arc::clone(&self.engine);

            tokio::spawn(async move {
                let service = service_fn(move |req| {
                    let engine = Arc::clone(&engine);
                    async move { handle_request(req, engine).await }
                });

                if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                    debug!("Connection error from {}: {}", peer, e);
                }
            });
        }
    }
}

/// Serve one request through the engine.
pub async fn handle_request<B>(
    req: Request<B>,
    engine: Arc<Engine>,
) -> Result<Response<Full<Bytes>>, Infallible>
where
    B: Body,
    B::Error: Display,
{
    if req.method() == Method::GET && req.uri().path() == HEALTH_PATH {
        return Ok(health_response());
    }

    let host = req
        .headers()
        .get(hyper::header::HOST)
        .and_then(|h| h.to_str().ok())
        .or_else(|| req.uri().host())
        .map(str::to_string);
    let (alias, path) = extract_alias(host.as_deref(), req.uri().path());

    let (parts, body) = req.into_parts();
    let body = match body.collect().await {
        Ok(collected) => collected.to_bytes(),
        Err(e) => {
            debug!("Failed to read request body: {}", e);
            let error = DecoyError::BadRequest(format!("failed to read request body: {e}"));
            return Ok(error_response(&error).into_response());
        }
    };

    let request = RequestData {
        method: parts.method,
        path,
        query: parts.uri.query().map(str::to_string),
        headers: parts.headers,
        body,
    };

    let dispatched = engine.handle(&alias, request).await;
    Ok(dispatched.response.into_response())
}

/// Split an inbound request into `(alias, project-relative path)`.
///
/// A Host with more than two labels (`shop.mock.example.com`) selects the
/// project by its first label and keeps the whole path. Otherwise the first
/// path segment is the alias, after an optional `/api` prefix.
pub fn extract_alias(host: Option<&str>, path: &str) -> (String, String) {
    if let Some(subdomain) = host.and_then(subdomain_alias) {
        let path = if path.is_empty() { "/" } else { path };
        return (subdomain.to_string(), path.to_string());
    }

    let trimmed = path.trim_start_matches('/');
    let rest = match trimmed.strip_prefix("api") {
        Some(after) if after.is_empty() || after.starts_with('/') => {
            after.trim_start_matches('/')
        }
        _ => trimmed,
    };
    if rest.is_empty() {
        return (DEFAULT_ALIAS.to_string(), "/".to_string());
    }

    match rest.find('/') {
        Some(index) => (rest[..index].to_string(), rest[index..].to_string()),
        None => (rest.to_string(), "/".to_string()),
    }
}

fn subdomain_alias(host: &str) -> Option<&str> {
    let hostname = strip_port(host);
    if hostname.parse::<IpAddr>().is_ok() {
        return None;
    }
    let mut labels = hostname.split('.');
    let first = labels.next().filter(|label| !label.is_empty())?;
    (labels.count() >= 2).then_some(first)
}

fn strip_port(host: &str) -> &str {
    if host.starts_with('[') {
        // bracketed IPv6 literal
        return host
            .split_once(']')
            .map_or(host, |(addr, _)| addr.trim_start_matches('['));
    }
    match host.rsplit_once(':') {
        Some((name, port)) if port.chars().all(|c| c.is_ascii_digit()) => name,
        _ => host,
    }
}

fn health_response() -> Response<Full<Bytes>> {
    ResponseBuilder::new(StatusCode::OK)
        .header(CONTENT_TYPE.as_str(), "application/json")
        .body(json!({"status": "ok"}).to_string())
        .build()
        .into_response()
}

/// Serve Prometheus metrics on `addr`.
pub async fn serve_metrics(addr: SocketAddr) -> Result<(), anyhow::Error> {
    let listener = TcpListener::bind(addr).await?;
    info!("Metrics listening on http://{}/metrics", addr);

    loop {
        let (stream, _) = listener.accept().await?;
        let io = TokioIo::new(stream);

        tokio::spawn(async move {
            let service = service_fn(|_req: Request<hyper::body::Incoming>| async {
                let response = ResponseBuilder::new(StatusCode::OK)
                    .header(CONTENT_TYPE.as_str(), "text/plain; version=0.0.4")
                    .body(metrics::collect_metrics())
                    .build()
                    .into_response();
                Ok::<_, Infallible>(response)
            });

            if let Err(e) = http1::Builder::new().serve_connection(io, service).await {
                error!("Metrics connection error: {}", e);
            }
        });
    }
}
