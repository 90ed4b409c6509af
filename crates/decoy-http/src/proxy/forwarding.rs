//! Forwarding a buffered request to an upstream target.

use super::client::HttpClient;
use super::headers::{
    has_reserved_header, DecoyHeadersExt, DECOY_LATENCY_MS, DECOY_LOOP_DETECT, VALUE_TRUE,
};
use crate::error::DecoyError;
use crate::exchange::{RequestData, ResponseData};
use http_body_util::combinators::BoxBody;
use http_body_util::{BodyExt, Full};
use hyper::header::{HeaderValue, HOST, REFERER};
use hyper::{Request, Uri};
use std::convert::Infallible;
use std::error::Error as StdError;
use std::time::{Duration, Instant};
use tracing::{debug, warn};

/// Headers that describe a single connection and are not relayed.
const HOP_BY_HOP: &[&str] = &[
    "connection",
    "keep-alive",
    "proxy-connection",
    "transfer-encoding",
    "te",
    "trailer",
    "upgrade",
];

/// Sends requests to proxy targets over a shared pooled client.
#[derive(Clone)]
pub struct ProxyExecutor {
    client: HttpClient,
    timeout: Duration,
}

impl ProxyExecutor {
    pub fn new(client: HttpClient, timeout: Duration) -> Self {
        Self { client, timeout }
    }

    /// Forward `request` to `target_url`.
    ///
    /// The request path is joined onto the target's base path and the query
    /// string is kept. `Referer` is dropped, `Host` becomes the target's
    /// authority and the loop marker is added. The whole exchange, body
    /// included, is bounded by the executor timeout.
    pub async fn forward(
        &self,
        target_url: &str,
        request: &RequestData,
    ) -> Result<ResponseData, DecoyError> {
        if has_reserved_header(&request.headers) {
            warn!(
                "Refusing to forward {} {}: reserved header present",
                request.method, request.path
            );
            return Err(DecoyError::LoopDetected);
        }

        let (authority, uri) = upstream_uri(target_url, request)?;
        debug!("Forwarding {} {} to {}", request.method, request.path, uri);

        let mut outbound = Request::builder()
            .method(request.method.clone())
            .uri(uri)
            .body(BoxBody::new(
                Full::new(request.body.clone()).map_err(|never: Infallible| match never {}),
            ))
            .map_err(|e| DecoyError::InvalidProxyUrl(e.to_string()))?;

        let headers = outbound.headers_mut();
        for (name, value) in request.headers.iter() {
            if *name != REFERER && *name != HOST {
                headers.append(name.clone(), value.clone());
            }
        }
        if let Ok(host) = HeaderValue::from_str(&authority) {
            headers.insert(HOST, host);
        }
        headers.set_header(&DECOY_LOOP_DETECT, &VALUE_TRUE);

        let start = Instant::now();
        let exchange = async {
            let response = self
                .client
                .request(outbound)
                .await
                .map_err(|e| DecoyError::Upstream(error_chain(&e)))?;
            let (parts, body) = response.into_parts();
            let body = body
                .collect()
                .await
                .map_err(|e| DecoyError::Upstream(error_chain(&e)))?
                .to_bytes();
            Ok::<_, DecoyError>((parts, body))
        };

        let (parts, body) = tokio::time::timeout(self.timeout, exchange)
            .await
            .map_err(|_| {
                DecoyError::Upstream(format!(
                    "upstream did not answer within {}s",
                    self.timeout.as_secs_f64()
                ))
            })??;
        let latency_ms = start.elapsed().as_millis();

        let mut response = ResponseData {
            status: parts.status,
            headers: parts.headers,
            body,
        };
        for name in HOP_BY_HOP {
            response.headers.remove(*name);
        }
        response.set_header_value(&DECOY_LATENCY_MS, &latency_ms.to_string());

        debug!(
            "Upstream answered {} in {}ms",
            response.status.as_u16(),
            latency_ms
        );
        Ok(response)
    }
}

/// Split the target into its authority and the full outbound URI.
fn upstream_uri(target_url: &str, request: &RequestData) -> Result<(String, Uri), DecoyError> {
    let target: Uri = target_url
        .trim()
        .parse()
        .map_err(|e| DecoyError::InvalidProxyUrl(format!("{target_url}: {e}")))?;

    let (Some(scheme), Some(authority)) = (target.scheme_str(), target.authority()) else {
        return Err(DecoyError::InvalidProxyUrl(format!(
            "{target_url}: scheme and host are required"
        )));
    };

    let mut uri = format!(
        "{scheme}://{authority}{}",
        join_paths(target.path(), &request.path)
    );
    if let Some(query) = request.query.as_deref().filter(|q| !q.is_empty()) {
        uri.push('?');
        uri.push_str(query);
    }

    let uri = uri
        .parse()
        .map_err(|e| DecoyError::InvalidProxyUrl(format!("{uri}: {e}")))?;
    Ok((authority.to_string(), uri))
}

/// Join two URL paths into one clean absolute path: empty and `.` segments
/// are dropped, `..` removes its parent, no trailing slash.
pub fn join_paths(base: &str, path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();
    for segment in base.split('/').chain(path.split('/')) {
        match segment {
            "" | "." => {}
            ".." => {
                segments.pop();
            }
            other => segments.push(other),
        }
    }
    format!("/{}", segments.join("/"))
}

fn error_chain(error: &dyn StdError) -> String {
    let mut message = error.to_string();
    let mut source = error.source();
    while let Some(cause) = source {
        message.push_str(": ");
        message.push_str(&cause.to_string());
        source = cause.source();
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ProxyConfig;
    use crate::proxy::create_http_client;
    use bytes::Bytes;
    use hyper::server::conn::http1;
    use hyper::service::service_fn;
    use hyper::{Method, Response, StatusCode};
    use hyper_util::rt::TokioIo;
    use serde_json::{json, Value};
    use std::net::SocketAddr;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use tokio::net::TcpListener;

    /// Upstream that echoes what it received as JSON.
    async fn spawn_echo_upstream(hits: Arc<AtomicUsize>, delay: Duration) -> SocketAddr {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();

        tokio::spawn(async move {
            loop {
                let Ok((stream, _)) = listener.accept().await else {
                    return;
                };
                let hits = Arc::clone(&hits);
                tokio::spawn(async move {
                    let service = service_fn(move |req: Request<hyper::body::Incoming>| {
                        let hits = Arc::clone(&hits);
                        async move {
                            hits.fetch_add(1, Ordering::SeqCst);
                            tokio::time::sleep(delay).await;
                            let (parts, body) = req.into_parts();
                            let body = body.collect().await.unwrap().to_bytes();
                            let headers: serde_json::Map<String, Value> = parts
                                .headers
                                .iter()
                                .map(|(k, v)| {
                                    (k.to_string(), json!(v.to_str().unwrap_or_default()))
                                })
                                .collect();
                            let echo = json!({
                                "method": parts.method.as_str(),
                                "uri": parts.uri.to_string(),
                                "headers": headers,
                                "body": String::from_utf8_lossy(&body),
                            });
                            Ok::<_, Infallible>(
                                Response::builder()
                                    .status(StatusCode::ACCEPTED)
                                    .header("x-upstream", "yes")
                                    .body(Full::new(Bytes::from(echo.to_string())))
                                    .unwrap(),
                            )
                        }
                    });
                    let _ = http1::Builder::new()
                        .serve_connection(TokioIo::new(stream), service)
                        .await;
                });
            }
        });

        addr
    }

    fn executor(timeout: Duration) -> ProxyExecutor {
        let client = create_http_client(&ProxyConfig::default()).unwrap();
        ProxyExecutor::new(client, timeout)
    }

    #[test]
    fn test_join_paths() {
        assert_eq!(join_paths("", "/users"), "/users");
        assert_eq!(join_paths("/", "/"), "/");
        assert_eq!(join_paths("/api/v1", "/users/42/"), "/api/v1/users/42");
        assert_eq!(join_paths("/api/", "//users"), "/api/users");
        assert_eq!(join_paths("/api/v1", "../v2/users"), "/api/v2/users");
        assert_eq!(join_paths("/", "../../etc"), "/etc");
    }

    #[test]
    fn test_upstream_uri() {
        let request = RequestData::new(Method::GET, "/users/42").with_query("expand=true");
        let (authority, uri) = upstream_uri("https://backend.local:8443/base", &request).unwrap();
        assert_eq!(authority, "backend.local:8443");
        assert_eq!(
            uri.to_string(),
            "https://backend.local:8443/base/users/42?expand=true"
        );
    }

    #[test]
    fn test_invalid_target_url() {
        let request = RequestData::new(Method::GET, "/");
        assert!(matches!(
            upstream_uri("not a url", &request),
            Err(DecoyError::InvalidProxyUrl(_))
        ));
        assert!(matches!(
            upstream_uri("/relative/only", &request),
            Err(DecoyError::InvalidProxyUrl(_))
        ));
    }

    #[tokio::test]
    async fn test_forward_rewrites_request() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_echo_upstream(Arc::clone(&hits), Duration::ZERO).await;

        let request = RequestData::new(Method::POST, "/orders")
            .with_query("dry_run=1")
            .with_header("X-Trace", "abc")
            .with_header("Referer", "http://client.local/")
            .with_header("Host", "decoy.local")
            .with_body("payload");

        let response = executor(Duration::from_secs(5))
            .forward(&format!("http://{addr}/api"), &request)
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(response.header("x-upstream"), "yes");
        assert!(response.header("decoy-latency-ms").parse::<u64>().is_ok());

        let echo: Value = serde_json::from_slice(&response.body).unwrap();
        assert_eq!(echo["method"], "POST");
        assert_eq!(echo["uri"], "/api/orders?dry_run=1");
        assert_eq!(echo["body"], "payload");
        assert_eq!(echo["headers"]["x-trace"], "abc");
        assert_eq!(echo["headers"]["host"], addr.to_string());
        assert_eq!(echo["headers"]["decoy-loop-detect"], "true");
        assert!(echo["headers"].get("referer").is_none());

        // the caller's request is still intact
        assert_eq!(request.body, Bytes::from_static(b"payload"));
        assert_eq!(hits.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_loop_is_never_forwarded() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_echo_upstream(Arc::clone(&hits), Duration::ZERO).await;

        let request = RequestData::new(Method::GET, "/").with_header("Decoy-Loop-Detect", "true");
        let result = executor(Duration::from_secs(5))
            .forward(&format!("http://{addr}"), &request)
            .await;

        assert!(matches!(result, Err(DecoyError::LoopDetected)));
        assert_eq!(hits.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_connection_refused_is_upstream_error() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let request = RequestData::new(Method::GET, "/");
        let result = executor(Duration::from_secs(5))
            .forward(&format!("http://{addr}"), &request)
            .await;

        match result {
            Err(error @ DecoyError::Upstream(_)) => {
                assert_eq!(error.status(), StatusCode::BAD_GATEWAY)
            }
            other => panic!("expected upstream error, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_slow_upstream_times_out() {
        let hits = Arc::new(AtomicUsize::new(0));
        let addr = spawn_echo_upstream(hits, Duration::from_millis(500)).await;

        let request = RequestData::new(Method::GET, "/slow");
        let result = executor(Duration::from_millis(100))
            .forward(&format!("http://{addr}"), &request)
            .await;

        match result {
            Err(DecoyError::Upstream(message)) => assert!(message.contains("did not answer")),
            other => panic!("expected timeout, got {other:?}"),
        }
    }
}
