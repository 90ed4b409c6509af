//! The `run_javascript` action.
//!
//! Scripts see `request` (and `response` after dispatch) as plain objects:
//!
//! ```text
//! request  = { method, path, query: {k: [v..]}, headers: {k: v}, body }
//! response = { status_code, headers: {k: v}, body }
//! ```
//!
//! Evaluation runs on a dedicated thread with a wall-clock deadline. The engine
//! interrupts a script that is still running when the deadline passes, and a
//! semaphore caps how many script threads exist at once.

use hyper::header::{HeaderName, HeaderValue, CONTENT_LENGTH};
use hyper::{HeaderMap, Method, StatusCode};
use parking_lot::Mutex;
use serde_json::{json, Map, Value};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Semaphore;
use tracing::{debug, warn};

use super::{ActionContext, ActionError};
use crate::config::ScriptingConfig;
use crate::exchange::{RequestData, ResponseData};
use crate::metrics;

/// What a successful script run left behind.
#[derive(Debug, Default)]
pub struct ScriptOutcome {
    pub logs: Vec<String>,
}

/// Extra wait past the deadline for the worker to report its interruption.
const INTERRUPT_GRACE: Duration = Duration::from_millis(250);

#[derive(Debug, Clone)]
pub struct ScriptSandbox {
    timeout: Duration,
    loop_iteration_limit: u64,
    max_concurrent: usize,
    workers: Arc<Semaphore>,
}

impl Default for ScriptSandbox {
    fn default() -> Self {
        Self::new(&ScriptingConfig::default())
    }
}

impl ScriptSandbox {
    pub fn new(config: &ScriptingConfig) -> Self {
        let max_concurrent = config.max_concurrent.max(1);
        Self {
            timeout: config.timeout(),
            loop_iteration_limit: config.loop_iteration_limit,
            max_concurrent,
            workers: Arc::new(Semaphore::new(max_concurrent)),
        }
    }

    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Script threads currently alive, including any still unwinding after
    /// an interruption.
    pub fn active_workers(&self) -> usize {
        self.max_concurrent - self.workers.available_permits()
    }

    /// Run `script` against the exchange and copy its changes back.
    pub async fn run(
        &self,
        script: &str,
        ctx: &mut ActionContext<'_>,
    ) -> Result<ScriptOutcome, ActionError> {
        let input = json!({
            "request": request_to_json(ctx.request()),
            "response": ctx.response().map(response_to_json).unwrap_or(Value::Null),
        });
        let logs: Arc<Mutex<Vec<String>>> = Arc::default();
        let started = Instant::now();

        let result = self.evaluate(script, input, logs.clone()).await;
        metrics::record_script_duration(started.elapsed());

        let output = match result {
            Evaluation::Done(Ok(output)) => output,
            Evaluation::Done(Err(message)) if started.elapsed() >= self.timeout => {
                debug!("Script failed past its deadline: {}", message);
                return Err(self.timeout_error(&logs));
            }
            Evaluation::Done(Err(message)) => {
                return Err(ActionError::Script {
                    message,
                    logs: logs.lock().clone(),
                })
            }
            Evaluation::TimedOut => return Err(self.timeout_error(&logs)),
        };

        apply_output(&output, ctx);
        let logs = std::mem::take(&mut *logs.lock());
        Ok(ScriptOutcome { logs })
    }

    fn timeout_error(&self, logs: &Mutex<Vec<String>>) -> ActionError {
        ActionError::ScriptTimeout {
            timeout_ms: self.timeout.as_millis() as u64,
            logs: logs.lock().clone(),
        }
    }

    #[cfg(feature = "javascript")]
    async fn evaluate(
        &self,
        script: &str,
        input: Value,
        logs: Arc<Mutex<Vec<String>>>,
    ) -> Evaluation {
        use super::js_engine::{self, EvalFailure, EvalLimits};

        let deadline = tokio::time::Instant::now() + self.timeout;
        let permit = match tokio::time::timeout_at(
            deadline,
            self.workers.clone().acquire_owned(),
        )
        .await
        {
            Ok(Ok(permit)) => permit,
            Ok(Err(_)) => return Evaluation::Done(Err("script sandbox is closed".to_string())),
            Err(_) => {
                warn!(
                    "All {} script workers busy, script timed out waiting",
                    self.max_concurrent
                );
                return Evaluation::TimedOut;
            }
        };

        let (tx, rx) = tokio::sync::oneshot::channel();
        let script = script.to_string();
        let limits = EvalLimits {
            deadline: deadline.saturating_duration_since(tokio::time::Instant::now()),
            loop_iteration_limit: self.loop_iteration_limit,
        };

        let spawned = std::thread::Builder::new()
            .name("decoy-script".to_string())
            .spawn(move || {
                let result = js_engine::execute(&script, &input, limits, logs);
                drop(permit);
                let _ = tx.send(result);
            });
        if let Err(e) = spawned {
            return Evaluation::Done(Err(format!("failed to start script thread: {e}")));
        }

        match tokio::time::timeout_at(deadline + INTERRUPT_GRACE, rx).await {
            Ok(Ok(Ok(output))) => Evaluation::Done(Ok(output)),
            Ok(Ok(Err(EvalFailure::Error(message)))) => Evaluation::Done(Err(message)),
            Ok(Ok(Err(EvalFailure::Interrupted))) | Err(_) => Evaluation::TimedOut,
            Ok(Err(_)) => {
                Evaluation::Done(Err("script thread exited without a result".to_string()))
            }
        }
    }

    #[cfg(not(feature = "javascript"))]
    async fn evaluate(
        &self,
        _script: &str,
        _input: Value,
        _logs: Arc<Mutex<Vec<String>>>,
    ) -> Evaluation {
        let _ = (self.loop_iteration_limit, &self.workers);
        Evaluation::Done(Err(ActionError::ScriptingUnavailable.to_string()))
    }
}

enum Evaluation {
    Done(Result<Value, String>),
    TimedOut,
}

fn request_to_json(request: &RequestData) -> Value {
    json!({
        "method": request.method.as_str(),
        "path": request.path,
        "query": request.query_params(),
        "headers": headers_to_json(&request.headers),
        "body": request.body_text(),
    })
}

fn response_to_json(response: &ResponseData) -> Value {
    json!({
        "status_code": response.status.as_u16(),
        "headers": headers_to_json(&response.headers),
        "body": response.body_text(),
    })
}

/// First value of each header, keyed by lower-case name.
fn headers_to_json(headers: &HeaderMap) -> Value {
    let map: Map<String, Value> = headers
        .keys()
        .filter_map(|name| {
            let value = headers.get(name)?.to_str().ok()?;
            Some((name.as_str().to_string(), Value::String(value.to_string())))
        })
        .collect();
    Value::Object(map)
}

fn apply_output(output: &Value, ctx: &mut ActionContext<'_>) {
    match ctx {
        ActionContext::Before { request } => {
            if let Some(out) = output.get("request").filter(|v| v.is_object()) {
                apply_request(out, request);
            }
        }
        ActionContext::After { response, .. } => {
            if let Some(out) = output.get("response").filter(|v| v.is_object()) {
                apply_response(out, response);
            }
        }
    }
}

fn apply_request(out: &Value, request: &mut RequestData) {
    if let Some(method) = non_empty_str(out, "method") {
        match Method::from_bytes(method.to_ascii_uppercase().as_bytes()) {
            Ok(method) => request.method = method,
            Err(_) => warn!("Script set an invalid method '{}'", method),
        }
    }
    if let Some(path) = non_empty_str(out, "path") {
        request.path = path.to_string();
    }
    merge_headers(out, &mut request.headers);
    if let Some(body) = non_empty_str(out, "body") {
        request.body = body.to_string().into();
        if request.headers.contains_key(CONTENT_LENGTH) {
            request
                .headers
                .insert(CONTENT_LENGTH, HeaderValue::from(request.body.len()));
        }
    }
}

fn apply_response(out: &Value, response: &mut ResponseData) {
    let status = out
        .get("status_code")
        .and_then(Value::as_u64)
        .filter(|code| (100..=999).contains(code))
        .and_then(|code| StatusCode::from_u16(code as u16).ok());
    if let Some(status) = status {
        response.status = status;
    }
    merge_headers(out, &mut response.headers);
    if let Some(body) = non_empty_str(out, "body") {
        response.set_body(body.to_string());
    }
}

/// Headers from the script are set; headers it deleted are left in place.
fn merge_headers(out: &Value, headers: &mut HeaderMap) {
    let Some(map) = out.get("headers").and_then(Value::as_object) else {
        return;
    };
    for (key, value) in map {
        let value = match value {
            Value::String(s) => s.clone(),
            Value::Number(n) => n.to_string(),
            Value::Bool(b) => b.to_string(),
            _ => continue,
        };
        let (Ok(name), Ok(value)) = (
            HeaderName::from_bytes(key.as_bytes()),
            HeaderValue::from_str(&value),
        ) else {
            warn!("Script set an invalid header '{}'", key);
            continue;
        };
        if headers.get(&name) != Some(&value) {
            headers.insert(name, value);
        }
    }
}

fn non_empty_str<'a>(out: &'a Value, key: &str) -> Option<&'a str> {
    out.get(key).and_then(Value::as_str).filter(|s| !s.is_empty())
}

#[cfg(all(test, feature = "javascript"))]
mod tests {
    use super::*;

    fn sandbox(timeout_ms: u64) -> ScriptSandbox {
        ScriptSandbox::new(&ScriptingConfig {
            timeout_ms,
            ..ScriptingConfig::default()
        })
    }

    #[tokio::test]
    async fn test_before_request_rewrites_request() {
        let mut request = RequestData::new(Method::GET, "/orders")
            .with_header("x-keep", "1")
            .with_body("{}");
        let script = r#"
            request.method = 'post';
            request.path = '/orders/archive';
            request.headers['X-Custom-Header'] = 'TestValue';
            request.body = '{"archived":true}';
        "#;

        let outcome = sandbox(5000)
            .run(script, &mut ActionContext::Before { request: &mut request })
            .await
            .unwrap();

        assert!(outcome.logs.is_empty());
        assert_eq!(request.method, Method::POST);
        assert_eq!(request.path, "/orders/archive");
        assert_eq!(request.header("x-custom-header"), "TestValue");
        assert_eq!(request.header("x-keep"), "1");
        assert_eq!(request.body_text(), r#"{"archived":true}"#);
    }

    #[tokio::test]
    async fn test_after_request_rewrites_response_only() {
        let request = RequestData::new(Method::GET, "/orders");
        let mut response = ResponseData::new(StatusCode::OK);
        response.set_body(r#"{"ok":true}"#);
        let script = r#"
            var data = JSON.parse(response.body);
            data.decorated = true;
            response.body = JSON.stringify(data);
            response.status_code = 202;
            request.path = '/ignored';
            console.log('decorated', request.path);
        "#;

        let outcome = sandbox(5000)
            .run(
                script,
                &mut ActionContext::After {
                    request: &request,
                    response: &mut response,
                },
            )
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::ACCEPTED);
        assert_eq!(response.body_text(), r#"{"ok":true,"decorated":true}"#);
        assert_eq!(request.path, "/orders");
        assert_eq!(outcome.logs, vec!["decorated /ignored".to_string()]);
    }

    #[tokio::test]
    async fn test_empty_and_out_of_range_values_are_ignored() {
        let request = RequestData::new(Method::GET, "/");
        let mut response = ResponseData::new(StatusCode::OK);
        response.set_body("original");
        let script = "response.body = ''; response.status_code = 42; delete response.headers;";

        sandbox(5000)
            .run(
                script,
                &mut ActionContext::After {
                    request: &request,
                    response: &mut response,
                },
            )
            .await
            .unwrap();

        assert_eq!(response.status, StatusCode::OK);
        assert_eq!(response.body_text(), "original");
    }

    #[tokio::test]
    async fn test_script_error_keeps_logs() {
        let mut request = RequestData::new(Method::GET, "/");
        let err = sandbox(5000)
            .run(
                "console.log('start'); undefinedFunction();",
                &mut ActionContext::Before { request: &mut request },
            )
            .await
            .unwrap_err();

        assert!(matches!(err, ActionError::Script { .. }));
        assert_eq!(err.logs(), ["start".to_string()]);
        assert_eq!(request.path, "/");
    }

    #[tokio::test]
    async fn test_timeout() {
        let mut request = RequestData::new(Method::GET, "/");
        let err = sandbox(100)
            .run(
                "console.log('spinning'); while (true) {}",
                &mut ActionContext::Before { request: &mut request },
            )
            .await
            .unwrap_err();

        match err {
            ActionError::ScriptTimeout { timeout_ms, logs } => {
                assert_eq!(timeout_ms, 100);
                assert_eq!(logs, vec!["spinning".to_string()]);
            }
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_timed_out_worker_exits() {
        let sandbox = sandbox(200);
        let mut request = RequestData::new(Method::GET, "/");
        let err = sandbox
            .run(
                "while (true) { for (var i = 0; i < 1000; i++) {} }",
                &mut ActionContext::Before { request: &mut request },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, ActionError::ScriptTimeout { timeout_ms: 200, .. }));

        let mut waited = Duration::ZERO;
        while sandbox.active_workers() > 0 && waited < Duration::from_secs(2) {
            tokio::time::sleep(Duration::from_millis(20)).await;
            waited += Duration::from_millis(20);
        }
        assert_eq!(sandbox.active_workers(), 0);
    }

    #[tokio::test]
    async fn test_cyclic_output_fails_without_touching_request() {
        let mut request = RequestData::new(Method::GET, "/orders");
        let err = sandbox(5000)
            .run(
                "request.path = '/changed'; request.self = request;",
                &mut ActionContext::Before { request: &mut request },
            )
            .await
            .unwrap_err();

        match err {
            ActionError::Script { message, .. } => assert!(message.contains("cyclic")),
            other => panic!("expected script error, got {other:?}"),
        }
        assert_eq!(request.path, "/orders");
    }

    #[tokio::test]
    async fn test_worker_cap_queues_scripts() {
        let sandbox = ScriptSandbox::new(&ScriptingConfig {
            timeout_ms: 400,
            loop_iteration_limit: u64::MAX,
            max_concurrent: 1,
        });
        let busy = sandbox.clone();
        let spinning = tokio::spawn(async move {
            let mut request = RequestData::new(Method::GET, "/");
            busy.run(
                "while (true) {}",
                &mut ActionContext::Before { request: &mut request },
            )
            .await
        });
        tokio::time::sleep(Duration::from_millis(150)).await;
        assert_eq!(sandbox.active_workers(), 1);

        let started = Instant::now();
        let mut request = RequestData::new(Method::GET, "/");
        sandbox
            .run(
                "request.path = '/queued';",
                &mut ActionContext::Before { request: &mut request },
            )
            .await
            .unwrap();
        assert_eq!(request.path, "/queued");
        assert!(started.elapsed() >= Duration::from_millis(200));

        assert!(matches!(
            spinning.await.unwrap(),
            Err(ActionError::ScriptTimeout { .. })
        ));
        assert_eq!(sandbox.active_workers(), 0);
    }
}
