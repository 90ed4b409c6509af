//! Request lifecycle: project resolution, actions, and mode dispatch.
//!
//! [`Engine::handle`] is the single entry point used by the HTTP adapter. It
//! resolves the project for an alias, runs `before_request` actions, answers
//! according to the project's [`ProjectMode`], runs `after_request` actions
//! and reports a [`RequestRecord`].

mod record;

#[allow(unused_imports)]
pub use record::{RequestLogSink, RequestRecord, TracingLogSink};

use std::sync::Arc;
use std::time::Instant;
use tracing::{debug, warn};

use crate::actions::ActionPipeline;
use crate::delay::apply_delay;
use crate::error::DecoyError;
use crate::exchange::{RequestData, ResponseData};
use crate::metrics;
use crate::model::{Endpoint, Project, ProjectMode, ProxyTarget};
use crate::proxy::{
    has_reserved_header, DecoyHeadersExt, ProxyExecutor, DECOY_RESPONSE_TYPE, VALUE_MOCK,
    VALUE_PROXY,
};
use crate::response::{error_response, mock_response};
use crate::selection::{select_response, RoundRobinScheduler};
use crate::store::MockStore;

/// Result of [`Engine::handle`].
#[derive(Debug)]
pub struct Dispatched {
    pub response: ResponseData,
    /// Empty when the alias did not resolve.
    pub project_id: String,
    /// `None` when the alias did not resolve.
    pub mode: Option<ProjectMode>,
    /// Whether a configured endpoint answered.
    pub matched: bool,
}

/// What mock resolution produced for a request.
enum MockOutcome {
    NoEndpoint,
    NoResponses(Endpoint),
    /// A selected mock response.
    Answered(ResponseData),
    /// The endpoint forwarded to its own proxy target.
    Forwarded(ResponseData),
}

pub struct Engine {
    store: Arc<dyn MockStore>,
    executor: ProxyExecutor,
    scheduler: Arc<RoundRobinScheduler>,
    actions: Option<ActionPipeline>,
    sink: Arc<dyn RequestLogSink>,
}

impl Engine {
    pub fn new(
        store: Arc<dyn MockStore>,
        executor: ProxyExecutor,
        scheduler: Arc<RoundRobinScheduler>,
    ) -> Self {
        Self {
            store,
            executor,
            scheduler,
            actions: None,
            sink: Arc::new(TracingLogSink),
        }
    }

    pub fn with_actions(mut self, actions: ActionPipeline) -> Self {
        self.actions = Some(actions);
        self
    }

    pub fn with_log_sink(mut self, sink: Arc<dyn RequestLogSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn scheduler(&self) -> &RoundRobinScheduler {
        &self.scheduler
    }

    /// Answer `request` for the project behind `alias`.
    ///
    /// `request.path` is relative to the project. Every failure is rendered
    /// into the response; this never errors.
    pub async fn handle(&self, alias: &str, mut request: RequestData) -> Dispatched {
        let started = Instant::now();

        let project = match self.store.find_project_by_alias(alias).await {
            Ok(Some(project)) => project,
            Ok(None) => {
                debug!("No project for alias '{}'", alias);
                let dispatched = Dispatched {
                    response: error_response(&DecoyError::ProjectNotFound),
                    project_id: String::new(),
                    mode: None,
                    matched: false,
                };
                self.report(alias, &request, &dispatched, started);
                return dispatched;
            }
            Err(e) => {
                warn!("Failed to resolve project '{}': {}", alias, e);
                let dispatched = Dispatched {
                    response: error_response(&DecoyError::Store(e)),
                    project_id: String::new(),
                    mode: None,
                    matched: false,
                };
                self.report(alias, &request, &dispatched, started);
                return dispatched;
            }
        };

        if let Some(actions) = &self.actions {
            actions.run_before(&project.id, &mut request).await;
        }

        let (mut response, mode, matched) = self.dispatch(&project, &request).await;

        if let Some(actions) = &self.actions {
            actions
                .run_after(&project.id, &request, &mut response)
                .await;
        }

        let dispatched = Dispatched {
            response,
            project_id: project.id,
            mode: Some(mode),
            matched,
        };
        self.report(alias, &request, &dispatched, started);
        dispatched
    }

    /// Answer by project mode. Returns the response, the effective mode and
    /// the matched flag.
    async fn dispatch(
        &self,
        project: &Project,
        request: &RequestData,
    ) -> (ResponseData, ProjectMode, bool) {
        let mode = project.mode.clone();
        match &project.mode {
            ProjectMode::Mock => self.dispatch_mock(project, request).await,
            ProjectMode::Proxy => {
                let (response, matched) = self.dispatch_proxy(project, request).await;
                (response, mode, matched)
            }
            ProjectMode::Forwarder => {
                let (response, matched) = self.dispatch_forwarder(project, request).await;
                (response, mode, matched)
            }
            ProjectMode::Disabled => (error_response(&DecoyError::Disabled), mode, false),
            ProjectMode::Unknown(name) => {
                warn!("Project {} has unknown mode '{}'", project.id, name);
                (error_response(&DecoyError::InvalidMode), mode, false)
            }
        }
    }

    /// An endpoint-level forward reports `proxy` as the effective mode.
    async fn dispatch_mock(
        &self,
        project: &Project,
        request: &RequestData,
    ) -> (ResponseData, ProjectMode, bool) {
        match self.resolve_mock(project, request).await {
            Ok(MockOutcome::Answered(response)) => (response, ProjectMode::Mock, true),
            Ok(MockOutcome::Forwarded(response)) => (response, ProjectMode::Proxy, true),
            Ok(MockOutcome::NoEndpoint) => {
                apply_delay(project, None, None).await;
                (error_response(&DecoyError::EndpointNotFound), ProjectMode::Mock, false)
            }
            Ok(MockOutcome::NoResponses(endpoint)) => {
                apply_delay(project, Some(&endpoint), None).await;
                (error_response(&DecoyError::NoResponses), ProjectMode::Mock, true)
            }
            Err(e) => (error_response(&e), ProjectMode::Mock, false),
        }
    }

    async fn dispatch_proxy(&self, project: &Project, request: &RequestData) -> (ResponseData, bool) {
        let target = match self.active_target(project).await {
            Ok(target) => target,
            Err(e) => return (error_response(&e), false),
        };
        if has_reserved_header(&request.headers) {
            return (error_response(&DecoyError::LoopDetected), false);
        }

        match self.resolve_mock(project, request).await {
            Ok(MockOutcome::Answered(mut response) | MockOutcome::Forwarded(mut response)) => {
                response.set_header(&DECOY_RESPONSE_TYPE, &VALUE_MOCK);
                return (response, true);
            }
            Ok(_) => debug!(
                "No mock for {} {} in project {}, proxying",
                request.method, request.path, project.id
            ),
            Err(e) => debug!("Mock resolution failed in proxy mode, proxying: {}", e),
        }

        apply_delay(project, None, None).await;
        let mut response = self.forward(&project.mode, &target, request).await;
        response.set_header(&DECOY_RESPONSE_TYPE, &VALUE_PROXY);
        (response, false)
    }

    async fn dispatch_forwarder(
        &self,
        project: &Project,
        request: &RequestData,
    ) -> (ResponseData, bool) {
        let target = match self.active_target(project).await {
            Ok(target) => target,
            Err(e) => return (error_response(&e), false),
        };
        if has_reserved_header(&request.headers) {
            return (error_response(&DecoyError::LoopDetected), false);
        }

        apply_delay(project, None, None).await;
        (self.forward(&project.mode, &target, request).await, false)
    }

    /// Match an endpoint and produce its answer, applying the delay cascade.
    async fn resolve_mock(
        &self,
        project: &Project,
        request: &RequestData,
    ) -> Result<MockOutcome, DecoyError> {
        let Some(endpoint) = self
            .store
            .find_matching_endpoint(&project.id, request.method.as_str(), &request.path)
            .await?
        else {
            return Ok(MockOutcome::NoEndpoint);
        };
        debug!(
            "Matched endpoint {} ({} {}) for {}",
            endpoint.id, endpoint.method, endpoint.path, request.path
        );

        if endpoint.use_proxy {
            if let Some(target) = self.endpoint_target(&endpoint).await? {
                apply_delay(project, Some(&endpoint), None).await;
                let response = self.forward(&ProjectMode::Proxy, &target, request).await;
                return Ok(MockOutcome::Forwarded(response));
            }
            debug!(
                "Endpoint {} asks for a proxy but has no usable target",
                endpoint.id
            );
        }

        let responses = self.store.list_enabled_responses(&endpoint.id).await?;
        let Some(selected) = select_response(&endpoint, &responses, request, &self.scheduler)
        else {
            return Ok(MockOutcome::NoResponses(endpoint));
        };

        apply_delay(project, Some(&endpoint), Some(selected)).await;
        Ok(MockOutcome::Answered(mock_response(selected)))
    }

    async fn active_target(&self, project: &Project) -> Result<ProxyTarget, DecoyError> {
        let Some(id) = project.active_proxy_id.as_deref().filter(|id| !id.is_empty()) else {
            return Err(DecoyError::NoProxyTarget);
        };
        self.store
            .get_proxy_target(id)
            .await?
            .ok_or(DecoyError::NoProxyTarget)
    }

    async fn endpoint_target(&self, endpoint: &Endpoint) -> Result<Option<ProxyTarget>, DecoyError> {
        match endpoint.proxy_target_id.as_deref().filter(|id| !id.is_empty()) {
            Some(id) => Ok(self.store.get_proxy_target(id).await?),
            None => Ok(None),
        }
    }

    /// Forward and render failures into the error envelope.
    async fn forward(
        &self,
        mode: &ProjectMode,
        target: &ProxyTarget,
        request: &RequestData,
    ) -> ResponseData {
        let started = Instant::now();
        let result = self.executor.forward(&target.url, request).await;
        metrics::record_upstream(mode.as_str(), result.is_ok(), started.elapsed());

        match result {
            Ok(response) => response,
            Err(e) => {
                warn!(
                    "Forwarding {} {} to {} failed: {}",
                    request.method, request.path, target.url, e
                );
                error_response(&e)
            }
        }
    }

    fn report(&self, alias: &str, request: &RequestData, dispatched: &Dispatched, started: Instant) {
        let record = RequestRecord {
            project_id: dispatched.project_id.clone(),
            alias: alias.to_string(),
            method: request.method.clone(),
            path: request.path.clone(),
            status: dispatched.response.status,
            mode: dispatched.mode.clone(),
            matched: dispatched.matched,
            latency: started.elapsed(),
        };
        metrics::record_request(
            record.mode_label(),
            record.matched,
            record.status.as_u16(),
        );
        self.sink.record(&record);
    }
}
