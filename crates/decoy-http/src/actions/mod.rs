//! Project actions: request/response transformations run around dispatch.
//!
//! Actions are attached to a project and fire at one of two execution points.
//! `before_request` actions may rewrite the inbound request before routing;
//! `after_request` actions may rewrite the outbound response and only read the
//! request. Failures are logged and never abort the exchange.

pub mod config;
pub mod filter;
#[cfg(feature = "javascript")]
mod js_engine;
pub mod pipeline;
pub mod replace_text;
pub mod script;

#[allow(unused_imports)]
pub use config::{ActionConfig, ReplaceTarget, ReplaceTextConfig, RunJavascriptConfig};
#[allow(unused_imports)]
pub use filter::{filter_matches, should_execute};
#[allow(unused_imports)]
pub use pipeline::{ActionPipeline, PipelineReport};
#[allow(unused_imports)]
pub use script::{ScriptOutcome, ScriptSandbox};

use thiserror::Error;

use crate::exchange::{RequestData, ResponseData};
use crate::model::ExecutionPoint;

#[derive(Debug, Error)]
pub enum ActionError {
    #[error("unsupported action type: {0}")]
    UnsupportedType(String),

    #[error("invalid action config: {0}")]
    InvalidConfig(String),

    #[error("script error: {message}")]
    Script { message: String, logs: Vec<String> },

    #[error("script execution timeout after {timeout_ms}ms")]
    ScriptTimeout { timeout_ms: u64, logs: Vec<String> },

    #[error("javascript support is not compiled in")]
    ScriptingUnavailable,
}

impl ActionError {
    /// Console output captured before the failure, if any.
    pub fn logs(&self) -> &[String] {
        match self {
            ActionError::Script { logs, .. } | ActionError::ScriptTimeout { logs, .. } => logs.as_slice(),
            _ => &[],
        }
    }
}

/// The exchange an action operates on at its execution point.
pub enum ActionContext<'a> {
    Before {
        request: &'a mut RequestData,
    },
    After {
        request: &'a RequestData,
        response: &'a mut ResponseData,
    },
}

impl ActionContext<'_> {
    pub fn point(&self) -> ExecutionPoint {
        match self {
            ActionContext::Before { .. } => ExecutionPoint::BeforeRequest,
            ActionContext::After { .. } => ExecutionPoint::AfterRequest,
        }
    }

    pub fn request(&self) -> &RequestData {
        match self {
            ActionContext::Before { request } => &**request,
            ActionContext::After { request, .. } => *request,
        }
    }

    pub fn response(&self) -> Option<&ResponseData> {
        match self {
            ActionContext::Before { .. } => None,
            ActionContext::After { response, .. } => Some(&**response),
        }
    }

    /// The request, when it is still writable.
    pub fn request_mut(&mut self) -> Option<&mut RequestData> {
        match self {
            ActionContext::Before { request } => Some(&mut **request),
            ActionContext::After { .. } => None,
        }
    }

    pub fn response_mut(&mut self) -> Option<&mut ResponseData> {
        match self {
            ActionContext::Before { .. } => None,
            ActionContext::After { response, .. } => Some(&mut **response),
        }
    }
}
