//! Error types for the serving path.
//!
//! Every failure that can happen while answering a request is a [`DecoyError`].
//! None of them escape as a fault: the dispatcher renders each one into the
//! JSON error envelope with the status returned by [`DecoyError::status`].

use hyper::StatusCode;
use thiserror::Error;

use crate::store::StoreError;

#[derive(Debug, Error)]
pub enum DecoyError {
    #[error("Project not found")]
    ProjectNotFound,

    #[error("Endpoint not found")]
    EndpointNotFound,

    #[error("No responses configured")]
    NoResponses,

    #[error("No proxy target configured")]
    NoProxyTarget,

    #[error("Proxy loop detected: request contains decoy header")]
    LoopDetected,

    #[error("Invalid proxy URL: {0}")]
    InvalidProxyUrl(String),

    /// DNS, connect, timeout or protocol failure while talking to the upstream.
    #[error("Request error: {0}")]
    Upstream(String),

    #[error("Service is disabled")]
    Disabled,

    #[error("Invalid project mode")]
    InvalidMode,

    #[error("Invalid request: {0}")]
    BadRequest(String),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl DecoyError {
    pub fn status(&self) -> StatusCode {
        match self {
            DecoyError::BadRequest(_) => StatusCode::BAD_REQUEST,
            DecoyError::ProjectNotFound | DecoyError::EndpointNotFound => StatusCode::NOT_FOUND,
            DecoyError::NoResponses
            | DecoyError::NoProxyTarget
            | DecoyError::InvalidProxyUrl(_)
            | DecoyError::InvalidMode
            | DecoyError::Store(_) => StatusCode::INTERNAL_SERVER_ERROR,
            DecoyError::LoopDetected => StatusCode::LOOP_DETECTED,
            DecoyError::Upstream(_) => StatusCode::BAD_GATEWAY,
            DecoyError::Disabled => StatusCode::SERVICE_UNAVAILABLE,
        }
    }
}
