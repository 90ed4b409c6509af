//! Read interfaces to the persistence layer.
//!
//! Projects, endpoints, responses, proxy targets and actions are owned by an
//! external collaborator. The serving path only reads them through
//! [`MockStore`] and [`ActionStore`]; [`InMemoryStore`] implements both from a
//! catalog file.

mod catalog;
mod memory;

#[allow(unused_imports)]
pub use catalog::{Catalog, CatalogEndpoint, CatalogProject};
pub use memory::InMemoryStore;

use async_trait::async_trait;
use thiserror::Error;

use crate::model::{Action, Endpoint, ExecutionPoint, MockResponse, Project, ProxyTarget};

#[derive(Debug, Error)]
pub enum StoreError {
    #[error("failed to read catalog: {0}")]
    Io(#[from] std::io::Error),

    #[error("failed to parse catalog: {0}")]
    Parse(String),

    #[error("invalid catalog: {0}")]
    Invalid(String),

    #[error("store backend error: {0}")]
    Backend(String),
}

#[async_trait]
pub trait MockStore: Send + Sync {
    async fn find_project_by_alias(&self, alias: &str) -> Result<Option<Project>, StoreError>;

    /// Best-scoring enabled endpoint of the project for `method` and `path`.
    async fn find_matching_endpoint(
        &self,
        project_id: &str,
        method: &str,
        path: &str,
    ) -> Result<Option<Endpoint>, StoreError>;

    /// Enabled responses of an endpoint, rules included, in storage order.
    async fn list_enabled_responses(
        &self,
        endpoint_id: &str,
    ) -> Result<Vec<MockResponse>, StoreError>;

    async fn get_proxy_target(&self, id: &str) -> Result<Option<ProxyTarget>, StoreError>;
}

#[async_trait]
pub trait ActionStore: Send + Sync {
    /// Enabled actions of a project for one execution point, filters
    /// included, ordered by priority then creation time.
    async fn list_enabled_actions(
        &self,
        project_id: &str,
        point: ExecutionPoint,
    ) -> Result<Vec<Action>, StoreError>;
}
