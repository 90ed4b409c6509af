use async_trait::async_trait;
use std::collections::HashMap;
use std::path::Path;
use tracing::{info, warn};

use super::catalog::Catalog;
use super::{ActionStore, MockStore, StoreError};
use crate::actions::ActionConfig;
use crate::matching::best_match;
use crate::model::{Action, Endpoint, ExecutionPoint, MockResponse, Project, ProxyTarget};

/// Read-only store backed by a catalog loaded into memory.
#[derive(Debug, Default)]
pub struct InMemoryStore {
    projects: HashMap<String, Project>,
    /// Endpoints per project id, in catalog order.
    endpoints: HashMap<String, Vec<Endpoint>>,
    /// Responses per endpoint id, in catalog order.
    responses: HashMap<String, Vec<MockResponse>>,
    proxy_targets: HashMap<String, ProxyTarget>,
    /// Actions per project id, sorted by priority then creation time.
    actions: HashMap<String, Vec<Action>>,
}

impl InMemoryStore {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let store = Self::from_catalog(Catalog::from_file(path.as_ref())?)?;
        info!(
            "Loaded catalog {}: {} project(s)",
            path.as_ref().display(),
            store.projects.len()
        );
        Ok(store)
    }

    pub fn from_yaml(contents: &str) -> Result<Self, StoreError> {
        Self::from_catalog(Catalog::from_yaml(contents)?)
    }

    /// Index a catalog, filling in missing ids and parent references.
    pub fn from_catalog(catalog: Catalog) -> Result<Self, StoreError> {
        let mut store = Self::default();

        for entry in catalog.projects {
            let mut project = entry.project;
            if project.alias.trim().is_empty() {
                return Err(StoreError::Invalid("project alias must not be empty".into()));
            }
            if project.id.is_empty() {
                project.id = project.alias.clone();
            }
            if store.projects.contains_key(&project.alias) {
                return Err(StoreError::Invalid(format!(
                    "duplicate project alias '{}'",
                    project.alias
                )));
            }

            for (index, mut target) in entry.proxy_targets.into_iter().enumerate() {
                if target.id.is_empty() {
                    target.id = format!("{}-proxy-{}", project.id, index);
                }
                target.project_id = project.id.clone();
                store.proxy_targets.insert(target.id.clone(), target);
            }

            if let Some(active) = project.active_proxy_id.as_deref() {
                if !store.proxy_targets.contains_key(active) {
                    warn!(
                        "Project '{}' references unknown proxy target '{}'",
                        project.alias, active
                    );
                }
            }

            let mut endpoints = Vec::with_capacity(entry.endpoints.len());
            for (index, catalog_endpoint) in entry.endpoints.into_iter().enumerate() {
                let mut endpoint = catalog_endpoint.endpoint;
                if endpoint.id.is_empty() {
                    endpoint.id = format!("{}-endpoint-{}", project.id, index);
                }
                endpoint.project_id = project.id.clone();
                endpoint.method = endpoint.method.to_ascii_uppercase();

                let responses = catalog_endpoint
                    .responses
                    .into_iter()
                    .enumerate()
                    .map(|(index, mut response)| {
                        if response.id.is_empty() {
                            response.id = format!("{}-response-{}", endpoint.id, index);
                        }
                        response.endpoint_id = endpoint.id.clone();
                        response
                    })
                    .collect();
                store.responses.insert(endpoint.id.clone(), responses);
                endpoints.push(endpoint);
            }
            store.endpoints.insert(project.id.clone(), endpoints);

            let mut actions: Vec<Action> = entry
                .actions
                .into_iter()
                .enumerate()
                .map(|(index, mut action)| {
                    if action.id.is_empty() {
                        action.id = format!("{}-action-{}", project.id, index);
                    }
                    action.project_id = project.id.clone();
                    action
                })
                .collect();
            for action in &actions {
                if let Err(e) = ActionConfig::from_action(action).and_then(|c| c.validate()) {
                    warn!("Action '{}' has an invalid configuration: {}", action.id, e);
                }
            }
            // stable: equal keys keep catalog order
            actions.sort_by_key(|action| {
                (action.priority, action.created_at.is_none(), action.created_at)
            });
            store.actions.insert(project.id.clone(), actions);

            store.projects.insert(project.alias.clone(), project);
        }

        Ok(store)
    }

    pub fn project_count(&self) -> usize {
        self.projects.len()
    }
}

#[async_trait]
impl MockStore for InMemoryStore {
    async fn find_project_by_alias(&self, alias: &str) -> Result<Option<Project>, StoreError> {
        Ok(self.projects.get(alias).cloned())
    }

    async fn find_matching_endpoint(
        &self,
        project_id: &str,
        method: &str,
        path: &str,
    ) -> Result<Option<Endpoint>, StoreError> {
        let Some(endpoints) = self.endpoints.get(project_id) else {
            return Ok(None);
        };
        Ok(best_match(endpoints, &method.to_ascii_uppercase(), path)
            .map(|(endpoint, _)| endpoint.clone()))
    }

    async fn list_enabled_responses(
        &self,
        endpoint_id: &str,
    ) -> Result<Vec<MockResponse>, StoreError> {
        Ok(self
            .responses
            .get(endpoint_id)
            .map(|responses| responses.iter().filter(|r| r.enabled).cloned().collect())
            .unwrap_or_default())
    }

    async fn get_proxy_target(&self, id: &str) -> Result<Option<ProxyTarget>, StoreError> {
        Ok(self.proxy_targets.get(id).cloned())
    }
}

#[async_trait]
impl ActionStore for InMemoryStore {
    async fn list_enabled_actions(
        &self,
        project_id: &str,
        point: ExecutionPoint,
    ) -> Result<Vec<Action>, StoreError> {
        Ok(self
            .actions
            .get(project_id)
            .map(|actions| {
                actions
                    .iter()
                    .filter(|a| a.enabled && a.execution_point == point)
                    .cloned()
                    .collect()
            })
            .unwrap_or_default())
    }
}
