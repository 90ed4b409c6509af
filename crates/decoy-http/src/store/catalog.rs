//! On-disk catalog format read by [`super::InMemoryStore`].

use serde::Deserialize;
use std::path::Path;

use super::StoreError;
use crate::model::{Action, Endpoint, MockResponse, Project, ProxyTarget};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Catalog {
    #[serde(default)]
    pub projects: Vec<CatalogProject>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogProject {
    #[serde(flatten)]
    pub project: Project,
    #[serde(default)]
    pub proxy_targets: Vec<ProxyTarget>,
    #[serde(default)]
    pub endpoints: Vec<CatalogEndpoint>,
    #[serde(default)]
    pub actions: Vec<Action>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CatalogEndpoint {
    #[serde(flatten)]
    pub endpoint: Endpoint,
    #[serde(default)]
    pub responses: Vec<MockResponse>,
}

impl Catalog {
    /// Load a catalog, choosing JSON or YAML by file extension.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, StoreError> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path)?;

        match path.extension().and_then(|ext| ext.to_str()) {
            Some("json") => Self::from_json(&contents),
            _ => Self::from_yaml(&contents),
        }
    }

    pub fn from_yaml(contents: &str) -> Result<Self, StoreError> {
        serde_yaml::from_str(contents).map_err(|e| StoreError::Parse(e.to_string()))
    }

    pub fn from_json(contents: &str) -> Result<Self, StoreError> {
        serde_json::from_str(contents).map_err(|e| StoreError::Parse(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{ProjectMode, ResponseMode};
    use std::io::Write;

    const CATALOG: &str = r#"
projects:
  - alias: shop
    mode: mock
    endpoints:
      - method: GET
        path: /users/:id
        response_mode: round_robin
        responses:
          - status_code: 200
            body: '{"id": 1}'
            headers:
              Content-Type: application/json
          - status_code: 404
            enabled: false
"#;

    #[test]
    fn test_parse_yaml_catalog() {
        let catalog = Catalog::from_yaml(CATALOG).unwrap();
        assert_eq!(catalog.projects.len(), 1);

        let project = &catalog.projects[0];
        assert_eq!(project.project.alias, "shop");
        assert_eq!(project.project.mode, ProjectMode::Mock);

        let endpoint = &project.endpoints[0];
        assert_eq!(endpoint.endpoint.response_mode, ResponseMode::RoundRobin);
        assert_eq!(endpoint.responses.len(), 2);
        assert_eq!(
            endpoint.responses[0].headers.as_deref(),
            Some(r#"{"Content-Type":"application/json"}"#)
        );
        assert!(!endpoint.responses[1].enabled);
    }

    #[test]
    fn test_parse_json_file() {
        let mut file = tempfile::Builder::new().suffix(".json").tempfile().unwrap();
        write!(
            file,
            r#"{{"projects":[{{"alias":"api","mode":"forwarder","active_proxy_id":"t1",
                "proxy_targets":[{{"id":"t1","url":"http://localhost:9000"}}]}}]}}"#
        )
        .unwrap();

        let catalog = Catalog::from_file(file.path()).unwrap();
        let project = &catalog.projects[0];
        assert_eq!(project.project.mode, ProjectMode::Forwarder);
        assert_eq!(project.proxy_targets[0].url, "http://localhost:9000");
    }

    #[test]
    fn test_malformed_catalog() {
        assert!(matches!(
            Catalog::from_yaml("projects: [alias"),
            Err(StoreError::Parse(_))
        ));
    }
}
