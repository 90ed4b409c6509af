use serde::Deserialize;
use std::fmt;

use super::opaque_json;

/// Serving mode of a project, re-evaluated on every request.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ProjectMode {
    #[default]
    Mock,
    Proxy,
    Forwarder,
    Disabled,
    /// A mode this build does not know; served as a 500.
    Unknown(String),
}

impl From<String> for ProjectMode {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "mock" => ProjectMode::Mock,
            "proxy" => ProjectMode::Proxy,
            "forwarder" => ProjectMode::Forwarder,
            "disabled" => ProjectMode::Disabled,
            _ => ProjectMode::Unknown(value),
        }
    }
}

impl ProjectMode {
    pub fn as_str(&self) -> &str {
        match self {
            ProjectMode::Mock => "mock",
            ProjectMode::Proxy => "proxy",
            ProjectMode::Forwarder => "forwarder",
            ProjectMode::Disabled => "disabled",
            ProjectMode::Unknown(other) => other,
        }
    }
}

impl fmt::Display for ProjectMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Project {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub name: String,
    pub alias: String,
    #[serde(default)]
    pub mode: ProjectMode,
    /// Id of the [`ProxyTarget`] used by proxy and forwarder modes.
    #[serde(default)]
    pub active_proxy_id: Option<String>,
    #[serde(default, deserialize_with = "opaque_json")]
    pub advance_config: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProxyTarget {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub label: String,
    pub url: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_project_mode_parsing() {
        assert_eq!(ProjectMode::from("mock".to_string()), ProjectMode::Mock);
        assert_eq!(ProjectMode::from("PROXY".to_string()), ProjectMode::Proxy);
        assert_eq!(
            ProjectMode::from("forwarder".to_string()),
            ProjectMode::Forwarder
        );
        assert_eq!(
            ProjectMode::from("replay".to_string()),
            ProjectMode::Unknown("replay".to_string())
        );
        assert_eq!(ProjectMode::Unknown("replay".into()).as_str(), "replay");
    }

    #[test]
    fn test_project_deserialize_inline_advance_config() {
        let yaml = r#"
alias: shop
mode: proxy
active_proxy_id: upstream-1
advance_config:
  delayMs: 100
"#;
        let project: Project = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(project.mode, ProjectMode::Proxy);
        assert_eq!(project.active_proxy_id.as_deref(), Some("upstream-1"));
        assert_eq!(project.advance_config.as_deref(), Some(r#"{"delayMs":100}"#));
    }
}
