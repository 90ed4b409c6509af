use chrono::{DateTime, Utc};
use serde::Deserialize;

use super::{opaque_json, Operator};

/// Where in the request lifecycle an action runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExecutionPoint {
    BeforeRequest,
    AfterRequest,
}

impl ExecutionPoint {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExecutionPoint::BeforeRequest => "before_request",
            ExecutionPoint::AfterRequest => "after_request",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum FilterType {
    Method,
    Path,
    Header,
    StatusCode,
    Unknown(String),
}

impl From<String> for FilterType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "method" => FilterType::Method,
            "path" => FilterType::Path,
            "header" => FilterType::Header,
            "status_code" => FilterType::StatusCode,
            _ => FilterType::Unknown(value),
        }
    }
}

/// A condition gating whether an action runs.
#[derive(Debug, Clone, Deserialize)]
pub struct ActionFilter {
    #[serde(rename = "type")]
    pub filter_type: FilterType,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
}

/// A request/response transformation attached to a project.
#[derive(Debug, Clone, Deserialize)]
pub struct Action {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    #[serde(default)]
    pub name: String,
    /// Module name, e.g. `replace_text` or `run_javascript`.
    #[serde(rename = "type")]
    pub action_type: String,
    pub execution_point: ExecutionPoint,
    #[serde(default = "default_true")]
    pub enabled: bool,
    /// 1-based; lower runs first.
    #[serde(default = "default_priority")]
    pub priority: i32,
    #[serde(default, deserialize_with = "opaque_json")]
    pub config: Option<String>,
    #[serde(default)]
    pub filters: Vec<ActionFilter>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

fn default_true() -> bool {
    true
}

fn default_priority() -> i32 {
    1
}
