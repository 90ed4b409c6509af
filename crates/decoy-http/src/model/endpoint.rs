use serde::Deserialize;

use super::{opaque_json, Operator};

/// How one response is picked among an endpoint's candidates.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum ResponseMode {
    Static,
    /// Also used for unrecognized mode names.
    #[default]
    Random,
    RoundRobin,
}

impl From<String> for ResponseMode {
    fn from(value: String) -> Self {
        match value.as_str() {
            "static" => ResponseMode::Static,
            "round_robin" => ResponseMode::RoundRobin,
            _ => ResponseMode::Random,
        }
    }
}

/// How a response's rules are combined.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RulesLogic {
    And,
    /// Also used for unrecognized values.
    #[default]
    Or,
}

impl From<String> for RulesLogic {
    fn from(value: String) -> Self {
        if value.eq_ignore_ascii_case("and") {
            RulesLogic::And
        } else {
            RulesLogic::Or
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum RuleType {
    Header,
    Query,
    Body,
    /// Paths are resolved by endpoint matching; such rules always pass.
    Path,
    Unknown(String),
}

impl From<String> for RuleType {
    fn from(value: String) -> Self {
        match value.as_str() {
            "header" => RuleType::Header,
            "query" => RuleType::Query,
            "body" => RuleType::Body,
            "path" => RuleType::Path,
            _ => RuleType::Unknown(value),
        }
    }
}

/// A condition gating whether a response may be selected.
#[derive(Debug, Clone, Deserialize)]
pub struct Rule {
    #[serde(rename = "type")]
    pub rule_type: RuleType,
    #[serde(default)]
    pub key: String,
    #[serde(default)]
    pub operator: Operator,
    #[serde(default)]
    pub value: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Endpoint {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub project_id: String,
    pub method: String,
    pub path: String,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub response_mode: ResponseMode,
    #[serde(default, deserialize_with = "opaque_json")]
    pub advance_config: Option<String>,
    /// Forward matched requests to `proxy_target_id` instead of mocking.
    #[serde(default)]
    pub use_proxy: bool,
    #[serde(default)]
    pub proxy_target_id: Option<String>,
}

/// A canned response owned by an endpoint.
#[derive(Debug, Clone, Deserialize)]
pub struct MockResponse {
    #[serde(default)]
    pub id: String,
    #[serde(default)]
    pub endpoint_id: String,
    #[serde(default = "default_status_code")]
    pub status_code: u16,
    #[serde(default)]
    pub body: String,
    /// JSON object of header name to value.
    #[serde(default, deserialize_with = "opaque_json")]
    pub headers: Option<String>,
    /// Higher is preferred.
    #[serde(default)]
    pub priority: i32,
    #[serde(default)]
    pub delay_ms: i64,
    #[serde(default)]
    pub stream: bool,
    #[serde(default = "default_true")]
    pub enabled: bool,
    #[serde(default)]
    pub rules: Vec<Rule>,
    #[serde(default)]
    pub rules_logic: RulesLogic,
}

fn default_true() -> bool {
    true
}

fn default_status_code() -> u16 {
    200
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_response_mode_fallback() {
        assert_eq!(ResponseMode::from("static".to_string()), ResponseMode::Static);
        assert_eq!(
            ResponseMode::from("round_robin".to_string()),
            ResponseMode::RoundRobin
        );
        assert_eq!(ResponseMode::from("weighted".to_string()), ResponseMode::Random);
    }

    #[test]
    fn test_rules_logic_fallback() {
        assert_eq!(RulesLogic::from("and".to_string()), RulesLogic::And);
        assert_eq!(RulesLogic::from("AND".to_string()), RulesLogic::And);
        assert_eq!(RulesLogic::from("xor".to_string()), RulesLogic::Or);
        assert_eq!(RulesLogic::default(), RulesLogic::Or);
    }

    #[test]
    fn test_response_defaults() {
        let response: MockResponse = serde_yaml::from_str("body: hello").unwrap();
        assert_eq!(response.status_code, 200);
        assert!(response.enabled);
        assert!(response.rules.is_empty());
        assert_eq!(response.rules_logic, RulesLogic::Or);
        assert!(response.headers.is_none());
    }

    #[test]
    fn test_rule_deserialize() {
        let yaml = r#"
type: header
key: X-Tenant
operator: starts_with
value: acme
"#;
        let rule: Rule = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(rule.rule_type, RuleType::Header);
        assert_eq!(rule.operator, Operator::StartsWith);
    }
}
