//! Response rule evaluation.

use serde_json::Value;

use super::operator::ValueMatcher;
use crate::exchange::RequestData;
use crate::model::{MockResponse, Operator, Rule, RuleType, RulesLogic};

/// Whether `response`'s rules admit `request`. A response without rules
/// always passes.
pub fn response_matches(response: &MockResponse, request: &RequestData) -> bool {
    if response.rules.is_empty() {
        return true;
    }

    let mut results = response
        .rules
        .iter()
        .map(|rule| rule_matches(rule, request));

    match response.rules_logic {
        RulesLogic::And => results.all(|passed| passed),
        RulesLogic::Or => results.any(|passed| passed),
    }
}

pub fn rule_matches(rule: &Rule, request: &RequestData) -> bool {
    let actual = match &rule.rule_type {
        RuleType::Header => request.header(&rule.key).to_string(),
        RuleType::Query => request.query_value(&rule.key),
        RuleType::Body => body_value(&request.body_text(), &rule.key),
        RuleType::Path | RuleType::Unknown(_) => return true,
    };

    // rules compare with `equals` when the operator is not recognized
    ValueMatcher::compile(&rule.operator, &rule.value)
        .or_else(|| ValueMatcher::compile(&Operator::Equals, &rule.value))
        .is_some_and(|matcher| matcher.matches(&actual))
}

/// Value compared by a body rule: the nested JSON field addressed by the
/// dot-separated `key` when it exists and is non-empty, the raw body otherwise.
fn body_value(body: &str, key: &str) -> String {
    serde_json::from_str::<Value>(body)
        .ok()
        .and_then(|json| nested_value(&json, key))
        .filter(|value| !value.is_empty())
        .unwrap_or_else(|| body.to_string())
}

fn nested_value(json: &Value, key: &str) -> Option<String> {
    if key.is_empty() {
        return None;
    }

    let mut current = json;
    for part in key.split('.') {
        current = current.as_object()?.get(part)?;
    }

    match current {
        Value::Null => None,
        Value::String(s) => Some(s.clone()),
        Value::Bool(b) => Some(b.to_string()),
        Value::Number(n) => Some(n.to_string()),
        other => Some(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hyper::Method;

    fn rule(rule_type: &str, key: &str, operator: &str, value: &str) -> Rule {
        Rule {
            rule_type: RuleType::from(rule_type.to_string()),
            key: key.to_string(),
            operator: Operator::from(operator),
            value: value.to_string(),
        }
    }

    fn response_with(rules: Vec<Rule>, logic: RulesLogic) -> MockResponse {
        MockResponse {
            id: "r1".to_string(),
            endpoint_id: "e1".to_string(),
            status_code: 200,
            body: String::new(),
            headers: None,
            priority: 0,
            delay_ms: 0,
            stream: false,
            enabled: true,
            rules,
            rules_logic: logic,
        }
    }

    #[test]
    fn test_no_rules_always_passes() {
        let request = RequestData::new(Method::GET, "/");
        assert!(response_matches(
            &response_with(vec![], RulesLogic::And),
            &request
        ));
    }

    #[test]
    fn test_header_rule() {
        let request = RequestData::new(Method::GET, "/").with_header("X-Tenant", "acme-corp");
        assert!(rule_matches(
            &rule("header", "x-tenant", "starts_with", "acme"),
            &request
        ));
        assert!(!rule_matches(
            &rule("header", "x-tenant", "equals", "acme"),
            &request
        ));
        // missing header reads as empty
        assert!(rule_matches(&rule("header", "x-other", "equals", ""), &request));
    }

    #[test]
    fn test_query_rule() {
        let request = RequestData::new(Method::GET, "/").with_query("status=active&page=2");
        assert!(rule_matches(&rule("query", "status", "equals", "active"), &request));
        assert!(rule_matches(&rule("query", "page", "regex", r"^\d+$"), &request));
        assert!(!rule_matches(&rule("query", "missing", "equals", "x"), &request));
    }

    #[test]
    fn test_body_rule_nested_key() {
        let request = RequestData::new(Method::POST, "/")
            .with_body(r#"{"user":{"role":"admin","age":42,"active":true}}"#);
        assert!(rule_matches(&rule("body", "user.role", "equals", "admin"), &request));
        assert!(rule_matches(&rule("body", "user.age", "equals", "42"), &request));
        assert!(rule_matches(&rule("body", "user.active", "equals", "true"), &request));
        assert!(rule_matches(
            &rule("body", "user", "contains", r#""role":"admin""#),
            &request
        ));
    }

    #[test]
    fn test_body_rule_falls_back_to_raw_body() {
        let request = RequestData::new(Method::POST, "/").with_body("plain text payload");
        assert!(rule_matches(&rule("body", "any", "contains", "text"), &request));

        let request = RequestData::new(Method::POST, "/").with_body(r#"{"name":""}"#);
        assert!(rule_matches(&rule("body", "name", "equals", r#"{"name":""}"#), &request));
    }

    #[test]
    fn test_invalid_regex_rule_fails_closed() {
        let request = RequestData::new(Method::GET, "/").with_header("X-Id", "abc");
        assert!(!rule_matches(&rule("header", "x-id", "regex", "(abc"), &request));
    }

    #[test]
    fn test_unknown_operator_compares_equals() {
        let request = RequestData::new(Method::GET, "/").with_header("X-Id", "abc");
        assert!(rule_matches(&rule("header", "x-id", "is", "abc"), &request));
        assert!(!rule_matches(&rule("header", "x-id", "is", "ab"), &request));
    }

    #[test]
    fn test_path_rule_is_ignored() {
        let request = RequestData::new(Method::GET, "/anything");
        assert!(rule_matches(&rule("path", "", "equals", "/else"), &request));
    }

    #[test]
    fn test_and_logic_requires_all() {
        let request = RequestData::new(Method::GET, "/")
            .with_header("X-Tenant", "acme")
            .with_query("debug=1");
        let both = vec![
            rule("header", "x-tenant", "equals", "acme"),
            rule("query", "debug", "equals", "1"),
        ];
        assert!(response_matches(&response_with(both, RulesLogic::And), &request));

        let one_fails = vec![
            rule("header", "x-tenant", "equals", "acme"),
            rule("query", "debug", "equals", "0"),
        ];
        assert!(!response_matches(
            &response_with(one_fails, RulesLogic::And),
            &request
        ));
    }

    #[test]
    fn test_or_logic_requires_one() {
        let request = RequestData::new(Method::GET, "/").with_header("X-Tenant", "acme");
        let rules = vec![
            rule("header", "x-tenant", "equals", "other"),
            rule("header", "x-tenant", "equals", "acme"),
        ];
        assert!(response_matches(
            &response_with(rules.clone(), RulesLogic::Or),
            &request
        ));
        // unrecognized logic values deserialize to Or
        assert!(response_matches(
            &response_with(rules, RulesLogic::from("xor".to_string())),
            &request
        ));

        let none = vec![rule("header", "x-tenant", "equals", "other")];
        assert!(!response_matches(&response_with(none, RulesLogic::Or), &request));
    }
}
