//! Typed action configuration.

use regex::Regex;
use serde::Deserialize;

use super::ActionError;
use crate::model::Action;

/// Where `replace_text` applies its substitution.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplaceTarget {
    RequestBody,
    ResponseBody,
    RequestHeader,
    ResponseHeader,
}

impl ReplaceTarget {
    pub fn is_header(&self) -> bool {
        matches!(self, ReplaceTarget::RequestHeader | ReplaceTarget::ResponseHeader)
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct ReplaceTextConfig {
    pub target: ReplaceTarget,
    pub pattern: String,
    #[serde(default)]
    pub replacement: String,
    #[serde(default)]
    pub use_regex: bool,
    /// Required for header targets.
    #[serde(default)]
    pub header_key: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RunJavascriptConfig {
    pub script: String,
}

/// Configuration of an action, keyed by its type.
#[derive(Debug, Clone)]
pub enum ActionConfig {
    ReplaceText(ReplaceTextConfig),
    RunJavascript(RunJavascriptConfig),
}

impl ActionConfig {
    /// Deserialize the stored JSON config for `action_type`.
    ///
    /// Unknown types, malformed JSON, unknown replace targets and header
    /// targets without a `header_key` are rejected here.
    pub fn parse(action_type: &str, raw: Option<&str>) -> Result<Self, ActionError> {
        let raw = raw.map(str::trim).filter(|r| !r.is_empty()).unwrap_or("{}");
        let invalid = |e: serde_json::Error| ActionError::InvalidConfig(e.to_string());

        let config = match action_type {
            "replace_text" => {
                let config: ReplaceTextConfig = serde_json::from_str(raw).map_err(invalid)?;
                let missing_key = config
                    .header_key
                    .as_deref()
                    .map_or(true, |key| key.trim().is_empty());
                if config.target.is_header() && missing_key {
                    return Err(ActionError::InvalidConfig(
                        "header_key is required for header targets".to_string(),
                    ));
                }
                Self::ReplaceText(config)
            }
            "run_javascript" => Self::RunJavascript(serde_json::from_str(raw).map_err(invalid)?),
            other => return Err(ActionError::UnsupportedType(other.to_string())),
        };
        Ok(config)
    }

    pub fn from_action(action: &Action) -> Result<Self, ActionError> {
        Self::parse(&action.action_type, action.config.as_deref())
    }

    /// Stricter checks run when a catalog is loaded.
    pub fn validate(&self) -> Result<(), ActionError> {
        match self {
            Self::ReplaceText(config) => {
                if config.pattern.is_empty() {
                    return Err(ActionError::InvalidConfig("pattern is required".to_string()));
                }
                if config.use_regex {
                    Regex::new(&config.pattern).map_err(|e| {
                        ActionError::InvalidConfig(format!("invalid regex pattern: {e}"))
                    })?;
                }
                Ok(())
            }
            Self::RunJavascript(config) => {
                if config.script.trim().is_empty() {
                    return Err(ActionError::InvalidConfig("script is required".to_string()));
                }
                Ok(())
            }
        }
    }

    pub fn type_name(&self) -> &'static str {
        match self {
            Self::ReplaceText(_) => "replace_text",
            Self::RunJavascript(_) => "run_javascript",
        }
    }
}
