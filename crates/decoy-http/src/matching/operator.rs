//! String comparison shared by response rules and action filters.

use regex::Regex;
use std::sync::Arc;
use tracing::debug;

use crate::model::Operator;

/// A compiled `(operator, expected value)` pair.
#[derive(Debug, Clone)]
pub enum ValueMatcher {
    Equals(String),
    Contains(String),
    StartsWith(String),
    EndsWith(String),
    Regex(Arc<Regex>),
    /// A regex that failed to compile; never matches.
    Never,
}

impl ValueMatcher {
    /// Compile an operator against its expected value.
    ///
    /// Returns `None` for unrecognized operators so each caller can pick its
    /// own fallback. An invalid regex compiles to [`ValueMatcher::Never`].
    pub fn compile(operator: &Operator, expected: &str) -> Option<Self> {
        let matcher = match operator {
            Operator::Equals => Self::Equals(expected.to_string()),
            Operator::Contains => Self::Contains(expected.to_string()),
            Operator::StartsWith => Self::StartsWith(expected.to_string()),
            Operator::EndsWith => Self::EndsWith(expected.to_string()),
            Operator::Regex => match Regex::new(expected) {
                Ok(regex) => Self::Regex(Arc::new(regex)),
                Err(e) => {
                    debug!("Invalid regex pattern '{}': {}", expected, e);
                    Self::Never
                }
            },
            Operator::Unknown(_) => return None,
        };
        Some(matcher)
    }

    pub fn matches(&self, actual: &str) -> bool {
        match self {
            Self::Equals(expected) => actual == expected,
            Self::Contains(expected) => actual.contains(expected.as_str()),
            Self::StartsWith(expected) => actual.starts_with(expected.as_str()),
            Self::EndsWith(expected) => actual.ends_with(expected.as_str()),
            Self::Regex(regex) => regex.is_match(actual),
            Self::Never => false,
        }
    }
}
