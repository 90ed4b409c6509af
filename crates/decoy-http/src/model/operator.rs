use serde::Deserialize;
use std::fmt;

/// Comparison operator shared by response rules and action filters.
///
/// Unrecognized operator names are preserved in [`Operator::Unknown`]; each
/// caller decides how to treat them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(from = "String")]
pub enum Operator {
    #[default]
    Equals,
    Contains,
    StartsWith,
    EndsWith,
    Regex,
    Unknown(String),
}

impl From<String> for Operator {
    fn from(value: String) -> Self {
        match value.to_ascii_lowercase().as_str() {
            "equals" => Operator::Equals,
            "contains" => Operator::Contains,
            "starts_with" => Operator::StartsWith,
            "ends_with" => Operator::EndsWith,
            "regex" => Operator::Regex,
            _ => Operator::Unknown(value),
        }
    }
}

impl From<&str> for Operator {
    fn from(value: &str) -> Self {
        Operator::from(value.to_string())
    }
}

impl fmt::Display for Operator {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Operator::Equals => f.write_str("equals"),
            Operator::Contains => f.write_str("contains"),
            Operator::StartsWith => f.write_str("starts_with"),
            Operator::EndsWith => f.write_str("ends_with"),
            Operator::Regex => f.write_str("regex"),
            Operator::Unknown(other) => f.write_str(other),
        }
    }
}
