//! Read-only data model consumed by the serving path.
//!
//! These types are loaded by an external collaborator (see [`crate::store`])
//! and never mutated by the core. Configuration blobs that the storage layer
//! persists as opaque JSON strings (`advance_config`, response `headers`,
//! action `config`) stay strings here and are parsed where they are used.

mod action;
mod advance;
mod endpoint;
mod operator;
mod project;

#[allow(unused_imports)]
pub use action::{Action, ActionFilter, ExecutionPoint, FilterType};
pub use advance::{AdvanceConfig, MAX_DELAY_MS};
#[allow(unused_imports)]
pub use endpoint::{Endpoint, MockResponse, ResponseMode, Rule, RuleType, RulesLogic};
pub use operator::Operator;
#[allow(unused_imports)]
pub use project::{Project, ProjectMode, ProxyTarget};

use serde::{Deserialize, Deserializer};
use serde_json::Value;

/// Accepts either a JSON string or any structured value and keeps it as a
/// JSON string, so catalogs may inline objects where storage keeps text.
pub(crate) fn opaque_json<'de, D>(deserializer: D) -> Result<Option<String>, D::Error>
where
    D: Deserializer<'de>,
{
    let value = Option::<Value>::deserialize(deserializer)?;
    Ok(match value {
        None | Some(Value::Null) => None,
        Some(Value::String(s)) => Some(s),
        Some(other) => Some(other.to_string()),
    })
}
