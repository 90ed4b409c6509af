use serde::Deserialize;
use std::time::Duration;

/// Upper bound accepted for a configured delay.
pub const MAX_DELAY_MS: i64 = 120_000;

/// Parsed form of a project or endpoint `advance_config` blob
/// (`{"delayMs": 250}`).
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct AdvanceConfig {
    #[serde(rename = "delayMs", default)]
    pub delay_ms: Option<i64>,
}

impl AdvanceConfig {
    /// Lenient parse: missing, empty or malformed configuration yields the
    /// default (no delay).
    pub fn parse(raw: Option<&str>) -> Self {
        match raw.map(str::trim) {
            Some(raw) if !raw.is_empty() => serde_json::from_str(raw).unwrap_or_default(),
            _ => Self::default(),
        }
    }

    /// The configured delay, if positive and within range.
    pub fn delay(&self) -> Option<Duration> {
        match self.delay_ms {
            Some(ms) if ms > 0 && ms <= MAX_DELAY_MS => Some(Duration::from_millis(ms as u64)),
            _ => None,
        }
    }
}
