//! Script sandbox and round-robin state configuration.

use serde::{Deserialize, Serialize};
use std::time::Duration;

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ScriptingConfig {
    /// Wall-clock budget for a single `run_javascript` invocation.
    #[serde(default = "default_timeout_ms")]
    pub timeout_ms: u64,
    /// Per-frame loop bound. Catches loops inside callbacks that builtins
    /// such as `Array.prototype.forEach` run outside the interruptible path.
    #[serde(default = "default_loop_iteration_limit")]
    pub loop_iteration_limit: u64,
    /// Script threads allowed to run at once.
    #[serde(default = "default_max_concurrent")]
    pub max_concurrent: usize,
}

fn default_timeout_ms() -> u64 {
    5000
}

fn default_loop_iteration_limit() -> u64 {
    100_000_000
}

fn default_max_concurrent() -> usize {
    32
}

impl Default for ScriptingConfig {
    fn default() -> Self {
        Self {
            timeout_ms: default_timeout_ms(),
            loop_iteration_limit: default_loop_iteration_limit(),
            max_concurrent: default_max_concurrent(),
        }
    }
}

impl ScriptingConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct RoundRobinConfig {
    /// Cursors idle for longer than this are dropped on the next selection.
    #[serde(default = "default_state_ttl_secs")]
    pub state_ttl_secs: u64,
}

fn default_state_ttl_secs() -> u64 {
    3600
}

impl Default for RoundRobinConfig {
    fn default() -> Self {
        Self {
            state_ttl_secs: default_state_ttl_secs(),
        }
    }
}

impl RoundRobinConfig {
    pub fn state_ttl(&self) -> Duration {
        Duration::from_secs(self.state_ttl_secs)
    }
}
