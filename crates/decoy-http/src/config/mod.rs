//! Server configuration for Decoy.

mod listen;
mod scripting;
mod upstream;

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

#[allow(unused_imports)]
pub use listen::{ListenConfig, MetricsConfig};
#[allow(unused_imports)]
pub use scripting::{RoundRobinConfig, ScriptingConfig};
#[allow(unused_imports)]
pub use upstream::ProxyConfig;

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
pub struct ServerConfig {
    #[serde(default)]
    pub listen: ListenConfig,
    /// Catalog of projects, endpoints, responses and actions served by the
    /// in-memory store (YAML or JSON).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog: Option<PathBuf>,
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub scripting: ScriptingConfig,
    #[serde(default)]
    pub round_robin: RoundRobinConfig,
    #[serde(default)]
    pub metrics: MetricsConfig,
}

impl ServerConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self, anyhow::Error> {
        let contents = std::fs::read_to_string(path)?;
        let config: ServerConfig = serde_yaml::from_str(&contents)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), anyhow::Error> {
        if self.listen.port == 0 {
            anyhow::bail!("listen.port must be greater than 0");
        }

        if self.proxy.timeout_secs == 0 {
            anyhow::bail!("proxy.timeout_secs must be greater than 0");
        }

        if self.scripting.timeout_ms == 0 {
            anyhow::bail!("scripting.timeout_ms must be greater than 0");
        }

        if self.scripting.max_concurrent == 0 {
            anyhow::bail!("scripting.max_concurrent must be greater than 0");
        }

        if self.round_robin.state_ttl_secs == 0 {
            anyhow::bail!("round_robin.state_ttl_secs must be greater than 0");
        }

        if self.metrics.enabled && self.metrics.port == self.listen.port {
            anyhow::bail!(
                "metrics.port ({}) must differ from listen.port",
                self.metrics.port
            );
        }

        Ok(())
    }
}
