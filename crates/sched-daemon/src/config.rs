//! `sched.toml` configuration.

use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Daemon-wide configuration, loaded from a `sched.toml` file.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SchedConfig {
    pub node: NodeConfig,
    pub store: StoreConfig,
    #[serde(default)]
    pub actor: ActorConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeConfig {
    pub id: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    pub data_dir: PathBuf,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActorConfig {
    #[serde(default = "default_cancellation_timeout_secs")]
    pub cancellation_timeout_secs: u64,
    #[serde(default = "default_reconcile_interval_secs")]
    pub reconcile_interval_secs: u64,
    #[serde(default = "default_scale_interval_secs")]
    pub scale_interval_secs: u64,
}

fn default_cancellation_timeout_secs() -> u64 {
    60
}

fn default_reconcile_interval_secs() -> u64 {
    30
}

fn default_scale_interval_secs() -> u64 {
    10
}

impl Default for ActorConfig {
    fn default() -> Self {
        Self {
            cancellation_timeout_secs: default_cancellation_timeout_secs(),
            reconcile_interval_secs: default_reconcile_interval_secs(),
            scale_interval_secs: default_scale_interval_secs(),
        }
    }
}

impl ActorConfig {
    pub fn cancellation_timeout(&self) -> Duration {
        Duration::from_secs(self.cancellation_timeout_secs)
    }

    pub fn reconcile_interval(&self) -> Duration {
        Duration::from_secs(self.reconcile_interval_secs)
    }

    pub fn scale_interval(&self) -> Duration {
        Duration::from_secs(self.scale_interval_secs)
    }
}

impl SchedConfig {
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let content = std::fs::read_to_string(path)?;
        let config: SchedConfig = toml::from_str(&content)?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> anyhow::Result<String> {
        Ok(toml::to_string_pretty(self)?)
    }

    /// A minimal config suitable for a single-node standalone run.
    pub fn scaffold(node_id: &str, data_dir: PathBuf) -> Self {
        Self {
            node: NodeConfig { id: node_id.to_string() },
            store: StoreConfig { data_dir },
            actor: ActorConfig::default(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn round_trips_through_toml() {
        let config = SchedConfig::scaffold("node-1", PathBuf::from("/tmp/sched"));
        let toml = config.to_toml_string().unwrap();
        let parsed: SchedConfig = toml::from_str(&toml).unwrap();
        assert_eq!(parsed.node.id, "node-1");
        assert_eq!(parsed.actor.cancellation_timeout_secs, 60);
    }

    #[test]
    fn missing_actor_section_falls_back_to_defaults() {
        let toml = "[node]\nid = \"n\"\n[store]\ndata_dir = \"/tmp\"\n";
        let parsed: SchedConfig = toml::from_str(toml).unwrap();
        assert_eq!(parsed.actor.reconcile_interval_secs, 30);
        assert_eq!(parsed.actor.scale_interval_secs, 10);
    }
}
