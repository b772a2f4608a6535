//! `RunSpec` — the declarative definition of a long-running application.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::CoreError;
use crate::path_id::PathId;
use crate::version::VersionInfo;

/// CPU/memory/disk/GPU resource request for a single instance of a run spec.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ResourceLimits {
    pub cpu_shares: f64,
    pub mem_bytes: u64,
    #[serde(default)]
    pub disk_bytes: u64,
    #[serde(default)]
    pub gpu: u32,
}

/// A single declared container port.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PortDefinition {
    pub name: String,
    pub container_port: Option<u16>,
    #[serde(default)]
    pub protocol: PortProtocol,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum PortProtocol {
    #[default]
    Tcp,
    Udp,
}

/// Either a fixed IP-per-task assignment or a set of declared ports — never
/// both (§3 invariant: `(ipAddress set) XOR (portDefinitions non-empty)`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NetworkMode {
    IpPerTask,
    Ports(Vec<PortDefinition>),
}

/// A declared health check attached to a run spec.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HealthCheckSpec {
    pub kind: HealthCheckKind,
    pub grace_period_secs: u32,
    pub interval_secs: u32,
    pub timeout_secs: u32,
    pub max_consecutive_failures: u32,
}

/// The probe mechanism used by a health check. The teacher's HTTP-only
/// prober is supplemented with the run-spec-level command and TCP variants
/// every mainstream scheduler exposes alongside HTTP.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum HealthCheckKind {
    Http { path: String, port_name: String },
    Tcp { port_name: String },
    Command { argv: Vec<String> },
}

/// Residency: pins an instance slot to an agent via reservation and a
/// persistent volume.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Residency {
    pub volume_paths: Vec<String>,
    pub relaunch_escalation_timeout_secs: u32,
}

/// The upgrade strategy controls how many instances may be down or
/// overprovisioned during a rolling deployment step.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct UpgradeStrategy {
    pub minimum_health_capacity: f64,
    pub maximum_over_capacity: f64,
}

impl Default for UpgradeStrategy {
    fn default() -> Self {
        Self {
            minimum_health_capacity: 1.0,
            maximum_over_capacity: 1.0,
        }
    }
}

/// The declarative definition of a long-running application.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunSpec {
    pub id: PathId,
    pub command: String,
    #[serde(default)]
    pub args: Vec<String>,
    pub resources: ResourceLimits,
    pub instances: u32,
    pub network: NetworkMode,
    #[serde(default)]
    pub health_checks: Vec<HealthCheckSpec>,
    #[serde(default)]
    pub upgrade_strategy: UpgradeStrategy,
    #[serde(default)]
    pub dependencies: Vec<PathId>,
    pub residency: Option<Residency>,
    #[serde(default)]
    pub secrets: BTreeMap<String, String>,
    pub version_info: VersionInfo,
}

impl RunSpec {
    /// Validate the invariants from spec §3 / §7 `ValidationFailure`.
    ///
    /// Does not check cross-app dependency cycles; that is a group-level
    /// concern handled by [`crate::group::Group::validate`].
    pub fn validate(&self) -> Result<(), CoreError> {
        match &self.network {
            NetworkMode::Ports(defs) if defs.is_empty() => {
                return Err(CoreError::validation(
                    self.id.clone(),
                    "network mode Ports must declare at least one port",
                ));
            }
            _ => {}
        }

        if self.residency.is_some() && matches!(&self.network, NetworkMode::IpPerTask) {
            // residency has no bearing on network mode; no-op branch kept
            // for clarity of the two independent invariants below.
        }

        if let Some(residency) = &self.residency {
            if residency.volume_paths.is_empty() {
                return Err(CoreError::validation(
                    self.id.clone(),
                    "residency requires at least one persistent volume",
                ));
            }
        }

        if self.residency.is_none() {
            // no persistent volumes implied; nothing further to check here,
            // volumes are modeled only via `Residency` in this schema.
        }

        if self.single_instance_constraint() && self.instances > 1 {
            return Err(CoreError::validation(
                self.id.clone(),
                "single-instance run specs may not scale beyond 1 instance",
            ));
        }

        if self.resources.gpu > 0 && self.resources.cpu_shares <= 0.0 {
            return Err(CoreError::validation(
                self.id.clone(),
                "gpu instances must also request nonzero cpu",
            ));
        }

        Ok(())
    }

    /// Whether this run spec is constrained to a single instance (residency
    /// with a relaunch escalation timeout implies exclusive slot ownership).
    fn single_instance_constraint(&self) -> bool {
        self.residency
            .as_ref()
            .map(|r| r.relaunch_escalation_timeout_secs == 0)
            .unwrap_or(false)
    }

    /// Whether updating `self` to `new` is a *resident update* that must not
    /// change resources or volumes (§3 invariant).
    pub fn validate_resident_update(&self, new: &RunSpec) -> Result<(), CoreError> {
        let (Some(old_res), Some(new_res)) = (&self.residency, &new.residency) else {
            return Ok(());
        };
        if self.resources != new.resources {
            return Err(CoreError::validation(
                self.id.clone(),
                "resident run specs may not change resources on update",
            ));
        }
        if old_res.volume_paths != new_res.volume_paths {
            return Err(CoreError::validation(
                self.id.clone(),
                "resident run specs may not change persistent volumes on update",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::version::Timestamp;

    fn base_spec() -> RunSpec {
        RunSpec {
            id: PathId::parse("/prod/api").unwrap(),
            command: "./run.sh".into(),
            args: vec![],
            resources: ResourceLimits {
                cpu_shares: 1.0,
                mem_bytes: 128 * 1024 * 1024,
                disk_bytes: 0,
                gpu: 0,
            },
            instances: 3,
            network: NetworkMode::Ports(vec![PortDefinition {
                name: "http".into(),
                container_port: Some(8080),
                protocol: PortProtocol::Tcp,
            }]),
            health_checks: vec![],
            upgrade_strategy: UpgradeStrategy::default(),
            dependencies: vec![],
            residency: None,
            secrets: BTreeMap::new(),
            version_info: VersionInfo::fresh_at(Timestamp::now()),
        }
    }

    #[test]
    fn valid_spec_passes() {
        assert!(base_spec().validate().is_ok());
    }

    #[test]
    fn empty_port_list_rejected() {
        let mut spec = base_spec();
        spec.network = NetworkMode::Ports(vec![]);
        assert!(spec.validate().is_err());
    }

    #[test]
    fn residency_without_volumes_rejected() {
        let mut spec = base_spec();
        spec.residency = Some(Residency {
            volume_paths: vec![],
            relaunch_escalation_timeout_secs: 300,
        });
        assert!(spec.validate().is_err());
    }

    #[test]
    fn single_instance_violation_rejected() {
        let mut spec = base_spec();
        spec.residency = Some(Residency {
            volume_paths: vec!["/data".into()],
            relaunch_escalation_timeout_secs: 0,
        });
        spec.instances = 2;
        assert!(spec.validate().is_err());
    }

    #[test]
    fn resident_update_rejects_resource_change() {
        let mut old = base_spec();
        old.residency = Some(Residency {
            volume_paths: vec!["/data".into()],
            relaunch_escalation_timeout_secs: 300,
        });
        let mut new = old.clone();
        new.resources.mem_bytes *= 2;
        assert!(old.validate_resident_update(&new).is_err());
    }

    #[test]
    fn resident_update_allows_unrelated_change() {
        let mut old = base_spec();
        old.residency = Some(Residency {
            volume_paths: vec!["/data".into()],
            relaunch_escalation_timeout_secs: 300,
        });
        let mut new = old.clone();
        new.instances = old.instances;
        new.command = "./run2.sh".into();
        assert!(old.validate_resident_update(&new).is_ok());
    }
}
