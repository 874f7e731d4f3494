use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;

/// One entry of a container's runtime port list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortEntry {
    pub private_port: u16,
    pub protocol: String,
    pub public_port: Option<u16>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MountEntry {
    pub source: String,
    pub destination: String,
}

impl MountEntry {
    /// `source:destination`, the form accepted as a host-config bind.
    pub fn bind_string(&self) -> String {
        format!("{}:{}", self.source, self.destination)
    }
}

/// A container as listed by the engine. Never persisted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ContainerDescriptor {
    pub id: String,
    /// Engine names, each with its leading `/`.
    pub names: Vec<String>,
    pub image: String,
    pub ports: Vec<PortEntry>,
    pub mounts: Vec<MountEntry>,
    pub labels: HashMap<String, String>,
    pub status: String,
}

impl ContainerDescriptor {
    pub fn has_name(&self, name: &str) -> bool {
        self.names
            .iter()
            .any(|n| n.strip_prefix('/').is_some_and(|n| n == name))
    }
}

/// Exposed-port keys and host bindings, both keyed by `"<private>/<protocol>"`.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortBindingSet {
    pub exposed_ports: BTreeSet<String>,
    pub bindings: BTreeMap<String, Vec<u16>>,
}

#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RegistryCredentials {
    pub server_address: String,
    pub username: String,
    pub password: String,
}

impl fmt::Debug for RegistryCredentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RegistryCredentials")
            .field("server_address", &self.server_address)
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Everything needed to create the replacement container.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ReplacementSpec {
    pub name: String,
    pub image: String,
    pub env: Vec<String>,
    pub binds: Vec<String>,
    pub labels: HashMap<String, String>,
    pub ports: PortBindingSet,
}

/// Engine-native CPU limit. Exactly one encoding is sent per update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ResourceQuota {
    PeriodQuota { period_us: i64, quota_us: i64 },
    NanoCpus(i64),
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct CpuCounters {
    pub total_usage: u64,
    pub system_usage: u64,
    /// Zero when the engine did not report it.
    pub online_cpus: u32,
    pub percpu_count: u32,
}

/// Two consecutive counter readings from one stats sample.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StatsSnapshot {
    pub current: CpuCounters,
    pub previous: CpuCounters,
    pub memory_usage_bytes: u64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ContainerUsage {
    pub cpu_percent: f64,
    pub memory_mb: f64,
    pub status: String,
}
