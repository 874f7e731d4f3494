use dockhand_common::ContainerUsage;
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Body of `PUT /docker/edit/{name}`. An absent limit leaves the container as is.
#[derive(Debug, Default, Serialize, Deserialize)]
pub struct EditRequest {
    #[serde(rename = "CpuLimitPercent", alias = "cpuLimitPercent", default)]
    pub cpu_limit_percent: Option<f64>,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct StatsResponse {
    /// e.g. `"12.5%"`
    pub cpu: String,
    /// e.g. `"52.429mb"`
    pub memory: String,
    /// The engine's status text, e.g. `"Up 2 hours"`.
    pub uptime: String,
}

impl From<ContainerUsage> for StatsResponse {
    fn from(usage: ContainerUsage) -> Self {
        Self {
            cpu: format!("{}%", usage.cpu_percent),
            memory: format!("{}mb", usage.memory_mb),
            uptime: usage.status,
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub engine: String,
    pub timestamp: String,
}
