// Re-export dependencies used in public interfaces of common types

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
pub use serde::{Deserialize, Serialize};
use thiserror::Error;

mod types;
#[cfg(feature = "test-util")]
pub mod testing;

pub use types::*;

#[derive(Error, Debug)]
pub enum DockhandError {
    #[error("Validation Error: {0}")]
    Validation(String),

    #[error("Container Not Found: {0}")]
    NotFound(String),

    #[error("Engine Error: {0}")]
    Engine(String),

    #[error("Invalid Image Reference: {0}")]
    InvalidImage(String),

    /// The destructive part of a recreate was entered and a later step failed.
    #[error("Recreate of {name} failed at {step} ({}): {message}", removal_note(.removed))]
    PartialFailure {
        name: String,
        step: RecreateStep,
        removed: bool,
        message: String,
    },

    #[error("Operation Cancelled: {0}")]
    Cancelled(String),

    #[error("Configuration Error: {0}")]
    Config(String),
}

fn removal_note(removed: &bool) -> &'static str {
    if *removed {
        "container removed but not recreated"
    } else {
        "container stopped but not removed"
    }
}

impl DockhandError {
    /// True when the named container may be missing or stopped as a result of the failure.
    pub fn is_partial(&self) -> bool {
        matches!(self, DockhandError::PartialFailure { .. })
    }
}

pub type Result<T> = std::result::Result<T, DockhandError>;

/// States of the recreate workflow, in the order they are reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RecreateStep {
    Located,
    Inspected,
    ImagePulled,
    Stopped,
    Removed,
    Created,
    Started,
}

impl RecreateStep {
    /// Whether reaching this step mutates the existing container.
    pub fn is_destructive(self) -> bool {
        self >= RecreateStep::Stopped
    }
}

impl Display for RecreateStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            RecreateStep::Located => "located",
            RecreateStep::Inspected => "inspected",
            RecreateStep::ImagePulled => "image_pulled",
            RecreateStep::Stopped => "stopped",
            RecreateStep::Removed => "removed",
            RecreateStep::Created => "created",
            RecreateStep::Started => "started",
        };
        f.write_str(s)
    }
}

/// Narrow view of the container engine consumed by the orchestrator.
#[async_trait]
pub trait ContainerEngine: Send + Sync {
    /// All containers on the host, running or not.
    async fn list_containers(&self) -> Result<Vec<ContainerDescriptor>>;

    /// Environment variables (`KEY=value`) recorded in the container's config.
    async fn inspect_env(&self, id: &str) -> Result<Vec<String>>;

    async fn pull_image(
        &self,
        repository: &str,
        tag: &str,
        credentials: Option<RegistryCredentials>,
    ) -> Result<()>;

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()>;

    /// Force-removes the container.
    async fn remove_container(&self, id: &str) -> Result<()>;

    /// Returns the id of the new container.
    async fn create_container(&self, spec: &ReplacementSpec) -> Result<String>;

    async fn start_container(&self, id: &str) -> Result<()>;

    async fn restart_container(&self, id: &str) -> Result<()>;

    async fn update_resources(&self, id: &str, quota: ResourceQuota) -> Result<()>;

    /// A single stats sample; the engine fills in the previous counters.
    async fn stats_once(&self, id: &str) -> Result<StatsSnapshot>;

    async fn host_cpu_count(&self) -> Result<u32>;

    async fn ping(&self) -> Result<()>;
}
