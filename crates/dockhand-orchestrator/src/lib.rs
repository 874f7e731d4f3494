use dockhand_common::{ContainerDescriptor, ContainerEngine, ContainerUsage, DockhandError};
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

pub use dockhand_common as common;
pub use dockhand_common::{Result, RecreateStep};

pub mod image_ref;
pub mod locks;
pub mod ports;
mod recreate;
pub mod registry_auth;
pub mod resources;
pub mod stats;

pub use image_ref::ImageReference;
pub use locks::NameLocks;
pub use recreate::{derive_replacement, RecreateOutcome};
pub use registry_auth::RegistryAuthResolver;
pub use resources::CpuLimitStrategy;

/// Grace period between the stop signal and a forced kill.
pub const DEFAULT_STOP_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    pub stop_timeout: Duration,
    pub cpu_strategy: CpuLimitStrategy,
    pub registry_auth: RegistryAuthResolver,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            stop_timeout: DEFAULT_STOP_TIMEOUT,
            cpu_strategy: CpuLimitStrategy::default(),
            registry_auth: RegistryAuthResolver::default(),
        }
    }
}

/// Sequences engine calls for lifecycle operations on named containers.
///
/// Recreate, restart and resource updates on the same name never overlap.
/// Nothing is cached: each call starts from a fresh container listing.
pub struct Orchestrator {
    engine: Arc<dyn ContainerEngine>,
    config: OrchestratorConfig,
    locks: NameLocks,
}

impl Orchestrator {
    pub fn new(engine: Arc<dyn ContainerEngine>, config: OrchestratorConfig) -> Self {
        Self {
            engine,
            config,
            locks: NameLocks::new(),
        }
    }

    pub fn locks(&self) -> &NameLocks {
        &self.locks
    }

    pub async fn engine_healthy(&self) -> bool {
        match self.engine.ping().await {
            Ok(()) => true,
            Err(e) => {
                warn!("Engine ping failed: {}", e);
                false
            }
        }
    }

    /// Finds the container carrying exactly this name.
    async fn locate(&self, name: &str) -> Result<ContainerDescriptor> {
        let containers = self.engine.list_containers().await?;
        let found = containers.into_iter().find(|c| c.has_name(name));
        match found {
            Some(container) => {
                debug!(container = %name, id = %container.id, image = %container.image, "Located container");
                Ok(container)
            }
            None => {
                warn!(container = %name, "Container not found");
                Err(DockhandError::NotFound(format!("Container {name} not found.")))
            }
        }
    }

    #[instrument(skip(self), fields(container = %name))]
    pub async fn restart(&self, name: &str) -> Result<()> {
        let name = validate_name(name)?;
        let _guard = self.locks.acquire(name).await;

        let container = self.locate(name).await?;
        self.engine
            .restart_container(&container.id)
            .await
            .map_err(|e| {
                error!(id = %container.id, "Restart failed: {}", e);
                e
            })?;

        info!(id = %container.id, "Container restarted");
        Ok(())
    }

    /// Applies a CPU limit given as a fraction of all host CPUs. `None` leaves
    /// the container's limits untouched.
    #[instrument(skip(self), fields(container = %name))]
    pub async fn update_cpu_limit(&self, name: &str, percent: Option<f64>) -> Result<()> {
        let name = validate_name(name)?;
        if let Some(percent) = percent {
            resources::validate_percent(percent)?;
        }
        let _guard = self.locks.acquire(name).await;

        let container = self.locate(name).await?;
        let Some(percent) = percent else {
            info!(id = %container.id, "No resource changes requested");
            return Ok(());
        };

        let total_cores = self.engine.host_cpu_count().await?;
        let quota = self.config.cpu_strategy.translate(total_cores, percent)?;
        info!(
            total_cores,
            percent,
            cores = f64::from(total_cores) * percent,
            ?quota,
            "Calculated CPU limit"
        );

        self.engine
            .update_resources(&container.id, quota)
            .await
            .map_err(|e| {
                error!(id = %container.id, "Resource update failed: {}", e);
                e
            })?;

        info!(id = %container.id, "Updated container resource limits");
        Ok(())
    }

    /// One CPU/memory sample. Cancelling `cancel` abandons the engine read.
    #[instrument(skip(self, cancel), fields(container = %name))]
    pub async fn stats(&self, name: &str, cancel: CancellationToken) -> Result<ContainerUsage> {
        let name = validate_name(name)?;
        let container = self.locate(name).await?;

        let snapshot = tokio::select! {
            biased;
            _ = cancel.cancelled() => {
                info!(id = %container.id, "Stats read cancelled");
                return Err(DockhandError::Cancelled(format!(
                    "stats request for {name} was cancelled"
                )));
            }
            snapshot = self.engine.stats_once(&container.id) => snapshot?,
        };

        Ok(ContainerUsage {
            cpu_percent: stats::cpu_percent(&snapshot),
            memory_mb: stats::memory_megabytes(snapshot.memory_usage_bytes),
            status: container.status,
        })
    }
}

/// Rejects empty and whitespace-only names.
pub fn validate_name(name: &str) -> Result<&str> {
    let trimmed = name.trim();
    if trimmed.is_empty() {
        return Err(DockhandError::Validation(
            "ContainerName is required.".to_string(),
        ));
    }
    Ok(trimmed)
}
