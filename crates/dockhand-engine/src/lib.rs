use async_trait::async_trait;
use bollard::container::{
    CreateContainerOptions, ListContainersOptions, RemoveContainerOptions, StatsOptions,
    StopContainerOptions,
};
use bollard::errors::Error as BollardError;
use bollard::image::CreateImageOptions;
use bollard::Docker;
use dockhand_common::{
    ContainerDescriptor, ContainerEngine, DockhandError, RegistryCredentials, ReplacementSpec,
    ResourceQuota, Result as CommonResult, StatsSnapshot,
};
use futures::StreamExt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tracing::{debug, info, instrument, warn};

// Re-export dependencies potentially needed by consumers
pub use bollard;
pub use dockhand_common as common;

pub mod convert;
pub mod test_utils;

/// Seconds bollard waits on a socket connection before giving up.
const CONNECT_TIMEOUT_SECS: u64 = 120;

// --- Custom Error Type ---
#[derive(Error, Debug)]
pub enum EngineError {
    #[error("Failed to connect to Docker: {0}")]
    Connect(#[source] BollardError),
    #[error("Image pull failed for {image}: {source}")]
    PullFailed {
        image: String,
        #[source]
        source: BollardError,
    },
    #[error("Container stats unavailable: {0}")]
    StatsUnavailable(String),
    #[error("Docker API error: {0}")]
    DockerApi(#[from] BollardError),
}

impl EngineError {
    fn status_code(&self) -> Option<u16> {
        let source = match self {
            EngineError::Connect(e) | EngineError::DockerApi(e) => e,
            EngineError::PullFailed { source, .. } => source,
            EngineError::StatsUnavailable(_) => return None,
        };
        match source {
            BollardError::DockerResponseServerError { status_code, .. } => Some(*status_code),
            _ => None,
        }
    }

    /// The engine's own message when it sent one.
    fn engine_message(&self) -> String {
        match self {
            EngineError::DockerApi(BollardError::DockerResponseServerError { message, .. }) => {
                message.clone()
            }
            other => other.to_string(),
        }
    }
}

impl From<EngineError> for DockhandError {
    fn from(err: EngineError) -> Self {
        // A pull 404 is a missing image, not a missing container
        let is_pull = matches!(err, EngineError::PullFailed { .. });
        match err.status_code() {
            Some(404) if !is_pull => DockhandError::NotFound(err.engine_message()),
            _ => DockhandError::Engine(err.engine_message()),
        }
    }
}

pub type Result<T> = std::result::Result<T, EngineError>;

// --- DockerEngine Implementation ---

/// [`ContainerEngine`] backed by the local Docker daemon.
#[derive(Clone)]
pub struct DockerEngine {
    docker_client: Arc<Docker>,
}

impl DockerEngine {
    pub fn new(docker_client: Arc<Docker>) -> Self {
        Self { docker_client }
    }

    /// Connects to an explicit socket or named pipe, or to the platform default
    /// (`DOCKER_HOST`, then `/var/run/docker.sock` or `//./pipe/docker_engine`).
    pub fn connect(socket: Option<&str>) -> Result<Self> {
        let docker = match socket {
            Some(path) => {
                let path = path.strip_prefix("unix://").unwrap_or(path);
                info!(socket = %path, "Connecting to Docker");
                Docker::connect_with_socket(path, CONNECT_TIMEOUT_SECS, bollard::API_DEFAULT_VERSION)
            }
            None => {
                info!("Connecting to Docker with local defaults");
                Docker::connect_with_local_defaults()
            }
        }
        .map_err(EngineError::Connect)?;
        Ok(Self::new(Arc::new(docker)))
    }

    async fn pull(
        &self,
        repository: &str,
        tag: &str,
        credentials: Option<RegistryCredentials>,
    ) -> Result<()> {
        let image = format!("{repository}:{tag}");
        let options = CreateImageOptions {
            from_image: repository.to_string(),
            tag: tag.to_string(),
            ..Default::default()
        };
        let mut progress = self.docker_client.create_image(
            Some(options),
            None,
            credentials.map(convert::docker_credentials),
        );

        while let Some(item) = progress.next().await {
            let info = item.map_err(|source| EngineError::PullFailed {
                image: image.clone(),
                source,
            })?;
            if let Some(status) = info.status {
                debug!(image = %image, progress = info.progress.as_deref().unwrap_or(""), "{}", status);
            }
        }
        Ok(())
    }

    async fn one_stats_sample(&self, id: &str) -> Result<StatsSnapshot> {
        // one_shot would skip the second reading and leave precpu_stats empty
        let options = StatsOptions {
            stream: false,
            one_shot: false,
        };
        let mut stream = self.docker_client.stats(id, Some(options));
        match stream.next().await {
            Some(stats) => Ok(convert::stats_snapshot(&stats?)),
            None => Err(EngineError::StatsUnavailable(format!(
                "engine returned no stats for {id}"
            ))),
        }
    }
}

#[async_trait]
impl ContainerEngine for DockerEngine {
    async fn list_containers(&self) -> CommonResult<Vec<ContainerDescriptor>> {
        let options = ListContainersOptions::<String> {
            all: true,
            ..Default::default()
        };
        let summaries = self
            .docker_client
            .list_containers(Some(options))
            .await
            .map_err(EngineError::from)?;
        Ok(summaries.into_iter().map(convert::container_descriptor).collect())
    }

    #[instrument(skip(self))]
    async fn inspect_env(&self, id: &str) -> CommonResult<Vec<String>> {
        let inspection = self
            .docker_client
            .inspect_container(id, None)
            .await
            .map_err(EngineError::from)?;
        Ok(inspection
            .config
            .and_then(|config| config.env)
            .unwrap_or_default())
    }

    #[instrument(skip(self, credentials))]
    async fn pull_image(
        &self,
        repository: &str,
        tag: &str,
        credentials: Option<RegistryCredentials>,
    ) -> CommonResult<()> {
        self.pull(repository, tag, credentials).await?;
        info!("Pulled {}:{}", repository, tag);
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stop_container(&self, id: &str, grace: Duration) -> CommonResult<()> {
        let options = StopContainerOptions {
            t: grace.as_secs() as i64,
        };
        match self.docker_client.stop_container(id, Some(options)).await {
            Ok(()) => Ok(()),
            // Already stopped
            Err(BollardError::DockerResponseServerError {
                status_code: 304, ..
            }) => Ok(()),
            Err(e) => Err(EngineError::from(e).into()),
        }
    }

    #[instrument(skip(self))]
    async fn remove_container(&self, id: &str) -> CommonResult<()> {
        let options = RemoveContainerOptions {
            force: true,
            ..Default::default()
        };
        self.docker_client
            .remove_container(id, Some(options))
            .await
            .map_err(EngineError::from)?;
        Ok(())
    }

    #[instrument(skip(self, spec), fields(name = %spec.name, image = %spec.image))]
    async fn create_container(&self, spec: &ReplacementSpec) -> CommonResult<String> {
        let options = CreateContainerOptions {
            name: spec.name.clone(),
            ..Default::default()
        };
        let response = self
            .docker_client
            .create_container(Some(options), convert::create_config(spec))
            .await
            .map_err(EngineError::from)?;
        for warning in &response.warnings {
            warn!("Engine warning on create: {}", warning);
        }
        Ok(response.id)
    }

    #[instrument(skip(self))]
    async fn start_container(&self, id: &str) -> CommonResult<()> {
        self.docker_client
            .start_container::<String>(id, None)
            .await
            .map_err(EngineError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn restart_container(&self, id: &str) -> CommonResult<()> {
        self.docker_client
            .restart_container(id, None)
            .await
            .map_err(EngineError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn update_resources(&self, id: &str, quota: ResourceQuota) -> CommonResult<()> {
        self.docker_client
            .update_container(id, convert::update_options(quota))
            .await
            .map_err(EngineError::from)?;
        Ok(())
    }

    #[instrument(skip(self))]
    async fn stats_once(&self, id: &str) -> CommonResult<StatsSnapshot> {
        Ok(self.one_stats_sample(id).await?)
    }

    async fn host_cpu_count(&self) -> CommonResult<u32> {
        let info = self
            .docker_client
            .info()
            .await
            .map_err(EngineError::from)?;
        Ok(info.ncpu.unwrap_or(0).max(0) as u32)
    }

    async fn ping(&self) -> CommonResult<()> {
        self.docker_client
            .ping()
            .await
            .map_err(EngineError::from)?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn server_error(status_code: u16, message: &str) -> BollardError {
        BollardError::DockerResponseServerError {
            status_code,
            message: message.to_string(),
        }
    }

    #[test]
    fn test_missing_container_maps_to_not_found() {
        let err: DockhandError =
            EngineError::from(server_error(404, "No such container: web1")).into();
        assert!(matches!(err, DockhandError::NotFound(ref m) if m == "No such container: web1"));
    }

    #[test]
    fn test_missing_image_is_an_engine_error() {
        let err: DockhandError = EngineError::PullFailed {
            image: "myrepo/app:latest".to_string(),
            source: server_error(404, "manifest unknown"),
        }
        .into();
        assert!(matches!(err, DockhandError::Engine(ref m) if m.contains("manifest unknown")));
    }

    #[test]
    fn test_conflict_surfaces_engine_message() {
        let err: DockhandError = EngineError::from(server_error(
            409,
            "Conflict. The container name \"/web1\" is already in use",
        ))
        .into();
        assert!(matches!(err, DockhandError::Engine(ref m) if m.starts_with("Conflict")));
    }
}
