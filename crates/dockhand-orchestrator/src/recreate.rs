//! Destroy-and-rebuild of a named container from the newest build of its image.
//!
//! The replacement image is pulled before anything is stopped, so a bad pull
//! leaves the original untouched. Once the original is stopped, a failure in
//! any later step is reported as [`DockhandError::PartialFailure`] carrying the
//! step and whether the original is already gone. A container the engine
//! already deleted on stop counts as removed and the rebuild carries on.

use crate::image_ref::ImageReference;
use crate::ports::project_ports;
use crate::{validate_name, Orchestrator};
use dockhand_common::{ContainerDescriptor, DockhandError, RecreateStep, ReplacementSpec, Result};
use tracing::{error, info, instrument, warn};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecreateOutcome {
    pub container_id: String,
    pub image: String,
}

/// Carries env, mounts, ports and labels of `existing` over to a [`ReplacementSpec`] for `image`.
pub fn derive_replacement(
    name: &str,
    image: &ImageReference,
    existing: &ContainerDescriptor,
    env: Vec<String>,
) -> ReplacementSpec {
    ReplacementSpec {
        name: name.to_string(),
        image: image.to_string(),
        env,
        binds: existing.mounts.iter().map(|m| m.bind_string()).collect(),
        labels: existing.labels.clone(),
        ports: project_ports(&existing.ports),
    }
}

impl Orchestrator {
    #[instrument(skip(self), fields(container = %name))]
    pub async fn recreate(&self, name: &str) -> Result<RecreateOutcome> {
        let name = validate_name(name)?;
        let _guard = self.locks.acquire(name).await;

        let existing = self.locate(name).await?;
        info!(reached = %RecreateStep::Located, id = %existing.id, image = %existing.image, "Recreating container");

        let env = self
            .engine
            .inspect_env(&existing.id)
            .await
            .map_err(|e| {
                error!(reached = %RecreateStep::Located, failed_at = %RecreateStep::Inspected, id = %existing.id, "Inspect failed: {}", e);
                e
            })?;

        let image = ImageReference::parse(&existing.image)
            .map_err(|e| {
                error!(reached = %RecreateStep::Inspected, image = %existing.image, "Cannot resolve image: {}", e);
                e
            })?
            .latest();
        let credentials = self.config.registry_auth.resolve(&image);

        info!(reached = %RecreateStep::Inspected, image = %image, authenticated = credentials.is_some(), "Pulling image");
        self.engine
            .pull_image(&image.repository, image.tag_or_latest(), credentials)
            .await
            .map_err(|e| {
                error!(reached = %RecreateStep::Inspected, failed_at = %RecreateStep::ImagePulled, image = %image, "Pull failed, container left untouched: {}", e);
                e
            })?;
        info!(reached = %RecreateStep::ImagePulled, image = %image, "Pulled image");

        let spec = derive_replacement(name, &image, &existing, env);

        self.engine
            .stop_container(&existing.id, self.config.stop_timeout)
            .await
            .map_err(|e| {
                error!(reached = %RecreateStep::ImagePulled, failed_at = %RecreateStep::Stopped, id = %existing.id, "Stop failed, container left in place: {}", e);
                e
            })?;
        info!(reached = %RecreateStep::Stopped, id = %existing.id, "Stopped container");

        match self.engine.remove_container(&existing.id).await {
            Ok(()) => info!(reached = %RecreateStep::Removed, id = %existing.id, "Removed container"),
            // Auto-remove containers are deleted by the engine on stop
            Err(DockhandError::NotFound(message)) => {
                warn!(reached = %RecreateStep::Removed, id = %existing.id, "Container already removed: {}", message)
            }
            Err(e) => return Err(partial_failure(name, RecreateStep::Removed, false, e)),
        }

        let container_id = match self.engine.create_container(&spec).await {
            Ok(id) => id,
            Err(e) => return Err(partial_failure(name, RecreateStep::Created, true, e)),
        };
        info!(reached = %RecreateStep::Created, id = %container_id, "Created replacement container");

        if let Err(e) = self.engine.start_container(&container_id).await {
            return Err(partial_failure(name, RecreateStep::Started, true, e));
        }
        info!(reached = %RecreateStep::Started, id = %container_id, image = %image, "Container recreated");

        Ok(RecreateOutcome {
            container_id,
            image: image.to_string(),
        })
    }
}

fn partial_failure(name: &str, step: RecreateStep, removed: bool, cause: DockhandError) -> DockhandError {
    let message = match cause {
        DockhandError::Engine(message) | DockhandError::NotFound(message) => message,
        other => other.to_string(),
    };
    if removed {
        error!(failed_at = %step, removed, "Original container is gone and no running replacement exists; manual intervention required: {}", message);
    } else {
        warn!(failed_at = %step, removed, "Original container is stopped but still present: {}", message);
    }
    DockhandError::PartialFailure {
        name: name.to_string(),
        step,
        removed,
        message,
    }
}
