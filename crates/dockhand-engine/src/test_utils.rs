//! Helpers for tests that talk to a real daemon.
use crate::{DockerEngine, Result};
use dockhand_common::ContainerEngine;

/// Socket override shared with the server's configuration.
pub const SOCKET_ENV: &str = "DOCKHAND_DOCKER_SOCKET";

/// Connects the way the server does, honouring [`SOCKET_ENV`].
pub fn engine_from_env() -> Result<DockerEngine> {
    let socket = std::env::var(SOCKET_ENV).ok().filter(|s| !s.trim().is_empty());
    DockerEngine::connect(socket.as_deref())
}

/// Whether the daemon behind [`engine_from_env`] answers a ping.
pub async fn docker_available() -> bool {
    match engine_from_env() {
        Ok(engine) => engine.ping().await.is_ok(),
        Err(_) => false,
    }
}

/// Returns early from an async test when no daemon answers.
#[macro_export]
macro_rules! require_docker {
    () => {
        if !$crate::test_utils::docker_available().await {
            eprintln!("Test skipped: Docker daemon not reachable");
            return;
        }
    };
}
