//! In-memory engine that records every call, for orchestrator and HTTP tests.

use crate::{
    ContainerDescriptor, ContainerEngine, DockhandError, MountEntry, PortEntry,
    RegistryCredentials, ReplacementSpec, ResourceQuota, Result, StatsSnapshot,
};
use async_trait::async_trait;
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::Mutex;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EngineOp {
    List,
    Inspect,
    Pull,
    Stop,
    Remove,
    Create,
    Start,
    Restart,
    Update,
    Stats,
    Info,
    Ping,
}

impl EngineOp {
    pub fn is_destructive(self) -> bool {
        matches!(
            self,
            EngineOp::Stop | EngineOp::Remove | EngineOp::Create | EngineOp::Start
        )
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum EngineCall {
    List,
    Inspect(String),
    Pull {
        repository: String,
        tag: String,
        credentials: Option<RegistryCredentials>,
    },
    Stop { id: String, grace: Duration },
    Remove(String),
    Create(ReplacementSpec),
    Start(String),
    Restart(String),
    Update { id: String, quota: ResourceQuota },
    Stats(String),
    Info,
    Ping,
}

impl EngineCall {
    pub fn op(&self) -> EngineOp {
        match self {
            EngineCall::List => EngineOp::List,
            EngineCall::Inspect(_) => EngineOp::Inspect,
            EngineCall::Pull { .. } => EngineOp::Pull,
            EngineCall::Stop { .. } => EngineOp::Stop,
            EngineCall::Remove(_) => EngineOp::Remove,
            EngineCall::Create(_) => EngineOp::Create,
            EngineCall::Start(_) => EngineOp::Start,
            EngineCall::Restart(_) => EngineOp::Restart,
            EngineCall::Update { .. } => EngineOp::Update,
            EngineCall::Stats(_) => EngineOp::Stats,
            EngineCall::Info => EngineOp::Info,
            EngineCall::Ping => EngineOp::Ping,
        }
    }
}

#[derive(Default)]
struct MockState {
    containers: Vec<ContainerDescriptor>,
    env: HashMap<String, Vec<String>>,
    stats: HashMap<String, StatsSnapshot>,
    calls: Vec<EngineCall>,
    failures: HashMap<EngineOp, String>,
    hanging: HashSet<EngineOp>,
    next_id: u64,
}

/// Behaves like a single-host engine: remove drops the container, create adds one
/// with the requested name, start marks it running.
#[derive(Clone)]
pub struct MockEngine {
    state: Arc<Mutex<MockState>>,
    cpu_count: u32,
    pull_delay: Duration,
    auto_remove: bool,
    abandoned: Arc<AtomicUsize>,
}

/// Counts a hanging call whose future was dropped before completing.
struct AbandonOnDrop(Arc<AtomicUsize>);

impl Drop for AbandonOnDrop {
    fn drop(&mut self) {
        self.0.fetch_add(1, Ordering::SeqCst);
    }
}

impl Default for MockEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl MockEngine {
    pub fn new() -> Self {
        Self {
            state: Arc::new(Mutex::new(MockState::default())),
            cpu_count: 4,
            pull_delay: Duration::ZERO,
            auto_remove: false,
            abandoned: Arc::new(AtomicUsize::new(0)),
        }
    }

    pub fn with_cpu_count(mut self, cpu_count: u32) -> Self {
        self.cpu_count = cpu_count;
        self
    }

    /// Makes every pull sleep, so concurrent callers have a chance to interleave.
    pub fn with_pull_delay(mut self, delay: Duration) -> Self {
        self.pull_delay = delay;
        self
    }

    /// Stop deletes the container, like one started with `--rm`.
    pub fn with_auto_remove(mut self) -> Self {
        self.auto_remove = true;
        self
    }

    pub async fn add_container(&self, container: ContainerDescriptor, env: Vec<String>) {
        let mut state = self.state.lock().await;
        state.env.insert(container.id.clone(), env);
        state.containers.push(container);
    }

    pub async fn set_stats(&self, id: &str, snapshot: StatsSnapshot) {
        self.state
            .lock()
            .await
            .stats
            .insert(id.to_string(), snapshot);
    }

    pub async fn fail(&self, op: EngineOp, message: &str) {
        self.state
            .lock()
            .await
            .failures
            .insert(op, message.to_string());
    }

    /// The operation never completes.
    pub async fn hang(&self, op: EngineOp) {
        self.state.lock().await.hanging.insert(op);
    }

    /// Hanging calls that were given up on by their caller.
    pub fn abandoned(&self) -> usize {
        self.abandoned.load(Ordering::SeqCst)
    }

    pub async fn calls(&self) -> Vec<EngineCall> {
        self.state.lock().await.calls.clone()
    }

    pub async fn ops(&self) -> Vec<EngineOp> {
        self.calls().await.iter().map(EngineCall::op).collect()
    }

    pub async fn containers(&self) -> Vec<ContainerDescriptor> {
        self.state.lock().await.containers.clone()
    }

    pub async fn env_of(&self, id: &str) -> Option<Vec<String>> {
        self.state.lock().await.env.get(id).cloned()
    }

    async fn record(&self, call: EngineCall) -> Result<()> {
        let op = call.op();
        let hang = {
            let mut state = self.state.lock().await;
            state.calls.push(call);
            if let Some(message) = state.failures.get(&op) {
                return Err(DockhandError::Engine(message.clone()));
            }
            state.hanging.contains(&op)
        };
        if hang {
            let _abandoned = AbandonOnDrop(self.abandoned.clone());
            std::future::pending::<()>().await;
        }
        Ok(())
    }

    async fn require(&self, id: &str) -> Result<()> {
        let state = self.state.lock().await;
        if state.containers.iter().any(|c| c.id == id) {
            Ok(())
        } else {
            Err(DockhandError::NotFound(format!("No such container: {id}")))
        }
    }

    async fn set_status(&self, id: &str, status: &str) {
        let mut state = self.state.lock().await;
        if let Some(container) = state.containers.iter_mut().find(|c| c.id == id) {
            container.status = status.to_string();
        }
    }
}

#[async_trait]
impl ContainerEngine for MockEngine {
    async fn list_containers(&self) -> Result<Vec<ContainerDescriptor>> {
        self.record(EngineCall::List).await?;
        Ok(self.containers().await)
    }

    async fn inspect_env(&self, id: &str) -> Result<Vec<String>> {
        self.record(EngineCall::Inspect(id.to_string())).await?;
        self.require(id).await?;
        Ok(self.env_of(id).await.unwrap_or_default())
    }

    async fn pull_image(
        &self,
        repository: &str,
        tag: &str,
        credentials: Option<RegistryCredentials>,
    ) -> Result<()> {
        self.record(EngineCall::Pull {
            repository: repository.to_string(),
            tag: tag.to_string(),
            credentials,
        })
        .await?;
        if !self.pull_delay.is_zero() {
            tokio::time::sleep(self.pull_delay).await;
        }
        Ok(())
    }

    async fn stop_container(&self, id: &str, grace: Duration) -> Result<()> {
        self.record(EngineCall::Stop {
            id: id.to_string(),
            grace,
        })
        .await?;
        self.require(id).await?;
        if self.auto_remove {
            let mut state = self.state.lock().await;
            state.containers.retain(|c| c.id != id);
            state.env.remove(id);
        } else {
            self.set_status(id, "Exited (0) Less than a second ago").await;
        }
        Ok(())
    }

    async fn remove_container(&self, id: &str) -> Result<()> {
        self.record(EngineCall::Remove(id.to_string())).await?;
        self.require(id).await?;
        let mut state = self.state.lock().await;
        state.containers.retain(|c| c.id != id);
        state.env.remove(id);
        Ok(())
    }

    async fn create_container(&self, spec: &ReplacementSpec) -> Result<String> {
        self.record(EngineCall::Create(spec.clone())).await?;
        let mut state = self.state.lock().await;
        let wanted = format!("/{}", spec.name);
        if state.containers.iter().any(|c| c.names.contains(&wanted)) {
            return Err(DockhandError::Engine(format!(
                "Conflict. The container name \"{wanted}\" is already in use"
            )));
        }
        state.next_id += 1;
        let id = format!("created-{}", state.next_id);
        let ports = spec
            .ports
            .exposed_ports
            .iter()
            .filter_map(|key| {
                let (port, protocol) = key.split_once('/')?;
                let private_port = port.parse().ok()?;
                let hosts = spec.ports.bindings.get(key).cloned().unwrap_or_default();
                if hosts.is_empty() {
                    return Some(vec![PortEntry {
                        private_port,
                        protocol: protocol.to_string(),
                        public_port: None,
                    }]);
                }
                Some(
                    hosts
                        .into_iter()
                        .map(|host| PortEntry {
                            private_port,
                            protocol: protocol.to_string(),
                            public_port: Some(host),
                        })
                        .collect(),
                )
            })
            .flatten()
            .collect();
        let mounts = spec
            .binds
            .iter()
            .filter_map(|bind| {
                let (source, destination) = bind.split_once(':')?;
                Some(MountEntry {
                    source: source.to_string(),
                    destination: destination.to_string(),
                })
            })
            .collect();
        state.containers.push(ContainerDescriptor {
            id: id.clone(),
            names: vec![wanted],
            image: spec.image.clone(),
            ports,
            mounts,
            labels: spec.labels.clone(),
            status: "Created".to_string(),
        });
        state.env.insert(id.clone(), spec.env.clone());
        Ok(id)
    }

    async fn start_container(&self, id: &str) -> Result<()> {
        self.record(EngineCall::Start(id.to_string())).await?;
        self.require(id).await?;
        self.set_status(id, "Up Less than a second").await;
        Ok(())
    }

    async fn restart_container(&self, id: &str) -> Result<()> {
        self.record(EngineCall::Restart(id.to_string())).await?;
        self.require(id).await?;
        self.set_status(id, "Up Less than a second").await;
        Ok(())
    }

    async fn update_resources(&self, id: &str, quota: ResourceQuota) -> Result<()> {
        self.record(EngineCall::Update {
            id: id.to_string(),
            quota,
        })
        .await?;
        self.require(id).await
    }

    async fn stats_once(&self, id: &str) -> Result<StatsSnapshot> {
        self.record(EngineCall::Stats(id.to_string())).await?;
        self.require(id).await?;
        Ok(self
            .state
            .lock()
            .await
            .stats
            .get(id)
            .copied()
            .unwrap_or_default())
    }

    async fn host_cpu_count(&self) -> Result<u32> {
        self.record(EngineCall::Info).await?;
        Ok(self.cpu_count)
    }

    async fn ping(&self) -> Result<()> {
        self.record(EngineCall::Ping).await
    }
}
