//! Mapping between bollard's wire models and the engine-neutral types.

use crate::bollard::container::{Config, CPUStats, Stats, UpdateContainerOptions};
use crate::bollard::models::{
    ContainerSummary, HostConfig, MountPoint, Port, PortBinding, PortTypeEnum,
};
use crate::bollard::auth::DockerCredentials;
use dockhand_common::{
    ContainerDescriptor, CpuCounters, MountEntry, PortEntry, RegistryCredentials,
    ReplacementSpec, ResourceQuota, StatsSnapshot,
};
use std::collections::HashMap;

pub fn port_entry(port: &Port) -> PortEntry {
    let protocol = match port.typ {
        Some(PortTypeEnum::UDP) => "udp",
        Some(PortTypeEnum::SCTP) => "sctp",
        Some(PortTypeEnum::TCP) | Some(PortTypeEnum::EMPTY) | None => "tcp",
    };
    PortEntry {
        private_port: port.private_port,
        protocol: protocol.to_string(),
        public_port: port.public_port,
    }
}

fn mount_entry(mount: &MountPoint) -> Option<MountEntry> {
    Some(MountEntry {
        source: mount.source.clone().filter(|s| !s.is_empty())?,
        destination: mount.destination.clone().filter(|d| !d.is_empty())?,
    })
}

pub fn container_descriptor(summary: ContainerSummary) -> ContainerDescriptor {
    ContainerDescriptor {
        id: summary.id.unwrap_or_default(),
        names: summary.names.unwrap_or_default(),
        image: summary.image.unwrap_or_default(),
        ports: summary.ports.unwrap_or_default().iter().map(port_entry).collect(),
        mounts: summary
            .mounts
            .unwrap_or_default()
            .iter()
            .filter_map(mount_entry)
            .collect(),
        labels: summary.labels.unwrap_or_default(),
        status: summary.status.unwrap_or_default(),
    }
}

pub fn create_config(spec: &ReplacementSpec) -> Config<String> {
    let exposed_ports: HashMap<String, HashMap<(), ()>> = spec
        .ports
        .exposed_ports
        .iter()
        .map(|key| (key.clone(), HashMap::new()))
        .collect();

    let port_bindings: HashMap<String, Option<Vec<PortBinding>>> = spec
        .ports
        .bindings
        .iter()
        .map(|(key, hosts)| {
            let bindings = hosts
                .iter()
                .map(|host| PortBinding {
                    host_ip: None,
                    host_port: Some(host.to_string()),
                })
                .collect();
            (key.clone(), Some(bindings))
        })
        .collect();

    Config {
        image: Some(spec.image.clone()),
        env: Some(spec.env.clone()),
        labels: Some(spec.labels.clone()),
        exposed_ports: Some(exposed_ports),
        host_config: Some(HostConfig {
            binds: Some(spec.binds.clone()),
            port_bindings: Some(port_bindings),
            ..Default::default()
        }),
        ..Default::default()
    }
}

pub fn update_options(quota: ResourceQuota) -> UpdateContainerOptions<String> {
    match quota {
        ResourceQuota::NanoCpus(nano_cpus) => UpdateContainerOptions {
            nano_cpus: Some(nano_cpus),
            ..Default::default()
        },
        ResourceQuota::PeriodQuota {
            period_us,
            quota_us,
        } => UpdateContainerOptions {
            cpu_period: Some(period_us),
            cpu_quota: Some(quota_us),
            ..Default::default()
        },
    }
}

pub fn docker_credentials(credentials: RegistryCredentials) -> DockerCredentials {
    DockerCredentials {
        username: Some(credentials.username),
        password: Some(credentials.password),
        serveraddress: Some(credentials.server_address),
        ..Default::default()
    }
}

fn cpu_counters(stats: &CPUStats) -> CpuCounters {
    CpuCounters {
        total_usage: stats.cpu_usage.total_usage,
        system_usage: stats.system_cpu_usage.unwrap_or(0),
        online_cpus: stats.online_cpus.unwrap_or(0) as u32,
        percpu_count: stats
            .cpu_usage
            .percpu_usage
            .as_ref()
            .map_or(0, |per_cpu| per_cpu.len() as u32),
    }
}

pub fn stats_snapshot(stats: &Stats) -> StatsSnapshot {
    StatsSnapshot {
        current: cpu_counters(&stats.cpu_stats),
        previous: cpu_counters(&stats.precpu_stats),
        memory_usage_bytes: stats.memory_stats.usage.unwrap_or(0),
    }
}
