//! Server configuration read from the process environment.
//!
//! `main` loads a `.env` file first, so every variable below can also live
//! there. Values that are present but malformed fail startup with
//! [`DockhandError::Config`] rather than silently falling back.

use dockhand_common::{DockhandError, RegistryCredentials, Result};
use dockhand_orchestrator::registry_auth::GHCR_HOST;
use dockhand_orchestrator::{CpuLimitStrategy, OrchestratorConfig, RegistryAuthResolver};
use std::net::{IpAddr, SocketAddr};
use std::str::FromStr;
use std::time::Duration;

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 8080;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum LogFormat {
    #[default]
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = DockhandError;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "text" | "pretty" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(DockhandError::Config(format!(
                "Unknown log format '{other}', expected 'text' or 'json'"
            ))),
        }
    }
}

#[derive(Debug, Clone)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    /// Explicit engine socket; bollard's local defaults apply when unset.
    pub docker_socket: Option<String>,
    pub log_format: LogFormat,
    pub orchestrator: OrchestratorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_string(),
            port: DEFAULT_PORT,
            docker_socket: None,
            log_format: LogFormat::default(),
            orchestrator: OrchestratorConfig::default(),
        }
    }
}

impl ServerConfig {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable source.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());
        let mut config = ServerConfig::default();

        if let Some(host) = var("DOCKHAND_HOST") {
            config.host = host.trim().to_string();
        }
        if let Some(port) = var("DOCKHAND_PORT") {
            config.port = parse_number("DOCKHAND_PORT", &port)?;
        }
        config.docker_socket = var("DOCKHAND_DOCKER_SOCKET");
        if let Some(format) = var("DOCKHAND_LOG_FORMAT") {
            config.log_format = format.parse()?;
        }
        if let Some(secs) = var("DOCKHAND_STOP_TIMEOUT_SECS") {
            config.orchestrator.stop_timeout =
                Duration::from_secs(parse_number("DOCKHAND_STOP_TIMEOUT_SECS", &secs)?);
        }
        if let Some(mode) = var("DOCKHAND_CPU_LIMIT_MODE") {
            config.orchestrator.cpu_strategy = mode.parse::<CpuLimitStrategy>()?;
        }
        config.orchestrator.registry_auth = registry_auth(&var)?;

        Ok(config)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        let ip: IpAddr = self.host.parse().map_err(|_| {
            DockhandError::Config(format!("DOCKHAND_HOST '{}' is not an IP address", self.host))
        })?;
        Ok(SocketAddr::new(ip, self.port))
    }
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> Result<T> {
    value
        .trim()
        .parse()
        .map_err(|_| DockhandError::Config(format!("{key} has invalid value '{value}'")))
}

/// ghcr.io from `GHCR_USERNAME`/`GHCR_PASSWORD`, then
/// `DOCKHAND_REGISTRY_<N>_HOST/_USERNAME/_PASSWORD` for N = 1, 2, ... until a
/// host is missing.
fn registry_auth<F>(var: &F) -> Result<RegistryAuthResolver>
where
    F: Fn(&str) -> Option<String>,
{
    let mut resolver = RegistryAuthResolver::new();

    match (var("GHCR_USERNAME"), var("GHCR_PASSWORD")) {
        (Some(username), Some(password)) => resolver.insert(RegistryCredentials {
            server_address: GHCR_HOST.to_string(),
            username,
            password,
        }),
        (None, None) => {}
        _ => {
            return Err(DockhandError::Config(
                "GHCR_USERNAME and GHCR_PASSWORD must be set together".to_string(),
            ))
        }
    }

    for n in 1.. {
        let Some(host) = var(&format!("DOCKHAND_REGISTRY_{n}_HOST")) else {
            break;
        };
        let username = var(&format!("DOCKHAND_REGISTRY_{n}_USERNAME"));
        let password = var(&format!("DOCKHAND_REGISTRY_{n}_PASSWORD"));
        let (Some(username), Some(password)) = (username, password) else {
            return Err(DockhandError::Config(format!(
                "Registry {n} ({host}) needs both DOCKHAND_REGISTRY_{n}_USERNAME and DOCKHAND_REGISTRY_{n}_PASSWORD"
            )));
        };
        resolver.insert(RegistryCredentials {
            server_address: host.trim().to_string(),
            username,
            password,
        });
    }

    Ok(resolver)
}

#[cfg(test)]
mod tests {
    use super::*;
    use dockhand_orchestrator::ImageReference;
    use std::collections::HashMap;

    fn config_from(vars: &[(&str, &str)]) -> Result<ServerConfig> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::from_lookup(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = config_from(&[]).unwrap();
        assert_eq!(config.bind_addr().unwrap(), "0.0.0.0:8080".parse().unwrap());
        assert_eq!(config.docker_socket, None);
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.orchestrator.stop_timeout, Duration::from_secs(10));
        assert_eq!(config.orchestrator.cpu_strategy, CpuLimitStrategy::NanoCpus);
        assert!(config.orchestrator.registry_auth.is_empty());
    }

    #[test]
    fn test_overrides() {
        let config = config_from(&[
            ("DOCKHAND_HOST", "127.0.0.1"),
            ("DOCKHAND_PORT", "9090"),
            ("DOCKHAND_DOCKER_SOCKET", "unix:///run/docker.sock"),
            ("DOCKHAND_LOG_FORMAT", "JSON"),
            ("DOCKHAND_STOP_TIMEOUT_SECS", "30"),
            ("DOCKHAND_CPU_LIMIT_MODE", "period-quota"),
        ])
        .unwrap();

        assert_eq!(config.bind_addr().unwrap(), "127.0.0.1:9090".parse().unwrap());
        assert_eq!(config.docker_socket.as_deref(), Some("unix:///run/docker.sock"));
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.orchestrator.stop_timeout, Duration::from_secs(30));
        assert_eq!(config.orchestrator.cpu_strategy, CpuLimitStrategy::PeriodQuota);
    }

    #[test]
    fn test_malformed_values_are_config_errors() {
        for (key, value) in [
            ("DOCKHAND_PORT", "eighty"),
            ("DOCKHAND_PORT", "70000"),
            ("DOCKHAND_STOP_TIMEOUT_SECS", "-1"),
            ("DOCKHAND_CPU_LIMIT_MODE", "shares"),
            ("DOCKHAND_LOG_FORMAT", "xml"),
        ] {
            let result = config_from(&[(key, value)]);
            assert!(
                matches!(result, Err(DockhandError::Config(_))),
                "{key}={value} should be rejected"
            );
        }

        let config = config_from(&[("DOCKHAND_HOST", "localhost")]).unwrap();
        assert!(matches!(config.bind_addr(), Err(DockhandError::Config(_))));
    }

    #[test]
    fn test_registry_credentials() {
        let config = config_from(&[
            ("GHCR_USERNAME", "bot"),
            ("GHCR_PASSWORD", "ghcr-token"),
            ("DOCKHAND_REGISTRY_1_HOST", "registry.example.com:5000"),
            ("DOCKHAND_REGISTRY_1_USERNAME", "deploy"),
            ("DOCKHAND_REGISTRY_1_PASSWORD", "s3cret"),
            // Not reached: numbering stops at the first gap
            ("DOCKHAND_REGISTRY_3_HOST", "skipped.example.com"),
            ("DOCKHAND_REGISTRY_3_USERNAME", "x"),
            ("DOCKHAND_REGISTRY_3_PASSWORD", "y"),
        ])
        .unwrap();

        let auth = &config.orchestrator.registry_auth;
        assert_eq!(auth.len(), 2);

        let ghcr = ImageReference::parse("ghcr.io/acme/api:v2").unwrap();
        assert_eq!(auth.resolve(&ghcr).unwrap().username, "bot");

        let private = ImageReference::parse("registry.example.com:5000/repo:old").unwrap();
        assert_eq!(auth.resolve(&private).unwrap().password, "s3cret");

        let skipped = ImageReference::parse("skipped.example.com/repo").unwrap();
        assert!(auth.resolve(&skipped).is_none());
    }

    #[test]
    fn test_incomplete_registry_credentials() {
        assert!(matches!(
            config_from(&[("GHCR_USERNAME", "bot")]),
            Err(DockhandError::Config(_))
        ));
        assert!(matches!(
            config_from(&[
                ("DOCKHAND_REGISTRY_1_HOST", "registry.example.com"),
                ("DOCKHAND_REGISTRY_1_USERNAME", "deploy"),
            ]),
            Err(DockhandError::Config(_))
        ));
    }
}
