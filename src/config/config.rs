use serde::{Deserialize, Serialize};
use std::fs;
use std::path::Path;
use thiserror::Error;

/// Default TLS port of a remote Docker daemon.
const DEFAULT_DOCKER_PORT: u16 = 2376;

#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read config: {0}")]
    Io(#[from] std::io::Error),

    #[error("Failed to parse config: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid config: {0}")]
    Invalid(String),
}

#[derive(Debug, Clone, Default, Deserialize, Serialize)]
#[serde(default)]
pub struct Config {
    pub docker: DockerConfig,
    pub registry: RegistryConfig,
    pub stats: StatsConfig,
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct DockerConfig {
    /// `unix:///path`, `tcp://host:port` or bare `host[:port]`; local defaults when unset
    pub host: Option<String>,
    /// Directory holding `key.pem`, `cert.pem` and `ca.pem`
    pub cert_path: Option<String>,
    pub timeout_secs: u64,
}

impl Default for DockerConfig {
    fn default() -> Self {
        Self {
            host: None,
            cert_path: None,
            timeout_secs: 120,
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct RegistryConfig {
    pub poll_rate_secs: u64,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self { poll_rate_secs: 2 }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct StatsConfig {
    /// Upper bound on waiting for the first sample in single-shot mode
    pub sample_timeout_secs: u64,
}

impl Default for StatsConfig {
    fn default() -> Self {
        Self { sample_timeout_secs: 10 }
    }
}

impl Config {
    pub fn load(path: &str) -> Result<Self, ConfigError> {
        let content = fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    pub fn from_json(content: &str) -> Result<Self, ConfigError> {
        let mut config: Config = serde_json::from_str(content)?;
        config.finish()?;
        Ok(config)
    }

    /// Loads `path` if it exists, otherwise starts from defaults.
    /// `DOCKER_HOST` and `DOCKER_CERT_PATH` override the file either way.
    pub fn load_or_default(path: &str) -> Result<Self, ConfigError> {
        let mut config = if Path::new(path).exists() {
            Self::load(path)?
        } else {
            tracing::info!("No config at {}, using defaults", path);
            Self::default()
        };

        if let Ok(host) = std::env::var("DOCKER_HOST") {
            config.docker.host = Some(host);
        }
        if let Ok(cert_path) = std::env::var("DOCKER_CERT_PATH") {
            config.docker.cert_path = Some(cert_path);
        }

        config.finish()?;
        Ok(config)
    }

    /// Applies overrides coming from the command line.
    pub fn with_overrides(
        mut self,
        host: Option<String>,
        cert_path: Option<String>,
    ) -> Result<Self, ConfigError> {
        if host.is_some() {
            self.docker.host = host;
        }
        if cert_path.is_some() {
            self.docker.cert_path = cert_path;
        }
        self.finish()?;
        Ok(self)
    }

    fn finish(&mut self) -> Result<(), ConfigError> {
        if self.registry.poll_rate_secs == 0 {
            return Err(ConfigError::Invalid("registry.poll_rate_secs can't be zero".to_string()));
        }
        if self.stats.sample_timeout_secs == 0 {
            return Err(ConfigError::Invalid("stats.sample_timeout_secs can't be zero".to_string()));
        }

        self.docker.host = match self.docker.host.take() {
            Some(host) if host.trim().is_empty() => None,
            Some(host) => Some(normalize_host(host.trim())),
            None => None,
        };
        Ok(())
    }
}

/// `example.com` becomes `tcp://example.com:2376`; socket paths pass through.
pub fn normalize_host(host: &str) -> String {
    if host.starts_with("unix://") || host.starts_with("npipe://") {
        return host.to_string();
    }

    let bare = host
        .strip_prefix("tcp://")
        .or_else(|| host.strip_prefix("https://"))
        .or_else(|| host.strip_prefix("http://"))
        .unwrap_or(host);

    if bare.contains(':') {
        format!("tcp://{}", bare)
    } else {
        format!("tcp://{}:{}", bare, DEFAULT_DOCKER_PORT)
    }
}
