//! Relay configuration.
//!
//! Values are layered, later sources winning:
//!
//! 1. built-in defaults
//! 2. an optional TOML file (`--config` or `COURIER_CONFIG`)
//! 3. environment variables (`COURIER_HOST`, `COURIER_PORT`, `COURIER_PATH`)
//! 4. command line flags (applied by the binary)
//!
//! ```toml
//! host = "0.0.0.0"
//! port = 8080
//! path = "/ws"
//! max_frame_size = 1048576
//! write_timeout_secs = 10
//! # idle_timeout_secs = 300
//! ```

use std::net::{IpAddr, SocketAddr};
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Environment variable naming a TOML config file
pub const CONFIG_ENV: &str = "COURIER_CONFIG";

const HOST_ENV: &str = "COURIER_HOST";
const PORT_ENV: &str = "COURIER_PORT";
const PATH_ENV: &str = "COURIER_PATH";

/// Default listening port
pub const DEFAULT_PORT: u16 = 8080;

/// Default upgrade endpoint
pub const DEFAULT_PATH: &str = "/ws";

/// Maximum inbound frame size (1 MB)
pub const DEFAULT_MAX_FRAME_SIZE: usize = 1_048_576;

/// Characters the router interprets as captures or wildcards
const ROUTE_SYNTAX: &[char] = &[':', '*', '{', '}'];

/// Settings for one relay process.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RelayConfig {
    /// Interface to bind
    pub host: IpAddr,

    /// TCP port to bind (0 picks a free port)
    pub port: u16,

    /// Path of the WebSocket upgrade endpoint
    pub path: String,

    /// Largest inbound frame accepted, in bytes
    pub max_frame_size: usize,

    /// Upper bound on writing one frame to a peer
    pub write_timeout_secs: u64,

    /// Close sessions that receive nothing for this long (disabled if unset)
    pub idle_timeout_secs: Option<u64>,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            host: IpAddr::from([0, 0, 0, 0]),
            port: DEFAULT_PORT,
            path: DEFAULT_PATH.to_string(),
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            write_timeout_secs: 10,
            idle_timeout_secs: None,
        }
    }
}

impl RelayConfig {
    /// Reads a TOML config file. Missing keys keep their defaults.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Read {
            path: path.to_path_buf(),
            error: e.to_string(),
        })?;

        toml::from_str(&contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            error: e.to_string(),
        })
    }

    /// Builds the config from defaults, the file named by `file` (or by
    /// `COURIER_CONFIG`), and the process environment.
    pub fn load(file: Option<&Path>) -> Result<Self, ConfigError> {
        let env_file = std::env::var(CONFIG_ENV).ok().map(PathBuf::from);
        let file = file.map(Path::to_path_buf).or(env_file);

        let mut config = match file {
            Some(path) => Self::from_file(&path)?,
            None => Self::default(),
        };
        config.apply_env(|key| std::env::var(key).ok())?;
        config.validate()?;
        Ok(config)
    }

    /// Applies `COURIER_*` overrides using the given variable lookup.
    pub fn apply_env<F>(&mut self, lookup: F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(host) = lookup(HOST_ENV) {
            self.host = host.parse().map_err(|_| ConfigError::InvalidValue {
                key: HOST_ENV,
                value: host,
            })?;
        }

        if let Some(port) = lookup(PORT_ENV) {
            self.port = port.parse().map_err(|_| ConfigError::InvalidValue {
                key: PORT_ENV,
                value: port,
            })?;
        }

        if let Some(path) = lookup(PATH_ENV) {
            self.path = path;
        }

        Ok(())
    }

    /// Checks invariants the server relies on.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if !self.path.starts_with('/') {
            return Err(ConfigError::Invalid(format!(
                "path must start with '/': {}",
                self.path
            )));
        }
        if let Some(c) = self.path.chars().find(|c| ROUTE_SYNTAX.contains(c)) {
            return Err(ConfigError::Invalid(format!(
                "path must be a literal route, found '{c}' in {}",
                self.path
            )));
        }
        if self.path == "/health" {
            return Err(ConfigError::Invalid(
                "path /health is reserved for the health endpoint".to_string(),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(ConfigError::Invalid(
                "max_frame_size must be greater than zero".to_string(),
            ));
        }
        if self.write_timeout_secs == 0 {
            return Err(ConfigError::Invalid(
                "write_timeout_secs must be greater than zero".to_string(),
            ));
        }
        Ok(())
    }

    pub fn bind_addr(&self) -> SocketAddr {
        SocketAddr::new(self.host, self.port)
    }

    pub fn write_timeout(&self) -> Duration {
        Duration::from_secs(self.write_timeout_secs)
    }

    pub fn idle_timeout(&self) -> Option<Duration> {
        self.idle_timeout_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }
}

/// Errors that can occur while loading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {error}")]
    Read { path: PathBuf, error: String },

    #[error("Failed to parse config file {path}: {error}")]
    Parse { path: PathBuf, error: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: &'static str, value: String },

    #[error("Invalid configuration: {0}")]
    Invalid(String),
}
