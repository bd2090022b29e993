use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use crate::errors::Error;

pub const DEFAULT_SOCKET_DIR: &str = "/var/lib/haproxy";
pub const DEFAULT_TIMEOUT_MS: u64 = 5000;

/// Where to find the per-process sockets and how long to wait for each of them.
///
/// ```toml
/// socket_dir = "/var/lib/haproxy"
/// timeout_ms = 2000
/// ```
#[derive(Clone, Debug, Deserialize, Eq, PartialEq)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    /// Directory holding one stats socket per HAProxy process.
    pub socket_dir: PathBuf,
    /// Timeout for every socket operation, in milliseconds.
    pub timeout_ms: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            socket_dir: PathBuf::from(DEFAULT_SOCKET_DIR),
            timeout_ms: DEFAULT_TIMEOUT_MS,
        }
    }
}

impl Config {
    pub fn new(content: &str) -> Result<Config, Error> {
        let config: Config = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn from_file(config_path: &Path) -> Result<Config, Error> {
        let content = std::fs::read_to_string(config_path).map_err(|e| Error::ConfigRead {
            path: config_path.to_path_buf(),
            source: e,
        })?;
        Self::new(content.as_str())
    }

    /// A default configuration reading sockets from `socket_dir`.
    pub fn with_socket_dir<P: Into<PathBuf>>(socket_dir: P) -> Self {
        Self {
            socket_dir: socket_dir.into(),
            ..Self::default()
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }

    pub fn validate(&self) -> Result<(), Error> {
        if self.timeout_ms == 0 {
            return Err(Error::Validation(
                "timeout_ms must be greater than zero".into(),
            ));
        }
        Ok(())
    }
}
