use std::fmt;
use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use crate::dnssec::DigestType;

pub const DEFAULT_CONFIG_PATH: &str = "/usr/local/etc/cdsync.toml";
pub const DEFAULT_NAMESERVER_ADDR: &str = "127.0.0.1";
pub const DEFAULT_NAMESERVER_PORT: u16 = 53;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read configuration file {path}: {message}")]
    Io { path: PathBuf, message: String },

    #[error("cannot parse configuration file {path}: {message}")]
    Parse { path: PathBuf, message: String },

    #[error("invalid configuration: {}", .0.join("; "))]
    Invalid(Vec<String>),
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ApiSection {
    key: Option<String>,
    endpoint: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct AccountSection {
    number: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct NameserverSection {
    address: Option<String>,
    port: Option<u16>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct DsSection {
    digest_type: Option<u8>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct ConfigFile {
    api: ApiSection,
    account: AccountSection,
    nameserver: NameserverSection,
    ds: DsSection,
}

/// Validated settings, read-only after startup.
#[derive(Clone)]
pub struct Config {
    pub api_key: String,
    /// Registrar API base URL; `None` means production
    pub api_endpoint: Option<String>,
    pub account_number: String,
    pub nameserver_addr: String,
    pub nameserver_port: u16,
    pub digest_type: DigestType,
}

impl fmt::Debug for Config {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Config")
            .field("api_key", &"<redacted>")
            .field("api_endpoint", &self.api_endpoint)
            .field("account_number", &self.account_number)
            .field("nameserver_addr", &self.nameserver_addr)
            .field("nameserver_port", &self.nameserver_port)
            .field("digest_type", &self.digest_type)
            .finish()
    }
}

impl Config {
    /// Read `path` and apply `CDSYNC_*` environment overrides.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let contents = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        debug!("Read configuration from {}", path.display());
        Self::from_toml_with_env(&contents, path, |name| std::env::var(name).ok())
    }

    /// Parse TOML and resolve overrides through `env`, then validate.
    pub fn from_toml_with_env<F>(contents: &str, path: &Path, env: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut file: ConfigFile = toml::from_str(contents).map_err(|e| ConfigError::Parse {
            path: path.to_path_buf(),
            message: e.to_string(),
        })?;
        let mut problems = Vec::new();

        if let Some(key) = env("CDSYNC_API_KEY") {
            file.api.key = Some(key);
        }
        if let Some(endpoint) = env("CDSYNC_API_ENDPOINT") {
            file.api.endpoint = Some(endpoint);
        }
        if let Some(number) = env("CDSYNC_ACCOUNT_NUMBER") {
            file.account.number = Some(number);
        }
        if let Some(addr) = env("CDSYNC_NAMESERVER_ADDR") {
            file.nameserver.address = Some(addr);
        }
        if let Some(port) = env("CDSYNC_NAMESERVER_PORT") {
            match port.parse::<u16>() {
                Ok(port) => file.nameserver.port = Some(port),
                Err(_) => problems.push(format!("invalid nameserver port: {}", port)),
            }
        }
        if let Some(digest_type) = env("CDSYNC_DS_DIGEST_TYPE") {
            match digest_type.parse::<u8>() {
                Ok(value) => file.ds.digest_type = Some(value),
                Err(_) => problems.push(format!("invalid DS digest type: {}", digest_type)),
            }
        }

        let api_key = non_empty(file.api.key);
        if api_key.is_none() {
            problems.push("the API key ([api] key) is mandatory".to_string());
        }
        let account_number = non_empty(file.account.number);
        if account_number.is_none() {
            problems.push("the account number ([account] number) is mandatory".to_string());
        }

        let digest_value = file.ds.digest_type.unwrap_or(DigestType::default().to_u8());
        let digest_type = match DigestType::from_u8(digest_value) {
            Some(d) if d.is_supported() => Some(d),
            _ => {
                problems.push(format!("unsupported DS digest type: {}", digest_value));
                None
            }
        };

        let nameserver_port = file.nameserver.port.unwrap_or(DEFAULT_NAMESERVER_PORT);
        if nameserver_port == 0 {
            problems.push("nameserver port must not be 0".to_string());
        }

        match (api_key, account_number, digest_type) {
            (Some(api_key), Some(account_number), Some(digest_type)) if problems.is_empty() => {
                let config = Config {
                    api_key,
                    api_endpoint: non_empty(file.api.endpoint),
                    account_number,
                    nameserver_addr: non_empty(file.nameserver.address)
                        .unwrap_or_else(|| DEFAULT_NAMESERVER_ADDR.to_string()),
                    nameserver_port,
                    digest_type,
                };
                debug!("Configuration: {:?}", config);
                Ok(config)
            }
            _ => Err(ConfigError::Invalid(problems)),
        }
    }
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(contents: &str) -> Result<Config, ConfigError> {
        Config::from_toml_with_env(contents, Path::new("test.toml"), |_| None)
    }

    #[test]
    fn test_defaults() {
        let config = parse(
            r#"
            [api]
            key = "secret"
            [account]
            number = "1234"
            "#,
        )
        .unwrap();
        assert_eq!(config.nameserver_addr, "127.0.0.1");
        assert_eq!(config.nameserver_port, 53);
        assert_eq!(config.digest_type, DigestType::Sha256);
        assert!(config.api_endpoint.is_none());
    }

    #[test]
    fn test_collects_every_problem() {
        match parse("[ds]\ndigest_type = 3\n") {
            Err(ConfigError::Invalid(problems)) => assert_eq!(problems.len(), 3),
            other => panic!("expected Invalid, got {:?}", other),
        }
    }

    #[test]
    fn test_env_overrides_file() {
        let config = Config::from_toml_with_env(
            "[api]\nkey = \"file\"\n[account]\nnumber = \"1\"\n",
            Path::new("test.toml"),
            |name| match name {
                "CDSYNC_API_KEY" => Some("env".to_string()),
                "CDSYNC_NAMESERVER_PORT" => Some("5353".to_string()),
                _ => None,
            },
        )
        .unwrap();
        assert_eq!(config.api_key, "env");
        assert_eq!(config.nameserver_port, 5353);
    }

    #[test]
    fn test_debug_redacts_key() {
        let config = parse("[api]\nkey = \"hunter2\"\n[account]\nnumber = \"1\"\n").unwrap();
        let debug = format!("{:?}", config);
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }
}
