//! Host configuration.
//!
//! Loaded from the YAML file named by `CAMWEB_CONFIG` (defaults apply when
//! it is unset), with `LISTEN_PORT` overriding the port.

use std::path::{Path, PathBuf};

use anyhow::Context;
use serde::Deserialize;

use crate::auth::{UserGroup, calculate_ha1};
use crate::server::{DEFAULT_AUTH_DOMAIN, DEFAULT_PORT};

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub users: Vec<UserConfig>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub port: u16,
    pub document_root: PathBuf,
    pub auth_domain: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            port: DEFAULT_PORT,
            document_root: PathBuf::new(),
            auth_domain: DEFAULT_AUTH_DOMAIN.to_string(),
        }
    }
}

/// A user entry. Either `ha1` or `password` must be given; a password is
/// hashed at load time and never kept by the server.
#[derive(Debug, Clone, Deserialize)]
pub struct UserConfig {
    pub name: String,
    #[serde(default)]
    pub ha1: Option<String>,
    #[serde(default)]
    pub password: Option<String>,
    #[serde(default)]
    pub group: UserGroup,
}

impl UserConfig {
    /// The user's HA1 digest for the given auth domain.
    pub fn ha1(&self, domain: &str) -> String {
        match (&self.ha1, &self.password) {
            (Some(ha1), _) => ha1.to_ascii_lowercase(),
            (None, Some(password)) => calculate_ha1(&self.name, domain, password),
            (None, None) => String::new(),
        }
    }
}

impl Config {
    /// Reads configuration from the environment.
    pub fn load() -> anyhow::Result<Self> {
        let mut cfg = match std::env::var("CAMWEB_CONFIG") {
            Ok(path) => Self::from_file(path)?,
            Err(_) => Self::default(),
        };

        if let Ok(port) = std::env::var("LISTEN_PORT") {
            cfg.server.port = port
                .parse()
                .with_context(|| format!("invalid LISTEN_PORT: {}", port))?;
        }

        Ok(cfg)
    }

    pub fn from_file(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        Self::from_yaml(&text).with_context(|| format!("invalid config {}", path.display()))
    }

    pub fn from_yaml(text: &str) -> anyhow::Result<Self> {
        let cfg: Config = serde_yaml::from_str(text)?;

        if let Some(user) = cfg
            .users
            .iter()
            .find(|user| user.ha1.is_none() && user.password.is_none())
        {
            anyhow::bail!("user '{}' needs either ha1 or password", user.name);
        }

        Ok(cfg)
    }
}
