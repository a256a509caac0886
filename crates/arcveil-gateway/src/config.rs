//! Gateway configuration, loadable from TOML or JSON

use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::Path;

/// One login credential accepted by `/auth/login`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserCredential {
    /// Login name
    pub username: String,
    /// Shared secret, compared in constant time
    pub password: String,
}

/// Gateway configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// Listen address
    pub bind_addr: SocketAddr,
    /// Accounts allowed to log in
    pub users: Vec<UserCredential>,
    /// Token lifetime in seconds
    pub token_ttl_secs: u64,
    /// Bounded capacity of the in-memory access log
    pub access_log_capacity: usize,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            bind_addr: SocketAddr::from(([0, 0, 0, 0], 8470)),
            users: Vec::new(),
            token_ttl_secs: 86_400,
            access_log_capacity: 10_000,
        }
    }
}

impl GatewayConfig {
    /// Load from a `.toml` or `.json` file, selected by extension.
    pub fn from_file(path: &Path) -> anyhow::Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default();

        match ext.to_lowercase().as_str() {
            "toml" => {
                let config: GatewayConfig = toml::from_str(&contents)?;
                Ok(config)
            }
            "json" => {
                let config: GatewayConfig = serde_json::from_str(&contents)?;
                Ok(config)
            }
            _ => anyhow::bail!("Unsupported config file extension: {}", ext),
        }
    }
}
