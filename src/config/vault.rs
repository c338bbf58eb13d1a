//! # Vault Configuration
//!
//! Connection settings for the 1Password Connect server.

use super::controller::{env_var_or_default, env_var_or_default_str};
use anyhow::{bail, Result};
use std::time::Duration;
use zeroize::Zeroizing;

/// 1Password Connect connection settings
///
/// The token is held in a `Zeroizing` buffer and is never printed.
#[derive(Clone)]
pub struct VaultConfig {
    /// Base URL of the Connect server, without trailing slash
    pub url: String,
    /// Connect access token (zeroized on drop)
    pub token: Zeroizing<String>,
    /// Timeout applied to each Connect request
    pub request_timeout_secs: u64,
}

impl std::fmt::Debug for VaultConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VaultConfig")
            .field("url", &self.url)
            .field("token", &"***")
            .field("request_timeout_secs", &self.request_timeout_secs)
            .finish()
    }
}

impl VaultConfig {
    pub fn new(url: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            url: url.into().trim_end_matches('/').to_string(),
            token: Zeroizing::new(token.into()),
            request_timeout_secs: crate::constants::DEFAULT_CONNECT_TIMEOUT_SECS,
        }
    }

    /// Load from `OP_CONNECT_HOST` / `OP_CONNECT_TOKEN`
    ///
    /// The token is mandatory; the host falls back to the in-cluster service name.
    pub fn from_env() -> Result<Self> {
        use crate::constants::*;
        let url = env_var_or_default_str("OP_CONNECT_HOST", DEFAULT_CONNECT_HOST);
        let token = Zeroizing::new(std::env::var("OP_CONNECT_TOKEN").unwrap_or_default());
        if token.trim().is_empty() {
            bail!("OP_CONNECT_TOKEN must be set to a 1Password Connect access token");
        }
        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            token,
            request_timeout_secs: env_var_or_default(
                "OP_CONNECT_TIMEOUT_SECS",
                DEFAULT_CONNECT_TIMEOUT_SECS,
            ),
        })
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_debug_redacts_token() {
        let config = VaultConfig::new("http://connect:8080/", "super-secret-token");
        let printed = format!("{config:?}");
        assert!(printed.contains("***"));
        assert!(!printed.contains("super-secret-token"));
        assert_eq!(config.url, "http://connect:8080");
    }
}
