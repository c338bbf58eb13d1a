//! # Configuration
//!
//! Process-wide configuration loaded from environment variables (populated from a ConfigMap
//! and a Secret in the deployment).
//!
//! Configuration is read once at startup and handed to the components that need it through
//! their constructors; nothing reads the environment after initialization.

mod controller;
mod server;
mod vault;

pub use controller::ControllerConfig;
pub use server::ServerConfig;
pub use vault::VaultConfig;

/// Load controller and server configuration from environment variables with defaults
pub fn load_config() -> (ControllerConfig, ServerConfig) {
    (ControllerConfig::from_env(), ServerConfig::from_env())
}
