//! Application configuration options

use std::time::Duration;

use crate::storage::config::DeployConfig;
use crate::storage::layout::StorageLayout;

/// Main application options
#[derive(Debug, Clone)]
pub struct AppOptions {
    /// Lifecycle configuration
    pub lifecycle: LifecycleOptions,

    /// Storage configuration
    pub storage: StorageOptions,

    /// Server configuration
    pub server: ServerOptions,
}

impl AppOptions {
    /// Derive runtime options from the persisted deploy configuration
    pub fn from_config(config: &DeployConfig, layout: StorageLayout) -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions { layout },
            server: ServerOptions {
                host: config.listener.host.clone(),
                port: config.listener.port,
            },
        }
    }
}

impl Default for AppOptions {
    fn default() -> Self {
        Self {
            lifecycle: LifecycleOptions::default(),
            storage: StorageOptions::default(),
            server: ServerOptions::default(),
        }
    }
}

/// Lifecycle options for the agent
#[derive(Debug, Clone)]
pub struct LifecycleOptions {
    /// Maximum delay for graceful shutdown
    pub max_shutdown_delay: Duration,
}

impl Default for LifecycleOptions {
    fn default() -> Self {
        Self {
            max_shutdown_delay: Duration::from_secs(30),
        }
    }
}

/// Storage configuration options
#[derive(Debug, Clone, Default)]
pub struct StorageOptions {
    /// Storage layout paths
    pub layout: StorageLayout,
}

/// Webhook HTTP server options
#[derive(Debug, Clone)]
pub struct ServerOptions {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,
}

impl Default for ServerOptions {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 9966,
        }
    }
}
