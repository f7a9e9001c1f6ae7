//! Deploy-time configuration record
//!
//! Written once by setup; read by the agent at start. A flat key-value
//! document so external reverse-proxy/DNS configurators can consume it too.

use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::logs::LogLevel;

/// Deploy-time configuration for one application instance
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DeployConfig {
    /// Application name (also the service unit name)
    pub app_name: String,

    /// Working tree of the deployed application
    pub workdir: PathBuf,

    /// Port the application listens on
    pub port: u16,

    /// Backend variant selector
    pub backend: String,

    /// Branch whose pushes trigger deploys
    #[serde(default = "default_branch")]
    pub branch: String,

    /// Shared secret for webhook signature verification
    pub webhook_secret: String,

    /// Requested runtime version (backend-specific, optional)
    #[serde(default)]
    pub runtime_version: Option<String>,

    /// Log level
    #[serde(default)]
    pub log_level: LogLevel,

    /// Webhook listener configuration
    #[serde(default)]
    pub listener: ListenerConfig,

    /// Pipeline retry and probe knobs
    #[serde(default)]
    pub pipeline: PipelineConfig,
}

fn default_branch() -> String {
    "main".to_string()
}

/// Webhook listener settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ListenerConfig {
    #[serde(default = "default_host")]
    pub host: String,

    #[serde(default = "default_listener_port")]
    pub port: u16,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_listener_port() -> u16 {
    9966
}

impl Default for ListenerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_listener_port(),
        }
    }
}

/// Pipeline retry and health-probe settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PipelineConfig {
    /// Fetch attempts before the sync stage gives up
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,

    /// Fixed delay between fetch attempts, in seconds
    #[serde(default = "default_fetch_delay")]
    pub fetch_delay_secs: u64,

    /// Health probe rounds before the verdict is inconclusive
    #[serde(default = "default_probe_attempts")]
    pub probe_attempts: u32,

    /// Fixed delay between probe rounds, in seconds
    #[serde(default = "default_probe_interval")]
    pub probe_interval_secs: u64,
}

fn default_fetch_attempts() -> u32 {
    3
}

fn default_fetch_delay() -> u64 {
    5
}

fn default_probe_attempts() -> u32 {
    10
}

fn default_probe_interval() -> u64 {
    2
}

impl Default for PipelineConfig {
    fn default() -> Self {
        Self {
            fetch_attempts: default_fetch_attempts(),
            fetch_delay_secs: default_fetch_delay(),
            probe_attempts: default_probe_attempts(),
            probe_interval_secs: default_probe_interval(),
        }
    }
}

impl DeployConfig {
    /// Base URL the health prober targets
    pub fn app_base_url(&self) -> String {
        format!("http://127.0.0.1:{}", self.port)
    }
}
