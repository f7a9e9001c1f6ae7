//! Error types for the dockhand agent

use thiserror::Error;

/// Main error type for the dockhand agent
#[derive(Error, Debug)]
pub enum AgentError {
    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    #[error("HTTP error: {0}")]
    HttpError(#[from] reqwest::Error),

    #[error("Deploy error: {0}")]
    Deploy(#[from] DeployError),

    #[error("Install error: {0}")]
    Install(#[from] InstallError),

    #[error("Server error: {0}")]
    ServerError(String),

    #[error("Shutdown error: {0}")]
    ShutdownError(String),

    #[error("Configuration error: {0}")]
    ConfigError(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<anyhow::Error> for AgentError {
    fn from(err: anyhow::Error) -> Self {
        AgentError::Internal(err.to_string())
    }
}

/// Errors produced by the deploy pipeline and its collaborators.
///
/// `LockContention` is a deliberate fail-fast abort, not a fault. Build and
/// restart failures trigger rollback; a rollback failure is the only class
/// that requires manual operator intervention.
#[derive(Error, Debug)]
pub enum DeployError {
    #[error("another deploy is in progress (lock held by pid {owner_pid})")]
    LockContention { owner_pid: u32 },

    #[error("fetch failed after {attempts} attempts: {reason}")]
    FetchFailure { attempts: u32, reason: String },

    #[error("source sync failed: {0}")]
    SyncFailure(String),

    #[error("build failed: {0}")]
    BuildFailure(String),

    #[error("restart failed: {0}")]
    RestartFailure(String),

    #[error("rollback to {revision} failed: {reason}; manual intervention required")]
    RollbackFailure { revision: String, reason: String },

    #[error("unknown backend variant: {0}")]
    UnknownBackend(String),
}

/// Errors produced by the runtime installer fallback chains.
#[derive(Error, Debug)]
pub enum InstallError {
    #[error("all install strategies for {tool} failed (tried: {})", tried.join(", "))]
    AllStrategiesFailed { tool: String, tried: Vec<String> },

    #[error("install strategy IO error: {0}")]
    IoError(#[from] std::io::Error),
}
