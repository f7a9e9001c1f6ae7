//! Ordered fallback chains
//!
//! "Try A, else B, else C" generalized into a combinator: strategies are
//! attempted in order until one succeeds; every failure is logged and the
//! chain only fails when all strategies are exhausted.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{info, warn};

use crate::errors::InstallError;

/// One installation strategy in an ordered chain
#[async_trait]
pub trait InstallStrategy: Send + Sync {
    /// Strategy name for logging and failure reports
    fn name(&self) -> &str;

    /// Attempt the installation; an error moves the chain to the next entry
    async fn attempt(&self) -> Result<(), String>;
}

/// Strategy that runs a shell script
pub struct CommandStrategy {
    name: String,
    script: String,
}

impl CommandStrategy {
    pub fn new(name: impl Into<String>, script: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            script: script.into(),
        }
    }
}

#[async_trait]
impl InstallStrategy for CommandStrategy {
    fn name(&self) -> &str {
        &self.name
    }

    async fn attempt(&self) -> Result<(), String> {
        let status = Command::new("bash")
            .args(["-c", &self.script])
            .status()
            .await
            .map_err(|e| format!("failed to spawn `{}`: {}", self.script, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("`{}` exited with {}", self.script, status))
        }
    }
}

/// Run an ordered strategy chain until one succeeds.
pub async fn run_chain(
    tool: &str,
    strategies: &[Box<dyn InstallStrategy>],
) -> Result<(), InstallError> {
    let mut tried = Vec::with_capacity(strategies.len());

    for strategy in strategies {
        info!("Installing {} via strategy: {}", tool, strategy.name());
        match strategy.attempt().await {
            Ok(()) => {
                info!("Strategy {} succeeded for {}", strategy.name(), tool);
                return Ok(());
            }
            Err(e) => {
                warn!("Strategy {} failed for {}: {}", strategy.name(), tool, e);
                tried.push(strategy.name().to_string());
            }
        }
    }

    Err(InstallError::AllStrategiesFailed {
        tool: tool.to_string(),
        tried,
    })
}

/// Check whether a probe command succeeds (tool already present).
pub async fn probe_command(script: &str) -> bool {
    probe_command_in(script, None).await
}

async fn probe_command_in(script: &str, workdir: Option<&Path>) -> bool {
    let mut cmd = Command::new("bash");
    cmd.args(["-c", script]);
    if let Some(dir) = workdir {
        cmd.current_dir(dir);
    }
    matches!(cmd.status().await, Ok(status) if status.success())
}
