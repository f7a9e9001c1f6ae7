//! Supervisor dispatch for backend build/restart/stop
//!
//! The pipeline drives build and start-or-restart per descriptor; stop
//! exists for operator-initiated teardown. `ShellSupervisor` maps all three
//! onto the concrete supervisor family named by the descriptor's restart
//! primitive.

use std::path::Path;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::{debug, info, warn};

use crate::backend::descriptor::{BackendDescriptor, RestartPrimitive};
use crate::errors::DeployError;

/// The supervisor operations the pipeline depends on
#[async_trait]
pub trait Supervisor: Send + Sync {
    /// Install dependencies and run the backend build command (a no-op for
    /// variants with no build step)
    async fn build(&self, descriptor: &BackendDescriptor, workdir: &Path)
        -> Result<(), DeployError>;

    /// Start the service, or restart it if it is already running
    async fn restart(&self, descriptor: &BackendDescriptor) -> Result<(), DeployError>;

    /// Stop the service
    async fn stop(&self, descriptor: &BackendDescriptor) -> Result<(), DeployError>;
}

/// Supervisor implementation that shells out to the host tools
#[derive(Debug, Default)]
pub struct ShellSupervisor;

impl ShellSupervisor {
    pub fn new() -> Self {
        Self
    }

    async fn run_shell(script: &str, workdir: Option<&Path>) -> Result<(), String> {
        debug!("Running: {}", script);
        let mut cmd = Command::new("bash");
        cmd.args(["-c", script]);
        if let Some(dir) = workdir {
            cmd.current_dir(dir);
        }

        let status = cmd
            .status()
            .await
            .map_err(|e| format!("failed to spawn `{}`: {}", script, e))?;

        if status.success() {
            Ok(())
        } else {
            Err(format!("`{}` exited with {}", script, status))
        }
    }
}

#[async_trait]
impl Supervisor for ShellSupervisor {
    async fn build(
        &self,
        descriptor: &BackendDescriptor,
        workdir: &Path,
    ) -> Result<(), DeployError> {
        if !descriptor.install_cmd.is_empty() {
            info!("Installing dependencies: {}", descriptor.install_cmd);
            Self::run_shell(&descriptor.install_cmd, Some(workdir))
                .await
                .map_err(DeployError::BuildFailure)?;
        }

        match &descriptor.build_cmd {
            Some(build_cmd) => {
                info!("Building: {}", build_cmd);
                Self::run_shell(build_cmd, Some(workdir))
                    .await
                    .map_err(DeployError::BuildFailure)
            }
            None => {
                debug!("Backend {} has no build step, skipping", descriptor.variant);
                Ok(())
            }
        }
    }

    async fn restart(&self, descriptor: &BackendDescriptor) -> Result<(), DeployError> {
        match &descriptor.restart {
            RestartPrimitive::ProcessManager { app_name } => {
                info!("Restarting process-managed app: {}", app_name);
                if Self::run_shell(&format!("pm2 restart {}", app_name), None)
                    .await
                    .is_err()
                {
                    // Not registered yet, start it fresh from the entry point
                    let workdir = &descriptor.service_unit.working_dir;
                    let start = format!(
                        "pm2 start {} --name {}",
                        descriptor.artifact.display(),
                        app_name
                    );
                    Self::run_shell(&start, Some(workdir))
                        .await
                        .map_err(DeployError::RestartFailure)?;
                }
                Ok(())
            }

            RestartPrimitive::Systemd { unit } => {
                info!("Restarting systemd unit: {}", unit);
                Self::run_shell(&format!("systemctl restart {}", unit), None)
                    .await
                    .map_err(DeployError::RestartFailure)
            }

            RestartPrimitive::Compose { project_dir } => {
                info!("Restarting compose stack in: {}", project_dir.display());
                // Prefer the compose plugin; fall back to standalone docker-compose
                if Self::run_shell("docker compose up -d --build", Some(project_dir))
                    .await
                    .is_ok()
                {
                    return Ok(());
                }
                warn!("`docker compose` failed, trying `docker-compose`...");
                Self::run_shell("docker-compose up -d --build", Some(project_dir))
                    .await
                    .map_err(DeployError::RestartFailure)
            }

            RestartPrimitive::FpmPool { pool_unit, proxy_unit } => {
                info!("Reloading FPM pool {} and proxy {}", pool_unit, proxy_unit);
                Self::run_shell(&format!("systemctl reload-or-restart {}", pool_unit), None)
                    .await
                    .map_err(DeployError::RestartFailure)?;
                Self::run_shell(&format!("systemctl reload {}", proxy_unit), None)
                    .await
                    .map_err(DeployError::RestartFailure)
            }
        }
    }

    async fn stop(&self, descriptor: &BackendDescriptor) -> Result<(), DeployError> {
        match &descriptor.restart {
            RestartPrimitive::ProcessManager { app_name } => {
                Self::run_shell(&format!("pm2 stop {}", app_name), None)
                    .await
                    .map_err(DeployError::RestartFailure)
            }
            RestartPrimitive::Systemd { unit } => {
                Self::run_shell(&format!("systemctl stop {}", unit), None)
                    .await
                    .map_err(DeployError::RestartFailure)
            }
            RestartPrimitive::Compose { project_dir } => {
                if Self::run_shell("docker compose down", Some(project_dir))
                    .await
                    .is_ok()
                {
                    return Ok(());
                }
                Self::run_shell("docker-compose down", Some(project_dir))
                    .await
                    .map_err(DeployError::RestartFailure)
            }
            RestartPrimitive::FpmPool { pool_unit, .. } => {
                Self::run_shell(&format!("systemctl stop {}", pool_unit), None)
                    .await
                    .map_err(DeployError::RestartFailure)
            }
        }
    }
}
