//! Version-control abstraction
//!
//! The pipeline consumes four operations (fetch, hard-reset, current
//! revision, stash) plus remote-head resolution, behind a trait so tests and
//! future VCS clients stay decoupled from the git binary.

use std::path::PathBuf;

use async_trait::async_trait;
use tokio::process::Command;
use tracing::debug;

use crate::errors::DeployError;

/// Version-control operations the pipeline depends on
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Fetch the default remote
    async fn fetch(&self) -> Result<(), DeployError>;

    /// Revision currently checked out in the working tree
    async fn current_revision(&self) -> Result<String, DeployError>;

    /// Revision at the tip of the remote branch
    async fn remote_head(&self, branch: &str) -> Result<String, DeployError>;

    /// Hard-reset the working tree to a revision
    async fn hard_reset(&self, revision: &str) -> Result<(), DeployError>;

    /// Discard uncommitted local modifications
    async fn stash_local_changes(&self) -> Result<(), DeployError>;
}

/// Git client shelling out to the git binary
pub struct GitClient {
    workdir: PathBuf,
}

impl GitClient {
    pub fn new(workdir: impl Into<PathBuf>) -> Self {
        Self {
            workdir: workdir.into(),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<String, DeployError> {
        debug!("Running: git {}", args.join(" "));
        let output = Command::new("git")
            .current_dir(&self.workdir)
            .args(args)
            .output()
            .await
            .map_err(|e| DeployError::SyncFailure(format!("failed to run git: {}", e)))?;

        if output.status.success() {
            Ok(String::from_utf8_lossy(&output.stdout).trim().to_string())
        } else {
            Err(DeployError::SyncFailure(format!(
                "git {} failed: {}",
                args.join(" "),
                String::from_utf8_lossy(&output.stderr).trim()
            )))
        }
    }
}

#[async_trait]
impl Vcs for GitClient {
    async fn fetch(&self) -> Result<(), DeployError> {
        self.git(&["fetch", "--prune", "origin"]).await.map(|_| ())
    }

    async fn current_revision(&self) -> Result<String, DeployError> {
        self.git(&["rev-parse", "HEAD"]).await
    }

    async fn remote_head(&self, branch: &str) -> Result<String, DeployError> {
        self.git(&["rev-parse", &format!("origin/{}", branch)]).await
    }

    async fn hard_reset(&self, revision: &str) -> Result<(), DeployError> {
        self.git(&["reset", "--hard", revision]).await.map(|_| ())
    }

    async fn stash_local_changes(&self) -> Result<(), DeployError> {
        // Exits 0 with "No local changes to save" on a clean tree
        self.git(&["stash", "push", "--include-untracked", "-m", "dockhand pre-deploy"])
            .await
            .map(|_| ())
    }
}
