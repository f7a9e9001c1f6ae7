//! Storage layout configuration

use std::path::PathBuf;

use crate::filesys::dir::Dir;
use crate::filesys::file::File;

/// Storage layout for the agent
#[derive(Debug, Clone)]
pub struct StorageLayout {
    /// Base directory for all storage
    pub base_dir: PathBuf,
}

impl StorageLayout {
    /// Create a new storage layout
    pub fn new(base_dir: impl Into<PathBuf>) -> Self {
        Self {
            base_dir: base_dir.into(),
        }
    }

    /// Get the deploy configuration file path
    pub fn config_file(&self) -> File {
        File::new(self.base_dir.join("config.json"))
    }

    /// Get the deploy lock file path
    pub fn lock_file(&self) -> File {
        File::new(self.base_dir.join("deploy.lock"))
    }

    /// Get the deploy event log file path
    pub fn deploy_log_file(&self) -> File {
        File::new(self.base_dir.join("logs").join("deploy.log"))
    }

    /// Get the agent logs directory
    pub fn logs_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("logs"))
    }

    /// Get the rendered service unit directory
    pub fn units_dir(&self) -> Dir {
        Dir::new(self.base_dir.join("units"))
    }

    /// Setup the storage layout (create directories)
    pub async fn setup(&self) -> Result<(), crate::errors::AgentError> {
        self.logs_dir().create().await?;
        self.units_dir().create().await?;
        Ok(())
    }
}

impl Default for StorageLayout {
    fn default() -> Self {
        // Use /etc/dockhand on Linux, or user home directory on other platforms
        #[cfg(target_os = "linux")]
        let base_dir = PathBuf::from("/etc/dockhand");

        #[cfg(not(target_os = "linux"))]
        let base_dir = std::env::var_os("HOME")
            .or_else(|| std::env::var_os("USERPROFILE"))
            .map(PathBuf::from)
            .unwrap_or_else(|| PathBuf::from("."))
            .join(".dockhand");

        Self::new(base_dir)
    }
}
