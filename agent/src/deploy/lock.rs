//! Deploy lock management
//!
//! A filesystem-visible lock token keyed by the owning process id. At most
//! one live-owner token exists at any instant; a token whose owner is dead
//! is stale and reclaimed by the next acquisition.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::errors::DeployError;
use crate::filesys::file::File;

/// The singleton "deploy in progress" token
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LockToken {
    /// Owning process id
    pub pid: u32,

    /// Acquisition time
    pub acquired_at: DateTime<Utc>,
}

/// Lock manager backed by a pid-keyed lock file
pub struct LockManager {
    lock_file: File,
    // Serializes acquire() between concurrent webhook tasks in this process;
    // the lock file alone cannot close the check-then-write window.
    guard: Mutex<()>,
}

impl LockManager {
    pub fn new(lock_file: File) -> Self {
        Self {
            lock_file,
            guard: Mutex::new(()),
        }
    }

    /// Acquire the deploy lock, fail-fast on contention.
    ///
    /// An existing token with a live owner yields `LockContention`; a stale
    /// token (dead owner or unreadable file) is discarded and acquisition
    /// proceeds.
    pub async fn acquire(&self) -> Result<LockToken, DeployError> {
        let _guard = self.guard.lock().await;

        if self.lock_file.exists().await {
            match self.lock_file.read_json::<LockToken>().await {
                Ok(existing) if process_alive(existing.pid) => {
                    debug!("Deploy lock held by live pid {}", existing.pid);
                    return Err(DeployError::LockContention {
                        owner_pid: existing.pid,
                    });
                }
                Ok(existing) => {
                    warn!(
                        "Reclaiming stale deploy lock held by dead pid {} (acquired {})",
                        existing.pid, existing.acquired_at
                    );
                }
                Err(e) => {
                    warn!("Discarding unreadable deploy lock: {}", e);
                }
            }
            self.lock_file
                .delete()
                .await
                .map_err(|e| DeployError::SyncFailure(format!("stale lock removal: {}", e)))?;
        }

        let token = LockToken {
            pid: std::process::id(),
            acquired_at: Utc::now(),
        };
        self.lock_file
            .write_json(&token)
            .await
            .map_err(|e| DeployError::SyncFailure(format!("lock file write: {}", e)))?;

        Ok(token)
    }

    /// Release the lock. Best-effort: a failure here is logged, never
    /// propagated, so terminal pipeline states can always return.
    pub async fn release(&self, token: &LockToken) {
        match self.lock_file.read_json::<LockToken>().await {
            Ok(current) if current.pid == token.pid => {
                if let Err(e) = self.lock_file.delete().await {
                    warn!("Failed to remove deploy lock file: {}", e);
                }
            }
            Ok(current) => {
                warn!(
                    "Deploy lock owned by pid {}, not releasing (token pid {})",
                    current.pid, token.pid
                );
            }
            Err(e) => {
                warn!("Deploy lock unreadable on release: {}", e);
            }
        }
    }
}

/// Check whether a process with the given pid is alive
fn process_alive(pid: u32) -> bool {
    let system = sysinfo::System::new_all();
    system.process(sysinfo::Pid::from_u32(pid)).is_some()
}
