//! Rollback controller
//!
//! Reverts the working tree to the last known-good revision and re-runs the
//! backend's build/restart sequence. Build failures are swallowed so a
//! best-effort restart of the previous artifact is still attempted; only a
//! failed restart makes the rollback itself fail.

use std::path::Path;
use std::sync::Arc;

use tracing::{info, warn};

use crate::backend::descriptor::BackendDescriptor;
use crate::backend::exec::Supervisor;
use crate::deploy::events::EventLog;
use crate::deploy::git::Vcs;
use crate::errors::DeployError;

/// Restores service at a prior revision after a pipeline stage failure
pub struct RollbackController {
    vcs: Arc<dyn Vcs>,
    supervisor: Arc<dyn Supervisor>,
    events: Arc<EventLog>,
}

impl RollbackController {
    pub fn new(vcs: Arc<dyn Vcs>, supervisor: Arc<dyn Supervisor>, events: Arc<EventLog>) -> Self {
        Self {
            vcs,
            supervisor,
            events,
        }
    }

    /// Roll the working tree back to `to_revision` and restart the service.
    ///
    /// Never retried automatically: a `RollbackFailure` is surfaced for
    /// manual operator intervention.
    pub async fn rollback(
        &self,
        to_revision: &str,
        descriptor: &BackendDescriptor,
        workdir: &Path,
    ) -> Result<(), DeployError> {
        info!("Rolling back to revision {}", to_revision);
        self.events
            .append("rollback", &format!("resetting working tree to {}", to_revision))
            .await;

        self.vcs.hard_reset(to_revision).await.map_err(|e| {
            DeployError::RollbackFailure {
                revision: to_revision.to_string(),
                reason: e.to_string(),
            }
        })?;

        // Best-effort rebuild: the previous artifact may already be on disk
        // from the last successful deploy, so a rebuild failure must not
        // prevent the restart below.
        if let Err(e) = self.supervisor.build(descriptor, workdir).await {
            warn!("Rebuild at rollback revision failed: {}", e);
            self.events
                .append(
                    "rollback",
                    &format!("rebuild failed ({}), restarting previous artifact", e),
                )
                .await;
        }

        self.supervisor.restart(descriptor).await.map_err(|e| {
            DeployError::RollbackFailure {
                revision: to_revision.to_string(),
                reason: e.to_string(),
            }
        })?;

        self.events
            .append("rollback", &format!("service restarted at revision {}", to_revision))
            .await;
        Ok(())
    }
}
