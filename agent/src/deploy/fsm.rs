//! Finite state machine for one deploy attempt
//!
//! Rollback is an explicit transition out of the Syncing/Building/Restarting
//! stages, never an implicit error handler.

use serde::{Deserialize, Serialize};

/// Pipeline state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PipelineState {
    /// Not yet locked; every attempt starts here
    Idle,

    /// Deploy lock held, no mutation yet
    Locked,

    /// Fetching and resetting the working tree
    Syncing,

    /// Installing dependencies and building
    Building,

    /// Invoking the backend restart primitive
    Restarting,

    /// Polling the service endpoints
    HealthChecking,

    /// Terminal: deploy applied (possibly degraded)
    Succeeded,

    /// Terminal: failure recovered by restoring the rollback revision
    RolledBack,

    /// Terminal: rollback itself failed; manual intervention required
    Failed,
}

impl PipelineState {
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            PipelineState::Succeeded | PipelineState::RolledBack | PipelineState::Failed
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Locked => "locked",
            PipelineState::Syncing => "syncing",
            PipelineState::Building => "building",
            PipelineState::Restarting => "restarting",
            PipelineState::HealthChecking => "health_checking",
            PipelineState::Succeeded => "succeeded",
            PipelineState::RolledBack => "rolled_back",
            PipelineState::Failed => "failed",
        }
    }
}

/// Pipeline event
#[derive(Debug, Clone)]
pub enum PipelineEvent {
    /// Lock manager granted the token
    LockGranted,

    /// Source synchronization started
    SyncStarted,

    /// Build stage started
    BuildStarted,

    /// Restart stage started
    RestartStarted,

    /// Health probing started
    HealthCheckStarted,

    /// Probe verdict: healthy
    Healthy,

    /// Probe exhausted without a healthy verdict; success with warning
    Degraded,

    /// A stage failed and the rollback revision was restored
    RollbackSucceeded(String),

    /// A stage failed and rollback failed too
    RollbackFailed(String),
}

/// Deploy attempt FSM
#[derive(Debug, Clone)]
pub struct PipelineFsm {
    state: PipelineState,
    error: Option<String>,
    degraded: bool,
}

impl PipelineFsm {
    /// Create a new FSM in idle state
    pub fn new() -> Self {
        Self {
            state: PipelineState::Idle,
            error: None,
            degraded: false,
        }
    }

    /// Get current state
    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Get error message if any
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    /// Whether the attempt succeeded with an inconclusive health probe
    pub fn degraded(&self) -> bool {
        self.degraded
    }

    /// Process an event and transition state
    pub fn process(&mut self, event: PipelineEvent) -> Result<(), String> {
        let new_state = match (&self.state, &event) {
            (PipelineState::Idle, PipelineEvent::LockGranted) => PipelineState::Locked,

            (PipelineState::Locked, PipelineEvent::SyncStarted) => PipelineState::Syncing,

            (PipelineState::Syncing, PipelineEvent::BuildStarted) => PipelineState::Building,

            (PipelineState::Building, PipelineEvent::RestartStarted) => PipelineState::Restarting,

            (PipelineState::Restarting, PipelineEvent::HealthCheckStarted) => {
                PipelineState::HealthChecking
            }

            (PipelineState::HealthChecking, PipelineEvent::Healthy) => PipelineState::Succeeded,

            (PipelineState::HealthChecking, PipelineEvent::Degraded) => {
                self.degraded = true;
                PipelineState::Succeeded
            }

            // Any in-flight mutation stage can end in rollback
            (
                PipelineState::Syncing | PipelineState::Building | PipelineState::Restarting,
                PipelineEvent::RollbackSucceeded(err),
            ) => {
                self.error = Some(err.clone());
                PipelineState::RolledBack
            }

            (
                PipelineState::Syncing | PipelineState::Building | PipelineState::Restarting,
                PipelineEvent::RollbackFailed(err),
            ) => {
                self.error = Some(err.clone());
                PipelineState::Failed
            }

            // Invalid transitions
            (state, event) => {
                return Err(format!("Invalid transition: {:?} -> {:?}", state, event));
            }
        };

        self.state = new_state;
        Ok(())
    }
}

impl Default for PipelineFsm {
    fn default() -> Self {
        Self::new()
    }
}
