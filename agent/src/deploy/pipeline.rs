//! Deploy pipeline
//!
//! Sequences lock acquisition, source synchronization, build, restart,
//! health verification, and rollback. Each attempt runs as one sequential
//! task; concurrency only arises from webhook deliveries, which are
//! serialized by the lock manager (fail-fast, no queuing).

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::Serialize;
use tokio::sync::RwLock;
use tracing::{error, info, warn};

use crate::backend::descriptor::BackendDescriptor;
use crate::backend::exec::Supervisor;
use crate::deploy::events::EventLog;
use crate::deploy::fsm::{PipelineEvent, PipelineFsm, PipelineState};
use crate::deploy::git::Vcs;
use crate::deploy::health::{HealthProber, HealthVerdict};
use crate::deploy::lock::{LockManager, LockToken};
use crate::deploy::rollback::RollbackController;
use crate::errors::DeployError;
use crate::storage::config::PipelineConfig;

/// Pipeline retry and probe settings
#[derive(Debug, Clone)]
pub struct PipelineSettings {
    /// Fetch attempts before the sync stage gives up
    pub fetch_attempts: u32,

    /// Fixed delay between fetch attempts
    pub fetch_delay: Duration,

    /// Health probe rounds
    pub probe_attempts: u32,

    /// Fixed delay between probe rounds
    pub probe_interval: Duration,
}

impl Default for PipelineSettings {
    fn default() -> Self {
        Self {
            fetch_attempts: 3,
            fetch_delay: Duration::from_secs(5),
            probe_attempts: 10,
            probe_interval: Duration::from_secs(2),
        }
    }
}

impl PipelineSettings {
    pub fn from_config(config: &PipelineConfig) -> Self {
        // A configured zero would skip the stage entirely; floor at one
        Self {
            fetch_attempts: config.fetch_attempts.max(1),
            fetch_delay: Duration::from_secs(config.fetch_delay_secs),
            probe_attempts: config.probe_attempts.max(1),
            probe_interval: Duration::from_secs(config.probe_interval_secs),
        }
    }
}

/// Ephemeral record of one pipeline run.
///
/// Discarded when the next attempt starts; the log trail is the durable
/// record.
#[derive(Debug, Clone, Serialize)]
pub struct DeploymentAttempt {
    pub id: String,
    pub triggered_at: DateTime<Utc>,
    pub starting_revision: Option<String>,
    pub target_revision: Option<String>,
    pub rollback_revision: Option<String>,
    pub state: PipelineState,
    pub degraded: bool,
    pub error: Option<String>,
}

impl DeploymentAttempt {
    fn new() -> Self {
        Self {
            id: uuid::Uuid::new_v4().to_string(),
            triggered_at: Utc::now(),
            starting_revision: None,
            target_revision: None,
            rollback_revision: None,
            state: PipelineState::Idle,
            degraded: false,
            error: None,
        }
    }
}

/// The deployment orchestration pipeline
pub struct DeployPipeline {
    descriptor: BackendDescriptor,
    workdir: PathBuf,
    branch: String,
    base_url: String,
    settings: PipelineSettings,
    lock: LockManager,
    vcs: Arc<dyn Vcs>,
    supervisor: Arc<dyn Supervisor>,
    prober: HealthProber,
    rollback: RollbackController,
    events: Arc<EventLog>,
    last_attempt: RwLock<Option<DeploymentAttempt>>,
}

impl DeployPipeline {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        descriptor: BackendDescriptor,
        workdir: PathBuf,
        branch: String,
        base_url: String,
        settings: PipelineSettings,
        lock: LockManager,
        vcs: Arc<dyn Vcs>,
        supervisor: Arc<dyn Supervisor>,
        events: Arc<EventLog>,
    ) -> Self {
        let rollback = RollbackController::new(vcs.clone(), supervisor.clone(), events.clone());
        Self {
            descriptor,
            workdir,
            branch,
            base_url,
            settings,
            lock,
            vcs,
            supervisor,
            prober: HealthProber::new(),
            rollback,
            events,
            last_attempt: RwLock::new(None),
        }
    }

    /// Most recent attempt, for the status endpoint
    pub async fn last_attempt(&self) -> Option<DeploymentAttempt> {
        self.last_attempt.read().await.clone()
    }

    /// Trigger a deploy: acquire the lock synchronously (fail-fast on
    /// contention) and run the pipeline in the background. The caller only
    /// learns whether the deploy was triggered; the outcome goes to the logs.
    pub async fn trigger(self: &Arc<Self>) -> Result<(), DeployError> {
        let token = self.lock.acquire().await?;
        let pipeline = self.clone();
        tokio::spawn(async move {
            pipeline.run_with_token(token).await;
        });
        Ok(())
    }

    /// Run one deploy attempt to a terminal state, awaiting completion.
    pub async fn run_once(&self) -> Result<PipelineState, DeployError> {
        let token = self.lock.acquire().await?;
        Ok(self.run_with_token(token).await)
    }

    async fn run_with_token(&self, token: LockToken) -> PipelineState {
        let mut fsm = PipelineFsm::new();
        let mut attempt = DeploymentAttempt::new();
        info!("Deploy attempt {} starting", attempt.id);

        self.step(
            &mut fsm,
            &mut attempt,
            PipelineEvent::LockGranted,
            &format!("deploy lock acquired by pid {}", token.pid),
        )
        .await;

        self.run_stages(&mut fsm, &mut attempt).await;

        let state = *fsm.state();
        match state {
            PipelineState::Succeeded if attempt.degraded => {
                warn!("Deploy attempt {} succeeded with inconclusive health probe", attempt.id)
            }
            PipelineState::Succeeded => info!("Deploy attempt {} succeeded", attempt.id),
            PipelineState::RolledBack => {
                warn!("Deploy attempt {} rolled back: {:?}", attempt.id, attempt.error)
            }
            _ => error!("Deploy attempt {} failed: {:?}", attempt.id, attempt.error),
        }

        // Guaranteed release on every exit path, terminal state regardless
        self.lock.release(&token).await;
        self.events.append(state.as_str(), "deploy lock released").await;
        state
    }

    async fn run_stages(&self, fsm: &mut PipelineFsm, attempt: &mut DeploymentAttempt) {
        self.step(fsm, attempt, PipelineEvent::SyncStarted, "synchronizing working tree")
            .await;
        if let Err(e) = self.sync_stage(attempt).await {
            self.fail_stage(fsm, attempt, e).await;
            return;
        }

        self.step(
            fsm,
            attempt,
            PipelineEvent::BuildStarted,
            "installing dependencies and building",
        )
        .await;
        if let Err(e) = self.supervisor.build(&self.descriptor, &self.workdir).await {
            self.fail_stage(fsm, attempt, e).await;
            return;
        }

        self.step(fsm, attempt, PipelineEvent::RestartStarted, "restarting service")
            .await;
        if let Err(e) = self.supervisor.restart(&self.descriptor).await {
            self.fail_stage(fsm, attempt, e).await;
            return;
        }

        self.step(
            fsm,
            attempt,
            PipelineEvent::HealthCheckStarted,
            &format!("probing {} for service health", self.base_url),
        )
        .await;
        let result = self
            .prober
            .probe(
                &self.base_url,
                self.settings.probe_attempts,
                self.settings.probe_interval,
                tokio::time::sleep,
            )
            .await;

        match result.verdict {
            HealthVerdict::Healthy => {
                self.step(fsm, attempt, PipelineEvent::Healthy, "service healthy").await;
            }
            verdict => {
                warn!(
                    "Health probe {} after {} endpoint attempts; recording degraded success",
                    verdict.as_str(),
                    result.attempts.len()
                );
                self.step(
                    fsm,
                    attempt,
                    PipelineEvent::Degraded,
                    &format!(
                        "health probe {} after {} endpoint attempts; degraded success",
                        verdict.as_str(),
                        result.attempts.len()
                    ),
                )
                .await;
            }
        }
    }

    /// Stash, record the rollback revision, fetch with a bounded retry
    /// budget, and hard-reset to the remote head of the deploy branch.
    async fn sync_stage(&self, attempt: &mut DeploymentAttempt) -> Result<(), DeployError> {
        self.vcs.stash_local_changes().await?;

        let starting = self.vcs.current_revision().await?;
        attempt.starting_revision = Some(starting.clone());
        attempt.rollback_revision = Some(starting);

        let mut last_err: Option<DeployError> = None;
        for n in 1..=self.settings.fetch_attempts {
            match self.vcs.fetch().await {
                Ok(()) => {
                    last_err = None;
                    break;
                }
                Err(e) => {
                    warn!("Fetch attempt {}/{} failed: {}", n, self.settings.fetch_attempts, e);
                    self.events
                        .append(
                            "syncing",
                            &format!(
                                "fetch attempt {}/{} failed: {}",
                                n, self.settings.fetch_attempts, e
                            ),
                        )
                        .await;
                    last_err = Some(e);
                    if n < self.settings.fetch_attempts {
                        tokio::time::sleep(self.settings.fetch_delay).await;
                    }
                }
            }
        }
        if let Some(e) = last_err {
            return Err(DeployError::FetchFailure {
                attempts: self.settings.fetch_attempts,
                reason: e.to_string(),
            });
        }

        let target = self.vcs.remote_head(&self.branch).await?;
        attempt.target_revision = Some(target.clone());
        self.vcs.hard_reset(&target).await?;
        Ok(())
    }

    /// Hand a failed stage to the rollback controller. Rollback failures end
    /// the attempt in `Failed` and are never retried automatically.
    async fn fail_stage(
        &self,
        fsm: &mut PipelineFsm,
        attempt: &mut DeploymentAttempt,
        err: DeployError,
    ) {
        error!("Deploy stage {} failed: {}", fsm.state().as_str(), err);
        self.events.append(fsm.state().as_str(), &err.to_string()).await;

        let Some(rollback_rev) = attempt.rollback_revision.clone() else {
            self.step(
                fsm,
                attempt,
                PipelineEvent::RollbackFailed(format!(
                    "{} (no rollback revision recorded)",
                    err
                )),
                "no rollback revision recorded; manual intervention required",
            )
            .await;
            return;
        };

        match self
            .rollback
            .rollback(&rollback_rev, &self.descriptor, &self.workdir)
            .await
        {
            Ok(()) => {
                self.step(
                    fsm,
                    attempt,
                    PipelineEvent::RollbackSucceeded(err.to_string()),
                    &format!("rolled back to {}", rollback_rev),
                )
                .await;
            }
            Err(rollback_err) => {
                self.step(
                    fsm,
                    attempt,
                    PipelineEvent::RollbackFailed(format!("{}; {}", err, rollback_err)),
                    &rollback_err.to_string(),
                )
                .await;
            }
        }
    }

    /// Apply a transition, log it to the event sink, and publish the updated
    /// attempt for the status endpoint.
    async fn step(
        &self,
        fsm: &mut PipelineFsm,
        attempt: &mut DeploymentAttempt,
        event: PipelineEvent,
        message: &str,
    ) {
        if let Err(e) = fsm.process(event) {
            // Transitions issued by the driver are valid by construction
            error!("Pipeline transition error: {}", e);
        }
        self.events.append(fsm.state().as_str(), message).await;

        attempt.state = *fsm.state();
        attempt.degraded = fsm.degraded();
        attempt.error = fsm.error().map(String::from);
        *self.last_attempt.write().await = Some(attempt.clone());
    }
}
