//! End-to-end pipeline scenarios with mocked VCS and supervisor

use std::path::Path;
use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use axum::routing::get;
use axum::Router;

use dockhand::backend::descriptor::{BackendDescriptor, BackendVariant};
use dockhand::backend::exec::Supervisor;
use dockhand::backend::registry::descriptor_for;
use dockhand::deploy::events::EventLog;
use dockhand::deploy::fsm::PipelineState;
use dockhand::deploy::git::Vcs;
use dockhand::deploy::lock::LockManager;
use dockhand::deploy::pipeline::{DeployPipeline, PipelineSettings};
use dockhand::errors::DeployError;
use dockhand::filesys::file::File;
use dockhand::storage::config::DeployConfig;

const OLD_REV: &str = "aaaa1111";
const NEW_REV: &str = "bbbb2222";

#[derive(Default)]
struct CallLog(Mutex<Vec<String>>);

impl CallLog {
    fn push(&self, call: impl Into<String>) {
        self.0.lock().unwrap().push(call.into());
    }

    fn calls(&self) -> Vec<String> {
        self.0.lock().unwrap().clone()
    }

    fn count(&self, call: &str) -> usize {
        self.calls().iter().filter(|c| c.as_str() == call).count()
    }
}

struct MockVcs {
    log: Arc<CallLog>,
    fetch_failures: AtomicU32,
    local_rev: Mutex<String>,
}

impl MockVcs {
    fn new(log: Arc<CallLog>, fetch_failures: u32) -> Self {
        Self {
            log,
            fetch_failures: AtomicU32::new(fetch_failures),
            local_rev: Mutex::new(OLD_REV.to_string()),
        }
    }

    fn local_rev(&self) -> String {
        self.local_rev.lock().unwrap().clone()
    }
}

#[async_trait]
impl Vcs for MockVcs {
    async fn fetch(&self) -> Result<(), DeployError> {
        self.log.push("fetch");
        if self.fetch_failures.load(Ordering::SeqCst) > 0 {
            self.fetch_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(DeployError::SyncFailure("network unreachable".to_string()));
        }
        Ok(())
    }

    async fn current_revision(&self) -> Result<String, DeployError> {
        self.log.push("current_revision");
        Ok(self.local_rev())
    }

    async fn remote_head(&self, _branch: &str) -> Result<String, DeployError> {
        self.log.push("remote_head");
        Ok(NEW_REV.to_string())
    }

    async fn hard_reset(&self, revision: &str) -> Result<(), DeployError> {
        self.log.push(format!("reset:{}", revision));
        *self.local_rev.lock().unwrap() = revision.to_string();
        Ok(())
    }

    async fn stash_local_changes(&self) -> Result<(), DeployError> {
        self.log.push("stash");
        Ok(())
    }
}

struct MockSupervisor {
    log: Arc<CallLog>,
    build_failures: AtomicU32,
    restart_failures: AtomicU32,
}

impl MockSupervisor {
    fn new(log: Arc<CallLog>, build_failures: u32, restart_failures: u32) -> Self {
        Self {
            log,
            build_failures: AtomicU32::new(build_failures),
            restart_failures: AtomicU32::new(restart_failures),
        }
    }
}

#[async_trait]
impl Supervisor for MockSupervisor {
    async fn build(
        &self,
        _descriptor: &BackendDescriptor,
        _workdir: &Path,
    ) -> Result<(), DeployError> {
        self.log.push("build");
        if self.build_failures.load(Ordering::SeqCst) > 0 {
            self.build_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(DeployError::BuildFailure("compiler exploded".to_string()));
        }
        Ok(())
    }

    async fn restart(&self, _descriptor: &BackendDescriptor) -> Result<(), DeployError> {
        self.log.push("restart");
        if self.restart_failures.load(Ordering::SeqCst) > 0 {
            self.restart_failures.fetch_sub(1, Ordering::SeqCst);
            return Err(DeployError::RestartFailure("unit kept crashing".to_string()));
        }
        Ok(())
    }

    async fn stop(&self, _descriptor: &BackendDescriptor) -> Result<(), DeployError> {
        self.log.push("stop");
        Ok(())
    }
}

async fn healthy_base_url() -> String {
    let app = Router::new().route("/health", get(|| async { "ok" }));
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, app).await.unwrap();
    });
    format!("http://{}", addr)
}

async fn dead_base_url() -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    drop(listener);
    format!("http://{}", addr)
}

fn make_pipeline(
    dir: &Path,
    base_url: String,
    vcs: Arc<MockVcs>,
    supervisor: Arc<MockSupervisor>,
) -> DeployPipeline {
    let config = DeployConfig {
        app_name: "shop".to_string(),
        workdir: dir.to_path_buf(),
        port: 3000,
        backend: "interpreted".to_string(),
        branch: "main".to_string(),
        webhook_secret: "s3cret".to_string(),
        runtime_version: None,
        log_level: Default::default(),
        listener: Default::default(),
        pipeline: Default::default(),
    };
    let descriptor = descriptor_for(BackendVariant::Interpreted, &config);

    let settings = PipelineSettings {
        fetch_attempts: 3,
        fetch_delay: Duration::from_millis(1),
        probe_attempts: 2,
        probe_interval: Duration::from_millis(100),
    };

    DeployPipeline::new(
        descriptor,
        dir.to_path_buf(),
        "main".to_string(),
        base_url,
        settings,
        LockManager::new(File::new(dir.join("deploy.lock"))),
        vcs,
        supervisor,
        Arc::new(EventLog::new(File::new(dir.join("deploy.log")))),
    )
}

#[tokio::test]
async fn test_successful_deploy() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let vcs = Arc::new(MockVcs::new(log.clone(), 0));
    let supervisor = Arc::new(MockSupervisor::new(log.clone(), 0, 0));

    let base_url = healthy_base_url().await;
    let pipeline = make_pipeline(dir.path(), base_url, vcs.clone(), supervisor);

    let state = pipeline.run_once().await.unwrap();
    assert_eq!(state, PipelineState::Succeeded);

    let attempt = pipeline.last_attempt().await.unwrap();
    assert_eq!(attempt.state, PipelineState::Succeeded);
    assert!(!attempt.degraded);
    assert!(attempt.error.is_none());
    assert_eq!(attempt.starting_revision.as_deref(), Some(OLD_REV));
    assert_eq!(attempt.target_revision.as_deref(), Some(NEW_REV));

    assert_eq!(
        log.calls(),
        vec![
            "stash",
            "current_revision",
            "fetch",
            "remote_head",
            &format!("reset:{}", NEW_REV),
            "build",
            "restart",
        ]
    );
    assert_eq!(vcs.local_rev(), NEW_REV);

    let events = File::new(dir.path().join("deploy.log"))
        .read_string()
        .await
        .unwrap();
    assert!(events.contains("[locked]"));
    assert!(events.contains("[succeeded]"));
}

#[tokio::test]
async fn test_unreachable_service_is_degraded_success() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let vcs = Arc::new(MockVcs::new(log.clone(), 0));
    let supervisor = Arc::new(MockSupervisor::new(log.clone(), 0, 0));

    let base_url = dead_base_url().await;
    let pipeline = make_pipeline(dir.path(), base_url, vcs, supervisor);

    let state = pipeline.run_once().await.unwrap();
    assert_eq!(state, PipelineState::Succeeded);

    let attempt = pipeline.last_attempt().await.unwrap();
    assert!(attempt.degraded);
}

#[tokio::test]
async fn test_build_failure_restores_previous_revision() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let vcs = Arc::new(MockVcs::new(log.clone(), 0));
    let supervisor = Arc::new(MockSupervisor::new(log.clone(), 1, 0));

    let base_url = dead_base_url().await;
    let pipeline = make_pipeline(dir.path(), base_url, vcs.clone(), supervisor);

    let state = pipeline.run_once().await.unwrap();
    assert_eq!(state, PipelineState::RolledBack);

    // Reset forward, then back to where we started
    let calls = log.calls();
    let forward = calls.iter().position(|c| c == &format!("reset:{}", NEW_REV));
    let back = calls.iter().position(|c| c == &format!("reset:{}", OLD_REV));
    assert!(forward.unwrap() < back.unwrap());
    assert_eq!(vcs.local_rev(), OLD_REV);

    // Rollback rebuilt and restarted the previous revision
    assert_eq!(log.count("build"), 2);
    assert_eq!(log.count("restart"), 1);

    let attempt = pipeline.last_attempt().await.unwrap();
    assert_eq!(attempt.state, PipelineState::RolledBack);
    assert!(attempt.error.unwrap().contains("compiler exploded"));
}

#[tokio::test]
async fn test_restart_failure_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let vcs = Arc::new(MockVcs::new(log.clone(), 0));
    let supervisor = Arc::new(MockSupervisor::new(log.clone(), 0, 1));

    let base_url = dead_base_url().await;
    let pipeline = make_pipeline(dir.path(), base_url, vcs.clone(), supervisor);

    let state = pipeline.run_once().await.unwrap();
    assert_eq!(state, PipelineState::RolledBack);
    assert_eq!(vcs.local_rev(), OLD_REV);
    // Failed restart at the new revision, successful one after rollback
    assert_eq!(log.count("restart"), 2);
}

#[tokio::test]
async fn test_failed_rollback_is_terminal_failure() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let vcs = Arc::new(MockVcs::new(log.clone(), 0));
    // Both the stage restart and the rollback restart fail
    let supervisor = Arc::new(MockSupervisor::new(log.clone(), 0, 2));

    let base_url = dead_base_url().await;
    let pipeline = make_pipeline(dir.path(), base_url, vcs, supervisor);

    let state = pipeline.run_once().await.unwrap();
    assert_eq!(state, PipelineState::Failed);

    let attempt = pipeline.last_attempt().await.unwrap();
    let error = attempt.error.unwrap();
    assert!(error.contains("restart failed"));
    assert!(error.contains("manual intervention required"));
}

#[tokio::test]
async fn test_fetch_exhaustion_rolls_back() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let vcs = Arc::new(MockVcs::new(log.clone(), 99));
    let supervisor = Arc::new(MockSupervisor::new(log.clone(), 0, 0));

    let base_url = dead_base_url().await;
    let pipeline = make_pipeline(dir.path(), base_url, vcs, supervisor);

    let state = pipeline.run_once().await.unwrap();
    assert_eq!(state, PipelineState::RolledBack);
    assert_eq!(log.count("fetch"), 3);

    let attempt = pipeline.last_attempt().await.unwrap();
    assert!(attempt.error.unwrap().contains("after 3 attempts"));
}

#[tokio::test]
async fn test_transient_fetch_failure_recovers() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let vcs = Arc::new(MockVcs::new(log.clone(), 1));
    let supervisor = Arc::new(MockSupervisor::new(log.clone(), 0, 0));

    let base_url = healthy_base_url().await;
    let pipeline = make_pipeline(dir.path(), base_url, vcs, supervisor);

    let state = pipeline.run_once().await.unwrap();
    assert_eq!(state, PipelineState::Succeeded);
    assert_eq!(log.count("fetch"), 2);
}

#[tokio::test]
async fn test_lock_contention_fails_fast_without_side_effects() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let vcs = Arc::new(MockVcs::new(log.clone(), 0));
    let supervisor = Arc::new(MockSupervisor::new(log.clone(), 0, 0));

    // Hold the lock through a second manager on the same file
    let holder = LockManager::new(File::new(dir.path().join("deploy.lock")));
    let _held = holder.acquire().await.unwrap();

    let base_url = dead_base_url().await;
    let pipeline = make_pipeline(dir.path(), base_url, vcs, supervisor);

    match pipeline.run_once().await {
        Err(DeployError::LockContention { owner_pid }) => {
            assert_eq!(owner_pid, std::process::id());
        }
        other => panic!("expected contention, got {:?}", other),
    }

    // Nothing was touched
    assert!(log.calls().is_empty());
    assert!(pipeline.last_attempt().await.is_none());
}

#[tokio::test]
async fn test_idempotent_reentry_succeeds_again() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let vcs = Arc::new(MockVcs::new(log.clone(), 0));
    let supervisor = Arc::new(MockSupervisor::new(log.clone(), 0, 0));

    let base_url = healthy_base_url().await;
    let pipeline = make_pipeline(dir.path(), base_url, vcs.clone(), supervisor);

    assert_eq!(pipeline.run_once().await.unwrap(), PipelineState::Succeeded);
    assert_eq!(vcs.local_rev(), NEW_REV);

    // Working tree is already at the target revision; deploying again is safe
    assert_eq!(pipeline.run_once().await.unwrap(), PipelineState::Succeeded);
    let attempt = pipeline.last_attempt().await.unwrap();
    assert_eq!(attempt.starting_revision.as_deref(), Some(NEW_REV));
    assert_eq!(attempt.target_revision.as_deref(), Some(NEW_REV));
    assert!(!attempt.degraded);
}

#[tokio::test]
async fn test_lock_released_after_rollback() {
    let dir = tempfile::tempdir().unwrap();
    let log = Arc::new(CallLog::default());
    let vcs = Arc::new(MockVcs::new(log.clone(), 0));
    let supervisor = Arc::new(MockSupervisor::new(log.clone(), 1, 0));

    let base_url = dead_base_url().await;
    let pipeline = make_pipeline(dir.path(), base_url, vcs, supervisor);

    let state = pipeline.run_once().await.unwrap();
    assert_eq!(state, PipelineState::RolledBack);

    // The lock must be free again after a terminal state
    let state = pipeline.run_once().await.unwrap();
    assert_eq!(state, PipelineState::Succeeded);
}
