//! Application state management

use std::sync::Arc;

use tracing::info;

use crate::backend::descriptor::BackendVariant;
use crate::backend::exec::{ShellSupervisor, Supervisor};
use crate::backend::registry::descriptor_for;
use crate::deploy::events::EventLog;
use crate::deploy::git::{GitClient, Vcs};
use crate::deploy::lock::LockManager;
use crate::deploy::pipeline::{DeployPipeline, PipelineSettings};
use crate::errors::AgentError;
use crate::storage::config::DeployConfig;
use crate::storage::layout::StorageLayout;

/// Main application state
pub struct AppState {
    /// Persisted deploy configuration
    pub config: DeployConfig,

    /// The deploy pipeline
    pub pipeline: Arc<DeployPipeline>,
}

impl AppState {
    /// Initialize application state
    pub async fn init(config: DeployConfig, layout: &StorageLayout) -> Result<Self, AgentError> {
        info!("Initializing application state for {}...", config.app_name);

        layout.setup().await?;

        let variant: BackendVariant = config.backend.parse().map_err(AgentError::Deploy)?;
        let descriptor = descriptor_for(variant, &config);

        let events = Arc::new(EventLog::new(layout.deploy_log_file()));
        let lock = LockManager::new(layout.lock_file());
        let vcs: Arc<dyn Vcs> = Arc::new(GitClient::new(&config.workdir));
        let supervisor: Arc<dyn Supervisor> = Arc::new(ShellSupervisor::new());

        let pipeline = Arc::new(DeployPipeline::new(
            descriptor,
            config.workdir.clone(),
            config.branch.clone(),
            config.app_base_url(),
            PipelineSettings::from_config(&config.pipeline),
            lock,
            vcs,
            supervisor,
            events,
        ));

        Ok(Self { config, pipeline })
    }
}
