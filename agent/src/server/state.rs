//! Server state

use std::sync::Arc;

use secrecy::SecretString;

use crate::deploy::pipeline::DeployPipeline;

/// Server state shared across handlers
pub struct ServerState {
    pub app_name: String,
    pub branch: String,
    pub webhook_secret: SecretString,
    pub pipeline: Arc<DeployPipeline>,
}

impl ServerState {
    pub fn new(
        app_name: String,
        branch: String,
        webhook_secret: SecretString,
        pipeline: Arc<DeployPipeline>,
    ) -> Self {
        Self {
            app_name,
            branch,
            webhook_secret,
            pipeline,
        }
    }
}
