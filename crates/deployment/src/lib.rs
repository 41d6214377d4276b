use std::sync::Arc;

use anyhow::Error as AnyhowError;
use async_trait::async_trait;
use db::DBService;
use services::services::{
    config::{Config, ConfigError},
    conversation::{ConversationService, ProjectLocks},
    llm_gateway::LlmGateway,
    prompt_catalog::{PromptCatalog, PromptSeedError},
    report::ReportService,
};
use sqlx::Error as SqlxError;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum DeploymentError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error(transparent)]
    Sqlx(#[from] SqlxError),
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error(transparent)]
    PromptSeed(#[from] PromptSeedError),
    #[error(transparent)]
    Other(#[from] AnyhowError),
}

/// Shared handles every request needs.
#[async_trait]
pub trait Deployment: Clone + Send + Sync + 'static {
    async fn new() -> Result<Self, DeploymentError>;

    fn config(&self) -> &Arc<Config>;

    fn db(&self) -> &DBService;

    fn prompts(&self) -> &Arc<PromptCatalog>;

    fn gateway(&self) -> &Arc<dyn LlmGateway>;

    fn project_locks(&self) -> &ProjectLocks;

    fn conversation(&self) -> ConversationService {
        ConversationService::new(
            self.db().pool.clone(),
            self.prompts().clone(),
            self.gateway().clone(),
            self.config().llm.clone(),
            self.project_locks().clone(),
        )
    }

    fn reports(&self) -> ReportService {
        ReportService::new(
            self.db().pool.clone(),
            self.config().report.running_offset_hours,
        )
    }
}
