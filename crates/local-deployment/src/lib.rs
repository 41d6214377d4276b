use std::{path::PathBuf, sync::Arc};

use async_trait::async_trait;
use db::DBService;
use deployment::{Deployment, DeploymentError};
use services::services::{
    config::Config,
    conversation::ProjectLocks,
    llm_gateway::{HttpLlmGateway, LlmGateway},
    prompt_catalog::{PromptCatalog, seed_from_file},
};
use utils::assets::prompts_path;

#[derive(Clone)]
pub struct LocalDeployment {
    config: Arc<Config>,
    db: DBService,
    prompts: Arc<PromptCatalog>,
    gateway: Arc<dyn LlmGateway>,
    project_locks: ProjectLocks,
}

impl LocalDeployment {
    /// Assembles a deployment from ready-made parts.
    pub fn from_parts(
        config: Config,
        db: DBService,
        prompts: PromptCatalog,
        gateway: Arc<dyn LlmGateway>,
    ) -> Self {
        Self {
            config: Arc::new(config),
            db,
            prompts: Arc::new(prompts),
            gateway,
            project_locks: ProjectLocks::default(),
        }
    }

    /// Configured seed file, else `prompts.json` in the asset directory
    /// when it exists.
    fn prompt_seed_file(config: &Config) -> Option<PathBuf> {
        config
            .prompts_file
            .clone()
            .or_else(|| Some(prompts_path()).filter(|p| p.exists()))
    }
}

#[async_trait]
impl Deployment for LocalDeployment {
    async fn new() -> Result<Self, DeploymentError> {
        let config = Config::from_env()?;

        let db = match &config.database_url {
            Some(url) => DBService::new_with_url(url).await?,
            None => DBService::new().await?,
        };

        if let Some(path) = Self::prompt_seed_file(&config) {
            seed_from_file(&db.pool, &path).await?;
        }
        let prompts = PromptCatalog::load(&db.pool).await?;
        if prompts.system().is_none() {
            tracing::warn!("Prompt catalog has no 'system' template");
        }

        Ok(Self::from_parts(
            config,
            db,
            prompts,
            Arc::new(HttpLlmGateway::new()),
        ))
    }

    fn config(&self) -> &Arc<Config> {
        &self.config
    }

    fn db(&self) -> &DBService {
        &self.db
    }

    fn prompts(&self) -> &Arc<PromptCatalog> {
        &self.prompts
    }

    fn gateway(&self) -> &Arc<dyn LlmGateway> {
        &self.gateway
    }

    fn project_locks(&self) -> &ProjectLocks {
        &self.project_locks
    }
}
