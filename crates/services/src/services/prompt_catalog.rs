use std::{collections::HashMap, path::Path};

use db::models::{context_turn::Action, prompt::Prompt};
use sqlx::SqlitePool;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum PromptSeedError {
    #[error(transparent)]
    Io(#[from] std::io::Error),
    #[error("prompt file is not a JSON object of title to text: {0}")]
    Json(#[from] serde_json::Error),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
}

/// Read-only map of action to template text, loaded once at startup.
#[derive(Debug, Clone, Default)]
pub struct PromptCatalog {
    templates: HashMap<Action, String>,
}

impl PromptCatalog {
    pub fn from_templates<I, S>(templates: I) -> Self
    where
        I: IntoIterator<Item = (Action, S)>,
        S: Into<String>,
    {
        Self {
            templates: templates
                .into_iter()
                .map(|(action, text)| (action, text.into()))
                .collect(),
        }
    }

    pub async fn load(pool: &SqlitePool) -> Result<Self, sqlx::Error> {
        let mut templates = HashMap::new();
        for prompt in Prompt::find_all(pool).await? {
            match prompt.title.parse::<Action>() {
                Ok(action) => {
                    templates.insert(action, prompt.prompt);
                }
                Err(err) => tracing::debug!("Skipping prompt '{}': {}", prompt.title, err),
            }
        }
        tracing::info!("Loaded {} prompt templates", templates.len());
        Ok(Self { templates })
    }

    pub fn get(&self, action: Action) -> Option<&str> {
        self.templates.get(&action).map(String::as_str)
    }

    pub fn system(&self) -> Option<&str> {
        self.get(Action::System)
    }

    pub fn len(&self) -> usize {
        self.templates.len()
    }

    pub fn is_empty(&self) -> bool {
        self.templates.is_empty()
    }
}

/// Upserts every `{"title": "text"}` pair from a JSON file into the
/// prompts table. Returns the number of templates written.
pub async fn seed_from_file(pool: &SqlitePool, path: &Path) -> Result<usize, PromptSeedError> {
    let raw = tokio::fs::read_to_string(path).await?;
    let prompts: HashMap<String, String> = serde_json::from_str(&raw)?;
    for (title, text) in &prompts {
        Prompt::upsert(pool, title, text).await?;
    }
    tracing::info!("Seeded {} prompts from {}", prompts.len(), path.display());
    Ok(prompts.len())
}

#[cfg(test)]
mod tests {
    use db::DBService;

    use super::*;

    #[tokio::test]
    async fn load_keeps_known_actions_only() {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        Prompt::upsert(&pool, "system", "You are a project manager.").await.unwrap();
        Prompt::upsert(&pool, "re_plan", "Revise the plan.").await.unwrap();
        Prompt::upsert(&pool, "legacy", "unused").await.unwrap();

        let catalog = PromptCatalog::load(&pool).await.unwrap();
        assert_eq!(catalog.len(), 2);
        assert_eq!(catalog.system(), Some("You are a project manager."));
        assert_eq!(catalog.get(Action::RePlan), Some("Revise the plan."));
        assert_eq!(catalog.get(Action::Task), None);
    }

    #[tokio::test]
    async fn seeding_reads_json_object() {
        let pool = DBService::new_in_memory().await.unwrap().pool;
        let path = std::env::temp_dir().join(format!("prompts-{}.json", std::process::id()));
        tokio::fs::write(&path, r#"{"plan": "Draft a plan.", "task": "List tasks as JSON."}"#)
            .await
            .unwrap();

        let written = seed_from_file(&pool, &path).await.unwrap();
        let _ = tokio::fs::remove_file(&path).await;

        assert_eq!(written, 2);
        let catalog = PromptCatalog::load(&pool).await.unwrap();
        assert_eq!(catalog.get(Action::Plan), Some("Draft a plan."));
    }
}
