use std::{sync::Arc, time::Duration};

use dashmap::DashMap;
use db::models::{context_turn::Action, project::Project};
use serde::Deserialize;
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use tokio::sync::{Mutex, OwnedMutexGuard};
use ts_rs::TS;

use super::{
    config::LlmConfig,
    context_assembler::{ChatMessage, ContextAssembler},
    llm_gateway::{CompletionOptions, CompletionRequest, GatewayError, LlmGateway},
    prompt_catalog::PromptCatalog,
    response_interpreter::{InterpretOutcome, ResponseInterpreter},
};

pub const DEFAULT_CONTEXT_DEPTH: i64 = 5;

#[derive(Debug, Error)]
pub enum ConversationError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error(transparent)]
    Gateway(#[from] GatewayError),
    #[error("Project {0} not found")]
    ProjectNotFound(i64),
    #[error("No model URI in request or configuration")]
    MissingModelUri,
}

fn default_context_depth() -> i64 {
    DEFAULT_CONTEXT_DEPTH
}

/// Inbound action contract of `POST /api/llm/action`.
#[derive(Debug, Clone, Deserialize, TS)]
pub struct ActionRequest {
    pub project_id: i64,
    pub action: Action,
    #[serde(default = "default_context_depth")]
    pub context_depth: i64,
    /// Seconds; the configured timeout applies when absent.
    #[serde(default)]
    pub timeout: Option<u64>,
    #[serde(default)]
    pub iam_token: Option<String>,
    #[serde(default)]
    pub model_uri: Option<String>,
    #[serde(default)]
    pub problem: Option<String>,
    /// Caller turns sent after the history; each `user` text gets the
    /// action's instruction in front. Empty means the instruction alone.
    #[serde(default)]
    pub messages: Vec<ChatMessage>,
    #[serde(default)]
    pub options: Option<CompletionOptions>,
}

#[derive(Debug, Clone)]
pub struct ActionResult {
    /// Upstream payload, returned to the caller untouched.
    pub payload: Value,
    pub outcome: InterpretOutcome,
}

/// One async mutex per project. LLM actions on the same project run one at
/// a time; other projects are unaffected. An entry lives only while some
/// caller holds or awaits it.
#[derive(Debug, Clone, Default)]
pub struct ProjectLocks {
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
}

/// Held for the duration of one action. Dropping it releases the project
/// and removes the map entry once nobody else is waiting on it.
pub struct ProjectGuard {
    project_id: i64,
    locks: Arc<DashMap<i64, Arc<Mutex<()>>>>,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for ProjectGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks
            .remove_if(&self.project_id, |_, lock| Arc::strong_count(lock) == 1);
    }
}

impl ProjectLocks {
    pub async fn lock(&self, project_id: i64) -> ProjectGuard {
        let lock = self
            .locks
            .entry(project_id)
            .or_insert_with(|| Arc::new(Mutex::new(())))
            .clone();
        ProjectGuard {
            project_id,
            locks: self.locks.clone(),
            guard: Some(lock.lock_owned().await),
        }
    }

    pub fn forget(&self, project_id: i64) {
        self.locks.remove(&project_id);
    }

    /// Number of projects currently locked or awaited.
    pub fn len(&self) -> usize {
        self.locks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.locks.is_empty()
    }
}

#[derive(Clone)]
pub struct ConversationService {
    pool: SqlitePool,
    assembler: ContextAssembler,
    interpreter: ResponseInterpreter,
    gateway: Arc<dyn LlmGateway>,
    config: LlmConfig,
    locks: ProjectLocks,
}

impl ConversationService {
    pub fn new(
        pool: SqlitePool,
        catalog: Arc<PromptCatalog>,
        gateway: Arc<dyn LlmGateway>,
        config: LlmConfig,
        locks: ProjectLocks,
    ) -> Self {
        Self {
            assembler: ContextAssembler::new(pool.clone(), catalog),
            interpreter: ResponseInterpreter::new(pool.clone()),
            pool,
            gateway,
            config,
            locks,
        }
    }

    fn headers(&self, request: &ActionRequest) -> Vec<(String, String)> {
        request
            .iam_token
            .as_deref()
            .or(self.config.api_key.as_deref())
            .map(|token| vec![("Authorization".to_string(), format!("Bearer {token}"))])
            .unwrap_or_default()
    }

    fn completion_options(&self, request: &ActionRequest) -> CompletionOptions {
        request.options.clone().unwrap_or(CompletionOptions {
            stream: false,
            temperature: self.config.temperature,
            max_tokens: self.config.max_tokens,
        })
    }

    /// Assemble, send, interpret. The user turn is committed before the
    /// upstream call; a gateway failure leaves it in place and writes
    /// nothing else.
    pub async fn run(&self, request: ActionRequest) -> Result<ActionResult, ConversationError> {
        let model_uri = request
            .model_uri
            .clone()
            .or_else(|| self.config.model_uri.clone())
            .ok_or(ConversationError::MissingModelUri)?;

        let project = Project::find_by_id(&self.pool, request.project_id)
            .await?
            .ok_or(ConversationError::ProjectNotFound(request.project_id))?;

        let _guard = self.locks.lock(project.id).await;

        let context = self
            .assembler
            .assemble(
                &project,
                request.action,
                request.context_depth,
                request.problem.as_deref(),
                &request.messages,
            )
            .await?;

        let body = CompletionRequest {
            model_uri,
            completion_options: self.completion_options(&request),
            messages: context.messages,
        };
        let body = serde_json::to_value(&body).map_err(|e| GatewayError::Request(e.to_string()))?;
        let timeout = Duration::from_secs(request.timeout.unwrap_or(self.config.timeout_secs));

        tracing::info!(
            "Sending '{}' for project {} ({} messages)",
            request.action,
            project.id,
            body["messages"].as_array().map(Vec::len).unwrap_or(0)
        );
        let payload = self
            .gateway
            .post(&self.config.endpoint, &self.headers(&request), &body, timeout)
            .await?;

        let outcome = self
            .interpreter
            .interpret(project.id, request.action, &payload)
            .await?;

        Ok(ActionResult { payload, outcome })
    }
}
