use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::context_turn::{Action, ContextTurn};
use deployment::Deployment;
use serde::Deserialize;
use serde_json::Value;
use services::services::{
    context_assembler::{ChatMessage, ContextAssembler},
    conversation::{ActionRequest, DEFAULT_CONTEXT_DEPTH},
};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ContextQuery {
    pub action: Action,
    pub depth: Option<i64>,
}

/// Runs one LLM action and returns the upstream payload as-is.
pub async fn run_action(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<ActionRequest>,
) -> Result<ResponseJson<Value>, ApiError> {
    let project_id = payload.project_id;
    let action = payload.action;
    let result = deployment.conversation().run(payload).await?;

    tracing::info!(
        "LLM action '{}' for project {} finished: {:?}",
        action,
        project_id,
        result.outcome.derived
    );
    Ok(ResponseJson(result.payload))
}

/// System prompt and history the next `action` request would carry.
pub async fn preview_context(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<i64>,
    Query(query): Query<ContextQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<ChatMessage>>>, ApiError> {
    let assembler = ContextAssembler::new(deployment.db().pool.clone(), deployment.prompts().clone());
    let messages = assembler
        .preview(project_id, query.action, query.depth.unwrap_or(DEFAULT_CONTEXT_DEPTH))
        .await?;
    Ok(ResponseJson(ApiResponse::success(messages)))
}

pub async fn get_history(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Vec<ContextTurn>>>, ApiError> {
    let turns = ContextTurn::find_by_project(&deployment.db().pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(turns)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    Router::new()
        .route("/action", post(run_action))
        .route("/context/{project_id}", get(preview_context))
        .route("/history/{project_id}", get(get_history))
}
