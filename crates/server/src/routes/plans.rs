use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::plan::{Plan, PlanSort};
use deployment::Deployment;
use serde::Deserialize;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct PlanQuery {
    #[serde(default)]
    pub sort: PlanSort,
    pub limit: Option<i64>,
}

pub async fn get_plans(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<i64>,
    Query(query): Query<PlanQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Plan>>>, ApiError> {
    let plans = Plan::find_by_project(&deployment.db().pool, project_id, query.sort, query.limit).await?;
    Ok(ResponseJson(ApiResponse::success(plans)))
}

pub async fn get_latest_plan(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Plan>>, ApiError> {
    let plan = Plan::find_latest(&deployment.db().pool, project_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Project {} has no plans", project_id)))?;
    Ok(ResponseJson(ApiResponse::success(plan)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/{project_id}", get(get_plans))
        .route("/{project_id}/latest", get(get_latest_plan));

    Router::new().nest("/plans", inner)
}
