use axum::{
    Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use deployment::Deployment;
use serde::Deserialize;
use services::services::report::{DeveloperReport, ProjectReport};
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct DeveloperReportQuery {
    pub project_id: i64,
}

pub async fn get_developer_report(
    State(deployment): State<DeploymentImpl>,
    Path(user_id): Path<i64>,
    Query(query): Query<DeveloperReportQuery>,
) -> Result<ResponseJson<ApiResponse<DeveloperReport>>, ApiError> {
    let report = deployment
        .reports()
        .developer_report(user_id, query.project_id)
        .await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub async fn get_project_report(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<ProjectReport>>, ApiError> {
    let report = deployment.reports().project_report(project_id).await?;
    Ok(ResponseJson(ApiResponse::success(report)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/developer/{user_id}", get(get_developer_report))
        .route("/project/{project_id}", get(get_project_report));

    Router::new().nest("/reports", inner)
}
