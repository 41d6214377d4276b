use axum::{
    Extension, Json, Router,
    extract::{Path, Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::get,
};
use db::models::{
    project::{CreateProject, Project, ProjectError, UpdateProject},
    team::Team,
};
use deployment::Deployment;
use serde::Deserialize;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_project_middleware};

#[derive(Debug, Deserialize)]
pub struct ProjectsQuery {
    pub owner_id: Option<i64>,
    /// Projects the user belongs to through a team membership.
    pub member_id: Option<i64>,
}

pub async fn get_projects(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<ProjectsQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Project>>>, ApiError> {
    let pool = &deployment.db().pool;
    let projects = match (query.owner_id, query.member_id) {
        (Some(owner_id), _) => Project::find_by_owner(pool, owner_id).await?,
        (None, Some(member_id)) => Project::find_by_member(pool, member_id).await?,
        (None, None) => Project::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(projects)))
}

pub async fn get_project(
    Extension(project): Extension<Project>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(project)))
}

/// The owner is enrolled as the project's admin.
pub async fn create_project(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    tracing::debug!("Creating project '{}' for owner {}", payload.title, payload.owner_id);
    let project = Project::create(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn update_project(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateProject>,
) -> Result<ResponseJson<ApiResponse<Project>>, ApiError> {
    let project = Project::update(&deployment.db().pool, project.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(project)))
}

pub async fn delete_project(
    Extension(project): Extension<Project>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<i64>>, ApiError> {
    if Project::delete(&deployment.db().pool, project.id).await? == 0 {
        return Err(ProjectError::ProjectNotFound.into());
    }
    deployment.project_locks().forget(project.id);
    tracing::info!("Deleted project {}", project.id);
    Ok(ResponseJson(ApiResponse::success(project.id)))
}

pub async fn delete_projects_by_owner(
    State(deployment): State<DeploymentImpl>,
    Path(owner_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Vec<i64>>>, ApiError> {
    let ids = Project::delete_by_owner(&deployment.db().pool, owner_id).await?;
    for id in &ids {
        deployment.project_locks().forget(*id);
    }
    Ok(ResponseJson(ApiResponse::success(ids)))
}

/// Ids of projects where the user is a plain member.
pub async fn get_non_admin_project_ids(
    State(deployment): State<DeploymentImpl>,
    Path(user_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Vec<i64>>>, ApiError> {
    let ids = Team::non_admin_project_ids(&deployment.db().pool, user_id).await?;
    Ok(ResponseJson(ApiResponse::success(ids)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let project_id_router = Router::new()
        .route("/", get(get_project).put(update_project).delete(delete_project))
        .layer(from_fn_with_state(deployment.clone(), load_project_middleware));

    let inner = Router::new()
        .route("/", get(get_projects).post(create_project))
        .route("/by-owner/{owner_id}", axum::routing::delete(delete_projects_by_owner))
        .route("/non-admin/{user_id}", get(get_non_admin_project_ids))
        .nest("/{id}", project_id_router);

    Router::new().nest("/projects", inner)
}
