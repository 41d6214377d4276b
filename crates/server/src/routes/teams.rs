use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::{
    team::{CreateTeam, Team, TeamError, TeamRole, UpdateTeam},
    user::User,
};
use deployment::Deployment;
use serde::Deserialize;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct TeamQuery {
    pub project_id: Option<i64>,
}

/// Identifies a membership by its `(user_id, project_id)` pair.
#[derive(Debug, Deserialize)]
pub struct MemberKey {
    pub user_id: i64,
    pub project_id: i64,
}

#[derive(Debug, Deserialize)]
pub struct UpdateMemberRole {
    pub user_id: i64,
    pub project_id: i64,
    pub role: TeamRole,
}

pub async fn get_teams(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<TeamQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Team>>>, ApiError> {
    let pool = &deployment.db().pool;
    let teams = match query.project_id {
        Some(project_id) => Team::find_by_project(pool, project_id).await?,
        None => Team::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(teams)))
}

pub async fn get_team(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = Team::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(TeamError::NotFound)?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub async fn get_project_members(
    State(deployment): State<DeploymentImpl>,
    Path(project_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let members = Team::members(&deployment.db().pool, project_id).await?;
    Ok(ResponseJson(ApiResponse::success(members)))
}

/// Role defaults to admin.
pub async fn create_team(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = Team::create(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

/// Adds a plain member whatever role the payload carries.
pub async fn add_member(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = Team::add_member(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub async fn update_team(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
    Json(payload): Json<UpdateTeam>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = Team::update_role(&deployment.db().pool, id, payload.role).await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub async fn update_member_role(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateMemberRole>,
) -> Result<ResponseJson<ApiResponse<Team>>, ApiError> {
    let team = Team::update_role_by_member(
        &deployment.db().pool,
        payload.user_id,
        payload.project_id,
        payload.role,
    )
    .await?;
    Ok(ResponseJson(ApiResponse::success(team)))
}

pub async fn delete_team(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<i64>>, ApiError> {
    let id = Team::delete(&deployment.db().pool, id).await?;
    Ok(ResponseJson(ApiResponse::success(id)))
}

pub async fn delete_member(
    State(deployment): State<DeploymentImpl>,
    Query(key): Query<MemberKey>,
) -> Result<ResponseJson<ApiResponse<i64>>, ApiError> {
    let id = Team::delete_by_member(&deployment.db().pool, key.user_id, key.project_id).await?;
    Ok(ResponseJson(ApiResponse::success(id)))
}

pub async fn is_admin(
    State(deployment): State<DeploymentImpl>,
    Query(key): Query<MemberKey>,
) -> Result<ResponseJson<ApiResponse<bool>>, ApiError> {
    let admin = Team::is_admin(&deployment.db().pool, key.user_id, key.project_id).await?;
    Ok(ResponseJson(ApiResponse::success(admin)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_teams).post(create_team))
        .route(
            "/members",
            post(add_member).put(update_member_role).delete(delete_member),
        )
        .route("/members/{project_id}", get(get_project_members))
        .route("/is-admin", get(is_admin))
        .route("/{id}", get(get_team).put(update_team).delete(delete_team));

    Router::new().nest("/teams", inner)
}
