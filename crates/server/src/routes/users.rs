use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::user::{CreateUser, User, UserError};
use deployment::Deployment;
use serde::Deserialize;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct UsersQuery {
    /// Comma-separated ids, e.g. `ids=1,2,3`.
    pub ids: Option<String>,
}

fn parse_ids(raw: &str) -> Result<Vec<i64>, ApiError> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| {
            s.parse::<i64>()
                .map_err(|_| ApiError::BadRequest(format!("Invalid id '{}'", s)))
        })
        .collect()
}

pub async fn get_users(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<UsersQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let pool = &deployment.db().pool;
    let users = match query.ids.as_deref() {
        Some(raw) => User::find_by_ids(pool, &parse_ids(raw)?).await?,
        None => User::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn get_user(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = User::find_by_id(&deployment.db().pool, id)
        .await?
        .ok_or(UserError::NotFound)?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

/// Creating an existing id returns the stored user unchanged.
pub async fn create_user(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateUser>,
) -> Result<ResponseJson<ApiResponse<User>>, ApiError> {
    let user = User::create(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(user)))
}

pub async fn create_users(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<Vec<CreateUser>>,
) -> Result<ResponseJson<ApiResponse<Vec<User>>>, ApiError> {
    let users = User::create_many(&deployment.db().pool, &payload).await?;
    tracing::info!("Created {} users", users.len());
    Ok(ResponseJson(ApiResponse::success(users)))
}

pub async fn delete_user(
    State(deployment): State<DeploymentImpl>,
    Path(id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<i64>>, ApiError> {
    if User::delete(&deployment.db().pool, id).await? == 0 {
        return Err(UserError::NotFound.into());
    }
    Ok(ResponseJson(ApiResponse::success(id)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_users).post(create_user))
        .route("/bulk", post(create_users))
        .route("/{id}", get(get_user).delete(delete_user));

    Router::new().nest("/users", inner)
}
