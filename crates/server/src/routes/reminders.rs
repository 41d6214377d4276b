use axum::{
    Json, Router,
    extract::{Path, Query, State},
    response::Json as ResponseJson,
    routing::get,
};
use db::models::reminder::{Reminder, UpdateReminder};
use deployment::Deployment;
use serde::Deserialize;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError};

#[derive(Debug, Deserialize)]
pub struct ReminderQuery {
    /// Comma-separated project ids.
    pub project_ids: Option<String>,
}

fn not_found(task_id: i64) -> ApiError {
    ApiError::NotFound(format!("No reminder for task {}", task_id))
}

pub async fn get_reminders(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<ReminderQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Reminder>>>, ApiError> {
    let pool = &deployment.db().pool;
    let reminders = match query.project_ids.as_deref() {
        Some(raw) => {
            let ids = raw
                .split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(|s| {
                    s.parse::<i64>()
                        .map_err(|_| ApiError::BadRequest(format!("Invalid project id '{}'", s)))
                })
                .collect::<Result<Vec<_>, _>>()?;
            Reminder::find_by_project_ids(pool, &ids).await?
        }
        None => Reminder::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(reminders)))
}

pub async fn get_reminder(
    State(deployment): State<DeploymentImpl>,
    Path(task_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<Reminder>>, ApiError> {
    let reminder = Reminder::find_by_task_id(&deployment.db().pool, task_id)
        .await?
        .ok_or_else(|| not_found(task_id))?;
    Ok(ResponseJson(ApiResponse::success(reminder)))
}

pub async fn update_reminder(
    State(deployment): State<DeploymentImpl>,
    Path(task_id): Path<i64>,
    Json(payload): Json<UpdateReminder>,
) -> Result<ResponseJson<ApiResponse<Reminder>>, ApiError> {
    let reminder = Reminder::update(&deployment.db().pool, task_id, &payload)
        .await?
        .ok_or_else(|| not_found(task_id))?;
    Ok(ResponseJson(ApiResponse::success(reminder)))
}

pub async fn delete_reminder(
    State(deployment): State<DeploymentImpl>,
    Path(task_id): Path<i64>,
) -> Result<ResponseJson<ApiResponse<i64>>, ApiError> {
    if Reminder::delete_by_task_id(&deployment.db().pool, task_id).await? == 0 {
        return Err(not_found(task_id));
    }
    Ok(ResponseJson(ApiResponse::success(task_id)))
}

pub fn router(_deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let inner = Router::new()
        .route("/", get(get_reminders))
        .route(
            "/{task_id}",
            get(get_reminder).put(update_reminder).delete(delete_reminder),
        );

    Router::new().nest("/reminders", inner)
}
