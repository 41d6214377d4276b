use axum::{
    Extension, Json, Router,
    extract::{Query, State},
    middleware::from_fn_with_state,
    response::Json as ResponseJson,
    routing::{get, post},
};
use db::models::task::{CreateTask, Task, TaskError, UpdateTask};
use deployment::Deployment;
use serde::Deserialize;
use utils::response::ApiResponse;

use crate::{DeploymentImpl, error::ApiError, middleware::load_task_middleware};

#[derive(Debug, Deserialize)]
pub struct TaskQuery {
    pub project_id: Option<i64>,
    pub user_id: Option<i64>,
}

pub async fn get_tasks(
    State(deployment): State<DeploymentImpl>,
    Query(query): Query<TaskQuery>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let pool = &deployment.db().pool;
    let tasks = match (query.project_id, query.user_id) {
        (Some(project_id), Some(user_id)) => {
            Task::find_by_user_and_project(pool, user_id, project_id).await?
        }
        (Some(project_id), None) => Task::find_by_project(pool, project_id).await?,
        (None, Some(_)) => {
            return Err(ApiError::BadRequest(
                "user_id filter requires project_id".to_string(),
            ));
        }
        (None, None) => Task::find_all(pool).await?,
    };
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn get_task(
    Extension(task): Extension<Task>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    Ok(ResponseJson(ApiResponse::success(task)))
}

/// Also schedules the task's reminder.
pub async fn create_task(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<CreateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    tracing::debug!(
        "Creating task '{}' in project {}",
        payload.title,
        payload.project_id
    );
    let task = Task::create(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn create_tasks(
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<Vec<CreateTask>>,
) -> Result<ResponseJson<ApiResponse<Vec<Task>>>, ApiError> {
    let tasks = Task::create_many(&deployment.db().pool, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(tasks)))
}

pub async fn update_task(
    Extension(task): Extension<Task>,
    State(deployment): State<DeploymentImpl>,
    Json(payload): Json<UpdateTask>,
) -> Result<ResponseJson<ApiResponse<Task>>, ApiError> {
    let task = Task::update(&deployment.db().pool, task.id, &payload).await?;
    Ok(ResponseJson(ApiResponse::success(task)))
}

pub async fn delete_task(
    Extension(task): Extension<Task>,
    State(deployment): State<DeploymentImpl>,
) -> Result<ResponseJson<ApiResponse<i64>>, ApiError> {
    if Task::delete(&deployment.db().pool, task.id).await? == 0 {
        return Err(TaskError::TaskNotFound.into());
    }
    Ok(ResponseJson(ApiResponse::success(task.id)))
}

pub fn router(deployment: &DeploymentImpl) -> Router<DeploymentImpl> {
    let task_id_router = Router::new()
        .route("/", get(get_task).put(update_task).delete(delete_task))
        .layer(from_fn_with_state(deployment.clone(), load_task_middleware));

    let inner = Router::new()
        .route("/", get(get_tasks).post(create_task))
        .route("/bulk", post(create_tasks))
        .nest("/{task_id}", task_id_router);

    Router::new().nest("/tasks", inner)
}
