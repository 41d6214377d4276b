use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use db::models::{
    project::ProjectError, task::TaskError, team::TeamError, user::UserError,
};
use deployment::DeploymentError;
use services::services::{conversation::ConversationError, llm_gateway::GatewayError};
use thiserror::Error;
use utils::response::ApiResponse;

#[derive(Debug, Error, ts_rs::TS)]
#[ts(type = "string")]
pub enum ApiError {
    #[error(transparent)]
    User(#[from] UserError),
    #[error(transparent)]
    Project(#[from] ProjectError),
    #[error(transparent)]
    Task(#[from] TaskError),
    #[error(transparent)]
    Team(#[from] TeamError),
    #[error(transparent)]
    Conversation(#[from] ConversationError),
    #[error(transparent)]
    Deployment(#[from] DeploymentError),
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Conflict: {0}")]
    Conflict(String),
    #[error("Bad Request: {0}")]
    BadRequest(String),
    #[error("Not Found: {0}")]
    NotFound(String),
    #[error("Internal Server Error: {0}")]
    InternalError(String),
}

/// Status for a raw store error: constraint violations are the caller's
/// fault, everything else is ours.
fn database_status(err: &sqlx::Error) -> (StatusCode, &'static str) {
    match err {
        sqlx::Error::RowNotFound => (StatusCode::NOT_FOUND, "NotFound"),
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            (StatusCode::CONFLICT, "ConflictError")
        }
        sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
            (StatusCode::BAD_REQUEST, "UnknownReference")
        }
        _ => (StatusCode::INTERNAL_SERVER_ERROR, "DatabaseError"),
    }
}

fn gateway_status(err: &GatewayError) -> (StatusCode, &'static str) {
    match err {
        GatewayError::Timeout(_) => (StatusCode::GATEWAY_TIMEOUT, "UpstreamTimeout"),
        _ => (StatusCode::BAD_GATEWAY, "UpstreamError"),
    }
}

impl ApiError {
    fn status(&self) -> (StatusCode, &'static str) {
        match self {
            ApiError::User(UserError::NotFound) => (StatusCode::NOT_FOUND, "UserNotFound"),
            ApiError::User(UserError::Database(e)) => database_status(e),
            ApiError::Project(err) => match err {
                ProjectError::ProjectNotFound => (StatusCode::NOT_FOUND, "ProjectNotFound"),
                ProjectError::OwnerNotFound(_) => (StatusCode::NOT_FOUND, "OwnerNotFound"),
                ProjectError::Database(e) => database_status(e),
            },
            ApiError::Task(TaskError::TaskNotFound) => (StatusCode::NOT_FOUND, "TaskNotFound"),
            ApiError::Task(TaskError::Database(e)) => database_status(e),
            ApiError::Team(err) => match err {
                TeamError::NotFound => (StatusCode::NOT_FOUND, "TeamNotFound"),
                TeamError::AlreadyMember { .. } => (StatusCode::CONFLICT, "AlreadyMember"),
                TeamError::Database(e) => database_status(e),
            },
            ApiError::Conversation(err) => match err {
                ConversationError::ProjectNotFound(_) => (StatusCode::NOT_FOUND, "ProjectNotFound"),
                ConversationError::MissingModelUri => (StatusCode::BAD_REQUEST, "MissingModelUri"),
                ConversationError::Gateway(e) => gateway_status(e),
                ConversationError::Database(e) => database_status(e),
            },
            ApiError::Deployment(_) => (StatusCode::INTERNAL_SERVER_ERROR, "DeploymentError"),
            ApiError::Database(e) => database_status(e),
            ApiError::Conflict(_) => (StatusCode::CONFLICT, "ConflictError"),
            ApiError::BadRequest(_) => (StatusCode::BAD_REQUEST, "BadRequest"),
            ApiError::NotFound(_) => (StatusCode::NOT_FOUND, "NotFound"),
            ApiError::InternalError(_) => (StatusCode::INTERNAL_SERVER_ERROR, "InternalError"),
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status_code, error_type) = self.status();

        let error_message = match &self {
            ApiError::Conflict(msg)
            | ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::InternalError(msg) => msg.clone(),
            _ if status_code == StatusCode::INTERNAL_SERVER_ERROR => {
                tracing::error!("{}: {}", error_type, self);
                "Operation failed".to_string()
            }
            _ => format!("{}: {}", error_type, self),
        };

        let response = ApiResponse::<()>::error(&error_message);
        (status_code, Json(response)).into_response()
    }
}
