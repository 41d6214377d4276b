use axum::{
    Router,
    middleware,
    routing::{IntoMakeService, get},
};
use tower_http::trace::TraceLayer;

use crate::{DeploymentImpl, middleware as app_middleware};

pub mod health;
pub mod llm;
pub mod plans;
pub mod projects;
pub mod reminders;
pub mod reports;
pub mod tasks;
pub mod teams;
pub mod users;

/// Routes under `/api`, without the outer layers.
pub fn api_router(deployment: DeploymentImpl) -> Router {
    let db_routes = Router::new()
        .merge(users::router(&deployment))
        .merge(projects::router(&deployment))
        .merge(tasks::router(&deployment))
        .merge(teams::router(&deployment))
        .merge(reminders::router(&deployment))
        .merge(plans::router(&deployment))
        .merge(reports::router(&deployment));

    let base_routes = Router::new()
        .route("/health", get(health::health_check))
        .nest("/db", db_routes)
        .nest("/llm", llm::router(&deployment))
        .with_state(deployment);

    Router::new()
        .nest("/api", base_routes)
        .layer(middleware::from_fn(app_middleware::request_id_middleware))
}

pub fn router(deployment: DeploymentImpl) -> IntoMakeService<Router> {
    api_router(deployment)
        .layer(TraceLayer::new_for_http().make_span_with(
            |request: &axum::http::Request<axum::body::Body>| {
                tracing::info_span!(
                    "http",
                    method = %request.method(),
                    uri = %request.uri(),
                    request_id = tracing::field::Empty,
                )
            },
        ))
        .into_make_service()
}
