use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

use async_trait::async_trait;
use axum::{
    Router,
    body::{Body, to_bytes},
    http::{Method, Request, StatusCode},
};
use db::{DBService, models::context_turn::Action};
use local_deployment::LocalDeployment;
use serde_json::{Value, json};
use server::routes::api_router;
use services::services::{
    config::Config,
    llm_gateway::{GatewayError, LlmGateway},
    prompt_catalog::PromptCatalog,
};
use tower::ServiceExt;

#[derive(Default)]
struct ScriptedGateway {
    replies: Mutex<Vec<Result<Value, GatewayError>>>,
    bodies: Mutex<Vec<Value>>,
}

impl ScriptedGateway {
    fn push(&self, reply: Result<Value, GatewayError>) {
        self.replies.lock().unwrap().insert(0, reply);
    }
}

#[async_trait]
impl LlmGateway for ScriptedGateway {
    async fn post(
        &self,
        _url: &str,
        _headers: &[(String, String)],
        body: &Value,
        _timeout: Duration,
    ) -> Result<Value, GatewayError> {
        self.bodies.lock().unwrap().push(body.clone());
        self.replies
            .lock()
            .unwrap()
            .pop()
            .unwrap_or_else(|| Err(GatewayError::Request("no scripted reply".into())))
    }
}

fn completion(text: &str) -> Value {
    json!({ "result": { "alternatives": [ { "message": { "role": "assistant", "text": text } } ] } })
}

async fn app(gateway: Arc<ScriptedGateway>) -> Router {
    let db = DBService::new_in_memory().await.unwrap();
    let mut config = Config::default();
    config.llm.model_uri = Some("gpt://folder/yandexgpt".into());
    let prompts = PromptCatalog::from_templates([
        (Action::System, "You are a project assistant."),
        (Action::Plan, "Write a plan."),
        (Action::Task, "Split the plan into tasks."),
    ]);
    api_router(LocalDeployment::from_parts(config, db, prompts, gateway))
}

async fn send(app: &Router, method: Method, uri: &str, body: Option<Value>) -> (StatusCode, Value) {
    let mut builder = Request::builder().method(method).uri(uri);
    let body = match body {
        Some(json) => {
            builder = builder.header("content-type", "application/json");
            Body::from(json.to_string())
        }
        None => Body::empty(),
    };
    let response = app
        .clone()
        .oneshot(builder.body(body).unwrap())
        .await
        .unwrap();
    let status = response.status();
    let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
    let value = if bytes.is_empty() {
        Value::Null
    } else {
        serde_json::from_slice(&bytes).unwrap()
    };
    (status, value)
}

async fn seed_project(app: &Router) -> i64 {
    let (status, _) = send(
        app,
        Method::POST,
        "/api/db/users",
        Some(json!({ "id": 1, "name": "alice" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        app,
        Method::POST,
        "/api/db/projects",
        Some(json!({ "title": "Launch", "description": "Ship the beta", "owner_id": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    body["data"]["id"].as_i64().unwrap()
}

#[tokio::test]
async fn health_answers_ok() {
    let app = app(Arc::default()).await;
    let (status, body) = send(&app, Method::GET, "/api/health", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["success"], true);
    assert_eq!(body["data"], "OK");
}

#[tokio::test]
async fn project_owner_becomes_admin() {
    let app = app(Arc::default()).await;
    let project_id = seed_project(&app).await;

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/db/teams/is-admin?user_id=1&project_id={project_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"], true);
}

#[tokio::test]
async fn task_lifecycle_keeps_reminder_in_step() {
    let app = app(Arc::default()).await;
    let project_id = seed_project(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/db/tasks",
        Some(json!({
            "title": "Write docs",
            "project_id": project_id,
            "user_id": 1,
            "deadline": "2030-01-02T12:00:00Z"
        })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let task_id = body["data"]["id"].as_i64().unwrap();
    assert_eq!(body["data"]["status"], "todo");

    let (status, body) = send(&app, Method::GET, &format!("/api/db/reminders/{task_id}"), None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["send_time"], "2030-01-01T12:00:00Z");

    let (status, body) = send(
        &app,
        Method::PUT,
        &format!("/api/db/tasks/{task_id}"),
        Some(json!({ "status": "in_progress" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["status"], "in_progress");

    let (status, _) = send(&app, Method::DELETE, &format!("/api/db/tasks/{task_id}"), None).await;
    assert_eq!(status, StatusCode::OK);

    let (status, _) = send(&app, Method::GET, &format!("/api/db/tasks/{task_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
    let (status, _) = send(&app, Method::GET, &format!("/api/db/reminders/{task_id}"), None).await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn duplicate_membership_is_a_conflict() {
    let app = app(Arc::default()).await;
    let project_id = seed_project(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/db/teams",
        Some(json!({ "user_id": 1, "project_id": project_id })),
    )
    .await;
    assert_eq!(status, StatusCode::CONFLICT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn task_for_unknown_project_is_rejected() {
    let app = app(Arc::default()).await;
    let (status, body) = send(
        &app,
        Method::POST,
        "/api/db/tasks",
        Some(json!({ "title": "Orphan", "project_id": 99 })),
    )
    .await;
    assert_eq!(status, StatusCode::BAD_REQUEST);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn plan_action_stores_plan_and_returns_raw_payload() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.push(Ok(completion("1. Design\n2. Build")));
    let app = app(gateway.clone()).await;
    let project_id = seed_project(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/llm/action",
        Some(json!({ "project_id": project_id, "action": "plan", "iam_token": "t0ken" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body, completion("1. Design\n2. Build"));

    let sent = gateway.bodies.lock().unwrap().clone();
    assert_eq!(sent.len(), 1);
    let messages = sent[0]["messages"].as_array().unwrap();
    assert_eq!(messages[0]["role"], "system");
    assert_eq!(messages.last().unwrap()["text"], "Write a plan.\n\nShip the beta");

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/db/plans/{project_id}/latest"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["text"], "1. Design\n2. Build");

    let (_, body) = send(&app, Method::GET, &format!("/api/llm/history/{project_id}"), None).await;
    let turns = body["data"].as_array().unwrap();
    assert_eq!(turns.len(), 2);
    assert_eq!(turns[0]["role"], "user");
    assert_eq!(turns[1]["role"], "assistant");
}

#[tokio::test]
async fn task_action_creates_tasks_from_json_reply() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.push(Ok(completion(
        "Here you go: {\"tasks\": [{\"ci\": \"Set up CI\"}, {\"tests\": \"Write tests\"}]}",
    )));
    let app = app(gateway).await;
    let project_id = seed_project(&app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/llm/action",
        Some(json!({ "project_id": project_id, "action": "task" })),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (_, body) = send(
        &app,
        Method::GET,
        &format!("/api/db/tasks?project_id={project_id}"),
        None,
    )
    .await;
    let tasks = body["data"].as_array().unwrap();
    assert_eq!(tasks.len(), 2);
    assert_eq!(tasks[0]["title"], "task_ci");
    assert_eq!(tasks[0]["description"], "Set up CI");
}

#[tokio::test]
async fn upstream_timeout_maps_to_gateway_timeout() {
    let gateway = Arc::new(ScriptedGateway::default());
    gateway.push(Err(GatewayError::Timeout(Duration::from_secs(1))));
    let app = app(gateway).await;
    let project_id = seed_project(&app).await;

    let (status, body) = send(
        &app,
        Method::POST,
        "/api/llm/action",
        Some(json!({ "project_id": project_id, "action": "plan", "timeout": 1 })),
    )
    .await;
    assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
    assert_eq!(body["success"], false);
}

#[tokio::test]
async fn action_on_unknown_project_is_not_found() {
    let app = app(Arc::default()).await;
    let (status, _) = send(
        &app,
        Method::POST,
        "/api/llm/action",
        Some(json!({ "project_id": 42, "action": "plan" })),
    )
    .await;
    assert_eq!(status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn project_report_counts_statuses() {
    let app = app(Arc::default()).await;
    let project_id = seed_project(&app).await;

    let (status, _) = send(
        &app,
        Method::POST,
        "/api/db/tasks/bulk",
        Some(json!([
            { "title": "a", "project_id": project_id, "user_id": 1, "status": "done" },
            { "title": "b", "project_id": project_id, "user_id": 1, "status": "in_progress" },
            { "title": "c", "project_id": project_id }
        ])),
    )
    .await;
    assert_eq!(status, StatusCode::OK);

    let (status, body) = send(
        &app,
        Method::GET,
        &format!("/api/db/reports/project/{project_id}"),
        None,
    )
    .await;
    assert_eq!(status, StatusCode::OK);
    let report = &body["data"];
    assert_eq!(report["total_quantity_of_tasks"], 3);
    assert_eq!(report["quantity_of_completed_tasks"], 1);
    assert_eq!(report["quantity_of_tasks_in_progress"], 1);
    assert_eq!(report["quantity_of_todo_tasks"], 1);
}

#[tokio::test]
async fn report_for_unknown_project_is_empty() {
    let app = app(Arc::default()).await;
    let (status, body) = send(&app, Method::GET, "/api/db/reports/project/77", None).await;
    assert_eq!(status, StatusCode::OK);
    assert_eq!(body["data"]["total_quantity_of_tasks"], 0);
}
