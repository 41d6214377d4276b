use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;
use ts_rs::TS;

use super::context_assembler::ChatMessage;

#[derive(Debug, Error)]
pub enum GatewayError {
    #[error("LLM request timed out after {0:?}")]
    Timeout(Duration),
    #[error("LLM endpoint returned {status}: {body}")]
    Status { status: u16, body: String },
    #[error("LLM request failed: {0}")]
    Request(String),
    #[error("LLM response is not valid JSON: {0}")]
    Decode(String),
}

#[derive(Debug, Clone, Serialize, Deserialize, TS)]
pub struct CompletionOptions {
    #[serde(default)]
    pub stream: bool,
    pub temperature: f64,
    pub max_tokens: u32,
}

/// Request body of the completion endpoint.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletionRequest {
    pub model_uri: String,
    pub completion_options: CompletionOptions,
    pub messages: Vec<ChatMessage>,
}

/// Outbound call to the model provider. Owns timeout and HTTP status
/// semantics only; the payload is returned untouched.
#[async_trait]
pub trait LlmGateway: Send + Sync {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, GatewayError>;
}

#[derive(Debug, Clone, Default)]
pub struct HttpLlmGateway {
    client: Client,
}

impl HttpLlmGateway {
    pub fn new() -> Self {
        Self {
            client: Client::new(),
        }
    }
}

#[async_trait]
impl LlmGateway for HttpLlmGateway {
    async fn post(
        &self,
        url: &str,
        headers: &[(String, String)],
        body: &Value,
        timeout: Duration,
    ) -> Result<Value, GatewayError> {
        let to_error = |e: reqwest::Error| {
            if e.is_timeout() {
                GatewayError::Timeout(timeout)
            } else {
                GatewayError::Request(e.to_string())
            }
        };

        let mut request = self
            .client
            .post(url)
            .timeout(timeout)
            .header("Content-Type", "application/json");
        for (name, value) in headers {
            request = request.header(name.as_str(), value.as_str());
        }

        tracing::debug!("[LLM] POST {} (timeout {:?})", url, timeout);
        let response = request.json(body).send().await.map_err(to_error)?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            tracing::warn!("[LLM] upstream returned {}: {}", status, body);
            return Err(GatewayError::Status {
                status: status.as_u16(),
                body,
            });
        }

        let text = response.text().await.map_err(to_error)?;
        serde_json::from_str(&text).map_err(|e| GatewayError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use axum::{Json, Router, http::StatusCode, routing::post};
    use serde_json::json;
    use tokio::net::TcpListener;

    use super::*;

    async fn serve(app: Router) -> String {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            axum::serve(listener, app).await.unwrap();
        });
        format!("http://{}/completion", addr)
    }

    #[tokio::test]
    async fn returns_payload_and_forwards_headers() {
        let app = Router::new().route(
            "/completion",
            post(|headers: axum::http::HeaderMap, Json(body): Json<Value>| async move {
                let auth = headers
                    .get("authorization")
                    .and_then(|v| v.to_str().ok())
                    .unwrap_or_default()
                    .to_string();
                Json(json!({ "auth": auth, "echo": body }))
            }),
        );
        let url = serve(app).await;

        let payload = HttpLlmGateway::new()
            .post(
                &url,
                &[("Authorization".into(), "Bearer t0k".into())],
                &json!({ "ping": 1 }),
                Duration::from_secs(5),
            )
            .await
            .unwrap();

        assert_eq!(payload["auth"], "Bearer t0k");
        assert_eq!(payload["echo"]["ping"], 1);
    }

    #[tokio::test]
    async fn non_success_status_is_an_upstream_error() {
        let app = Router::new().route(
            "/completion",
            post(|| async { (StatusCode::UNAUTHORIZED, "bad token") }),
        );
        let url = serve(app).await;

        let err = HttpLlmGateway::new()
            .post(&url, &[], &json!({}), Duration::from_secs(5))
            .await
            .unwrap_err();

        match err {
            GatewayError::Status { status, body } => {
                assert_eq!(status, 401);
                assert_eq!(body, "bad token");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn slow_upstream_times_out() {
        let app = Router::new().route(
            "/completion",
            post(|| async {
                tokio::time::sleep(Duration::from_secs(5)).await;
                Json(json!({}))
            }),
        );
        let url = serve(app).await;

        let err = HttpLlmGateway::new()
            .post(&url, &[], &json!({}), Duration::from_millis(100))
            .await
            .unwrap_err();

        assert!(matches!(err, GatewayError::Timeout(_)));
    }
}
