use db::models::{
    context_turn::{Action, ContextTurn, CreateContextTurn, MessageRole},
    plan::Plan,
    task::{CreateTask, Task},
};
use serde::Serialize;
use serde_json::Value;
use sqlx::SqlitePool;
use thiserror::Error;
use ts_rs::TS;

/// Stand-in text when the payload carries no assistant message.
pub const INTERRUPTED_SENTINEL: &str = "Error was interrupt";

/// Prefix of every task title derived from a model response.
pub const DERIVED_TASK_PREFIX: &str = "task_";

#[derive(Debug, Error, PartialEq, Eq)]
pub enum TaskExtractionError {
    #[error("no JSON object found in response text")]
    NoJsonObject,
    #[error("embedded JSON is invalid: {0}")]
    InvalidJson(String),
    #[error("embedded JSON has no `tasks` list")]
    MissingTasks,
}

/// Entities written as a consequence of a model response.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Derived {
    Plan { plan_id: i64 },
    Tasks { task_ids: Vec<i64> },
    /// Extraction degraded; nothing was written.
    Empty { reason: String },
    None,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct InterpretOutcome {
    pub message: String,
    pub extracted: bool,
    pub derived: Derived,
}

/// `result.alternatives[0].message.text`, when present and non-empty.
pub fn extract_text(payload: &Value) -> Option<&str> {
    payload
        .pointer("/result/alternatives/0/message/text")
        .and_then(Value::as_str)
        .filter(|text| !text.is_empty())
}

/// First balanced `{...}` span in `text`. Braces inside JSON strings are
/// ignored.
pub fn find_json_object(text: &str) -> Option<&str> {
    let start = text.find('{')?;
    let mut depth = 0usize;
    let mut in_string = false;
    let mut escaped = false;

    for (offset, ch) in text[start..].char_indices() {
        if in_string {
            match ch {
                _ if escaped => escaped = false,
                '\\' => escaped = true,
                '"' => in_string = false,
                _ => {}
            }
            continue;
        }
        match ch {
            '"' => in_string = true,
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(&text[start..start + offset + 1]);
                }
            }
            _ => {}
        }
    }
    None
}

/// `(name, description)` pairs from `{"tasks": [{"name": "description"}, ...]}`
/// embedded anywhere in `text`.
pub fn parse_task_list(text: &str) -> Result<Vec<(String, String)>, TaskExtractionError> {
    let raw = find_json_object(text).ok_or(TaskExtractionError::NoJsonObject)?;
    let value: Value =
        serde_json::from_str(raw).map_err(|e| TaskExtractionError::InvalidJson(e.to_string()))?;
    let entries = value
        .get("tasks")
        .and_then(Value::as_array)
        .ok_or(TaskExtractionError::MissingTasks)?;

    let mut tasks = Vec::new();
    for entry in entries {
        let Some(object) = entry.as_object() else {
            tracing::debug!("Skipping non-object task entry: {}", entry);
            continue;
        };
        for (name, description) in object {
            let description = match description {
                Value::String(s) => s.clone(),
                other => other.to_string(),
            };
            tasks.push((name.clone(), description));
        }
    }
    Ok(tasks)
}

#[derive(Clone)]
pub struct ResponseInterpreter {
    pool: SqlitePool,
}

impl ResponseInterpreter {
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }

    /// Records the assistant turn and the entities derived from it in one
    /// transaction. Malformed payloads and task JSON degrade to an
    /// [`Derived::Empty`] outcome; only store faults are returned as errors.
    pub async fn interpret(
        &self,
        project_id: i64,
        action: Action,
        payload: &Value,
    ) -> Result<InterpretOutcome, sqlx::Error> {
        let Some(text) = extract_text(payload) else {
            tracing::warn!(
                "LLM payload for project {} ({}) has no assistant text",
                project_id,
                action
            );
            return Ok(InterpretOutcome {
                message: INTERRUPTED_SENTINEL.to_string(),
                extracted: false,
                derived: Derived::Empty {
                    reason: "payload has no assistant text".to_string(),
                },
            });
        };

        let mut tx = self.pool.begin().await?;

        ContextTurn::insert(
            &mut *tx,
            &CreateContextTurn {
                project_id,
                role: MessageRole::Assistant,
                action,
                message: text.to_string(),
            },
        )
        .await?;

        let derived = match action {
            Action::Plan | Action::RePlan => {
                let plan = Plan::insert(&mut *tx, project_id, text).await?;
                Derived::Plan { plan_id: plan.id }
            }
            Action::Task | Action::ReTask => match parse_task_list(text) {
                Ok(entries) => {
                    let data: Vec<CreateTask> = entries
                        .into_iter()
                        .map(|(name, description)| {
                            let mut task =
                                CreateTask::new(project_id, format!("{DERIVED_TASK_PREFIX}{name}"));
                            task.description = Some(description);
                            task
                        })
                        .collect();
                    let tasks = Task::create_many_in(&mut tx, &data).await?;
                    tracing::info!("Derived {} tasks for project {}", tasks.len(), project_id);
                    Derived::Tasks {
                        task_ids: tasks.into_iter().map(|t| t.id).collect(),
                    }
                }
                Err(err) => {
                    tracing::warn!("No tasks derived for project {}: {}", project_id, err);
                    Derived::Empty {
                        reason: err.to_string(),
                    }
                }
            },
            Action::DivTask | Action::System => Derived::None,
        };

        tx.commit().await?;

        Ok(InterpretOutcome {
            message: text.to_string(),
            extracted: true,
            derived,
        })
    }
}
