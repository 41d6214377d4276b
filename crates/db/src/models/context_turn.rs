use std::{fmt, str::FromStr};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use ts_rs::TS;

/// Intent tag of an LLM request. Selects the prompt template and the
/// history lineage a request reads from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize, TS)]
#[sqlx(type_name = "action", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum Action {
    System,
    Plan,
    RePlan,
    Task,
    ReTask,
    DivTask,
}

/// History lineage a turn belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Type, Serialize, Deserialize, TS)]
#[sqlx(type_name = "context_bucket", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ContextBucket {
    Plan,
    Task,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Type, Serialize, Deserialize, TS)]
#[sqlx(type_name = "message_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum MessageRole {
    System,
    User,
    Assistant,
}

impl Action {
    pub const ALL: [Action; 6] = [
        Action::System,
        Action::Plan,
        Action::RePlan,
        Action::Task,
        Action::ReTask,
        Action::DivTask,
    ];

    /// Lineage this action reads history from. Task generation reads the
    /// plan lineage; task refinements read the task lineage. `system` is a
    /// template key only and reads no history.
    pub fn bucket(self) -> Option<ContextBucket> {
        match self {
            Action::Plan | Action::RePlan | Action::Task => Some(ContextBucket::Plan),
            Action::ReTask | Action::DivTask => Some(ContextBucket::Task),
            Action::System => None,
        }
    }

    /// Lineage turns of this action are recorded under, so `re_task` and
    /// `div_task` see the exchange that produced the tasks.
    pub fn lineage(self) -> Option<ContextBucket> {
        match self {
            Action::Plan | Action::RePlan => Some(ContextBucket::Plan),
            Action::Task | Action::ReTask | Action::DivTask => Some(ContextBucket::Task),
            Action::System => None,
        }
    }

    /// Title of the prompt template for this action.
    pub fn as_str(self) -> &'static str {
        match self {
            Action::System => "system",
            Action::Plan => "plan",
            Action::RePlan => "re_plan",
            Action::Task => "task",
            Action::ReTask => "re_task",
            Action::DivTask => "div_task",
        }
    }
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UnknownAction(pub String);

impl fmt::Display for UnknownAction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown action '{}'", self.0)
    }
}

impl std::error::Error for UnknownAction {}

impl FromStr for Action {
    type Err = UnknownAction;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Action::ALL
            .into_iter()
            .find(|action| action.as_str() == s)
            .ok_or_else(|| UnknownAction(s.to_string()))
    }
}

impl fmt::Display for MessageRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            MessageRole::System => "system",
            MessageRole::User => "user",
            MessageRole::Assistant => "assistant",
        })
    }
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct ContextTurn {
    pub id: i64,
    pub project_id: i64,
    pub role: MessageRole,
    pub action: Action,
    pub bucket: Option<ContextBucket>,
    pub message: String,
    pub created_at: DateTime<Utc>,
    pub changed_at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct CreateContextTurn {
    pub project_id: i64,
    pub role: MessageRole,
    pub action: Action,
    pub message: String,
}

impl ContextTurn {
    /// Appends a turn under the action's write lineage.
    pub async fn insert<'e, E>(executor: E, data: &CreateContextTurn) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, ContextTurn>(
            r#"INSERT INTO context_turns (project_id, role, action, bucket, message, created_at, changed_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)
               RETURNING *"#,
        )
        .bind(data.project_id)
        .bind(data.role)
        .bind(data.action)
        .bind(data.action.lineage())
        .bind(&data.message)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    /// The `limit` most recent turns of a bucket, oldest first.
    pub async fn find_recent<'e, E>(
        executor: E,
        project_id: i64,
        bucket: ContextBucket,
        limit: i64,
    ) -> Result<Vec<Self>, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        // SQLite treats a negative LIMIT as unbounded.
        if limit <= 0 {
            return Ok(Vec::new());
        }

        let mut turns = sqlx::query_as::<_, ContextTurn>(
            r#"SELECT * FROM context_turns
               WHERE project_id = ?1 AND bucket = ?2
               ORDER BY julianday(changed_at) DESC, id DESC
               LIMIT ?3"#,
        )
        .bind(project_id)
        .bind(bucket)
        .bind(limit)
        .fetch_all(executor)
        .await?;
        turns.reverse();
        Ok(turns)
    }

    pub async fn find_by_project(pool: &SqlitePool, project_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, ContextTurn>(
            r#"SELECT * FROM context_turns WHERE project_id = ?1 ORDER BY julianday(changed_at), id"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }
}
