use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqliteConnection, SqlitePool, Type};
use thiserror::Error;
use ts_rs::TS;

use super::reminder::Reminder;

#[derive(Debug, Error)]
pub enum TaskError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Task not found")]
    TaskNotFound,
}

/// Any status may follow any other; there is no transition table.
#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    #[default]
    Todo,
    InProgress,
    Done,
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, Default, TS)]
#[sqlx(type_name = "priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    #[default]
    Medium,
    High,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Task {
    pub id: i64,
    pub title: String,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub user_id: Option<i64>, // unassigned when None
    pub project_id: i64,
    pub created_at: DateTime<Utc>,
    pub changed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTask {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub deadline: Option<DateTime<Utc>>,
    #[serde(default)]
    pub priority: Option<TaskPriority>,
    #[serde(default)]
    pub status: Option<TaskStatus>,
    #[serde(default)]
    pub user_id: Option<i64>,
    pub project_id: i64,
}

impl CreateTask {
    pub fn new(project_id: i64, title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            description: None,
            deadline: None,
            priority: None,
            status: None,
            user_id: None,
            project_id,
        }
    }
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateTask {
    pub title: Option<String>,
    pub description: Option<String>,
    pub deadline: Option<DateTime<Utc>>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
    pub user_id: Option<i64>,
}

impl Task {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(r#"SELECT * FROM tasks ORDER BY id"#)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(r#"SELECT * FROM tasks WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_project(pool: &SqlitePool, project_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(r#"SELECT * FROM tasks WHERE project_id = ?1 ORDER BY id"#)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_user_and_project(
        pool: &SqlitePool,
        user_id: i64,
        project_id: i64,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Task>(
            r#"SELECT * FROM tasks WHERE user_id = ?1 AND project_id = ?2 ORDER BY id"#,
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    async fn insert<'e, E>(executor: E, data: &CreateTask) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Task>(
            r#"INSERT INTO tasks
                (title, description, deadline, priority, status, user_id, project_id, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)
               RETURNING *"#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.deadline)
        .bind(data.priority.unwrap_or_default())
        .bind(data.status.unwrap_or_default())
        .bind(data.user_id)
        .bind(data.project_id)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    /// Creates the task together with its reminder.
    pub async fn create(pool: &SqlitePool, data: &CreateTask) -> Result<Self, TaskError> {
        let mut tx = pool.begin().await?;
        let task = Self::insert(&mut *tx, data).await?;
        Reminder::sync_with_task(&mut *tx, &task).await?;
        tx.commit().await?;
        Ok(task)
    }

    /// Bulk insert on a caller-owned connection or transaction; every task
    /// gets its reminder.
    pub async fn create_many_in(
        conn: &mut SqliteConnection,
        data: &[CreateTask],
    ) -> Result<Vec<Self>, sqlx::Error> {
        let mut tasks = Vec::with_capacity(data.len());
        for item in data {
            let task = Self::insert(&mut *conn, item).await?;
            Reminder::sync_with_task(&mut *conn, &task).await?;
            tasks.push(task);
        }
        Ok(tasks)
    }

    pub async fn create_many(pool: &SqlitePool, data: &[CreateTask]) -> Result<Vec<Self>, TaskError> {
        let mut tx = pool.begin().await?;
        let tasks = Self::create_many_in(&mut tx, data).await?;
        tx.commit().await?;
        Ok(tasks)
    }

    /// Applies the given fields, stamps `changed_at` and keeps the reminder
    /// in step with the new title, assignee and deadline.
    pub async fn update(pool: &SqlitePool, id: i64, data: &UpdateTask) -> Result<Self, TaskError> {
        let mut tx = pool.begin().await?;

        let task = sqlx::query_as::<_, Task>(
            r#"UPDATE tasks
               SET title = COALESCE(?2, title),
                   description = COALESCE(?3, description),
                   deadline = COALESCE(?4, deadline),
                   priority = COALESCE(?5, priority),
                   status = COALESCE(?6, status),
                   user_id = COALESCE(?7, user_id),
                   changed_at = ?8
               WHERE id = ?1
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(data.deadline)
        .bind(data.priority)
        .bind(data.status)
        .bind(data.user_id)
        .bind(Utc::now())
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(TaskError::TaskNotFound)?;

        Reminder::sync_with_task(&mut *tx, &task).await?;
        tx.commit().await?;
        Ok(task)
    }

    /// The reminder is removed by the `ON DELETE CASCADE` on `reminders`.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM tasks WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
