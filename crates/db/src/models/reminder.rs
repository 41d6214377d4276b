use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, QueryBuilder, Sqlite, SqlitePool};
use ts_rs::TS;

use super::task::Task;

/// How long before a task's deadline its reminder fires.
pub const REMINDER_LEAD_HOURS: i64 = 24;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Reminder {
    pub task_id: i64,
    pub user_id: Option<i64>,
    pub title: String,
    pub send_time: Option<DateTime<Utc>>,
    pub project_id: i64,
    pub created_at: DateTime<Utc>,
    pub changed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateReminder {
    pub title: Option<String>,
    pub send_time: Option<DateTime<Utc>>,
    pub user_id: Option<i64>,
}

/// Send time for a task due at `deadline`; tasks without a deadline get a
/// reminder with no send time.
pub fn send_time_for(deadline: Option<DateTime<Utc>>) -> Option<DateTime<Utc>> {
    deadline.map(|d| d - Duration::hours(REMINDER_LEAD_HOURS))
}

impl Reminder {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(r#"SELECT * FROM reminders ORDER BY task_id"#)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_task_id(pool: &SqlitePool, task_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(r#"SELECT * FROM reminders WHERE task_id = ?1"#)
            .bind(task_id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_project_ids(
        pool: &SqlitePool,
        project_ids: &[i64],
    ) -> Result<Vec<Self>, sqlx::Error> {
        if project_ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder =
            QueryBuilder::<Sqlite>::new("SELECT * FROM reminders WHERE project_id IN (");
        let mut separated = builder.separated(", ");
        for id in project_ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY task_id");

        builder.build_query_as::<Reminder>().fetch_all(pool).await
    }

    /// Creates or refreshes the single reminder that mirrors `task`.
    pub async fn sync_with_task<'e, E>(executor: E, task: &Task) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        let now = Utc::now();
        sqlx::query_as::<_, Reminder>(
            r#"INSERT INTO reminders (task_id, user_id, title, send_time, project_id, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               ON CONFLICT(task_id) DO UPDATE SET
                   user_id = excluded.user_id,
                   title = excluded.title,
                   send_time = excluded.send_time,
                   changed_at = ?6
               RETURNING *"#,
        )
        .bind(task.id)
        .bind(task.user_id)
        .bind(&task.title)
        .bind(send_time_for(task.deadline))
        .bind(task.project_id)
        .bind(now)
        .fetch_one(executor)
        .await
    }

    pub async fn update(
        pool: &SqlitePool,
        task_id: i64,
        data: &UpdateReminder,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Reminder>(
            r#"UPDATE reminders
               SET title = COALESCE(?2, title),
                   send_time = COALESCE(?3, send_time),
                   user_id = COALESCE(?4, user_id),
                   changed_at = ?5
               WHERE task_id = ?1
               RETURNING *"#,
        )
        .bind(task_id)
        .bind(&data.title)
        .bind(data.send_time)
        .bind(data.user_id)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await
    }

    pub async fn delete_by_task_id(pool: &SqlitePool, task_id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM reminders WHERE task_id = ?1")
            .bind(task_id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
