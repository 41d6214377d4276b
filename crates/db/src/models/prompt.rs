use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use ts_rs::TS;

/// Template text keyed by action title. `system` is reserved for the
/// leading system message.
#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Prompt {
    pub id: i64,
    pub title: String,
    pub prompt: String,
}

impl Prompt {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Prompt>(r#"SELECT * FROM prompts ORDER BY title"#)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_title(pool: &SqlitePool, title: &str) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Prompt>(r#"SELECT * FROM prompts WHERE title = ?1"#)
            .bind(title)
            .fetch_optional(pool)
            .await
    }

    /// Used by seeding only.
    pub async fn upsert(pool: &SqlitePool, title: &str, prompt: &str) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Prompt>(
            r#"INSERT INTO prompts (title, prompt) VALUES (?1, ?2)
               ON CONFLICT(title) DO UPDATE SET prompt = excluded.prompt
               RETURNING *"#,
        )
        .bind(title)
        .bind(prompt)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_utils::setup_test_pool;

    #[tokio::test]
    async fn upsert_replaces_existing_text() {
        let pool = setup_test_pool().await;
        let first = Prompt::upsert(&pool, "plan", "Draft a plan.").await.unwrap();
        let second = Prompt::upsert(&pool, "plan", "Draft a short plan.").await.unwrap();

        assert_eq!(first.id, second.id);
        let stored = Prompt::find_by_title(&pool, "plan").await.unwrap().unwrap();
        assert_eq!(stored.prompt, "Draft a short plan.");
        assert_eq!(Prompt::find_all(&pool).await.unwrap().len(), 1);
    }
}
