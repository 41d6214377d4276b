use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool};
use ts_rs::TS;

pub const DEFAULT_PLAN_LIMIT: i64 = 3;

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Plan {
    pub id: i64,
    pub project_id: i64,
    pub text: String,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize, TS)]
#[serde(rename_all = "lowercase")]
pub enum PlanSort {
    #[default]
    Latest,
    Older,
    /// Insertion order.
    None,
}

impl Plan {
    pub async fn insert<'e, E>(executor: E, project_id: i64, text: &str) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Plan>(
            r#"INSERT INTO plans (project_id, text, created_at) VALUES (?1, ?2, ?3) RETURNING *"#,
        )
        .bind(project_id)
        .bind(text)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    pub async fn find_latest(pool: &SqlitePool, project_id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Plan>(
            r#"SELECT * FROM plans WHERE project_id = ?1 ORDER BY julianday(created_at) DESC, id DESC LIMIT 1"#,
        )
        .bind(project_id)
        .fetch_optional(pool)
        .await
    }

    pub async fn find_by_project(
        pool: &SqlitePool,
        project_id: i64,
        sort: PlanSort,
        limit: Option<i64>,
    ) -> Result<Vec<Self>, sqlx::Error> {
        let order = match sort {
            PlanSort::Latest => "julianday(created_at) DESC, id DESC",
            PlanSort::Older => "julianday(created_at) ASC, id ASC",
            PlanSort::None => "id",
        };
        let limit = limit.unwrap_or(DEFAULT_PLAN_LIMIT).max(0);
        let sql = format!("SELECT * FROM plans WHERE project_id = ?1 ORDER BY {order} LIMIT ?2");

        sqlx::query_as::<_, Plan>(&sql)
            .bind(project_id)
            .bind(limit)
            .fetch_all(pool)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::test_utils::{create_test_project, create_test_user, setup_test_pool};

    #[tokio::test]
    async fn plans_sort_and_limit() {
        let pool = setup_test_pool().await;
        create_test_user(&pool, 1, "owner").await;
        let project = create_test_project(&pool, 1).await;

        for text in ["one", "two", "three", "four"] {
            Plan::insert(&pool, project.id, text).await.unwrap();
        }

        let latest = Plan::find_latest(&pool, project.id).await.unwrap().unwrap();
        assert_eq!(latest.text, "four");

        let recent = Plan::find_by_project(&pool, project.id, PlanSort::Latest, None)
            .await
            .unwrap();
        let texts: Vec<_> = recent.iter().map(|p| p.text.as_str()).collect();
        assert_eq!(texts, vec!["four", "three", "two"]);

        let oldest = Plan::find_by_project(&pool, project.id, PlanSort::Older, Some(1))
            .await
            .unwrap();
        assert_eq!(oldest[0].text, "one");
    }

    #[tokio::test]
    async fn project_without_plans_has_no_latest() {
        let pool = setup_test_pool().await;
        create_test_user(&pool, 1, "owner").await;
        let project = create_test_project(&pool, 1).await;
        assert!(Plan::find_latest(&pool, project.id).await.unwrap().is_none());
    }
}
