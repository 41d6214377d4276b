use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, QueryBuilder, Sqlite, SqlitePool};
use thiserror::Error;
use ts_rs::TS;

#[derive(Debug, Error)]
pub enum UserError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("User not found")]
    NotFound,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct User {
    pub id: i64,
    pub name: String,
    pub created_at: DateTime<Utc>,
}

/// Users are usually registered with an id issued by the chat front-end,
/// so the id is optional rather than always database-assigned.
#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateUser {
    #[serde(default)]
    pub id: Option<i64>,
    pub name: String,
}

impl User {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(r#"SELECT * FROM users ORDER BY id"#)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, User>(r#"SELECT * FROM users WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_ids(pool: &SqlitePool, ids: &[i64]) -> Result<Vec<Self>, sqlx::Error> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut builder = QueryBuilder::<Sqlite>::new("SELECT * FROM users WHERE id IN (");
        let mut separated = builder.separated(", ");
        for id in ids {
            separated.push_bind(*id);
        }
        separated.push_unseparated(") ORDER BY id");

        builder.build_query_as::<User>().fetch_all(pool).await
    }

    /// Returns the existing row untouched when a user with the requested id
    /// is already registered.
    pub async fn create(pool: &SqlitePool, data: &CreateUser) -> Result<Self, UserError> {
        if let Some(id) = data.id
            && let Some(existing) = Self::find_by_id(pool, id).await?
        {
            return Ok(existing);
        }

        let user = sqlx::query_as::<_, User>(
            r#"INSERT INTO users (id, name, created_at)
               VALUES (?1, ?2, ?3)
               RETURNING *"#,
        )
        .bind(data.id)
        .bind(&data.name)
        .bind(Utc::now())
        .fetch_one(pool)
        .await?;

        Ok(user)
    }

    pub async fn create_many(pool: &SqlitePool, data: &[CreateUser]) -> Result<Vec<Self>, UserError> {
        let mut tx = pool.begin().await?;
        let mut users = Vec::with_capacity(data.len());
        let now = Utc::now();

        for item in data {
            let user = sqlx::query_as::<_, User>(
                r#"INSERT INTO users (id, name, created_at)
                   VALUES (?1, ?2, ?3)
                   RETURNING *"#,
            )
            .bind(item.id)
            .bind(&item.name)
            .bind(now)
            .fetch_one(&mut *tx)
            .await?;
            users.push(user);
        }

        tx.commit().await?;
        Ok(users)
    }

    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM users WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }
}
