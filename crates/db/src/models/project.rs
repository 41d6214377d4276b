use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, SqlitePool};
use thiserror::Error;
use ts_rs::TS;

use super::team::{Team, TeamRole};

#[derive(Debug, Error)]
pub enum ProjectError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Project not found")]
    ProjectNotFound,
    #[error("Owner {0} does not exist")]
    OwnerNotFound(i64),
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Project {
    pub id: i64,
    pub title: String,
    /// Free text appended to LLM instructions for this project.
    pub description: Option<String>,
    pub chat_link: Option<String>,
    pub repo_link: Option<String>,
    pub owner_id: i64,
    pub created_at: DateTime<Utc>,
    pub changed_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateProject {
    pub title: String,
    #[serde(default)]
    pub description: Option<String>,
    #[serde(default)]
    pub chat_link: Option<String>,
    #[serde(default)]
    pub repo_link: Option<String>,
    pub owner_id: i64,
}

#[derive(Debug, Clone, Default, Deserialize, TS)]
pub struct UpdateProject {
    pub title: Option<String>,
    pub description: Option<String>,
    pub chat_link: Option<String>,
    pub repo_link: Option<String>,
}

impl Project {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(r#"SELECT * FROM projects ORDER BY id"#)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(r#"SELECT * FROM projects WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_owner(pool: &SqlitePool, owner_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"SELECT * FROM projects WHERE owner_id = ?1 ORDER BY id"#,
        )
        .bind(owner_id)
        .fetch_all(pool)
        .await
    }

    /// Projects the user belongs to through a team membership, any role.
    pub async fn find_by_member(pool: &SqlitePool, user_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Project>(
            r#"SELECT p.* FROM projects p
               JOIN teams t ON t.project_id = p.id
               WHERE t.user_id = ?1
               ORDER BY p.id"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await
    }

    /// Creates the project and enrolls its owner as team admin atomically.
    pub async fn create(pool: &SqlitePool, data: &CreateProject) -> Result<Self, ProjectError> {
        let mut tx = pool.begin().await?;

        let owner_exists: Option<(i64,)> = sqlx::query_as("SELECT id FROM users WHERE id = ?1")
            .bind(data.owner_id)
            .fetch_optional(&mut *tx)
            .await?;
        if owner_exists.is_none() {
            return Err(ProjectError::OwnerNotFound(data.owner_id));
        }

        let project = sqlx::query_as::<_, Project>(
            r#"INSERT INTO projects (title, description, chat_link, repo_link, owner_id, created_at)
               VALUES (?1, ?2, ?3, ?4, ?5, ?6)
               RETURNING *"#,
        )
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.chat_link)
        .bind(&data.repo_link)
        .bind(data.owner_id)
        .bind(Utc::now())
        .fetch_one(&mut *tx)
        .await?;

        Team::insert(&mut *tx, data.owner_id, project.id, TeamRole::Admin).await?;

        tx.commit().await?;
        tracing::debug!("Created project {} owned by {}", project.id, project.owner_id);
        Ok(project)
    }

    pub async fn update(
        pool: &SqlitePool,
        id: i64,
        data: &UpdateProject,
    ) -> Result<Self, ProjectError> {
        sqlx::query_as::<_, Project>(
            r#"UPDATE projects
               SET title = COALESCE(?2, title),
                   description = COALESCE(?3, description),
                   chat_link = COALESCE(?4, chat_link),
                   repo_link = COALESCE(?5, repo_link),
                   changed_at = ?6
               WHERE id = ?1
               RETURNING *"#,
        )
        .bind(id)
        .bind(&data.title)
        .bind(&data.description)
        .bind(&data.chat_link)
        .bind(&data.repo_link)
        .bind(Utc::now())
        .fetch_optional(pool)
        .await?
        .ok_or(ProjectError::ProjectNotFound)
    }

    /// Tasks, teams, reminders, context turns and plans go with it.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<u64, sqlx::Error> {
        let result = sqlx::query("DELETE FROM projects WHERE id = ?1")
            .bind(id)
            .execute(pool)
            .await?;
        Ok(result.rows_affected())
    }

    pub async fn delete_by_owner(pool: &SqlitePool, owner_id: i64) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> =
            sqlx::query_as("DELETE FROM projects WHERE owner_id = ?1 RETURNING id")
                .bind(owner_id)
                .fetch_all(pool)
                .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }
}
