use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{Executor, FromRow, Sqlite, SqlitePool, Type};
use thiserror::Error;
use ts_rs::TS;

use super::user::User;

#[derive(Debug, Error)]
pub enum TeamError {
    #[error(transparent)]
    Database(#[from] sqlx::Error),
    #[error("Team membership not found")]
    NotFound,
    #[error("User {user_id} is already a member of project {project_id}")]
    AlreadyMember { user_id: i64, project_id: i64 },
}

#[derive(Debug, Clone, Copy, Type, Serialize, Deserialize, PartialEq, Eq, TS)]
#[sqlx(type_name = "team_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TeamRole {
    Admin,
    User,
}

#[derive(Debug, Clone, FromRow, Serialize, Deserialize, TS)]
pub struct Team {
    pub id: i64,
    pub user_id: i64,
    pub project_id: i64,
    pub role: TeamRole,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct CreateTeam {
    pub user_id: i64,
    pub project_id: i64,
    #[serde(default)]
    pub role: Option<TeamRole>,
}

#[derive(Debug, Clone, Deserialize, TS)]
pub struct UpdateTeam {
    pub role: TeamRole,
}

fn map_unique_violation(err: sqlx::Error, user_id: i64, project_id: i64) -> TeamError {
    match &err {
        sqlx::Error::Database(db_err) if db_err.is_unique_violation() => {
            TeamError::AlreadyMember {
                user_id,
                project_id,
            }
        }
        _ => TeamError::Database(err),
    }
}

impl Team {
    pub async fn find_all(pool: &SqlitePool) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(r#"SELECT * FROM teams ORDER BY id"#)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_id(pool: &SqlitePool, id: i64) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(r#"SELECT * FROM teams WHERE id = ?1"#)
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    pub async fn find_by_project(pool: &SqlitePool, project_id: i64) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(r#"SELECT * FROM teams WHERE project_id = ?1 ORDER BY id"#)
            .bind(project_id)
            .fetch_all(pool)
            .await
    }

    pub async fn find_by_member(
        pool: &SqlitePool,
        user_id: i64,
        project_id: i64,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Team>(
            r#"SELECT * FROM teams WHERE user_id = ?1 AND project_id = ?2"#,
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await
    }

    /// Users enrolled in the project, in enrollment order.
    pub async fn members(pool: &SqlitePool, project_id: i64) -> Result<Vec<User>, sqlx::Error> {
        sqlx::query_as::<_, User>(
            r#"SELECT u.* FROM users u
               JOIN teams t ON t.user_id = u.id
               WHERE t.project_id = ?1
               ORDER BY t.id"#,
        )
        .bind(project_id)
        .fetch_all(pool)
        .await
    }

    pub async fn is_admin(pool: &SqlitePool, user_id: i64, project_id: i64) -> Result<bool, sqlx::Error> {
        Ok(Self::find_by_member(pool, user_id, project_id)
            .await?
            .is_some_and(|team| team.role == TeamRole::Admin))
    }

    /// Ids of projects where the user is a plain member.
    pub async fn non_admin_project_ids(
        pool: &SqlitePool,
        user_id: i64,
    ) -> Result<Vec<i64>, sqlx::Error> {
        let rows: Vec<(i64,)> = sqlx::query_as(
            r#"SELECT project_id FROM teams
               WHERE user_id = ?1 AND role = 'user'
               ORDER BY project_id"#,
        )
        .bind(user_id)
        .fetch_all(pool)
        .await?;
        Ok(rows.into_iter().map(|(id,)| id).collect())
    }

    pub(crate) async fn insert<'e, E>(
        executor: E,
        user_id: i64,
        project_id: i64,
        role: TeamRole,
    ) -> Result<Self, sqlx::Error>
    where
        E: Executor<'e, Database = Sqlite>,
    {
        sqlx::query_as::<_, Team>(
            r#"INSERT INTO teams (user_id, project_id, role, created_at)
               VALUES (?1, ?2, ?3, ?4)
               RETURNING *"#,
        )
        .bind(user_id)
        .bind(project_id)
        .bind(role)
        .bind(Utc::now())
        .fetch_one(executor)
        .await
    }

    /// Membership with the requested role, admin when none is given.
    pub async fn create(pool: &SqlitePool, data: &CreateTeam) -> Result<Self, TeamError> {
        let role = data.role.unwrap_or(TeamRole::Admin);
        Self::insert(pool, data.user_id, data.project_id, role)
            .await
            .map_err(|e| map_unique_violation(e, data.user_id, data.project_id))
    }

    /// Adds a user as a plain member regardless of the requested role.
    pub async fn add_member(pool: &SqlitePool, data: &CreateTeam) -> Result<Self, TeamError> {
        Self::insert(pool, data.user_id, data.project_id, TeamRole::User)
            .await
            .map_err(|e| map_unique_violation(e, data.user_id, data.project_id))
    }

    pub async fn update_role(pool: &SqlitePool, id: i64, role: TeamRole) -> Result<Self, TeamError> {
        sqlx::query_as::<_, Team>(r#"UPDATE teams SET role = ?2 WHERE id = ?1 RETURNING *"#)
            .bind(id)
            .bind(role)
            .fetch_optional(pool)
            .await?
            .ok_or(TeamError::NotFound)
    }

    pub async fn update_role_by_member(
        pool: &SqlitePool,
        user_id: i64,
        project_id: i64,
        role: TeamRole,
    ) -> Result<Self, TeamError> {
        sqlx::query_as::<_, Team>(
            r#"UPDATE teams SET role = ?3
               WHERE user_id = ?1 AND project_id = ?2
               RETURNING *"#,
        )
        .bind(user_id)
        .bind(project_id)
        .bind(role)
        .fetch_optional(pool)
        .await?
        .ok_or(TeamError::NotFound)
    }

    /// Returns the id of the removed membership.
    pub async fn delete(pool: &SqlitePool, id: i64) -> Result<i64, TeamError> {
        let row: Option<(i64,)> = sqlx::query_as("DELETE FROM teams WHERE id = ?1 RETURNING id")
            .bind(id)
            .fetch_optional(pool)
            .await?;
        row.map(|(id,)| id).ok_or(TeamError::NotFound)
    }

    pub async fn delete_by_member(
        pool: &SqlitePool,
        user_id: i64,
        project_id: i64,
    ) -> Result<i64, TeamError> {
        let row: Option<(i64,)> = sqlx::query_as(
            "DELETE FROM teams WHERE user_id = ?1 AND project_id = ?2 RETURNING id",
        )
        .bind(user_id)
        .bind(project_id)
        .fetch_optional(pool)
        .await?;
        row.map(|(id,)| id).ok_or(TeamError::NotFound)
    }
}
