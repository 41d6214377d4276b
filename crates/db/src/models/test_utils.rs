use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

use super::{
    project::{CreateProject, Project},
    user::{CreateUser, User},
};
use crate::DBService;

pub(crate) async fn setup_test_pool() -> SqlitePool {
    DBService::new_in_memory()
        .await
        .expect("failed to open sqlite memory db")
        .pool
}

pub(crate) async fn create_test_user(pool: &SqlitePool, id: i64, name: &str) -> User {
    User::create(
        pool,
        &CreateUser {
            id: Some(id),
            name: name.to_string(),
        },
    )
    .await
    .expect("failed to create test user")
}

pub(crate) async fn create_test_project(pool: &SqlitePool, owner_id: i64) -> Project {
    Project::create(
        pool,
        &CreateProject {
            title: format!("Test Project {}", owner_id),
            description: Some("A project used by tests".into()),
            chat_link: None,
            repo_link: None,
            owner_id,
        },
    )
    .await
    .expect("failed to create test project")
}

pub(crate) async fn backdate_task(pool: &SqlitePool, task_id: i64, created_at: DateTime<Utc>) {
    sqlx::query("UPDATE tasks SET created_at = ?1 WHERE id = ?2")
        .bind(created_at)
        .bind(task_id)
        .execute(pool)
        .await
        .expect("failed to backdate task");
}
