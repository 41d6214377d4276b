//! Read-only task statistics per developer and per project.
//!
//! The builders are pure over already-loaded rows and take `now`
//! explicitly; [`ReportService`] loads the rows and stamps the clock.

use std::collections::{BTreeMap, HashMap};

use chrono::{DateTime, Utc};
use db::models::{
    project::Project,
    task::{Task, TaskStatus},
    team::Team,
    user::User,
};
use serde::Serialize;
use sqlx::SqlitePool;
use ts_rs::TS;

use super::config::DEFAULT_RUNNING_OFFSET_HOURS;

/// Returned by [`allotted_time`] when a task has no deadline.
pub const NO_ALLOTTED_TIME: f64 = -1.0;

const NO_TASKS: &str = "no tasks to analyse";
const NO_VALID_DURATION: &str = "could not determine a task";

#[derive(Debug, Clone, Copy, PartialEq, Serialize, TS)]
pub struct TaskDuration {
    /// Hours, rounded to two decimals.
    pub duration: f64,
    pub is_done: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct TaskBreakdown {
    pub duration: f64,
    pub is_done: bool,
    pub allotted_time: f64,
}

/// Longest or shortest task, or the reason none could be picked.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
pub struct DurationPick {
    pub title: Option<String>,
    pub duration: f64,
    pub error: Option<String>,
}

impl DurationPick {
    fn failed(reason: &str) -> Self {
        Self {
            title: None,
            duration: 0.0,
            error: Some(reason.to_string()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum DeveloperRanking {
    Ranked { user_id: i64, name: String, metric: f64 },
    NoDevelopers,
    NotDetermined,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct DeveloperReport {
    pub developer_id: i64,
    pub developer_name: Option<String>,
    pub all_tasks: usize,
    /// Tasks with status `done`.
    pub total_completed_tasks: usize,
    pub total_in_progress_tasks: usize,
    pub total_todo_tasks: usize,
    pub total_overdue_tasks: usize,
    pub all_users_tasks_duration: BTreeMap<String, TaskBreakdown>,
    pub most_difficult_task: DurationPick,
    pub the_easiest_task: DurationPick,
    /// Sum of durations over every task of the developer, finished or not.
    pub total_hours_worked: f64,
}

#[derive(Debug, Clone, Serialize, TS)]
pub struct ProjectReport {
    pub project_id: i64,
    pub project_title: String,
    pub total_quantity_of_tasks: usize,
    pub quantity_of_completed_tasks: usize,
    pub quantity_of_tasks_in_progress: usize,
    pub quantity_of_todo_tasks: usize,
    pub quantity_of_overdue_tasks: usize,
    pub most_valuable_developer: DeveloperRanking,
    pub most_productive_developer: DeveloperRanking,
    pub most_flawed_developer: DeveloperRanking,
    pub all_tasks_in_project_with_duration: BTreeMap<String, TaskBreakdown>,
}

fn round2(value: f64) -> f64 {
    (value * 100.0).round() / 100.0
}

fn hours_between(from: DateTime<Utc>, to: DateTime<Utc>) -> f64 {
    (to - from).num_milliseconds() as f64 / 3_600_000.0
}

/// Done tasks: time from creation to the last change. Anything else: time
/// since creation minus `running_offset_hours`.
pub fn task_duration(task: &Task, now: DateTime<Utc>, running_offset_hours: f64) -> TaskDuration {
    if task.status == TaskStatus::Done {
        let finished = task.changed_at.unwrap_or(task.created_at);
        TaskDuration {
            duration: round2(hours_between(task.created_at, finished)),
            is_done: true,
        }
    } else {
        TaskDuration {
            duration: round2(hours_between(task.created_at, now) - running_offset_hours),
            is_done: false,
        }
    }
}

pub fn allotted_time(task: &Task) -> f64 {
    task.deadline
        .map(|deadline| hours_between(task.created_at, deadline))
        .unwrap_or(NO_ALLOTTED_TIME)
}

pub fn is_overdue(task: &Task, now: DateTime<Utc>) -> bool {
    task.status != TaskStatus::Done && task.deadline.is_some_and(|deadline| deadline < now)
}

fn pick_by_duration<F>(tasks: &[Task], now: DateTime<Utc>, offset: f64, better: F) -> DurationPick
where
    F: Fn(f64, f64) -> bool,
{
    if tasks.is_empty() {
        return DurationPick::failed(NO_TASKS);
    }

    let mut best: Option<(&Task, f64)> = None;
    for task in tasks {
        let duration = task_duration(task, now, offset).duration;
        if !duration.is_finite() {
            continue;
        }
        match best {
            Some((_, current)) if !better(duration, current) => {}
            _ => best = Some((task, duration)),
        }
    }

    match best {
        Some((task, duration)) => DurationPick {
            title: Some(task.title.clone()),
            duration,
            error: None,
        },
        None => DurationPick::failed(NO_VALID_DURATION),
    }
}

/// First task with the longest duration.
pub fn most_duration_task(tasks: &[Task], now: DateTime<Utc>, offset: f64) -> DurationPick {
    pick_by_duration(tasks, now, offset, |candidate, current| candidate > current)
}

/// First task with the shortest duration.
pub fn least_duration_task(tasks: &[Task], now: DateTime<Utc>, offset: f64) -> DurationPick {
    pick_by_duration(tasks, now, offset, |candidate, current| candidate < current)
}

/// Keyed by title; a later task with the same title replaces an earlier one.
pub fn duration_breakdown(tasks: &[Task], now: DateTime<Utc>, offset: f64) -> BTreeMap<String, TaskBreakdown> {
    tasks
        .iter()
        .map(|task| {
            let TaskDuration { duration, is_done } = task_duration(task, now, offset);
            (
                task.title.clone(),
                TaskBreakdown {
                    duration,
                    is_done,
                    allotted_time: allotted_time(task),
                },
            )
        })
        .collect()
}

fn count_status(tasks: &[Task], status: TaskStatus) -> usize {
    tasks.iter().filter(|t| t.status == status).count()
}

fn count_overdue(tasks: &[Task], now: DateTime<Utc>) -> usize {
    tasks.iter().filter(|t| is_overdue(t, now)).count()
}

fn tasks_by_user(tasks: &[Task]) -> HashMap<i64, Vec<&Task>> {
    let mut grouped: HashMap<i64, Vec<&Task>> = HashMap::new();
    for task in tasks {
        if let Some(user_id) = task.user_id {
            grouped.entry(user_id).or_default().push(task);
        }
    }
    grouped
}

fn ranked(user: &User, metric: f64) -> DeveloperRanking {
    DeveloperRanking::Ranked {
        user_id: user.id,
        name: user.name.clone(),
        metric,
    }
}

/// Most `done` tasks; the first member wins a tie. Members without a
/// finished task never qualify.
pub fn most_productive_developer(members: &[User], tasks: &[Task]) -> DeveloperRanking {
    if members.is_empty() {
        return DeveloperRanking::NoDevelopers;
    }
    let grouped = tasks_by_user(tasks);

    let mut best: Option<(&User, usize)> = None;
    for user in members {
        let done = grouped
            .get(&user.id)
            .map(|ts| ts.iter().filter(|t| t.status == TaskStatus::Done).count())
            .unwrap_or(0);
        let current = best.map(|(_, n)| n).unwrap_or(0);
        if done > current {
            best = Some((user, done));
        }
    }

    best.map(|(user, done)| ranked(user, done as f64))
        .unwrap_or(DeveloperRanking::NotDetermined)
}

/// Fewest overdue tasks among members with at least one task; the first
/// member wins a tie.
pub fn most_flawed_developer(members: &[User], tasks: &[Task], now: DateTime<Utc>) -> DeveloperRanking {
    if members.is_empty() {
        return DeveloperRanking::NoDevelopers;
    }
    let grouped = tasks_by_user(tasks);

    let mut best: Option<(&User, usize)> = None;
    for user in members {
        let Some(own) = grouped.get(&user.id) else {
            continue;
        };
        let overdue = own.iter().filter(|t| is_overdue(t, now)).count();
        match best {
            Some((_, current)) if overdue >= current => {}
            _ => best = Some((user, overdue)),
        }
    }

    best.map(|(user, overdue)| ranked(user, overdue as f64))
        .unwrap_or(DeveloperRanking::NotDetermined)
}

/// Highest effectiveness, `100 - overdue / total * 100`, among members with
/// at least one task. The last member wins a tie.
pub fn most_valuable_developer(members: &[User], tasks: &[Task], now: DateTime<Utc>) -> DeveloperRanking {
    if members.is_empty() {
        return DeveloperRanking::NoDevelopers;
    }
    let grouped = tasks_by_user(tasks);

    let mut best: Option<(&User, f64)> = None;
    for user in members {
        let Some(own) = grouped.get(&user.id) else {
            continue;
        };
        let overdue = own.iter().filter(|t| is_overdue(t, now)).count();
        let effectiveness = 100.0 - (overdue as f64 / own.len() as f64) * 100.0;
        match best {
            Some((_, current)) if effectiveness < current => {}
            _ => best = Some((user, effectiveness)),
        }
    }

    best.map(|(user, effectiveness)| ranked(user, round2(effectiveness)))
        .unwrap_or(DeveloperRanking::NotDetermined)
}

/// `tasks` are the developer's tasks within one project.
pub fn build_developer_report(
    developer_id: i64,
    developer: Option<&User>,
    tasks: &[Task],
    now: DateTime<Utc>,
    running_offset_hours: f64,
) -> DeveloperReport {
    let completed: Vec<Task> = tasks
        .iter()
        .filter(|t| t.status == TaskStatus::Done)
        .cloned()
        .collect();

    let total_hours: f64 = tasks
        .iter()
        .map(|t| task_duration(t, now, running_offset_hours).duration)
        .sum();

    DeveloperReport {
        developer_id,
        developer_name: developer.map(|u| u.name.clone()),
        all_tasks: tasks.len(),
        total_completed_tasks: completed.len(),
        total_in_progress_tasks: count_status(tasks, TaskStatus::InProgress),
        total_todo_tasks: count_status(tasks, TaskStatus::Todo),
        total_overdue_tasks: count_overdue(tasks, now),
        all_users_tasks_duration: duration_breakdown(tasks, now, running_offset_hours),
        most_difficult_task: most_duration_task(&completed, now, running_offset_hours),
        the_easiest_task: least_duration_task(&completed, now, running_offset_hours),
        total_hours_worked: round2(total_hours),
    }
}

pub fn build_project_report(
    project_id: i64,
    project: Option<&Project>,
    tasks: &[Task],
    members: &[User],
    now: DateTime<Utc>,
    running_offset_hours: f64,
) -> ProjectReport {
    ProjectReport {
        project_id,
        project_title: project.map(|p| p.title.clone()).unwrap_or_default(),
        total_quantity_of_tasks: tasks.len(),
        quantity_of_completed_tasks: count_status(tasks, TaskStatus::Done),
        quantity_of_tasks_in_progress: count_status(tasks, TaskStatus::InProgress),
        quantity_of_todo_tasks: count_status(tasks, TaskStatus::Todo),
        quantity_of_overdue_tasks: count_overdue(tasks, now),
        most_valuable_developer: most_valuable_developer(members, tasks, now),
        most_productive_developer: most_productive_developer(members, tasks),
        most_flawed_developer: most_flawed_developer(members, tasks, now),
        all_tasks_in_project_with_duration: duration_breakdown(tasks, now, running_offset_hours),
    }
}

#[derive(Clone)]
pub struct ReportService {
    pool: SqlitePool,
    running_offset_hours: f64,
}

impl ReportService {
    pub fn new(pool: SqlitePool, running_offset_hours: f64) -> Self {
        Self {
            pool,
            running_offset_hours,
        }
    }

    pub fn with_default_offset(pool: SqlitePool) -> Self {
        Self::new(pool, DEFAULT_RUNNING_OFFSET_HOURS)
    }

    /// Unknown users or projects yield an empty report, not an error.
    pub async fn developer_report(&self, user_id: i64, project_id: i64) -> Result<DeveloperReport, sqlx::Error> {
        let developer = User::find_by_id(&self.pool, user_id).await?;
        let tasks = Task::find_by_user_and_project(&self.pool, user_id, project_id).await?;
        Ok(build_developer_report(
            user_id,
            developer.as_ref(),
            &tasks,
            Utc::now(),
            self.running_offset_hours,
        ))
    }

    pub async fn project_report(&self, project_id: i64) -> Result<ProjectReport, sqlx::Error> {
        let project = Project::find_by_id(&self.pool, project_id).await?;
        let tasks = Task::find_by_project(&self.pool, project_id).await?;
        let members = Team::members(&self.pool, project_id).await?;
        Ok(build_project_report(
            project_id,
            project.as_ref(),
            &tasks,
            &members,
            Utc::now(),
            self.running_offset_hours,
        ))
    }
}
