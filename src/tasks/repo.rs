use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_priority", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum TaskPriority {
    Low,
    Medium,
    High,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "task_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Pending,
    InProgress,
    Completed,
}

/// `project_id` is nullable: tasks without one are personal tasks visible
/// only to their assignee. Invariant: `completed_at` is set exactly while
/// `status` is `completed`.
#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Task {
    pub id: Uuid,
    pub project_id: Option<Uuid>,
    pub user_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Date,
    pub priority: TaskPriority,
    pub status: TaskStatus,
    pub completed_at: Option<OffsetDateTime>,
    pub attachment_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

const TASK_COLUMNS: &str = "id, project_id, user_id, title, description, due_date, \
                            priority, status, completed_at, attachment_path, \
                            created_at, updated_at";

pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Task>> {
    let task = sqlx::query_as::<_, Task>(&format!(
        "SELECT {TASK_COLUMNS} FROM tasks WHERE id = $1"
    ))
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(task)
}

/// Filter for the personal task list. `project: Some(None)` selects tasks
/// with no project at all (the `project_id=null` query form).
#[derive(Debug, Default)]
pub struct TaskFilter {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    pub project: Option<Option<Uuid>>,
}

/// The user's own tasks, high priority first, then soonest due date.
pub async fn list_by_user(
    db: &PgPool,
    user_id: Uuid,
    filter: &TaskFilter,
) -> anyhow::Result<Vec<Task>> {
    let (only_personal, project_id) = match filter.project {
        Some(None) => (true, None),
        Some(Some(id)) => (false, Some(id)),
        None => (false, None),
    };
    let rows = sqlx::query_as::<_, Task>(&format!(
        r#"
        SELECT {TASK_COLUMNS}
        FROM tasks
        WHERE user_id = $1
          AND ($2::task_status IS NULL OR status = $2)
          AND ($3::task_priority IS NULL OR priority = $3)
          AND ($4::uuid IS NULL OR project_id = $4)
          AND (NOT $5 OR project_id IS NULL)
        ORDER BY
          CASE priority WHEN 'high' THEN 1 WHEN 'medium' THEN 2 ELSE 3 END,
          due_date ASC
        "#
    ))
    .bind(user_id)
    .bind(filter.status)
    .bind(filter.priority)
    .bind(project_id)
    .bind(only_personal)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn list_by_project(db: &PgPool, project_id: Uuid) -> anyhow::Result<Vec<Task>> {
    let rows = sqlx::query_as::<_, Task>(&format!(
        r#"
        SELECT {TASK_COLUMNS}
        FROM tasks
        WHERE project_id = $1
        ORDER BY due_date ASC
        "#
    ))
    .bind(project_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

#[allow(clippy::too_many_arguments)]
pub async fn create(
    db: &PgPool,
    project_id: Option<Uuid>,
    user_id: Uuid,
    title: &str,
    description: Option<&str>,
    due_date: Date,
    priority: TaskPriority,
    status: TaskStatus,
) -> anyhow::Result<Task> {
    let completed_at = matches!(status, TaskStatus::Completed).then(OffsetDateTime::now_utc);
    let task = sqlx::query_as::<_, Task>(&format!(
        r#"
        INSERT INTO tasks (project_id, user_id, title, description, due_date,
                           priority, status, completed_at)
        VALUES ($1, $2, $3, $4, $5, $6, $7, $8)
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(project_id)
    .bind(user_id)
    .bind(title)
    .bind(description)
    .bind(due_date)
    .bind(priority)
    .bind(status)
    .bind(completed_at)
    .fetch_one(db)
    .await?;
    Ok(task)
}

/// Persists the mutable columns of an already-updated in-memory task.
/// Handlers compute the new values (including the completed_at transition)
/// before calling this.
pub async fn save(db: &PgPool, task: &Task) -> anyhow::Result<Task> {
    let saved = sqlx::query_as::<_, Task>(&format!(
        r#"
        UPDATE tasks
        SET title = $2, description = $3, due_date = $4, priority = $5,
            status = $6, completed_at = $7, updated_at = now()
        WHERE id = $1
        RETURNING {TASK_COLUMNS}
        "#
    ))
    .bind(task.id)
    .bind(&task.title)
    .bind(&task.description)
    .bind(task.due_date)
    .bind(task.priority)
    .bind(task.status)
    .bind(task.completed_at)
    .fetch_one(db)
    .await?;
    Ok(saved)
}

pub async fn count_by_project(db: &PgPool, project_id: Uuid) -> anyhow::Result<i64> {
    let (count,): (i64,) = sqlx::query_as("SELECT COUNT(*) FROM tasks WHERE project_id = $1")
        .bind(project_id)
        .fetch_one(db)
        .await?;
    Ok(count)
}

pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    sqlx::query("DELETE FROM tasks WHERE id = $1")
        .bind(id)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn set_attachment(db: &PgPool, id: Uuid, path: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE tasks SET attachment_path = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(path)
        .execute(db)
        .await?;
    Ok(())
}
