use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use crate::tasks::repo::Task;

/// One-row aggregate over the user's tasks.
#[derive(Debug, Clone, FromRow)]
pub struct TaskStats {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub overdue: i64,
    pub high_priority: i64,
    pub medium_priority: i64,
    pub low_priority: i64,
}

pub async fn task_stats(db: &PgPool, user_id: Uuid) -> anyhow::Result<TaskStats> {
    let stats = sqlx::query_as::<_, TaskStats>(
        r#"
        SELECT
            COUNT(*) AS total,
            COUNT(*) FILTER (WHERE status = 'pending') AS pending,
            COUNT(*) FILTER (WHERE status = 'in_progress') AS in_progress,
            COUNT(*) FILTER (WHERE status = 'completed') AS completed,
            COUNT(*) FILTER (WHERE status != 'completed' AND due_date < CURRENT_DATE) AS overdue,
            COUNT(*) FILTER (WHERE priority = 'high') AS high_priority,
            COUNT(*) FILTER (WHERE priority = 'medium') AS medium_priority,
            COUNT(*) FILTER (WHERE priority = 'low') AS low_priority
        FROM tasks
        WHERE user_id = $1
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok(stats)
}

pub async fn pending_tasks(db: &PgPool, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<Task>> {
    let rows = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, project_id, user_id, title, description, due_date, priority,
               status, completed_at, attachment_path, created_at, updated_at
        FROM tasks
        WHERE user_id = $1 AND status = 'pending'
        ORDER BY due_date ASC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn overdue_tasks(db: &PgPool, user_id: Uuid, limit: i64) -> anyhow::Result<Vec<Task>> {
    let rows = sqlx::query_as::<_, Task>(
        r#"
        SELECT id, project_id, user_id, title, description, due_date, priority,
               status, completed_at, attachment_path, created_at, updated_at
        FROM tasks
        WHERE user_id = $1 AND status != 'completed' AND due_date < CURRENT_DATE
        ORDER BY due_date ASC
        LIMIT $2
        "#,
    )
    .bind(user_id)
    .bind(limit)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

/// (owned, total) project counts — total includes projects the user is a
/// member of.
pub async fn project_counts(db: &PgPool, user_id: Uuid) -> anyhow::Result<(i64, i64)> {
    let (owned, total): (i64, i64) = sqlx::query_as(
        r#"
        SELECT
            (SELECT COUNT(*) FROM projects WHERE owner_id = $1),
            (SELECT COUNT(DISTINCT p.id)
             FROM projects p
             LEFT JOIN project_members pm ON pm.project_id = p.id
             WHERE p.owner_id = $1 OR pm.user_id = $1)
        "#,
    )
    .bind(user_id)
    .fetch_one(db)
    .await?;
    Ok((owned, total))
}
