use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

/// Ownership lives in `projects.owner_id`; membership rows only ever carry
/// the `member` role. The enum still has `Owner` because the API reports a
/// caller's role, derived from the owner column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, sqlx::Type)]
#[sqlx(type_name = "project_role", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum ProjectRole {
    Owner,
    Member,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct Project {
    pub id: Uuid,
    pub owner_id: Uuid,
    pub title: String,
    pub description: Option<String>,
    pub start_date: Date,
    pub end_date: Date,
    pub attachment_path: Option<String>,
    pub created_at: OffsetDateTime,
    pub updated_at: OffsetDateTime,
}

#[derive(Debug, Clone, Serialize, Deserialize, FromRow)]
pub struct ProjectMember {
    pub project_id: Uuid,
    pub user_id: Uuid,
    pub role: ProjectRole,
    pub added_at: OffsetDateTime,
}

/// Membership row joined with user display fields, for member listings.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct MemberWithUser {
    pub user_id: Uuid,
    pub name: String,
    pub email: String,
    pub role: ProjectRole,
    pub added_at: OffsetDateTime,
}

pub async fn find(db: &PgPool, id: Uuid) -> anyhow::Result<Option<Project>> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        SELECT id, owner_id, title, description, start_date, end_date,
               attachment_path, created_at, updated_at
        FROM projects
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(project)
}

/// Projects the user owns or is a member of, with optional filters.
pub async fn search(
    db: &PgPool,
    user_id: Uuid,
    search: Option<&str>,
    start_date_from: Option<Date>,
    end_date_to: Option<Date>,
) -> anyhow::Result<Vec<Project>> {
    let pattern = search.map(|s| format!("%{s}%"));
    let rows = sqlx::query_as::<_, Project>(
        r#"
        SELECT DISTINCT p.id, p.owner_id, p.title, p.description, p.start_date,
               p.end_date, p.attachment_path, p.created_at, p.updated_at
        FROM projects p
        LEFT JOIN project_members pm ON pm.project_id = p.id
        WHERE (p.owner_id = $1 OR pm.user_id = $1)
          AND ($2::text IS NULL OR p.title ILIKE $2 OR p.description ILIKE $2)
          AND ($3::date IS NULL OR p.start_date >= $3)
          AND ($4::date IS NULL OR p.end_date <= $4)
        ORDER BY p.created_at DESC
        "#,
    )
    .bind(user_id)
    .bind(pattern)
    .bind(start_date_from)
    .bind(end_date_to)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn create(
    db: &PgPool,
    owner_id: Uuid,
    title: &str,
    description: Option<&str>,
    start_date: Date,
    end_date: Date,
) -> anyhow::Result<Project> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        INSERT INTO projects (owner_id, title, description, start_date, end_date)
        VALUES ($1, $2, $3, $4, $5)
        RETURNING id, owner_id, title, description, start_date, end_date,
                  attachment_path, created_at, updated_at
        "#,
    )
    .bind(owner_id)
    .bind(title)
    .bind(description)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(db)
    .await?;
    Ok(project)
}

pub async fn update(
    db: &PgPool,
    id: Uuid,
    title: Option<&str>,
    description: Option<&str>,
    start_date: Option<Date>,
    end_date: Option<Date>,
) -> anyhow::Result<Project> {
    let project = sqlx::query_as::<_, Project>(
        r#"
        UPDATE projects
        SET title = COALESCE($2, title),
            description = COALESCE($3, description),
            start_date = COALESCE($4, start_date),
            end_date = COALESCE($5, end_date),
            updated_at = now()
        WHERE id = $1
        RETURNING id, owner_id, title, description, start_date, end_date,
                  attachment_path, created_at, updated_at
        "#,
    )
    .bind(id)
    .bind(title)
    .bind(description)
    .bind(start_date)
    .bind(end_date)
    .fetch_one(db)
    .await?;
    Ok(project)
}

/// Deletes a project atomically: membership rows go away and the project's
/// tasks are detached (they become personal tasks of their assignees) rather
/// than destroyed.
pub async fn delete(db: &PgPool, id: Uuid) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM project_members WHERE project_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("UPDATE tasks SET project_id = NULL, updated_at = now() WHERE project_id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    sqlx::query("DELETE FROM projects WHERE id = $1")
        .bind(id)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}

pub async fn set_attachment(db: &PgPool, id: Uuid, path: &str) -> anyhow::Result<()> {
    sqlx::query("UPDATE projects SET attachment_path = $2, updated_at = now() WHERE id = $1")
        .bind(id)
        .bind(path)
        .execute(db)
        .await?;
    Ok(())
}

pub async fn membership(
    db: &PgPool,
    project_id: Uuid,
    user_id: Uuid,
) -> anyhow::Result<Option<ProjectMember>> {
    let row = sqlx::query_as::<_, ProjectMember>(
        r#"
        SELECT project_id, user_id, role, added_at
        FROM project_members
        WHERE project_id = $1 AND user_id = $2
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn members(db: &PgPool, project_id: Uuid) -> anyhow::Result<Vec<MemberWithUser>> {
    let rows = sqlx::query_as::<_, MemberWithUser>(
        r#"
        SELECT pm.user_id, u.name, u.email, pm.role, pm.added_at
        FROM project_members pm
        JOIN users u ON u.id = pm.user_id
        WHERE pm.project_id = $1
        ORDER BY u.name ASC
        "#,
    )
    .bind(project_id)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn add_member(db: &PgPool, project_id: Uuid, user_id: Uuid) -> anyhow::Result<()> {
    sqlx::query(
        r#"
        INSERT INTO project_members (project_id, user_id, role)
        VALUES ($1, $2, 'member')
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(())
}

/// The SQL guard mirrors the authorization rule: owner rows are never
/// deleted through this path.
pub async fn remove_member(db: &PgPool, project_id: Uuid, user_id: Uuid) -> anyhow::Result<u64> {
    let result = sqlx::query(
        r#"
        DELETE FROM project_members
        WHERE project_id = $1 AND user_id = $2 AND role != 'owner'
        "#,
    )
    .bind(project_id)
    .bind(user_id)
    .execute(db)
    .await?;
    Ok(result.rows_affected())
}

/// Swaps ownership in one transaction: the new owner's member row goes away,
/// the old owner gets one, and the owner column flips. Rollback on any step
/// leaves no partial state.
pub async fn transfer_ownership(
    db: &PgPool,
    project_id: Uuid,
    old_owner: Uuid,
    new_owner: Uuid,
) -> anyhow::Result<()> {
    let mut tx = db.begin().await?;
    sqlx::query("DELETE FROM project_members WHERE project_id = $1 AND user_id = $2")
        .bind(project_id)
        .bind(new_owner)
        .execute(&mut *tx)
        .await?;
    sqlx::query(
        "INSERT INTO project_members (project_id, user_id, role) VALUES ($1, $2, 'member')",
    )
    .bind(project_id)
    .bind(old_owner)
    .execute(&mut *tx)
    .await?;
    sqlx::query("UPDATE projects SET owner_id = $2, updated_at = now() WHERE id = $1")
        .bind(project_id)
        .bind(new_owner)
        .execute(&mut *tx)
        .await?;
    tx.commit().await?;
    Ok(())
}
