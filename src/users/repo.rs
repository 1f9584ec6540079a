use serde::Serialize;
use sqlx::{FromRow, PgPool};
use time::OffsetDateTime;
use uuid::Uuid;

/// Slim user row for listings and member picking; no credential material.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct UserSummary {
    pub id: Uuid,
    pub name: String,
    pub email: String,
    pub created_at: OffsetDateTime,
}

/// Everyone except the calling user, for the "add member" picker.
pub async fn list_others(db: &PgPool, exclude: Uuid) -> anyhow::Result<Vec<UserSummary>> {
    let rows = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT id, name, email, created_at
        FROM users
        WHERE id != $1
        ORDER BY name ASC
        "#,
    )
    .bind(exclude)
    .fetch_all(db)
    .await?;
    Ok(rows)
}

pub async fn find_summary(db: &PgPool, id: Uuid) -> anyhow::Result<Option<UserSummary>> {
    let row = sqlx::query_as::<_, UserSummary>(
        r#"
        SELECT id, name, email, created_at
        FROM users
        WHERE id = $1
        "#,
    )
    .bind(id)
    .fetch_optional(db)
    .await?;
    Ok(row)
}

pub async fn exists(db: &PgPool, id: Uuid) -> anyhow::Result<bool> {
    let row: Option<(i32,)> = sqlx::query_as("SELECT 1 FROM users WHERE id = $1")
        .bind(id)
        .fetch_optional(db)
        .await?;
    Ok(row.is_some())
}

pub async fn update_profile(
    db: &PgPool,
    id: Uuid,
    name: Option<&str>,
    email: Option<&str>,
) -> anyhow::Result<UserSummary> {
    let row = sqlx::query_as::<_, UserSummary>(
        r#"
        UPDATE users
        SET name = COALESCE($2, name),
            email = COALESCE($3, email),
            updated_at = now()
        WHERE id = $1
        RETURNING id, name, email, created_at
        "#,
    )
    .bind(id)
    .bind(name)
    .bind(email)
    .fetch_one(db)
    .await?;
    Ok(row)
}
