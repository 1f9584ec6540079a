use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{get, patch, post},
    Json, Router,
};
use time::OffsetDateTime;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::access;
use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::projects::repo as projects_repo;
use crate::projects::repo::{Project, ProjectMember};
use crate::state::AppState;
use crate::storage::{body_limit, safe_filename};
use crate::tasks::dto::{
    apply_changes, CreateTaskRequest, TaskQuery, UpdateTaskRequest, UploadResponse,
};
use crate::tasks::repo::{self, Task, TaskFilter, TaskStatus};

pub fn routes(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/tasks", get(list_tasks).post(create_task))
        .route(
            "/tasks/:id",
            get(get_task).put(update_task).delete(delete_task),
        )
        .route("/tasks/:id/complete", patch(complete_task))
        .route(
            "/tasks/:id/attachment",
            post(upload_attachment).layer(DefaultBodyLimit::max(body_limit(upload_max_bytes))),
        )
}

fn validate_title(title: &str) -> Result<(), ApiError> {
    if title.len() < 3 {
        return Err(ApiError::validation("Title must be at least 3 characters"));
    }
    if title.len() > 200 {
        return Err(ApiError::validation("Title must be at most 200 characters"));
    }
    Ok(())
}

/// Loads the task plus whatever rows the access decision needs: the task's
/// project (if any) and the caller's membership row in it.
async fn load_task(
    state: &AppState,
    task_id: Uuid,
    caller: Uuid,
) -> Result<(Task, Option<Project>, Option<ProjectMember>), ApiError> {
    let task = repo::find(&state.db, task_id)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;
    let (project, membership) = match task.project_id {
        Some(project_id) => (
            projects_repo::find(&state.db, project_id).await?,
            projects_repo::membership(&state.db, project_id, caller).await?,
        ),
        None => (None, None),
    };
    Ok((task, project, membership))
}

#[instrument(skip(state, user))]
async fn list_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<TaskQuery>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let filter = TaskFilter {
        status: q.status,
        priority: q.priority,
        project: q.project_id,
    };
    let tasks = repo::list_by_user(&state.db, user.id, &filter).await?;
    Ok(Json(tasks))
}

#[instrument(skip(state, user, payload))]
async fn create_task(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateTaskRequest>,
) -> Result<(StatusCode, Json<Task>), ApiError> {
    validate_title(&payload.title)?;

    // A project-scoped task requires read access to that project.
    if let Some(project_id) = payload.project_id {
        let project = projects_repo::find(&state.db, project_id)
            .await?
            .ok_or(ApiError::NotFound("Project"))?;
        let membership = projects_repo::membership(&state.db, project_id, user.id).await?;
        if !access::can_read_project(user.id, &project, membership.as_ref()) {
            return Err(ApiError::forbidden("You do not have access to this project"));
        }
    }

    let task = repo::create(
        &state.db,
        payload.project_id,
        user.id,
        &payload.title,
        payload.description.as_deref(),
        payload.due_date,
        payload.priority,
        payload.status.unwrap_or(TaskStatus::Pending),
    )
    .await?;
    info!(task_id = %task.id, user_id = %user.id, "task created");
    Ok((StatusCode::CREATED, Json(task)))
}

#[instrument(skip(state, user))]
async fn get_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    let (task, project, membership) = load_task(&state, id, user.id).await?;
    if !access::can_read_task(user.id, &task, project.as_ref(), membership.as_ref()) {
        return Err(ApiError::forbidden("You do not have access to this task"));
    }
    Ok(Json(task))
}

#[instrument(skip(state, user, payload))]
async fn update_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateTaskRequest>,
) -> Result<Json<Task>, ApiError> {
    let (mut task, project, membership) = load_task(&state, id, user.id).await?;
    if !access::can_update_task(user.id, &task, project.as_ref(), membership.as_ref()) {
        return Err(ApiError::forbidden("You do not have access to this task"));
    }

    if let Some(title) = payload.title.as_deref() {
        validate_title(title)?;
    }
    if payload.is_empty() {
        return Err(ApiError::validation("Nothing to update"));
    }

    apply_changes(&mut task, &payload, OffsetDateTime::now_utc());
    let saved = repo::save(&state.db, &task).await?;
    info!(task_id = %id, "task updated");
    Ok(Json(saved))
}

#[instrument(skip(state, user))]
async fn delete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let task = repo::find(&state.db, id)
        .await?
        .ok_or(ApiError::NotFound("Task"))?;
    if !access::can_delete_task(user.id, &task) {
        return Err(ApiError::forbidden(
            "Only the task's assignee can delete it",
        ));
    }

    repo::delete(&state.db, id).await?;
    info!(task_id = %id, "task deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user))]
async fn complete_task(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Task>, ApiError> {
    let (mut task, project, membership) = load_task(&state, id, user.id).await?;
    if !access::can_update_task(user.id, &task, project.as_ref(), membership.as_ref()) {
        return Err(ApiError::forbidden("You do not have access to this task"));
    }
    if task.status == TaskStatus::Completed {
        return Err(ApiError::validation("Task is already completed"));
    }

    apply_changes(
        &mut task,
        &UpdateTaskRequest {
            status: Some(TaskStatus::Completed),
            ..Default::default()
        },
        OffsetDateTime::now_utc(),
    );
    let saved = repo::save(&state.db, &task).await?;
    info!(task_id = %id, "task completed");
    Ok(Json(saved))
}

#[instrument(skip(state, user, multipart))]
async fn upload_attachment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (task, project, membership) = load_task(&state, id, user.id).await?;
    if !access::can_update_task(user.id, &task, project.as_ref(), membership.as_ref()) {
        return Err(ApiError::forbidden("You do not have access to this task"));
    }

    let field = multipart
        .next_field()
        .await
        .map_err(|_| ApiError::validation("Invalid multipart body"))?
        .ok_or_else(|| ApiError::validation("No file uploaded"))?;

    let original = field
        .file_name()
        .map(str::to_string)
        .ok_or_else(|| ApiError::validation("No filename provided"))?;
    let safe = safe_filename(&original).ok_or_else(|| {
        warn!(filename = %original, "rejected upload extension");
        ApiError::validation("File extension not allowed (pdf, jpg, jpeg, png)")
    })?;

    let data = field
        .bytes()
        .await
        .map_err(|_| ApiError::validation("Failed to read upload"))?;
    if data.len() > state.config.upload.max_bytes {
        return Err(ApiError::validation("File too large"));
    }

    let path = state.storage.store(&format!("tasks/{safe}"), data).await?;
    if let Err(e) = repo::set_attachment(&state.db, id, &path).await {
        if let Err(del) = state.storage.delete(&path).await {
            warn!(path = %path, error = %del, "failed to remove orphaned upload");
        }
        return Err(e.into());
    }
    if let Some(old) = task.attachment_path.as_deref() {
        if let Err(e) = state.storage.delete(old).await {
            warn!(path = %old, error = %e, "failed to remove replaced attachment");
        }
    }
    info!(task_id = %id, path = %path, "task attachment stored");
    Ok(Json(UploadResponse { file_path: path }))
}
