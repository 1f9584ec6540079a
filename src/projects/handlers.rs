use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    routing::{delete, get, post},
    Json, Router,
};
use time::Date;
use tracing::{info, instrument, warn};
use uuid::Uuid;

use crate::access;
use crate::auth::extractors::AuthUser;
use crate::error::ApiError;
use crate::projects::dto::{
    AddMemberRequest, CreateProjectRequest, ProjectDetails, ProjectQuery,
    TransferOwnershipRequest, UpdateProjectRequest, UploadResponse,
};
use crate::projects::repo::{self, MemberWithUser, Project, ProjectRole};
use crate::state::AppState;
use crate::storage::{body_limit, safe_filename};
use crate::tasks::repo as tasks_repo;
use crate::tasks::repo::Task;

pub fn routes(upload_max_bytes: usize) -> Router<AppState> {
    Router::new()
        .route("/projects", get(list_projects).post(create_project))
        .route(
            "/projects/:id",
            get(get_project).put(update_project).delete(delete_project),
        )
        .route("/projects/:id/members", get(list_members).post(add_member))
        .route("/projects/:id/members/:user_id", delete(remove_member))
        .route("/projects/:id/tasks", get(project_tasks))
        .route("/projects/:id/transfer", post(transfer_ownership))
        .route(
            "/projects/:id/attachment",
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

fn validate_dates(start: Date, end: Date) -> Result<(), ApiError> {
    if end < start {
        return Err(ApiError::validation(
            "End date must be on or after the start date",
        ));
    }
    Ok(())
}

/// Fetches the project and the caller's membership row in one go; most
/// handlers need both for an access decision.
async fn load_project(
    state: &AppState,
    project_id: Uuid,
    caller: Uuid,
) -> Result<(Project, Option<repo::ProjectMember>), ApiError> {
    let project = repo::find(&state.db, project_id)
        .await?
        .ok_or(ApiError::NotFound("Project"))?;
    let membership = repo::membership(&state.db, project_id, caller).await?;
    Ok((project, membership))
}

#[instrument(skip(state, user))]
async fn list_projects(
    State(state): State<AppState>,
    user: AuthUser,
    Query(q): Query<ProjectQuery>,
) -> Result<Json<Vec<Project>>, ApiError> {
    let projects = repo::search(
        &state.db,
        user.id,
        q.search.as_deref(),
        q.start_date_from,
        q.end_date_to,
    )
    .await?;
    Ok(Json(projects))
}

#[instrument(skip(state, user, payload))]
async fn create_project(
    State(state): State<AppState>,
    user: AuthUser,
    Json(payload): Json<CreateProjectRequest>,
) -> Result<(StatusCode, Json<Project>), ApiError> {
    validate_title(&payload.title)?;
    validate_dates(payload.start_date, payload.end_date)?;

    let project = repo::create(
        &state.db,
        user.id,
        &payload.title,
        payload.description.as_deref(),
        payload.start_date,
        payload.end_date,
    )
    .await?;
    info!(project_id = %project.id, owner_id = %user.id, "project created");
    Ok((StatusCode::CREATED, Json(project)))
}

#[instrument(skip(state, user))]
async fn get_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<ProjectDetails>, ApiError> {
    let (project, membership) = load_project(&state, id, user.id).await?;
    if !access::can_read_project(user.id, &project, membership.as_ref()) {
        return Err(ApiError::forbidden("You do not have access to this project"));
    }

    let members = repo::members(&state.db, id).await?;
    let tasks_count = tasks_repo::count_by_project(&state.db, id).await?;
    let role = if project.owner_id == user.id {
        ProjectRole::Owner
    } else {
        ProjectRole::Member
    };

    Ok(Json(ProjectDetails {
        project,
        role,
        members,
        tasks_count,
    }))
}

#[instrument(skip(state, user, payload))]
async fn update_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<UpdateProjectRequest>,
) -> Result<Json<Project>, ApiError> {
    let (project, _) = load_project(&state, id, user.id).await?;
    if !access::can_write_project(user.id, &project) {
        return Err(ApiError::forbidden(
            "Only the project owner can update it",
        ));
    }

    if let Some(title) = payload.title.as_deref() {
        validate_title(title)?;
    }
    // The date invariant holds over the merged state, not just the patch.
    let start = payload.start_date.unwrap_or(project.start_date);
    let end = payload.end_date.unwrap_or(project.end_date);
    validate_dates(start, end)?;

    if payload.title.is_none()
        && payload.description.is_none()
        && payload.start_date.is_none()
        && payload.end_date.is_none()
    {
        return Err(ApiError::validation("Nothing to update"));
    }

    let updated = repo::update(
        &state.db,
        id,
        payload.title.as_deref(),
        payload.description.as_deref(),
        payload.start_date,
        payload.end_date,
    )
    .await?;
    info!(project_id = %id, "project updated");
    Ok(Json(updated))
}

#[instrument(skip(state, user))]
async fn delete_project(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<StatusCode, ApiError> {
    let (project, _) = load_project(&state, id, user.id).await?;
    if !access::can_write_project(user.id, &project) {
        return Err(ApiError::forbidden(
            "Only the project owner can delete it",
        ));
    }

    repo::delete(&state.db, id).await?;
    info!(project_id = %id, "project deleted");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user))]
async fn list_members(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<MemberWithUser>>, ApiError> {
    let (project, membership) = load_project(&state, id, user.id).await?;
    if !access::can_read_project(user.id, &project, membership.as_ref()) {
        return Err(ApiError::forbidden("You do not have access to this project"));
    }
    let members = repo::members(&state.db, id).await?;
    Ok(Json(members))
}

#[instrument(skip(state, user, payload))]
async fn add_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<AddMemberRequest>,
) -> Result<StatusCode, ApiError> {
    let (project, _) = load_project(&state, id, user.id).await?;
    if !access::can_write_project(user.id, &project) {
        return Err(ApiError::forbidden(
            "Only the project owner can add members",
        ));
    }
    if payload.user_id == project.owner_id {
        return Err(ApiError::validation("The owner is already on the project"));
    }
    if !crate::users::repo::exists(&state.db, payload.user_id).await? {
        return Err(ApiError::NotFound("User"));
    }
    if repo::membership(&state.db, id, payload.user_id).await?.is_some() {
        return Err(ApiError::conflict("User is already a member of this project"));
    }

    repo::add_member(&state.db, id, payload.user_id).await?;
    info!(project_id = %id, member_id = %payload.user_id, "member added");
    Ok(StatusCode::CREATED)
}

#[instrument(skip(state, user))]
async fn remove_member(
    State(state): State<AppState>,
    user: AuthUser,
    Path((id, member_id)): Path<(Uuid, Uuid)>,
) -> Result<StatusCode, ApiError> {
    let (project, _) = load_project(&state, id, user.id).await?;
    if !access::can_remove_member(user.id, &project, member_id) {
        // Covers both non-owner callers and attempts to remove the owner.
        return Err(ApiError::forbidden(
            "Only the project owner can remove members, and the owner cannot be removed",
        ));
    }

    let removed = repo::remove_member(&state.db, id, member_id).await?;
    if removed == 0 {
        return Err(ApiError::NotFound("Member"));
    }
    info!(project_id = %id, member_id = %member_id, "member removed");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user))]
async fn project_tasks(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
) -> Result<Json<Vec<Task>>, ApiError> {
    let (project, membership) = load_project(&state, id, user.id).await?;
    if !access::can_read_project(user.id, &project, membership.as_ref()) {
        return Err(ApiError::forbidden("You do not have access to this project"));
    }
    let tasks = tasks_repo::list_by_project(&state.db, id).await?;
    Ok(Json(tasks))
}

#[instrument(skip(state, user, payload))]
async fn transfer_ownership(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    Json(payload): Json<TransferOwnershipRequest>,
) -> Result<StatusCode, ApiError> {
    let (project, _) = load_project(&state, id, user.id).await?;
    if !access::can_write_project(user.id, &project) {
        return Err(ApiError::forbidden(
            "Only the project owner can transfer ownership",
        ));
    }
    if payload.user_id == project.owner_id {
        return Err(ApiError::validation("User already owns this project"));
    }
    if repo::membership(&state.db, id, payload.user_id).await?.is_none() {
        return Err(ApiError::validation(
            "Ownership can only be transferred to an existing member",
        ));
    }

    repo::transfer_ownership(&state.db, id, project.owner_id, payload.user_id).await?;
    info!(project_id = %id, new_owner = %payload.user_id, "ownership transferred");
    Ok(StatusCode::NO_CONTENT)
}

#[instrument(skip(state, user, multipart))]
async fn upload_attachment(
    State(state): State<AppState>,
    user: AuthUser,
    Path(id): Path<Uuid>,
    mut multipart: Multipart,
) -> Result<Json<UploadResponse>, ApiError> {
    let (project, _) = load_project(&state, id, user.id).await?;
    if !access::can_write_project(user.id, &project) {
        return Err(ApiError::forbidden(
            "Only the project owner can upload files",
        ));
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

    let path = state.storage.store(&format!("projects/{safe}"), data).await?;
    if let Err(e) = repo::set_attachment(&state.db, id, &path).await {
        if let Err(del) = state.storage.delete(&path).await {
            warn!(path = %path, error = %del, "failed to remove orphaned upload");
        }
        return Err(e.into());
    }
    if let Some(old) = project.attachment_path.as_deref() {
        if let Err(e) = state.storage.delete(old).await {
            warn!(path = %old, error = %e, "failed to remove replaced attachment");
        }
    }
    info!(project_id = %id, path = %path, "project attachment stored");
    Ok(Json(UploadResponse { file_path: path }))
}
