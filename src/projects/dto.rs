use serde::{Deserialize, Serialize};
use time::Date;
use uuid::Uuid;

use crate::projects::repo::{MemberWithUser, Project, ProjectRole};

#[derive(Debug, Default, Deserialize)]
pub struct ProjectQuery {
    pub search: Option<String>,
    pub start_date_from: Option<Date>,
    pub end_date_to: Option<Date>,
}

#[derive(Debug, Deserialize)]
pub struct CreateProjectRequest {
    pub title: String,
    pub description: Option<String>,
    pub start_date: Date,
    pub end_date: Date,
}

#[derive(Debug, Deserialize)]
pub struct UpdateProjectRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub start_date: Option<Date>,
    pub end_date: Option<Date>,
}

#[derive(Debug, Deserialize)]
pub struct AddMemberRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Deserialize)]
pub struct TransferOwnershipRequest {
    pub user_id: Uuid,
}

#[derive(Debug, Serialize)]
pub struct ProjectDetails {
    #[serde(flatten)]
    pub project: Project,
    pub role: ProjectRole,
    pub members: Vec<MemberWithUser>,
    pub tasks_count: i64,
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_path: String,
}
