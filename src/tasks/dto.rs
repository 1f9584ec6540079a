use serde::{Deserialize, Deserializer, Serialize};
use time::{Date, OffsetDateTime};
use uuid::Uuid;

use crate::tasks::repo::{Task, TaskPriority, TaskStatus};

/// Query filters for the personal task list. `project_id=null` selects
/// tasks that have no project.
#[derive(Debug, Default, Deserialize)]
pub struct TaskQuery {
    pub status: Option<TaskStatus>,
    pub priority: Option<TaskPriority>,
    #[serde(default, deserialize_with = "project_filter")]
    pub project_id: Option<Option<Uuid>>,
}

fn project_filter<'de, D>(deserializer: D) -> Result<Option<Option<Uuid>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = Option::<String>::deserialize(deserializer)?;
    match raw.as_deref() {
        None | Some("") => Ok(None),
        Some("null") => Ok(Some(None)),
        Some(s) => s
            .parse::<Uuid>()
            .map(|id| Some(Some(id)))
            .map_err(serde::de::Error::custom),
    }
}

#[derive(Debug, Deserialize)]
pub struct CreateTaskRequest {
    pub project_id: Option<Uuid>,
    pub title: String,
    pub description: Option<String>,
    pub due_date: Date,
    pub priority: TaskPriority,
    pub status: Option<TaskStatus>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UpdateTaskRequest {
    pub title: Option<String>,
    pub description: Option<String>,
    pub due_date: Option<Date>,
    pub priority: Option<TaskPriority>,
    pub status: Option<TaskStatus>,
}

impl UpdateTaskRequest {
    pub fn is_empty(&self) -> bool {
        self.title.is_none()
            && self.description.is_none()
            && self.due_date.is_none()
            && self.priority.is_none()
            && self.status.is_none()
    }
}

/// Applies a patch in memory, stamping or clearing `completed_at` on the
/// status transitions so the invariant (set iff completed) always holds.
pub fn apply_changes(task: &mut Task, changes: &UpdateTaskRequest, now: OffsetDateTime) {
    if let Some(title) = &changes.title {
        task.title = title.clone();
    }
    if let Some(description) = &changes.description {
        task.description = Some(description.clone());
    }
    if let Some(due_date) = changes.due_date {
        task.due_date = due_date;
    }
    if let Some(priority) = changes.priority {
        task.priority = priority;
    }
    if let Some(status) = changes.status {
        if status == TaskStatus::Completed && task.status != TaskStatus::Completed {
            task.completed_at = Some(now);
        } else if status != TaskStatus::Completed {
            task.completed_at = None;
        }
        task.status = status;
    }
}

#[derive(Debug, Serialize)]
pub struct UploadResponse {
    pub file_path: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use time::macros::date;

    fn pending_task() -> Task {
        Task {
            id: Uuid::new_v4(),
            project_id: None,
            user_id: Uuid::new_v4(),
            title: "Write report".into(),
            description: None,
            due_date: date!(2026 - 03 - 01),
            priority: TaskPriority::Medium,
            status: TaskStatus::Pending,
            completed_at: None,
            attachment_path: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn completing_stamps_completed_at() {
        let mut task = pending_task();
        let now = OffsetDateTime::now_utc();
        apply_changes(
            &mut task,
            &UpdateTaskRequest {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            now,
        );
        assert_eq!(task.status, TaskStatus::Completed);
        assert_eq!(task.completed_at, Some(now));
    }

    #[test]
    fn reopening_clears_completed_at() {
        let mut task = pending_task();
        let now = OffsetDateTime::now_utc();
        task.status = TaskStatus::Completed;
        task.completed_at = Some(now);
        apply_changes(
            &mut task,
            &UpdateTaskRequest {
                status: Some(TaskStatus::InProgress),
                ..Default::default()
            },
            now,
        );
        assert_eq!(task.status, TaskStatus::InProgress);
        assert_eq!(task.completed_at, None);
    }

    #[test]
    fn completing_twice_keeps_the_original_stamp() {
        let mut task = pending_task();
        let first = OffsetDateTime::now_utc();
        apply_changes(
            &mut task,
            &UpdateTaskRequest {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            first,
        );
        let later = first + time::Duration::hours(1);
        apply_changes(
            &mut task,
            &UpdateTaskRequest {
                status: Some(TaskStatus::Completed),
                ..Default::default()
            },
            later,
        );
        assert_eq!(task.completed_at, Some(first));
    }

    #[test]
    fn field_edits_leave_status_alone() {
        let mut task = pending_task();
        apply_changes(
            &mut task,
            &UpdateTaskRequest {
                title: Some("New title".into()),
                priority: Some(TaskPriority::High),
                ..Default::default()
            },
            OffsetDateTime::now_utc(),
        );
        assert_eq!(task.title, "New title");
        assert_eq!(task.priority, TaskPriority::High);
        assert_eq!(task.status, TaskStatus::Pending);
        assert_eq!(task.completed_at, None);
    }
}
