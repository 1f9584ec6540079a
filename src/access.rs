//! Authorization rules over projects and tasks.
//!
//! Every function here is a pure decision over rows the caller already
//! fetched; no I/O happens in this module. Handlers surface a `false` as a
//! 403 with an explicit message.
//!
//! The model: the project owner (projects.owner_id) has exclusive write
//! authority; membership rows grant read access plus the broad-write task
//! policy — any member may edit or complete any task in a shared project.
//! Deleting a task stays with its assignee alone.

use uuid::Uuid;

use crate::projects::repo::{Project, ProjectMember};
use crate::tasks::repo::Task;

pub fn can_read_project(caller: Uuid, project: &Project, membership: Option<&ProjectMember>) -> bool {
    caller == project.owner_id
        || membership.is_some_and(|m| m.project_id == project.id && m.user_id == caller)
}

/// Edit, delete, membership changes and file upload are owner-only.
pub fn can_write_project(caller: Uuid, project: &Project) -> bool {
    caller == project.owner_id
}

pub fn can_read_task(
    caller: Uuid,
    task: &Task,
    project: Option<&Project>,
    membership: Option<&ProjectMember>,
) -> bool {
    if caller == task.user_id {
        return true;
    }
    match (task.project_id, project) {
        (Some(project_id), Some(p)) if p.id == project_id => {
            can_read_project(caller, p, membership)
        }
        _ => false,
    }
}

/// Deliberately the same predicate as reading: anyone who can see a task in
/// a shared project may update it.
pub fn can_update_task(
    caller: Uuid,
    task: &Task,
    project: Option<&Project>,
    membership: Option<&ProjectMember>,
) -> bool {
    can_read_task(caller, task, project, membership)
}

/// Stricter than update: only the assignee may delete.
pub fn can_delete_task(caller: Uuid, task: &Task) -> bool {
    caller == task.user_id
}

/// The owner may remove members, but never themself — a project must keep
/// its owner for as long as it exists.
pub fn can_remove_member(caller: Uuid, project: &Project, target: Uuid) -> bool {
    caller == project.owner_id && target != project.owner_id
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::projects::repo::ProjectRole;
    use crate::tasks::repo::{TaskPriority, TaskStatus};
    use time::macros::date;
    use time::OffsetDateTime;

    fn project(id: Uuid, owner: Uuid) -> Project {
        Project {
            id,
            owner_id: owner,
            title: "Launch".into(),
            description: None,
            start_date: date!(2026 - 01 - 01),
            end_date: date!(2026 - 06 - 30),
            attachment_path: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    fn member_row(project_id: Uuid, user_id: Uuid) -> ProjectMember {
        ProjectMember {
            project_id,
            user_id,
            role: ProjectRole::Member,
            added_at: OffsetDateTime::now_utc(),
        }
    }

    fn task(id: Uuid, project_id: Option<Uuid>, assignee: Uuid) -> Task {
        Task {
            id,
            project_id,
            user_id: assignee,
            title: "Ship it".into(),
            description: None,
            due_date: date!(2026 - 03 - 01),
            priority: TaskPriority::High,
            status: TaskStatus::Pending,
            completed_at: None,
            attachment_path: None,
            created_at: OffsetDateTime::now_utc(),
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    #[test]
    fn member_reads_but_owner_writes() {
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let p = project(Uuid::new_v4(), owner);
        let m = member_row(p.id, member);

        assert!(can_read_project(member, &p, Some(&m)));
        assert!(!can_write_project(member, &p));
        assert!(can_read_project(owner, &p, None));
        assert!(can_write_project(owner, &p));
    }

    #[test]
    fn outsider_has_no_access() {
        let p = project(Uuid::new_v4(), Uuid::new_v4());
        let outsider = Uuid::new_v4();
        assert!(!can_read_project(outsider, &p, None));
        assert!(!can_write_project(outsider, &p));
    }

    #[test]
    fn membership_row_for_another_project_does_not_grant_access() {
        let caller = Uuid::new_v4();
        let p = project(Uuid::new_v4(), Uuid::new_v4());
        let other = member_row(Uuid::new_v4(), caller);
        assert!(!can_read_project(caller, &p, Some(&other)));
    }

    #[test]
    fn write_implies_read() {
        let users = [Uuid::new_v4(), Uuid::new_v4(), Uuid::new_v4()];
        let p = project(Uuid::new_v4(), users[0]);
        for u in users {
            if can_write_project(u, &p) {
                assert!(can_read_project(u, &p, None));
            }
        }
    }

    #[test]
    fn outsider_cannot_read_project_task() {
        let owner = Uuid::new_v4();
        let assignee = Uuid::new_v4();
        let outsider = Uuid::new_v4();
        let p = project(Uuid::new_v4(), owner);
        let t = task(Uuid::new_v4(), Some(p.id), assignee);

        assert!(!can_read_task(outsider, &t, Some(&p), None));
        assert!(!can_update_task(outsider, &t, Some(&p), None));
        assert!(can_read_task(assignee, &t, None, None));
        assert!(can_read_task(owner, &t, Some(&p), None));
    }

    #[test]
    fn member_updates_but_cannot_delete_someone_elses_task() {
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let p = project(Uuid::new_v4(), owner);
        let m = member_row(p.id, member);
        let t = task(Uuid::new_v4(), Some(p.id), owner);

        assert!(can_update_task(member, &t, Some(&p), Some(&m)));
        assert!(!can_delete_task(member, &t));
        assert!(can_delete_task(owner, &t));
    }

    #[test]
    fn personal_task_is_private_to_its_assignee() {
        let assignee = Uuid::new_v4();
        let t = task(Uuid::new_v4(), None, assignee);
        assert!(can_read_task(assignee, &t, None, None));
        assert!(!can_read_task(Uuid::new_v4(), &t, None, None));
    }

    #[test]
    fn owner_can_never_be_removed() {
        let owner = Uuid::new_v4();
        let member = Uuid::new_v4();
        let p = project(Uuid::new_v4(), owner);

        assert!(can_remove_member(owner, &p, member));
        // not even by themself
        assert!(!can_remove_member(owner, &p, owner));
        assert!(!can_remove_member(member, &p, member));
        assert!(!can_remove_member(member, &p, owner));
    }
}
