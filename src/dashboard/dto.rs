use serde::Serialize;

use crate::tasks::repo::Task;

#[derive(Debug, Serialize)]
pub struct DashboardSummary {
    pub pending_count: i64,
    pub overdue_count: i64,
    pub pending_tasks: Vec<Task>,
    pub overdue_tasks: Vec<Task>,
}

#[derive(Debug, Serialize)]
pub struct TaskTotals {
    pub total: i64,
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
    pub overdue: i64,
    pub completion_rate: f64,
}

#[derive(Debug, Serialize)]
pub struct ProjectTotals {
    pub owned: i64,
    pub total: i64,
}

#[derive(Debug, Serialize)]
pub struct Distribution {
    pub high: i64,
    pub medium: i64,
    pub low: i64,
}

#[derive(Debug, Serialize)]
pub struct StatusDistribution {
    pub pending: i64,
    pub in_progress: i64,
    pub completed: i64,
}

#[derive(Debug, Serialize)]
pub struct DashboardStats {
    pub tasks: TaskTotals,
    pub projects: ProjectTotals,
    pub priority_distribution: Distribution,
    pub status_distribution: StatusDistribution,
}

/// Completion percentage rounded to two decimals; zero tasks means zero.
pub fn completion_rate(completed: i64, total: i64) -> f64 {
    if total == 0 {
        return 0.0;
    }
    ((completed as f64 / total as f64) * 10_000.0).round() / 100.0
}
