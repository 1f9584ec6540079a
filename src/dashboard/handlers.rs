use axum::{extract::State, routing::get, Json, Router};
use tracing::instrument;

use crate::auth::extractors::AuthUser;
use crate::dashboard::dto::{
    completion_rate, DashboardStats, DashboardSummary, Distribution, ProjectTotals,
    StatusDistribution, TaskTotals,
};
use crate::dashboard::repo;
use crate::error::ApiError;
use crate::state::AppState;

const SUMMARY_LIMIT: i64 = 5;

pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/dashboard/summary", get(summary))
        .route("/dashboard/stats", get(stats))
}

#[instrument(skip(state, user))]
async fn summary(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DashboardSummary>, ApiError> {
    let stats = repo::task_stats(&state.db, user.id).await?;
    let pending_tasks = repo::pending_tasks(&state.db, user.id, SUMMARY_LIMIT).await?;
    let overdue_tasks = repo::overdue_tasks(&state.db, user.id, SUMMARY_LIMIT).await?;

    Ok(Json(DashboardSummary {
        pending_count: stats.pending,
        overdue_count: stats.overdue,
        pending_tasks,
        overdue_tasks,
    }))
}

#[instrument(skip(state, user))]
async fn stats(
    State(state): State<AppState>,
    user: AuthUser,
) -> Result<Json<DashboardStats>, ApiError> {
    let task_stats = repo::task_stats(&state.db, user.id).await?;
    let (owned, total) = repo::project_counts(&state.db, user.id).await?;

    Ok(Json(DashboardStats {
        tasks: TaskTotals {
            total: task_stats.total,
            pending: task_stats.pending,
            in_progress: task_stats.in_progress,
            completed: task_stats.completed,
            overdue: task_stats.overdue,
            completion_rate: completion_rate(task_stats.completed, task_stats.total),
        },
        projects: ProjectTotals { owned, total },
        priority_distribution: Distribution {
            high: task_stats.high_priority,
            medium: task_stats.medium_priority,
            low: task_stats.low_priority,
        },
        status_distribution: StatusDistribution {
            pending: task_stats.pending,
            in_progress: task_stats.in_progress,
            completed: task_stats.completed,
        },
    }))
}
