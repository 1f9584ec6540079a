mod dto;
pub mod handlers;
pub mod repo;

use crate::config::AppConfig;
use crate::state::AppState;
use axum::Router;

pub fn router(config: &AppConfig) -> Router<AppState> {
    handlers::routes(config.upload.max_bytes)
}
