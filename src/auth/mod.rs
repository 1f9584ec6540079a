use crate::state::AppState;
use axum::Router;

pub mod claims;
pub mod cookies;
mod dto;
pub mod extractors;
pub mod handlers;
pub mod password;
pub mod repo;
pub mod token;

pub fn public_router() -> Router<AppState> {
    handlers::public_routes()
}

pub fn router() -> Router<AppState> {
    handlers::protected_routes()
}
