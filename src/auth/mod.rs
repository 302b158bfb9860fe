use crate::state::AppState;
use axum::Router;

mod dto;
pub mod handlers;
pub mod password;
pub mod policy;
pub mod repo;
pub mod token;

pub fn router() -> Router<AppState> {
    handlers::routes()
}
