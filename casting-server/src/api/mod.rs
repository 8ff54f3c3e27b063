pub(crate) mod actors;
mod guard;
pub(crate) mod health;
pub(crate) mod movies;

use crate::state::AppState;
use axum::Router;

/// Combines all API routes into a single router
pub(super) fn router() -> Router<AppState> {
    Router::new()
        .merge(health::router())
        .merge(actors::router())
        .merge(movies::router())
}
