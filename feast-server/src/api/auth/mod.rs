//! Authentication Routes

mod handler;

use axum::{Router, routing::get, routing::post};

use crate::core::ServerState;

/// Build authentication router
/// - /api/v1/auth/register, /api/v1/auth/login: public (no auth required)
/// - /api/v1/auth/me: protected (auth middleware handled at Router level)
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/v1/auth/register", post(handler::register))
        .route("/api/v1/auth/login", post(handler::login))
        .route("/api/v1/auth/me", get(handler::me))
}
