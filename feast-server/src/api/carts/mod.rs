//! Cart API Module
//!
//! The `{cart}` segment is a cart id or a restaurant id; see
//! [`CartService`](crate::carts::CartService) for the resolution rule.

mod handler;

use axum::{
    Router,
    routing::{delete, get, post, put},
};

use crate::core::ServerState;

/// Cart router (authentication handled by the global `require_auth`)
pub fn router() -> Router<ServerState> {
    Router::new()
        .route("/api/v1/carts", get(handler::list_active))
        .route("/api/v1/carts/history", get(handler::list_history))
        .route("/api/v1/carts/{cart}/items", post(handler::add_item))
        .route(
            "/api/v1/carts/{cart}/items/{item_id}",
            put(handler::update_item).delete(handler::remove_item),
        )
        .route("/api/v1/carts/{cart}/checkout", post(handler::checkout))
        .route("/api/v1/carts/{cart}/clear", delete(handler::clear))
        .route(
            "/api/v1/cart/items/{item_id}",
            delete(handler::remove_item_anywhere),
        )
}
