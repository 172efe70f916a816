//! Cart API Handlers

use axum::{
    Json,
    extract::{Path, State},
};
use shared::{AddItemRequest, CartResponse, CartsResponse, UpdateQuantityRequest};

use crate::api::{ApiJson, AppResult};
use crate::auth::CurrentUser;
use crate::core::ServerState;

/// GET /api/v1/carts - 活跃购物车
pub async fn list_active(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<CartsResponse>> {
    let carts = state.carts.list_active_carts(&user.id)?;
    Ok(Json(CartsResponse::ok(carts)))
}

/// GET /api/v1/carts/history - 已结账购物车 (新的在前)
pub async fn list_history(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<CartsResponse>> {
    let carts = state.carts.list_cart_history(&user.id)?;
    Ok(Json(CartsResponse::ok(carts)))
}

/// POST /api/v1/carts/{restaurant_id}/items
pub async fn add_item(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(restaurant_id): Path<String>,
    ApiJson(req): ApiJson<AddItemRequest>,
) -> AppResult<Json<CartResponse>> {
    let cart = state.carts.add_item(&user.id, &restaurant_id, req)?;
    Ok(Json(CartResponse::ok(cart)))
}

/// PUT /api/v1/carts/{cart}/items/{item_id}
pub async fn update_item(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((cart, item_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<UpdateQuantityRequest>,
) -> AppResult<Json<CartResponse>> {
    let cart = state
        .carts
        .update_item_quantity(&user.id, &cart, &item_id, req.quantity)?;
    Ok(Json(CartResponse::ok(cart)))
}

/// DELETE /api/v1/carts/{cart}/items/{item_id}
pub async fn remove_item(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path((cart, item_id)): Path<(String, String)>,
) -> AppResult<Json<CartResponse>> {
    let cart = state.carts.remove_item(&user.id, &cart, &item_id)?;
    Ok(Json(CartResponse::ok(cart)))
}

/// DELETE /api/v1/cart/items/{item_id} - 在所有活跃购物车中查找该条目
pub async fn remove_item_anywhere(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(item_id): Path<String>,
) -> AppResult<Json<CartResponse>> {
    let cart = state.carts.remove_item_anywhere(&user.id, &item_id)?;
    Ok(Json(CartResponse::ok(cart)))
}

/// POST /api/v1/carts/{cart}/checkout
pub async fn checkout(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(cart): Path<String>,
) -> AppResult<Json<CartResponse>> {
    let cart = state.carts.checkout(&user.id, &cart)?;
    Ok(Json(CartResponse::ok(cart)))
}

/// DELETE /api/v1/carts/{cart}/clear
pub async fn clear(
    State(state): State<ServerState>,
    user: CurrentUser,
    Path(cart): Path<String>,
) -> AppResult<Json<CartResponse>> {
    let cart = state.carts.clear_cart(&user.id, &cart)?;
    Ok(Json(CartResponse::ok(cart)))
}
