//! API 路由模块
//!
//! # 结构
//!
//! - [`health`] - 健康检查
//! - [`auth`] - 注册、登录、当前用户
//! - [`carts`] - 购物车接口
//!
//! [`build_app`] 同时用于 HTTP 服务器和集成测试 (`oneshot`)。

pub mod auth;
pub mod carts;
pub mod extract;
pub mod health;

use std::time::Duration;

use axum::Router;
use http::{HeaderName, HeaderValue, StatusCode};
use tower_http::cors::CorsLayer;
use tower_http::request_id::{MakeRequestId, PropagateRequestIdLayer, RequestId, SetRequestIdLayer};
use tower_http::timeout::TimeoutLayer;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::auth::require_auth;
use crate::core::ServerState;

pub use crate::utils::AppResult;
pub use extract::ApiJson;

const REQUEST_ID_HEADER: &str = "x-request-id";

/// Custom request ID generator
#[derive(Clone)]
struct XRequestId;

impl MakeRequestId for XRequestId {
    fn make_request_id<B>(&mut self, _request: &http::Request<B>) -> Option<RequestId> {
        HeaderValue::from_str(&Uuid::new_v4().to_string())
            .ok()
            .map(RequestId::new)
    }
}

/// Build a router with all routes registered (no middleware, no state)
pub fn build_router() -> Router<ServerState> {
    Router::new()
        // Health API - public route
        .merge(health::router())
        // Auth API - register/login public, me authenticated
        .merge(auth::router())
        // Cart API - authentication required
        .merge(carts::router())
}

/// Build a fully configured application with all middleware
pub fn build_app(state: &ServerState) -> Router<ServerState> {
    let request_id = HeaderName::from_static(REQUEST_ID_HEADER);

    build_router()
        // JWT authentication - injects CurrentUser
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_auth,
        ))
        // Per-request timeout (408)
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_millis(state.config.request_timeout_ms),
        ))
        // CORS - Handle cross-origin requests
        .layer(CorsLayer::permissive())
        // Trace - Request tracing span per request
        .layer(TraceLayer::new_for_http())
        // Propagate request ID to response
        .layer(PropagateRequestIdLayer::new(request_id.clone()))
        // Request ID - Generate unique ID for each request (outermost)
        .layer(SetRequestIdLayer::new(request_id, XRequestId))
}
