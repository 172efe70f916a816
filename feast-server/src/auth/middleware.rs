//! 认证中间件
//!
//! 为 JWT 认证提供 Axum 中间件

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::Response,
};

use crate::AppError;
use crate::auth::extractor::authenticate;
use crate::core::ServerState;

/// 无需认证的 API 路径
const PUBLIC_API_ROUTES: &[&str] = &["/api/v1/auth/login", "/api/v1/auth/register"];

/// 认证中间件 - 要求用户登录
///
/// 从 `Authorization: Bearer <token>` 头提取并验证 JWT。
/// 验证成功后将 [`CurrentUser`](crate::auth::CurrentUser) 注入请求扩展。
///
/// # 跳过认证的路径
///
/// - `OPTIONS *` (CORS 预检)
/// - 非 `/api/` 路径 (`/health`，以及让未知路径正常返回 404)
/// - `/api/v1/auth/login`, `/api/v1/auth/register`
///
/// # 错误处理
///
/// | 错误 | HTTP 状态码 |
/// |------|------------|
/// | 无 Authorization 头 | 401 Unauthorized |
/// | 令牌过期 | 401 TokenExpired |
/// | 无效令牌 | 401 InvalidToken |
pub async fn require_auth(
    State(state): State<ServerState>,
    mut req: Request,
    next: Next,
) -> Result<Response, AppError> {
    let path = req.uri().path();

    if req.method() == http::Method::OPTIONS
        || !path.starts_with("/api/")
        || PUBLIC_API_ROUTES.contains(&path)
    {
        return Ok(next.run(req).await);
    }

    let auth_header = req
        .headers()
        .get(http::header::AUTHORIZATION)
        .and_then(|h| h.to_str().ok());

    let user = authenticate(&state.get_jwt_service(), auth_header, req.uri())?;
    req.extensions_mut().insert(user);
    Ok(next.run(req).await)
}
