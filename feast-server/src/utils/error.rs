//! 统一错误处理
//!
//! [`AppError`] 是 HTTP 层的错误枚举，`IntoResponse` 将其映射为状态码和
//! [`ErrorBody`]：
//!
//! ```json
//! { "success": false, "error": "Cart not found", "code": "not_found" }
//! ```
//!
//! | 分类 | 状态码 | code |
//! |------|--------|------|
//! | 未登录 / 令牌错误 / 凭证错误 | 401 | unauthorized, token_expired, invalid_token, invalid_credentials |
//! | 资源不存在 | 404 | not_found |
//! | 冲突 (已结账、邮箱占用、并发) | 409 | conflict |
//! | 验证失败 | 400 | validation |
//! | 系统错误 | 500 | database, internal |

use axum::{
    Json,
    extract::rejection::JsonRejection,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use shared::{CartError, ErrorBody};
use tracing::error;

use crate::carts::{MutationError, StorageError};
use crate::catalog::CatalogError;
use crate::utils::validation::FieldError;

/// 应用错误枚举
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    // ========== 认证错误 (401) ==========
    #[error("Authentication required")]
    /// 未登录 (401)
    Unauthorized,

    #[error("Token expired")]
    /// 令牌过期 (401)
    TokenExpired,

    #[error("Invalid token: {0}")]
    /// 无效令牌 (401)
    InvalidToken(String),

    #[error("Invalid email or password")]
    /// 登录凭证错误 (401)，不区分用户不存在与密码错误
    InvalidCredentials,

    // ========== 业务逻辑错误 (4xx) ==========
    #[error("{0}")]
    /// 资源不存在 (404)
    NotFound(String),

    #[error("{0}")]
    /// 资源冲突 (409)
    Conflict(String),

    #[error("{0}")]
    /// 验证失败 (400)
    Validation(String),

    // ========== 系统错误 (5xx) ==========
    #[error("Database error: {0}")]
    /// 数据库错误 (500)
    Database(String),

    #[error("Internal server error: {0}")]
    /// 内部错误 (500)
    Internal(String),
}

impl AppError {
    pub fn unauthorized() -> Self {
        Self::Unauthorized
    }

    pub fn token_expired() -> Self {
        Self::TokenExpired
    }

    pub fn invalid_token(msg: impl Into<String>) -> Self {
        Self::InvalidToken(msg.into())
    }

    pub fn invalid_credentials() -> Self {
        Self::InvalidCredentials
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::NotFound(msg.into())
    }

    pub fn conflict(msg: impl Into<String>) -> Self {
        Self::Conflict(msg.into())
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::Validation(msg.into())
    }

    pub fn database(msg: impl Into<String>) -> Self {
        Self::Database(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    pub fn status(&self) -> StatusCode {
        match self {
            AppError::Unauthorized
            | AppError::TokenExpired
            | AppError::InvalidToken(_)
            | AppError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
            AppError::Validation(_) => StatusCode::BAD_REQUEST,
            AppError::Database(_) | AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error kind carried in `ErrorBody.code`
    pub fn code(&self) -> &'static str {
        match self {
            AppError::Unauthorized => "unauthorized",
            AppError::TokenExpired => "token_expired",
            AppError::InvalidToken(_) => "invalid_token",
            AppError::InvalidCredentials => "invalid_credentials",
            AppError::NotFound(_) => "not_found",
            AppError::Conflict(_) => "conflict",
            AppError::Validation(_) => "validation",
            AppError::Database(_) => "database",
            AppError::Internal(_) => "internal",
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let message = match &self {
            AppError::Unauthorized => "Please login first".to_string(),
            AppError::TokenExpired => "Token expired".to_string(),
            AppError::InvalidToken(_) => "Invalid token".to_string(),
            AppError::InvalidCredentials => self.to_string(),
            AppError::NotFound(msg) | AppError::Conflict(msg) | AppError::Validation(msg) => {
                msg.clone()
            }
            AppError::Database(msg) => {
                error!(target: "database", error = %msg, "Database error occurred");
                "Database error".to_string()
            }
            AppError::Internal(msg) => {
                error!(target: "internal", error = %msg, "Internal error occurred");
                "Internal server error".to_string()
            }
        };

        (self.status(), Json(ErrorBody::new(self.code(), message))).into_response()
    }
}

// ========== Conversions ==========

impl From<StorageError> for AppError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::UserNotFound(_) => AppError::not_found("User not found"),
            StorageError::EmailTaken(_) => AppError::conflict("Email is already registered"),
            StorageError::VersionConflict { .. } => {
                AppError::conflict("Cart was modified concurrently, retry")
            }
            other => AppError::Database(other.to_string()),
        }
    }
}

impl From<MutationError> for AppError {
    fn from(e: MutationError) -> Self {
        match e {
            MutationError::NotFound(msg) => AppError::NotFound(msg),
            MutationError::Conflict(msg) => AppError::Conflict(msg),
            MutationError::Validation(msg) => AppError::Validation(msg),
            MutationError::Storage(e) => e.into(),
        }
    }
}

impl From<CartError> for AppError {
    fn from(e: CartError) -> Self {
        MutationError::from(e).into()
    }
}

impl From<CatalogError> for AppError {
    fn from(e: CatalogError) -> Self {
        MutationError::from(e).into()
    }
}

impl From<FieldError> for AppError {
    fn from(e: FieldError) -> Self {
        AppError::Validation(e.0)
    }
}

impl From<JsonRejection> for AppError {
    fn from(rejection: JsonRejection) -> Self {
        AppError::Validation(rejection.body_text())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use http_body_util::BodyExt;

    async fn body_of(err: AppError) -> (StatusCode, ErrorBody) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[tokio::test]
    async fn status_and_body_shape() {
        let (status, body) = body_of(AppError::not_found("Cart not found")).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert!(!body.success);
        assert_eq!(body.code, "not_found");
        assert_eq!(body.error, "Cart not found");

        let (status, body) = body_of(AppError::Unauthorized).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body.code, "unauthorized");
    }

    #[tokio::test]
    async fn system_errors_hide_details() {
        let (status, body) = body_of(AppError::database("redb exploded at page 7")).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body.error, "Database error");
        assert!(!body.error.contains("page 7"));
    }

    #[test]
    fn mutation_errors_map_to_statuses() {
        let cases = [
            (MutationError::NotFound("x".into()), StatusCode::NOT_FOUND),
            (MutationError::Conflict("x".into()), StatusCode::CONFLICT),
            (MutationError::Validation("x".into()), StatusCode::BAD_REQUEST),
        ];
        for (err, status) in cases {
            assert_eq!(AppError::from(err).status(), status);
        }

        let conflict = StorageError::VersionConflict {
            user_id: "u".into(),
            expected: 1,
            actual: 2,
        };
        assert_eq!(AppError::from(conflict).status(), StatusCode::CONFLICT);
        assert_eq!(
            AppError::from(CartError::CheckedOut("c".into())).status(),
            StatusCode::CONFLICT
        );
    }
}
