//! Authentication Handlers
//!
//! Handles registration, login, and the current user lookup

use std::time::Duration;

use axum::{Json, extract::State, http::StatusCode};

use crate::AppError;
use crate::api::{ApiJson, AppResult};
use crate::auth::{CurrentUser, password};
use crate::carts::{StorageError, UserRecord};
use crate::core::ServerState;
use crate::security_log;
use crate::utils::validation::{
    MAX_NAME_LEN, MAX_SHORT_TEXT_LEN, validate_email, validate_optional_text, validate_password,
    validate_required_text,
};

use shared::client::{CurrentUserResponse, LoginRequest, LoginResponse, RegisterRequest};
use shared::response::MessageResponse;
use shared::util::now_millis;

/// Fixed delay for authentication to prevent timing attacks
const AUTH_FIXED_DELAY_MS: u64 = 250;

async fn hash_blocking(plain: String) -> AppResult<String> {
    tokio::task::spawn_blocking(move || password::hash_password(&plain))
        .await
        .map_err(|e| AppError::internal(format!("Hash task failed: {}", e)))?
        .map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))
}

async fn verify_blocking(plain: String, hash: String) -> AppResult<bool> {
    tokio::task::spawn_blocking(move || password::verify_password(&plain, &hash))
        .await
        .map_err(|e| AppError::internal(format!("Verify task failed: {}", e)))?
        .map_err(|e| AppError::internal(format!("Password verification failed: {}", e)))
}

/// Register handler
///
/// Creates a user with an empty cart set. 409 when the email is taken.
pub async fn register(
    State(state): State<ServerState>,
    ApiJson(req): ApiJson<RegisterRequest>,
) -> AppResult<(StatusCode, Json<MessageResponse>)> {
    validate_required_text(&req.name, "name", MAX_NAME_LEN)?;
    validate_email(&req.email)?;
    validate_password(&req.password)?;
    validate_optional_text(&req.phone_number, "phoneNumber", MAX_SHORT_TEXT_LEN)?;

    let hash = hash_blocking(req.password).await?;
    let user = UserRecord::new(&req.email, req.name.trim(), req.phone_number, hash);

    match state.storage.insert_user(&user) {
        Ok(()) => {}
        Err(StorageError::EmailTaken(email)) => {
            tracing::info!(email = %email, "Registration rejected - email taken");
            return Err(AppError::conflict("Email is already registered"));
        }
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %user.id, email = %user.email, "User registered");
    Ok((
        StatusCode::CREATED,
        Json(MessageResponse::ok("User registered successfully")),
    ))
}

/// Login handler
///
/// Authenticates user credentials and returns a JWT token
pub async fn login(
    State(state): State<ServerState>,
    ApiJson(req): ApiJson<LoginRequest>,
) -> AppResult<Json<LoginResponse>> {
    let user = state.storage.find_user_by_email(&req.email)?;

    // Fixed delay to prevent timing attacks (before checking result)
    tokio::time::sleep(Duration::from_millis(AUTH_FIXED_DELAY_MS)).await;

    // Unified error message to prevent email enumeration; unknown emails
    // still run one verification against the dummy hash
    let user = match user {
        Some(user) => {
            if !verify_blocking(req.password, user.password_hash.clone()).await? {
                security_log!("WARN", "login_failed", email = req.email.clone(), reason = "invalid_password");
                return Err(AppError::invalid_credentials());
            }
            user
        }
        None => {
            let dummy = password::dummy_hash()
                .map_err(|e| AppError::internal(format!("Password hashing failed: {}", e)))?;
            verify_blocking(req.password, dummy.to_string()).await?;
            security_log!("WARN", "login_failed", email = req.email.clone(), reason = "user_not_found");
            return Err(AppError::invalid_credentials());
        }
    };

    let token = state
        .get_jwt_service()
        .generate_token(&user.id, &user.email, user.role)
        .map_err(|e| AppError::internal(format!("Failed to generate token: {}", e)))?;

    record_login(&state, user.clone());

    tracing::info!(user_id = %user.id, email = %user.email, role = %user.role, "User logged in successfully");

    Ok(Json(LoginResponse {
        success: true,
        token,
        user: user.info(),
    }))
}

/// Best-effort `last_login` update; a concurrent cart write wins
fn record_login(state: &ServerState, mut user: UserRecord) {
    let now = now_millis();
    user.last_login = Some(now);
    user.updated_at = now;
    if let Err(e) = state.storage.save_user(user) {
        tracing::debug!(error = %e, "Skipped last_login update");
    }
}

/// Get current user info
pub async fn me(
    State(state): State<ServerState>,
    user: CurrentUser,
) -> AppResult<Json<CurrentUserResponse>> {
    let record = state.storage.require_user(&user.id)?;
    Ok(Json(CurrentUserResponse {
        success: true,
        user: record.info(),
    }))
}
