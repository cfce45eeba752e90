/// Authentication endpoints
///
/// Credentials and sessions are owned by Supabase Auth; these handlers relay
/// them and attach the caller's member profile.
///
/// # Endpoints
///
/// - `POST /auth/login` - Sign in with e-mail and password
/// - `POST /auth/refresh` - Exchange a refresh token for a new session
/// - `POST /auth/forgot-password` - Send a password-reset e-mail
/// - `POST /auth/logout` - Revoke the current session
/// - `GET  /auth/me` - Current user and member profile
/// - `PUT  /auth/me/password` - Change own password

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::Payload,
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use regionalops_shared::{
    auth::{middleware::AuthContext, password},
    models::member::Member,
    supabase::auth::{AuthUser, Session},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use validator::Validate;

/// Path of the SPA page that reset e-mails link to
const RESET_PASSWORD_PATH: &str = "/reset-password";

/// Login request
#[derive(Debug, Deserialize, Validate)]
pub struct LoginRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    #[validate(length(min = 1, message = "Password is required"))]
    pub password: String,
}

/// Login response
#[derive(Debug, Serialize)]
pub struct LoginResponse {
    pub user: AuthUser,
    pub member: Member,
    pub session: Session,
}

/// Refresh token request
#[derive(Debug, Deserialize, Validate)]
pub struct RefreshRequest {
    #[validate(length(min = 1, message = "Refresh token is required"))]
    pub refresh_token: String,
}

#[derive(Debug, Serialize)]
pub struct RefreshResponse {
    pub session: Session,
}

#[derive(Debug, Deserialize, Validate)]
pub struct ForgotPasswordRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,
}

/// New password for the caller
#[derive(Debug, Deserialize, Validate)]
pub struct ChangePasswordRequest {
    pub password: String,
}

/// Current user
#[derive(Debug, Serialize)]
pub struct MeResponse {
    pub user: AuthUser,
    pub member: Member,
}

/// Where password-reset e-mails should land, if the SPA URL is known
pub(crate) fn reset_redirect(state: &AppState) -> Option<String> {
    state
        .config
        .api
        .frontend_url
        .as_deref()
        .map(|base| format!("{}{}", base, RESET_PASSWORD_PATH))
}

/// Sign in
///
/// # Endpoint
///
/// ```text
/// POST /auth/login
/// Content-Type: application/json
///
/// { "email": "ana@example.org", "password": "senha2024" }
/// ```
///
/// # Response
///
/// ```json
/// { "data": { "user": { ... }, "member": { ... }, "session": { "access_token": "...", ... } } }
/// ```
///
/// # Errors
///
/// - `400 invalid_payload`: Malformed request
/// - `401 invalid_credentials`: Wrong e-mail or password
/// - `403 member_not_found`: Account has no member profile
/// - `403 member_inactive`: Member profile is deactivated
pub async fn login(
    State(state): State<AppState>,
    payload: Payload,
) -> ApiResult<ApiResponse<LoginResponse>> {
    let req: LoginRequest = payload.parse(&[])?;

    let session = state
        .supabase
        .sign_in_with_password(&req.email, &req.password)
        .await
        .map_err(|e| match e.status() {
            Some(400) | Some(401) => {
                tracing::info!(email = %req.email, "Login rejected");
                ApiError::InvalidCredentials
            }
            _ => ApiError::from(e),
        })?;

    let scope = state.supabase.preferred_scope(&session.access_token);
    let member = Member::find_by_auth_user_id(&state.supabase, &scope, session.user.id)
        .await?
        .ok_or_else(|| ApiError::Forbidden {
            code: "member_not_found",
            message: "No member profile is linked to this user".to_string(),
        })?;

    if !member.ativo {
        return Err(ApiError::Forbidden {
            code: "member_inactive",
            message: "Member is inactive".to_string(),
        });
    }

    tracing::info!(user_id = %session.user.id, member_id = %member.id, "User logged in");

    Ok(ApiResponse::success(LoginResponse {
        user: session.user.clone(),
        member,
        session,
    }))
}

/// Refresh session
///
/// # Errors
///
/// - `401 unauthorized`: Refresh token invalid, expired or already used
pub async fn refresh(
    State(state): State<AppState>,
    payload: Payload,
) -> ApiResult<ApiResponse<RefreshResponse>> {
    let req: RefreshRequest = payload.parse(&[])?;

    let session = state
        .supabase
        .refresh_session(&req.refresh_token)
        .await
        .map_err(|e| match e.status() {
            Some(400) | Some(401) => ApiError::Unauthorized("Invalid refresh token".to_string()),
            _ => ApiError::from(e),
        })?;

    Ok(ApiResponse::success(RefreshResponse { session }))
}

/// Request a password-reset e-mail
///
/// Answers `200` whether or not the address belongs to an account.
pub async fn forgot_password(
    State(state): State<AppState>,
    payload: Payload,
) -> ApiResult<ApiResponse<Value>> {
    let req: ForgotPasswordRequest = payload.parse(&[])?;

    let redirect = reset_redirect(&state);
    if let Err(e) = state.supabase.recover(&req.email, redirect.as_deref()).await {
        tracing::warn!(error = %e, "Password recovery request failed");
    }

    Ok(ApiResponse::success(json!({
        "message": "If the address is registered, a reset link has been sent"
    })))
}

/// Sign out
pub async fn logout(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
) -> ApiResult<ApiResponse<Value>> {
    match state.supabase.sign_out(&auth.token).await {
        Ok(()) => {}
        // Session already gone
        Err(e) if matches!(e.status(), Some(401) | Some(403) | Some(404)) => {}
        Err(e) => return Err(e.into()),
    }

    tracing::info!(user_id = %auth.user_id(), "User logged out");

    Ok(ApiResponse::success(json!({ "message": "Logged out" })))
}

/// Current user and member profile
pub async fn me(Extension(auth): Extension<AuthContext>) -> ApiResponse<MeResponse> {
    ApiResponse::success(MeResponse {
        user: auth.user,
        member: auth.member,
    })
}

/// Change own password
///
/// # Errors
///
/// - `400 invalid_payload`: Password too weak
pub async fn change_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Payload,
) -> ApiResult<ApiResponse<Value>> {
    let req: ChangePasswordRequest = payload.parse(&[])?;

    password::validate_password_strength(&req.password)
        .map_err(|msg| ApiError::invalid_field("password", msg))?;

    state
        .supabase
        .update_user_password(&auth.token, &req.password)
        .await?;

    tracing::info!(user_id = %auth.user_id(), "Password changed");

    Ok(ApiResponse::success(json!({ "message": "Password updated" })))
}
