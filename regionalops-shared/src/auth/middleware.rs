/// Request authentication against Supabase Auth
///
/// Resolves the `Authorization: Bearer <token>` header of a request into an
/// [`AuthContext`]: the Supabase auth user, the caller's member profile and
/// the token itself (used to scope database calls so row-level security
/// applies).
///
/// # Flow
///
/// 1. Extract the bearer token
/// 2. If a JWT secret is configured, verify it locally (signature, expiry,
///    audience) and reject early
/// 3. Resolve the user through `GET /auth/v1/user`
/// 4. Load the member linked to the user and reject inactive members
///
/// # Example
///
/// ```
/// use axum::Extension;
/// use regionalops_shared::auth::middleware::AuthContext;
///
/// async fn handler(Extension(auth): Extension<AuthContext>) -> String {
///     format!("User: {}, role: {}", auth.user_id(), auth.role())
/// }
/// ```

use axum::http::{header, HeaderMap};
use uuid::Uuid;

use super::jwt::{validate_token, JwtError};
use crate::models::member::{Member, UserRole};
use crate::supabase::auth::AuthUser;
use crate::supabase::{Scope, SupabaseClient, SupabaseError};

/// Authentication context added to request extensions
#[derive(Debug, Clone)]
pub struct AuthContext {
    /// Auth user as returned by Supabase
    pub user: AuthUser,

    /// Member profile of the user
    pub member: Member,

    /// Raw access token
    pub token: String,
}

impl AuthContext {
    pub fn new(user: AuthUser, member: Member, token: String) -> Self {
        Self { user, member, token }
    }

    /// Auth user ID
    pub fn user_id(&self) -> Uuid {
        self.user.id
    }

    /// Member ID of the caller
    pub fn member_id(&self) -> Uuid {
        self.member.id
    }

    pub fn role(&self) -> UserRole {
        self.member.role
    }

    /// Regional of the caller's member profile
    pub fn regional(&self) -> Option<&str> {
        self.member
            .regional
            .as_deref()
            .map(str::trim)
            .filter(|r| !r.is_empty())
    }

    pub fn is_admin(&self) -> bool {
        self.member.role == UserRole::Admin
    }

    /// Database scope carrying the caller's token
    pub fn scope(&self) -> Scope {
        Scope::User(self.token.clone())
    }
}

/// Error type for request authentication
#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    /// Missing authorization header
    #[error("Missing credentials")]
    MissingCredentials,

    /// Invalid authorization header format
    #[error("{0}")]
    InvalidFormat(String),

    /// Token rejected locally or by Supabase
    #[error("{0}")]
    InvalidToken(String),

    /// Authenticated user has no member profile
    #[error("No member profile for this user")]
    MemberNotFound,

    /// Member profile is deactivated
    #[error("Member is inactive")]
    MemberInactive,

    /// Supabase could not be reached or failed
    #[error(transparent)]
    Upstream(#[from] SupabaseError),
}

/// Extracts the bearer token from request headers
pub fn bearer_token(headers: &HeaderMap) -> Result<&str, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .ok_or(AuthError::MissingCredentials)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .or_else(|| auth_header.strip_prefix("bearer "))
        .map(str::trim)
        .ok_or_else(|| AuthError::InvalidFormat("Expected Bearer token".to_string()))?;

    if token.is_empty() {
        return Err(AuthError::MissingCredentials);
    }

    Ok(token)
}

/// Resolves an access token into an [`AuthContext`]
pub async fn authenticate(client: &SupabaseClient, token: &str) -> Result<AuthContext, AuthError> {
    if let Some(secret) = client.config().jwt_secret.as_deref() {
        validate_token(token, secret).map_err(|e| match e {
            JwtError::Expired => AuthError::InvalidToken("Token expired".to_string()),
            JwtError::InvalidAudience => AuthError::InvalidToken("Invalid audience".to_string()),
            _ => AuthError::InvalidToken(format!("Invalid token: {}", e)),
        })?;
    }

    let user = client.get_user(token).await.map_err(|e| match e.status() {
        Some(401) | Some(403) => AuthError::InvalidToken("Invalid or expired session".to_string()),
        _ => AuthError::Upstream(e),
    })?;

    let scope = client.preferred_scope(token);
    let member = Member::find_by_auth_user_id(client, &scope, user.id)
        .await?
        .ok_or(AuthError::MemberNotFound)?;

    if !member.ativo {
        tracing::info!(user_id = %user.id, member_id = %member.id, "Inactive member rejected");
        return Err(AuthError::MemberInactive);
    }

    tracing::debug!(user_id = %user.id, member_id = %member.id, role = %member.role, "Request authenticated");

    Ok(AuthContext::new(user, member, token.to_string()))
}
