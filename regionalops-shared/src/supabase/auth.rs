/// Supabase Auth (GoTrue) operations
///
/// # Endpoints used
///
/// - `POST /auth/v1/token?grant_type=password` - sign in
/// - `POST /auth/v1/token?grant_type=refresh_token` - refresh session
/// - `POST /auth/v1/logout` - revoke the caller's session
/// - `GET  /auth/v1/user` - resolve an access token to a user
/// - `PUT  /auth/v1/user` - change the caller's own password
/// - `POST /auth/v1/recover` - send a password-reset e-mail
/// - `/auth/v1/admin/users[/:id]` - user administration (service role)

use super::client::{send_empty, send_json, Scope, SupabaseClient, SupabaseError};
use chrono::{DateTime, Utc};
use reqwest::Method;
use serde::{Deserialize, Serialize};
use serde_json::json;
use uuid::Uuid;

/// A user as reported by the auth provider
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthUser {
    pub id: Uuid,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub phone: Option<String>,

    /// Postgres role claimed by the user's tokens (`authenticated`)
    #[serde(default)]
    pub role: Option<String>,

    #[serde(default)]
    pub email_confirmed_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub last_sign_in_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub app_metadata: serde_json::Value,

    #[serde(default)]
    pub user_metadata: serde_json::Value,

    #[serde(default)]
    pub banned_until: Option<DateTime<Utc>>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Tokens returned by a successful sign-in or refresh
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub access_token: String,
    pub refresh_token: String,
    pub expires_in: i64,

    #[serde(default)]
    pub expires_at: Option<i64>,

    pub token_type: String,
    pub user: AuthUser,
}

/// Attributes for creating or updating a user through the admin API
///
/// Only non-None fields are sent.
#[derive(Debug, Clone, Default, Serialize)]
pub struct AdminUserAttributes {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub password: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email_confirm: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_metadata: Option<serde_json::Value>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub app_metadata: Option<serde_json::Value>,

    /// `"none"` lifts a ban, a duration such as `"876000h"` sets one
    #[serde(skip_serializing_if = "Option::is_none")]
    pub ban_duration: Option<String>,
}

#[derive(Debug, Deserialize)]
struct UserList {
    #[serde(default)]
    users: Vec<AuthUser>,
}

impl SupabaseClient {
    /// Signs in with e-mail and password
    ///
    /// # Errors
    ///
    /// Invalid credentials come back as `SupabaseError::Api` with status 400.
    pub async fn sign_in_with_password(
        &self,
        email: &str,
        password: &str,
    ) -> Result<Session, SupabaseError> {
        let req = self
            .anon_request(Method::POST, "auth/v1/token")
            .query(&[("grant_type", "password")])
            .json(&json!({ "email": email, "password": password }));
        send_json(req).await
    }

    /// Exchanges a refresh token for a new session
    pub async fn refresh_session(&self, refresh_token: &str) -> Result<Session, SupabaseError> {
        let req = self
            .anon_request(Method::POST, "auth/v1/token")
            .query(&[("grant_type", "refresh_token")])
            .json(&json!({ "refresh_token": refresh_token }));
        send_json(req).await
    }

    /// Revokes the session behind `access_token`
    pub async fn sign_out(&self, access_token: &str) -> Result<(), SupabaseError> {
        let req = self.request(
            Method::POST,
            "auth/v1/logout",
            &Scope::User(access_token.to_string()),
        )?;
        send_empty(req).await
    }

    /// Resolves an access token to its user
    pub async fn get_user(&self, access_token: &str) -> Result<AuthUser, SupabaseError> {
        let req = self.request(
            Method::GET,
            "auth/v1/user",
            &Scope::User(access_token.to_string()),
        )?;
        send_json(req).await
    }

    /// Changes the password of the user behind `access_token`
    pub async fn update_user_password(
        &self,
        access_token: &str,
        password: &str,
    ) -> Result<AuthUser, SupabaseError> {
        let req = self
            .request(
                Method::PUT,
                "auth/v1/user",
                &Scope::User(access_token.to_string()),
            )?
            .json(&json!({ "password": password }));
        send_json(req).await
    }

    /// Sends a password-reset e-mail
    ///
    /// `redirect_to` is where the e-mail link lands (the SPA's reset page).
    pub async fn recover(&self, email: &str, redirect_to: Option<&str>) -> Result<(), SupabaseError> {
        let mut req = self
            .anon_request(Method::POST, "auth/v1/recover")
            .json(&json!({ "email": email }));
        if let Some(redirect_to) = redirect_to {
            req = req.query(&[("redirect_to", redirect_to)]);
        }
        send_empty(req).await
    }

    /// Creates a user (service role)
    pub async fn admin_create_user(
        &self,
        attributes: &AdminUserAttributes,
    ) -> Result<AuthUser, SupabaseError> {
        let req = self
            .request(Method::POST, "auth/v1/admin/users", &Scope::Service)?
            .json(attributes);
        send_json(req).await
    }

    /// Lists users (service role)
    pub async fn admin_list_users(
        &self,
        page: u32,
        per_page: u32,
    ) -> Result<Vec<AuthUser>, SupabaseError> {
        let req = self
            .request(Method::GET, "auth/v1/admin/users", &Scope::Service)?
            .query(&[("page", page), ("per_page", per_page)]);
        let list: UserList = send_json(req).await?;
        Ok(list.users)
    }

    /// Fetches a user by id (service role)
    pub async fn admin_get_user(&self, id: Uuid) -> Result<AuthUser, SupabaseError> {
        let req = self.request(
            Method::GET,
            &format!("auth/v1/admin/users/{}", id),
            &Scope::Service,
        )?;
        send_json(req).await
    }

    /// Updates a user (service role)
    pub async fn admin_update_user(
        &self,
        id: Uuid,
        attributes: &AdminUserAttributes,
    ) -> Result<AuthUser, SupabaseError> {
        let req = self
            .request(
                Method::PUT,
                &format!("auth/v1/admin/users/{}", id),
                &Scope::Service,
            )?
            .json(attributes);
        send_json(req).await
    }

    /// Deletes a user (service role)
    pub async fn admin_delete_user(&self, id: Uuid) -> Result<(), SupabaseError> {
        let req = self.request(
            Method::DELETE,
            &format!("auth/v1/admin/users/{}", id),
            &Scope::Service,
        )?;
        send_empty(req).await
    }
}
