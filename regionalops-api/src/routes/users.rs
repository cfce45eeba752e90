/// User administration endpoints (admin only)
///
/// A user account is three records kept in step:
///
/// 1. the Supabase Auth user (credentials)
/// 2. the `members` row (profile, role, regional)
/// 3. the `usuarios` mirror row
///
/// All calls here run with the service-role key; without it every endpoint
/// answers `503 supabase_client_unavailable`.
///
/// # Endpoints
///
/// - `GET    /auth/users` - List members with their auth accounts
/// - `POST   /auth/users` - Create account and member
/// - `GET    /auth/users/:id` - Member (by member id) with auth account
/// - `PUT    /auth/users/:id` - Update member, auth e-mail/password/metadata
/// - `DELETE /auth/users/:id` - Delete account and member
/// - `POST   /auth/users/:id/reset-password` - Recovery e-mail, or set `{password}`

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{
        non_empty, not_blank, OptionalPayload, Payload, PathId, QueryParams, SERVER_OWNED_FIELDS,
    },
    response::ApiResponse,
    routes::auth::reset_redirect,
};
use axum::{extract::State, Extension};
use regionalops_shared::{
    auth::{authorization::require_role, middleware::AuthContext, password},
    models::{
        member::{CreateMember, Member, MemberFilter, UpdateMember, UserRole},
        usuario::Usuario,
    },
    supabase::{
        auth::{AdminUserAttributes, AuthUser},
        Scope, SupabaseClient, SupabaseError,
    },
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::collections::HashMap;
use uuid::Uuid;
use validator::Validate;

/// Page size used when listing auth users
const AUTH_USERS_PER_PAGE: u32 = 1000;

/// Ban length applied to deactivated members (100 years)
const DEACTIVATED_BAN: &str = "876000h";

/// Member with its auth account, when it has one
#[derive(Debug, Serialize)]
pub struct UserAccount {
    pub member: Member,
    pub user: Option<AuthUser>,
}

#[derive(Debug, Default, Deserialize)]
pub struct UserListQuery {
    pub regional: Option<String>,
    pub role: Option<UserRole>,
    pub ativo: Option<bool>,
    pub search: Option<String>,
}

/// Create user request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: String,

    pub password: String,

    #[validate(
        length(min = 1, max = 150, message = "Name must be 1-150 characters"),
        custom(function = "not_blank")
    )]
    pub nome: String,

    #[serde(default)]
    pub role: UserRole,

    pub regional: Option<String>,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub telefone: Option<String>,

    pub instituicao_id: Option<Uuid>,
}

/// Update user request; absent fields are left unchanged
#[derive(Debug, Deserialize, Validate)]
pub struct UpdateUserRequest {
    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub password: Option<String>,

    #[validate(
        length(min = 1, max = 150, message = "Name must be 1-150 characters"),
        custom(function = "not_blank")
    )]
    pub nome: Option<String>,

    pub role: Option<UserRole>,
    pub regional: Option<String>,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub telefone: Option<String>,

    pub instituicao_id: Option<Uuid>,
    pub ativo: Option<bool>,
}

#[derive(Debug, Default, Deserialize, Validate)]
pub struct ResetPasswordRequest {
    pub password: Option<String>,
}

fn user_metadata(nome: &str, role: UserRole, regional: Option<&str>) -> Value {
    json!({
        "nome": nome,
        "role": role,
        "regional": regional,
    })
}

/// `ban_duration` for an `ativo` transition, if any
fn ban_change(was_active: bool, active: bool) -> Option<String> {
    match (was_active, active) {
        (true, false) => Some(DEACTIVATED_BAN.to_string()),
        (false, true) => Some("none".to_string()),
        _ => None,
    }
}

/// Every auth user, page by page
async fn all_auth_users(db: &SupabaseClient) -> Result<Vec<AuthUser>, SupabaseError> {
    let mut users = Vec::new();
    let mut page = 1;

    loop {
        let batch = db.admin_list_users(page, AUTH_USERS_PER_PAGE).await?;
        let last = batch.len() < AUTH_USERS_PER_PAGE as usize;
        users.extend(batch);
        if last {
            return Ok(users);
        }
        page += 1;
    }
}

/// Puts the auth user back in line with the unchanged member row
///
/// A password set by the failed update stays set.
async fn restore_auth_user(db: &SupabaseClient, current: &Member, attempted_active: bool) {
    let Some(user_id) = current.auth_user_id else {
        return;
    };

    let attributes = AdminUserAttributes {
        email: current.email.clone(),
        user_metadata: Some(user_metadata(
            &current.nome,
            current.role,
            current.regional.as_deref(),
        )),
        ban_duration: ban_change(attempted_active, current.ativo),
        ..Default::default()
    };

    if let Err(e) = db.admin_update_user(user_id, &attributes).await {
        tracing::error!(error = %e, user_id = %user_id, "Failed to restore auth user after member update failed");
    }
}

async fn sync_mirror(db: &SupabaseClient, member: &Member) {
    if let Err(e) = Usuario::sync(db, &Scope::Service, member).await {
        tracing::warn!(error = %e, member_id = %member.id, "Failed to sync usuarios mirror");
    }
}

async fn find_member(db: &SupabaseClient, id: Uuid) -> ApiResult<Member> {
    Member::find_by_id(db, &Scope::Service, id)
        .await?
        .ok_or(ApiError::NotFound("member_not_found"))
}

fn check_password(password: &str) -> ApiResult<()> {
    password::validate_password_strength(password)
        .map_err(|msg| ApiError::invalid_field("password", msg))
}

/// List members joined with their auth accounts
pub async fn list_users(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    QueryParams(query): QueryParams<UserListQuery>,
) -> ApiResult<ApiResponse<Vec<UserAccount>>> {
    require_role(&auth, UserRole::Admin)?;

    let filter = MemberFilter {
        regional: non_empty(query.regional),
        ativo: query.ativo,
        role: query.role,
        search: non_empty(query.search),
    };

    let (members, users) = tokio::try_join!(
        Member::list(&state.supabase, &Scope::Service, &filter),
        all_auth_users(&state.supabase),
    )?;

    let mut users: HashMap<Uuid, AuthUser> = users.into_iter().map(|u| (u.id, u)).collect();
    let accounts = members
        .into_iter()
        .map(|member| {
            let user = member.auth_user_id.and_then(|id| users.remove(&id));
            UserAccount { member, user }
        })
        .collect();

    Ok(ApiResponse::success(accounts))
}

/// Create an account
///
/// # Errors
///
/// - `400 invalid_payload`: Validation failed or weak password
/// - `409 conflict`: E-mail already registered
pub async fn create_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Payload,
) -> ApiResult<ApiResponse<UserAccount>> {
    require_role(&auth, UserRole::Admin)?;

    let req: CreateUserRequest = payload.parse(SERVER_OWNED_FIELDS)?;
    check_password(&req.password)?;

    let nome = req.nome.trim().to_string();
    let regional = non_empty(req.regional);
    if req.role != UserRole::Admin && regional.is_none() {
        return Err(ApiError::invalid_field(
            "regional",
            "Regional is required for coordenador and membro",
        ));
    }

    let db = &state.supabase;
    let user = db
        .admin_create_user(&AdminUserAttributes {
            email: Some(req.email.clone()),
            password: Some(req.password),
            email_confirm: Some(true),
            user_metadata: Some(user_metadata(&nome, req.role, regional.as_deref())),
            ..Default::default()
        })
        .await?;

    let new_member = CreateMember {
        auth_user_id: Some(user.id),
        nome,
        email: Some(req.email),
        telefone: non_empty(req.telefone),
        role: req.role,
        regional,
        instituicao_id: req.instituicao_id,
        ativo: true,
    };

    let member = match Member::create(db, &Scope::Service, &new_member).await {
        Ok(member) => member,
        Err(e) => {
            // Don't leave a login without a profile behind
            if let Err(cleanup) = db.admin_delete_user(user.id).await {
                tracing::error!(error = %cleanup, user_id = %user.id, "Failed to remove orphaned auth user");
            }
            return Err(e.into());
        }
    };

    sync_mirror(db, &member).await;

    tracing::info!(
        admin_id = %auth.user_id(),
        user_id = %user.id,
        member_id = %member.id,
        role = %member.role,
        "User account created"
    );

    Ok(ApiResponse::created(UserAccount {
        member,
        user: Some(user),
    }))
}

/// Member by id with its auth account
pub async fn get_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<UserAccount>> {
    require_role(&auth, UserRole::Admin)?;

    let member = find_member(&state.supabase, id).await?;
    let user = match member.auth_user_id {
        Some(user_id) => match state.supabase.admin_get_user(user_id).await {
            Ok(user) => Some(user),
            Err(e) if e.is_not_found() => None,
            Err(e) => return Err(e.into()),
        },
        None => None,
    };

    Ok(ApiResponse::success(UserAccount { member, user }))
}

/// Update an account
///
/// The auth user is changed first. If the member row then fails to update,
/// the auth user is put back to match it.
pub async fn update_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
    payload: Payload,
) -> ApiResult<ApiResponse<UserAccount>> {
    require_role(&auth, UserRole::Admin)?;

    let req: UpdateUserRequest = payload.parse(SERVER_OWNED_FIELDS)?;
    if let Some(password) = &req.password {
        check_password(password)?;
    }

    let db = &state.supabase;
    let current = find_member(db, id).await?;

    let changes = UpdateMember {
        nome: req.nome.map(|n| n.trim().to_string()),
        email: req.email.clone(),
        telefone: req.telefone,
        role: req.role,
        regional: req.regional.map(|r| r.trim().to_string()),
        instituicao_id: req.instituicao_id,
        ativo: req.ativo,
        updated_at: None,
    };
    let active = changes.ativo.unwrap_or(current.ativo);

    let user = match current.auth_user_id {
        Some(user_id) => {
            let attributes = AdminUserAttributes {
                email: req.email,
                password: req.password,
                user_metadata: Some(user_metadata(
                    changes.nome.as_deref().unwrap_or(current.nome.as_str()),
                    changes.role.unwrap_or(current.role),
                    changes.regional.as_deref().or(current.regional.as_deref()),
                )),
                ban_duration: ban_change(current.ativo, active),
                ..Default::default()
            };
            Some(db.admin_update_user(user_id, &attributes).await?)
        }
        None => None,
    };

    let updated = Member::update(db, &Scope::Service, id, &changes).await;
    let member = match updated {
        Ok(Some(member)) => member,
        failed => {
            if user.is_some() {
                restore_auth_user(db, &current, active).await;
            }
            return Err(match failed {
                Err(e) => e.into(),
                _ => ApiError::NotFound("member_not_found"),
            });
        }
    };

    sync_mirror(db, &member).await;

    tracing::info!(admin_id = %auth.user_id(), member_id = %member.id, "User account updated");

    Ok(ApiResponse::success(UserAccount { member, user }))
}

/// Delete an account
///
/// The login is removed first, then the `usuarios` mirror and the member
/// row. A retry after a partial failure picks up where it stopped.
pub async fn delete_user(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<Value>> {
    require_role(&auth, UserRole::Admin)?;

    if id == auth.member_id() {
        return Err(ApiError::BadRequest("Admins cannot delete their own account".to_string()));
    }

    let db = &state.supabase;
    let member = find_member(db, id).await?;

    if let Some(user_id) = member.auth_user_id {
        match db.admin_delete_user(user_id).await {
            Ok(()) => {}
            Err(e) if e.is_not_found() => {}
            Err(e) => return Err(e.into()),
        }
        Usuario::delete_by_auth_user_id(db, &Scope::Service, user_id).await?;
    }

    Member::delete(db, &Scope::Service, id)
        .await?
        .ok_or(ApiError::NotFound("member_not_found"))?;

    tracing::info!(admin_id = %auth.user_id(), member_id = %id, "User account deleted");

    Ok(ApiResponse::success(json!({ "id": id })))
}

/// Reset a user's password
///
/// With `{ "password": "..." }` the password is set directly; with no body a
/// recovery e-mail is sent. A body that is not valid JSON is rejected.
pub async fn reset_password(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
    OptionalPayload(payload): OptionalPayload,
) -> ApiResult<ApiResponse<Value>> {
    require_role(&auth, UserRole::Admin)?;

    let req: ResetPasswordRequest = match payload {
        Some(payload) => payload.parse(&[])?,
        None => ResetPasswordRequest::default(),
    };

    let db = &state.supabase;
    let member = find_member(db, id).await?;
    let user_id = member
        .auth_user_id
        .ok_or_else(|| ApiError::BadRequest("Member has no login".to_string()))?;

    match req.password {
        Some(password) => {
            check_password(&password)?;
            db.admin_update_user(
                user_id,
                &AdminUserAttributes {
                    password: Some(password),
                    ..Default::default()
                },
            )
            .await?;

            tracing::info!(admin_id = %auth.user_id(), member_id = %id, "Password set by admin");
            Ok(ApiResponse::success(json!({ "message": "Password updated" })))
        }
        None => {
            let email = match member.email {
                Some(email) => email,
                None => db
                    .admin_get_user(user_id)
                    .await?
                    .email
                    .ok_or_else(|| ApiError::BadRequest("User has no e-mail".to_string()))?,
            };

            let redirect = reset_redirect(&state);
            db.recover(&email, redirect.as_deref()).await?;

            tracing::info!(admin_id = %auth.user_id(), member_id = %id, "Recovery e-mail sent");
            Ok(ApiResponse::success(json!({ "message": "Recovery e-mail sent" })))
        }
    }
}
