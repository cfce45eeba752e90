/// Member endpoints
///
/// # Endpoints
///
/// - `GET    /members` - List members (regional-scoped)
/// - `GET    /members/:id` - Get member
/// - `POST   /members` - Create member (coordenador+)
/// - `PUT    /members/:id` - Update member (coordenador+ or self)
/// - `DELETE /members/:id` - Delete member (admin)
///
/// Members created here have no login; accounts are created through
/// `/auth/users`.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{non_empty, not_blank, Payload, PathId, QueryParams, SERVER_OWNED_FIELDS},
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use regionalops_shared::{
    auth::{
        authorization::{assigned_regional, require_regional_access, require_role, scoped_regional},
        middleware::AuthContext,
    },
    models::{
        member::{CreateMember, Member, MemberFilter, UpdateMember, UserRole},
        usuario::Usuario,
    },
    supabase::Scope,
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

fn default_true() -> bool {
    true
}

#[derive(Debug, Default, Deserialize)]
pub struct MemberListQuery {
    pub regional: Option<String>,
    pub ativo: Option<bool>,
    pub role: Option<UserRole>,
    pub search: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateMemberRequest {
    #[validate(
        length(min = 1, max = 150, message = "Name must be 1-150 characters"),
        custom(function = "not_blank")
    )]
    pub nome: String,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub telefone: Option<String>,

    #[serde(default)]
    pub role: UserRole,

    pub regional: Option<String>,
    pub instituicao_id: Option<Uuid>,

    #[serde(default = "default_true")]
    pub ativo: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateMemberRequest {
    #[validate(
        length(min = 1, max = 150, message = "Name must be 1-150 characters"),
        custom(function = "not_blank")
    )]
    pub nome: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub telefone: Option<String>,

    pub role: Option<UserRole>,
    pub regional: Option<String>,
    pub instituicao_id: Option<Uuid>,
    pub ativo: Option<bool>,
}

/// Only admins hand out the admin role
fn check_assignable_role(auth: &AuthContext, role: UserRole) -> ApiResult<()> {
    if role == UserRole::Admin && !auth.is_admin() {
        return Err(ApiError::forbidden("Only admins can assign the admin role"));
    }
    Ok(())
}

/// List members
pub async fn list_members(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    QueryParams(query): QueryParams<MemberListQuery>,
) -> ApiResult<ApiResponse<Vec<Member>>> {
    let filter = MemberFilter {
        regional: scoped_regional(&auth, query.regional.as_deref())?,
        ativo: query.ativo,
        role: query.role,
        search: non_empty(query.search),
    };

    let members = Member::list(&state.supabase, &auth.scope(), &filter).await?;
    Ok(ApiResponse::success(members))
}

/// Get member
///
/// # Errors
///
/// - `403 forbidden`: Member belongs to another regional
/// - `404 member_not_found`
pub async fn get_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<Member>> {
    let member = Member::find_by_id(&state.supabase, &auth.scope(), id)
        .await?
        .ok_or(ApiError::NotFound("member_not_found"))?;

    require_regional_access(&auth, member.regional.as_deref())?;

    Ok(ApiResponse::success(member))
}

/// Create member
///
/// The regional defaults to the caller's. `member_id` and `auth_user_id`
/// are rejected.
pub async fn create_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Payload,
) -> ApiResult<ApiResponse<Member>> {
    require_role(&auth, UserRole::Coordenador)?;

    let req: CreateMemberRequest = payload.parse(SERVER_OWNED_FIELDS)?;
    check_assignable_role(&auth, req.role)?;

    let regional = assigned_regional(&auth, req.regional.as_deref())?;

    let member = Member::create(
        &state.supabase,
        &auth.scope(),
        &CreateMember {
            auth_user_id: None,
            nome: req.nome.trim().to_string(),
            email: non_empty(req.email),
            telefone: non_empty(req.telefone),
            role: req.role,
            regional,
            instituicao_id: req.instituicao_id,
            ativo: req.ativo,
        },
    )
    .await?;

    tracing::info!(member_id = %member.id, created_by = %auth.member_id(), "Member created");

    Ok(ApiResponse::created(member))
}

/// Update member
///
/// Members may edit their own contact details; role, regional, institution
/// and status need coordenador+.
pub async fn update_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
    payload: Payload,
) -> ApiResult<ApiResponse<Member>> {
    let req: UpdateMemberRequest = payload.parse(SERVER_OWNED_FIELDS)?;

    let mut changes = UpdateMember {
        nome: req.nome.map(|n| n.trim().to_string()),
        email: req.email,
        telefone: req.telefone,
        role: req.role,
        regional: req.regional.map(|r| r.trim().to_string()),
        instituicao_id: req.instituicao_id,
        ativo: req.ativo,
        updated_at: None,
    };

    let is_self = id == auth.member_id();
    let is_manager = auth.role().has_permission(&UserRole::Coordenador);

    if !is_manager {
        if !is_self {
            require_role(&auth, UserRole::Coordenador)?;
        }
        if changes.changes_privileges() {
            return Err(ApiError::forbidden(
                "Role, regional and status can only be changed by a coordenador",
            ));
        }
    }

    if let Some(role) = changes.role {
        check_assignable_role(&auth, role)?;
    }
    if let Some(requested) = changes.regional.take() {
        changes.regional = assigned_regional(&auth, Some(&requested))?;
    }

    let db = &state.supabase;
    let scope = auth.scope();

    let current = Member::find_by_id(db, &scope, id)
        .await?
        .ok_or(ApiError::NotFound("member_not_found"))?;
    require_regional_access(&auth, current.regional.as_deref())?;

    if current.role == UserRole::Admin && !auth.is_admin() {
        return Err(ApiError::forbidden("Only admins can edit admin profiles"));
    }

    let member = Member::update(db, &scope, id, &changes)
        .await?
        .ok_or(ApiError::NotFound("member_not_found"))?;

    if member.auth_user_id.is_some() {
        let mirror_scope = if db.has_service_role() { Scope::Service } else { scope };
        if let Err(e) = Usuario::sync(db, &mirror_scope, &member).await {
            tracing::warn!(error = %e, member_id = %member.id, "Failed to sync usuarios mirror");
        }
    }

    tracing::info!(member_id = %member.id, updated_by = %auth.member_id(), "Member updated");

    Ok(ApiResponse::success(member))
}

/// Delete member
///
/// # Errors
///
/// - `403 forbidden`: Caller is not an admin
/// - `404 member_not_found`
pub async fn delete_member(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<Value>> {
    require_role(&auth, UserRole::Admin)?;

    Member::delete(&state.supabase, &auth.scope(), id)
        .await?
        .ok_or(ApiError::NotFound("member_not_found"))?;

    tracing::info!(member_id = %id, deleted_by = %auth.member_id(), "Member deleted");

    Ok(ApiResponse::success(json!({ "id": id })))
}
