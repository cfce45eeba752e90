/// Activity endpoints
///
/// # Endpoints
///
/// - `GET    /activities` - List (`?regional`, `?member_id`, `?tipo`, `?from`, `?to`)
/// - `GET    /activities/:id` - Get activity
/// - `POST   /activities` - Record an activity for the caller
/// - `PUT    /activities/:id` - Update (owner or coordenador+)
/// - `DELETE /activities/:id` - Delete (owner or coordenador+)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{non_empty, not_blank, Payload, PathId, QueryParams, SERVER_OWNED_FIELDS},
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use chrono::{NaiveDate, Utc};
use regionalops_shared::{
    auth::{
        authorization::{
            assigned_regional, require_owner_or_role, require_regional_access, scoped_regional,
        },
        middleware::AuthContext,
    },
    models::{
        activity::{Activity, ActivityFilter, CreateActivity, UpdateActivity},
        member::UserRole,
    },
    supabase::{Scope, SupabaseClient},
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

fn default_quantidade() -> i64 {
    1
}

#[derive(Debug, Default, Deserialize)]
pub struct ActivityListQuery {
    pub regional: Option<String>,
    pub member_id: Option<Uuid>,
    pub tipo: Option<String>,
    pub from: Option<NaiveDate>,
    pub to: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateActivityRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub titulo: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub descricao: Option<String>,

    #[validate(
        length(min = 1, max = 100, message = "Type must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    pub tipo: String,

    #[serde(default = "default_quantidade")]
    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantidade: i64,

    /// Defaults to today
    pub data: Option<NaiveDate>,

    pub regional: Option<String>,
    pub instituicao_id: Option<Uuid>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateActivityRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub titulo: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub descricao: Option<String>,

    #[validate(
        length(min = 1, max = 100, message = "Type must be 1-100 characters"),
        custom(function = "not_blank")
    )]
    pub tipo: Option<String>,

    #[validate(range(min = 1, message = "Quantity must be at least 1"))]
    pub quantidade: Option<i64>,

    pub data: Option<NaiveDate>,
    pub regional: Option<String>,
    pub instituicao_id: Option<Uuid>,
}

/// Loads an activity the caller may see
async fn find_visible(
    db: &SupabaseClient,
    scope: &Scope,
    auth: &AuthContext,
    id: Uuid,
) -> ApiResult<Activity> {
    let activity = Activity::find_by_id(db, scope, id)
        .await?
        .ok_or(ApiError::NotFound("activity_not_found"))?;

    require_regional_access(auth, activity.regional.as_deref())?;
    Ok(activity)
}

/// List activities, most recent first
pub async fn list_activities(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    QueryParams(query): QueryParams<ActivityListQuery>,
) -> ApiResult<ApiResponse<Vec<Activity>>> {
    if let (Some(from), Some(to)) = (query.from, query.to) {
        if from > to {
            return Err(ApiError::invalid_field("from", "'from' must not be after 'to'"));
        }
    }

    let filter = ActivityFilter {
        regional: scoped_regional(&auth, query.regional.as_deref())?,
        member_id: query.member_id,
        tipo: non_empty(query.tipo),
        from: query.from,
        to: query.to,
    };

    let activities = Activity::list(&state.supabase, &auth.scope(), &filter).await?;
    Ok(ApiResponse::success(activities))
}

/// Get activity
///
/// # Errors
///
/// - `404 activity_not_found`
pub async fn get_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<Activity>> {
    let activity = find_visible(&state.supabase, &auth.scope(), &auth, id).await?;
    Ok(ApiResponse::success(activity))
}

/// Record an activity
///
/// `member_id` is always the caller; sending it is rejected. The regional
/// defaults to the caller's.
pub async fn create_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Payload,
) -> ApiResult<ApiResponse<Activity>> {
    let req: CreateActivityRequest = payload.parse(SERVER_OWNED_FIELDS)?;

    let regional = assigned_regional(&auth, req.regional.as_deref())?;

    let activity = Activity::create(
        &state.supabase,
        &auth.scope(),
        &CreateActivity {
            member_id: auth.member_id(),
            titulo: req.titulo.trim().to_string(),
            descricao: non_empty(req.descricao),
            tipo: req.tipo.trim().to_string(),
            quantidade: req.quantidade,
            data: req.data.unwrap_or_else(|| Utc::now().date_naive()),
            regional,
            instituicao_id: req.instituicao_id,
        },
    )
    .await?;

    tracing::info!(
        activity_id = %activity.id,
        member_id = %activity.member_id,
        tipo = %activity.tipo,
        "Activity recorded"
    );

    Ok(ApiResponse::created(activity))
}

/// Update activity
///
/// # Errors
///
/// - `403 forbidden`: Caller neither owns the activity nor is coordenador+
/// - `404 activity_not_found`
pub async fn update_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
    payload: Payload,
) -> ApiResult<ApiResponse<Activity>> {
    let req: UpdateActivityRequest = payload.parse(SERVER_OWNED_FIELDS)?;

    let db = &state.supabase;
    let scope = auth.scope();

    let current = find_visible(db, &scope, &auth, id).await?;
    require_owner_or_role(&auth, current.member_id, UserRole::Coordenador)?;

    let regional = match req.regional {
        Some(requested) => assigned_regional(&auth, Some(&requested))?,
        None => None,
    };

    let changes = UpdateActivity {
        titulo: req.titulo.map(|t| t.trim().to_string()),
        descricao: req.descricao,
        tipo: req.tipo.map(|t| t.trim().to_string()),
        quantidade: req.quantidade,
        data: req.data,
        regional,
        instituicao_id: req.instituicao_id,
    };

    let activity = Activity::update(db, &scope, id, &changes)
        .await?
        .ok_or(ApiError::NotFound("activity_not_found"))?;

    tracing::info!(activity_id = %id, updated_by = %auth.member_id(), "Activity updated");

    Ok(ApiResponse::success(activity))
}

/// Delete activity
///
/// # Errors
///
/// - `403 forbidden`: Caller neither owns the activity nor is coordenador+
/// - `404 activity_not_found`
pub async fn delete_activity(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<Value>> {
    let db = &state.supabase;
    let scope = auth.scope();

    let current = find_visible(db, &scope, &auth, id).await?;
    require_owner_or_role(&auth, current.member_id, UserRole::Coordenador)?;

    Activity::delete(db, &scope, id)
        .await?
        .ok_or(ApiError::NotFound("activity_not_found"))?;

    tracing::info!(activity_id = %id, deleted_by = %auth.member_id(), "Activity deleted");

    Ok(ApiResponse::success(json!({ "id": id })))
}
