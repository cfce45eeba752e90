/// Goal (meta) endpoints
///
/// # Endpoints
///
/// - `GET    /goals` - List goals (`?regional`, `?categoria`)
/// - `GET    /goals/:id` - Get goal
/// - `POST   /goals` - Create goal (coordenador+)
/// - `PUT    /goals/:id` - Update goal (coordenador+)
/// - `DELETE /goals/:id` - Delete goal (coordenador+)
///
/// Goals without a regional apply to every regional; only admins create them.

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{non_empty, not_blank, Payload, PathId, QueryParams, SERVER_OWNED_FIELDS},
    response::ApiResponse,
};
use axum::{extract::State, Extension};
use chrono::NaiveDate;
use regionalops_shared::{
    auth::{
        authorization::{require_regional_access, require_role, same_regional, scoped_regional},
        middleware::AuthContext,
    },
    models::{
        goal::{CreateGoal, Goal, GoalFilter, UpdateGoal},
        member::UserRole,
    },
    supabase::{Scope, SupabaseClient},
};
use serde::Deserialize;
use serde_json::{json, Value};
use uuid::Uuid;
use validator::Validate;

#[derive(Debug, Default, Deserialize)]
pub struct GoalListQuery {
    pub regional: Option<String>,
    pub categoria: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateGoalRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub titulo: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub descricao: Option<String>,

    #[validate(length(max = 100, message = "Category must be at most 100 characters"))]
    pub categoria: Option<String>,

    #[validate(length(max = 100, message = "Activity type must be at most 100 characters"))]
    pub tipo_atividade: Option<String>,

    #[validate(range(min = 1, message = "Target must be at least 1"))]
    pub valor_meta: i64,

    pub regional: Option<String>,
    pub prazo: Option<NaiveDate>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateGoalRequest {
    #[validate(
        length(min = 1, max = 200, message = "Title must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub titulo: Option<String>,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub descricao: Option<String>,

    #[validate(length(max = 100, message = "Category must be at most 100 characters"))]
    pub categoria: Option<String>,

    #[validate(length(max = 100, message = "Activity type must be at most 100 characters"))]
    pub tipo_atividade: Option<String>,

    #[validate(range(min = 1, message = "Target must be at least 1"))]
    pub valor_meta: Option<i64>,

    pub regional: Option<String>,
    pub prazo: Option<NaiveDate>,
}

/// Goals of the caller's regional plus goals for every regional
fn visible_to(auth: &AuthContext, goal: &Goal) -> bool {
    match (auth.regional(), goal.regional.as_deref()) {
        _ if auth.is_admin() => true,
        (_, None) => true,
        (Some(own), Some(regional)) => same_regional(own, regional),
        (None, Some(_)) => false,
    }
}

async fn find_goal(
    db: &SupabaseClient,
    scope: &Scope,
    auth: &AuthContext,
    id: Uuid,
) -> ApiResult<Goal> {
    let goal = Goal::find_by_id(db, scope, id)
        .await?
        .ok_or(ApiError::NotFound("goal_not_found"))?;

    require_regional_access(auth, goal.regional.as_deref())?;
    Ok(goal)
}

/// Regional to store on a goal written by the caller
///
/// Non-admins may only target their own regional.
fn target_regional(auth: &AuthContext, requested: Option<String>) -> ApiResult<Option<String>> {
    let requested = non_empty(requested);
    if auth.is_admin() {
        return Ok(requested);
    }

    Ok(scoped_regional(auth, requested.as_deref())?)
}

/// List goals
///
/// Non-admins see their regional's goals and goals that apply everywhere.
pub async fn list_goals(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    QueryParams(query): QueryParams<GoalListQuery>,
) -> ApiResult<ApiResponse<Vec<Goal>>> {
    let regional = scoped_regional(&auth, query.regional.as_deref())?;

    // Non-admins: fetch unfiltered, then keep own regional + global goals
    let filter = GoalFilter {
        regional: if auth.is_admin() { regional } else { None },
        categoria: non_empty(query.categoria),
    };

    let goals: Vec<Goal> = Goal::list(&state.supabase, &auth.scope(), &filter)
        .await?
        .into_iter()
        .filter(|g| visible_to(&auth, g))
        .collect();

    Ok(ApiResponse::success(goals))
}

/// Get goal
///
/// # Errors
///
/// - `404 goal_not_found`
pub async fn get_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<Goal>> {
    let goal = find_goal(&state.supabase, &auth.scope(), &auth, id).await?;
    Ok(ApiResponse::success(goal))
}

/// Create goal
///
/// # Errors
///
/// - `400 invalid_payload`: Validation failed, or the payload carries
///   `member_id`
/// - `403 forbidden`: Caller is below coordenador
pub async fn create_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Payload,
) -> ApiResult<ApiResponse<Goal>> {
    require_role(&auth, UserRole::Coordenador)?;

    let req: CreateGoalRequest = payload.parse(SERVER_OWNED_FIELDS)?;
    let regional = target_regional(&auth, req.regional)?;

    let goal = Goal::create(
        &state.supabase,
        &auth.scope(),
        &CreateGoal {
            member_id: auth.member_id(),
            titulo: req.titulo.trim().to_string(),
            descricao: non_empty(req.descricao),
            categoria: non_empty(req.categoria),
            tipo_atividade: non_empty(req.tipo_atividade),
            valor_meta: req.valor_meta,
            regional,
            prazo: req.prazo,
        },
    )
    .await?;

    tracing::info!(goal_id = %goal.id, created_by = %auth.member_id(), "Goal created");

    Ok(ApiResponse::created(goal))
}

/// Update goal
pub async fn update_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
    payload: Payload,
) -> ApiResult<ApiResponse<Goal>> {
    require_role(&auth, UserRole::Coordenador)?;

    let req: UpdateGoalRequest = payload.parse(SERVER_OWNED_FIELDS)?;

    let db = &state.supabase;
    let scope = auth.scope();

    let current = find_goal(db, &scope, &auth, id).await?;
    if current.regional.is_none() && !auth.is_admin() {
        return Err(ApiError::forbidden("Goals for every regional are managed by admins"));
    }

    let regional = match req.regional {
        Some(regional) => target_regional(&auth, Some(regional))?,
        None => None,
    };

    let changes = UpdateGoal {
        titulo: req.titulo.map(|t| t.trim().to_string()),
        descricao: req.descricao,
        categoria: req.categoria,
        tipo_atividade: req.tipo_atividade,
        valor_meta: req.valor_meta,
        regional,
        prazo: req.prazo,
    };

    let goal = Goal::update(db, &scope, id, &changes)
        .await?
        .ok_or(ApiError::NotFound("goal_not_found"))?;

    tracing::info!(goal_id = %id, updated_by = %auth.member_id(), "Goal updated");

    Ok(ApiResponse::success(goal))
}

/// Delete goal
///
/// # Errors
///
/// - `403 forbidden`: Caller is below coordenador
/// - `404 goal_not_found`
pub async fn delete_goal(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<Value>> {
    require_role(&auth, UserRole::Coordenador)?;

    let db = &state.supabase;
    let scope = auth.scope();

    let current = find_goal(db, &scope, &auth, id).await?;
    if current.regional.is_none() && !auth.is_admin() {
        return Err(ApiError::forbidden("Goals for every regional are managed by admins"));
    }

    Goal::delete(db, &scope, id)
        .await?
        .ok_or(ApiError::NotFound("goal_not_found"))?;

    tracing::info!(goal_id = %id, deleted_by = %auth.member_id(), "Goal deleted");

    Ok(ApiResponse::success(json!({ "id": id })))
}
