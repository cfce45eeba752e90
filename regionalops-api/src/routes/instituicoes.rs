/// Institution (ONG) endpoints
///
/// # Endpoints
///
/// - `GET    /instituicoes` - List (`?regional`, `?ativa`, `?search`)
/// - `GET    /instituicoes/stats` - Counts per regional
/// - `GET    /instituicoes/:id` - Get institution
/// - `POST   /instituicoes` - Create (coordenador+)
/// - `PUT    /instituicoes/:id` - Update (coordenador+)
/// - `DELETE /instituicoes/:id` - Delete (admin)

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
        instituicao::{
            CreateInstituicao, Instituicao, InstituicaoFilter, InstituicaoStats,
            UpdateInstituicao,
        },
        member::UserRole,
    },
};
use serde::Deserialize;
use serde_json::{json, Value};
use validator::{Validate, ValidationError};

fn default_true() -> bool {
    true
}

/// CNPJ: 14 digits, punctuation allowed
fn validate_cnpj(cnpj: &str) -> Result<(), ValidationError> {
    let digits = cnpj.chars().filter(|c| c.is_ascii_digit()).count();
    let only_allowed = cnpj
        .chars()
        .all(|c| c.is_ascii_digit() || matches!(c, '.' | '/' | '-' | ' '));

    if digits != 14 || !only_allowed {
        let mut err = ValidationError::new("cnpj");
        err.message = Some("CNPJ must have 14 digits".into());
        return Err(err);
    }
    Ok(())
}

/// Digits only, as stored
fn normalize_cnpj(cnpj: Option<String>) -> Option<String> {
    non_empty(cnpj).map(|c| c.chars().filter(|c| c.is_ascii_digit()).collect())
}

#[derive(Debug, Default, Deserialize)]
pub struct InstituicaoListQuery {
    pub regional: Option<String>,
    pub ativa: Option<bool>,
    pub search: Option<String>,
}

#[derive(Debug, Default, Deserialize)]
pub struct StatsQuery {
    pub regional: Option<String>,
}

#[derive(Debug, Deserialize, Validate)]
pub struct CreateInstituicaoRequest {
    #[validate(
        length(min = 1, max = 200, message = "Name must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub nome: String,

    #[validate(custom(function = "validate_cnpj"))]
    pub cnpj: Option<String>,

    #[validate(length(max = 100, message = "Type must be at most 100 characters"))]
    pub tipo: Option<String>,

    pub regional: Option<String>,

    #[validate(length(max = 300, message = "Address must be at most 300 characters"))]
    pub endereco: Option<String>,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub telefone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    #[serde(default = "default_true")]
    pub ativa: bool,
}

#[derive(Debug, Deserialize, Validate)]
pub struct UpdateInstituicaoRequest {
    #[validate(
        length(min = 1, max = 200, message = "Name must be 1-200 characters"),
        custom(function = "not_blank")
    )]
    pub nome: Option<String>,

    #[validate(custom(function = "validate_cnpj"))]
    pub cnpj: Option<String>,

    #[validate(length(max = 100, message = "Type must be at most 100 characters"))]
    pub tipo: Option<String>,

    pub regional: Option<String>,

    #[validate(length(max = 300, message = "Address must be at most 300 characters"))]
    pub endereco: Option<String>,

    #[validate(length(max = 30, message = "Phone must be at most 30 characters"))]
    pub telefone: Option<String>,

    #[validate(email(message = "Invalid email format"))]
    pub email: Option<String>,

    pub ativa: Option<bool>,
}

/// List institutions
pub async fn list_instituicoes(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    QueryParams(query): QueryParams<InstituicaoListQuery>,
) -> ApiResult<ApiResponse<Vec<Instituicao>>> {
    let filter = InstituicaoFilter {
        regional: scoped_regional(&auth, query.regional.as_deref())?,
        ativa: query.ativa,
        search: non_empty(query.search),
    };

    let instituicoes = Instituicao::list(&state.supabase, &auth.scope(), &filter).await?;
    Ok(ApiResponse::success(instituicoes))
}

/// Institution counts per regional
///
/// # Response
///
/// ```json
/// { "data": [ { "regional": "Norte", "total": 12, "ativas": 10 } ] }
/// ```
pub async fn instituicao_stats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    QueryParams(query): QueryParams<StatsQuery>,
) -> ApiResult<ApiResponse<Vec<InstituicaoStats>>> {
    let regional = scoped_regional(&auth, query.regional.as_deref())?;

    let stats = Instituicao::stats(&state.supabase, &auth.scope(), regional.as_deref()).await?;
    Ok(ApiResponse::success(stats))
}

/// Get institution
///
/// # Errors
///
/// - `404 instituicao_not_found`
pub async fn get_instituicao(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<Instituicao>> {
    let instituicao = Instituicao::find_by_id(&state.supabase, &auth.scope(), id)
        .await?
        .ok_or(ApiError::NotFound("instituicao_not_found"))?;

    require_regional_access(&auth, instituicao.regional.as_deref())?;

    Ok(ApiResponse::success(instituicao))
}

/// Create institution
pub async fn create_instituicao(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    payload: Payload,
) -> ApiResult<ApiResponse<Instituicao>> {
    require_role(&auth, UserRole::Coordenador)?;

    let req: CreateInstituicaoRequest = payload.parse(SERVER_OWNED_FIELDS)?;

    let regional = assigned_regional(&auth, req.regional.as_deref())?;

    let instituicao = Instituicao::create(
        &state.supabase,
        &auth.scope(),
        &CreateInstituicao {
            nome: req.nome.trim().to_string(),
            cnpj: normalize_cnpj(req.cnpj),
            tipo: non_empty(req.tipo),
            regional,
            endereco: non_empty(req.endereco),
            telefone: non_empty(req.telefone),
            email: non_empty(req.email),
            ativa: req.ativa,
        },
    )
    .await?;

    tracing::info!(instituicao_id = %instituicao.id, created_by = %auth.member_id(), "Institution created");

    Ok(ApiResponse::created(instituicao))
}

/// Update institution
pub async fn update_instituicao(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
    payload: Payload,
) -> ApiResult<ApiResponse<Instituicao>> {
    require_role(&auth, UserRole::Coordenador)?;

    let req: UpdateInstituicaoRequest = payload.parse(SERVER_OWNED_FIELDS)?;

    let db = &state.supabase;
    let scope = auth.scope();

    let current = Instituicao::find_by_id(db, &scope, id)
        .await?
        .ok_or(ApiError::NotFound("instituicao_not_found"))?;
    require_regional_access(&auth, current.regional.as_deref())?;

    let regional = match req.regional {
        Some(requested) => assigned_regional(&auth, Some(&requested))?,
        None => None,
    };

    let changes = UpdateInstituicao {
        nome: req.nome.map(|n| n.trim().to_string()),
        cnpj: normalize_cnpj(req.cnpj),
        tipo: req.tipo,
        regional,
        endereco: req.endereco,
        telefone: req.telefone,
        email: req.email,
        ativa: req.ativa,
    };

    let instituicao = Instituicao::update(db, &scope, id, &changes)
        .await?
        .ok_or(ApiError::NotFound("instituicao_not_found"))?;

    tracing::info!(instituicao_id = %id, updated_by = %auth.member_id(), "Institution updated");

    Ok(ApiResponse::success(instituicao))
}

/// Delete institution
///
/// # Errors
///
/// - `403 forbidden`: Caller is not an admin
/// - `404 instituicao_not_found`
pub async fn delete_instituicao(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<Value>> {
    require_role(&auth, UserRole::Admin)?;

    Instituicao::delete(&state.supabase, &auth.scope(), id)
        .await?
        .ok_or(ApiError::NotFound("instituicao_not_found"))?;

    tracing::info!(instituicao_id = %id, deleted_by = %auth.member_id(), "Institution deleted");

    Ok(ApiResponse::success(json!({ "id": id })))
}
