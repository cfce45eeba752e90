/// Document upload endpoints
///
/// Bytes go to Supabase Storage; the `files` table keeps the metadata.
///
/// # Endpoints
///
/// - `GET    /files` - List file metadata (`?regional`, `?member_id`)
/// - `POST   /files` - Upload (multipart: `file`, optional `descricao`, `regional`)
/// - `GET    /files/:id` - Metadata plus a signed download URL
/// - `DELETE /files/:id` - Remove object and metadata (owner or coordenador+)

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{non_empty, PathId, QueryParams},
    response::ApiResponse,
};
use axum::{
    extract::{
        multipart::{MultipartError, MultipartRejection},
        Multipart, State,
    },
    Extension,
};
use bytes::Bytes;
use regionalops_shared::{
    auth::{
        authorization::{
            assigned_regional, require_owner_or_role, require_regional_access, scoped_regional,
        },
        middleware::AuthContext,
    },
    models::{
        file::{self, CreateFileRecord, FileFilter, FileRecord},
        member::UserRole,
    },
    supabase::{Scope, SupabaseClient},
};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use uuid::Uuid;

/// Lifetime of download links
const SIGNED_URL_TTL_SECS: u64 = 3600;

/// Longest accepted description
const MAX_DESCRICAO_LEN: usize = 2000;

#[derive(Debug, Default, Deserialize)]
pub struct FileListQuery {
    pub regional: Option<String>,
    pub member_id: Option<Uuid>,
}

/// File metadata with a download link
#[derive(Debug, Serialize)]
pub struct FileDownload {
    #[serde(flatten)]
    pub file: FileRecord,

    pub download_url: String,

    /// Seconds the link stays valid
    pub expires_in: u64,
}

/// Parts of an upload form
#[derive(Debug, Default)]
struct UploadForm {
    file_name: Option<String>,
    content_type: Option<String>,
    content: Option<Bytes>,
    descricao: Option<String>,
    regional: Option<String>,
}

fn multipart_error(err: MultipartError) -> ApiError {
    if err.status() == axum::http::StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge("Upload exceeds the size limit".to_string())
    } else {
        ApiError::invalid_payload(err.body_text())
    }
}

async fn read_form(mut multipart: Multipart) -> ApiResult<UploadForm> {
    let mut form = UploadForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error)? {
        let name = field.name().unwrap_or_default().to_string();
        match name.as_str() {
            "file" => {
                form.file_name = field.file_name().map(str::to_string);
                form.content_type = field.content_type().map(str::to_string);
                form.content = Some(field.bytes().await.map_err(multipart_error)?);
            }
            "descricao" => form.descricao = Some(field.text().await.map_err(multipart_error)?),
            "regional" => form.regional = Some(field.text().await.map_err(multipart_error)?),
            other => tracing::debug!(field = other, "Ignoring unknown upload field"),
        }
    }

    Ok(form)
}

async fn find_file(
    db: &SupabaseClient,
    scope: &Scope,
    auth: &AuthContext,
    id: Uuid,
) -> ApiResult<FileRecord> {
    let record = FileRecord::find_by_id(db, scope, id)
        .await?
        .ok_or(ApiError::NotFound("file_not_found"))?;

    require_regional_access(auth, record.regional.as_deref())?;
    Ok(record)
}

/// List file metadata, newest first
pub async fn list_files(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    QueryParams(query): QueryParams<FileListQuery>,
) -> ApiResult<ApiResponse<Vec<FileRecord>>> {
    let filter = FileFilter {
        regional: scoped_regional(&auth, query.regional.as_deref())?,
        member_id: query.member_id,
    };

    let files = FileRecord::list(&state.supabase, &auth.scope(), &filter).await?;
    Ok(ApiResponse::success(files))
}

/// Upload a document
///
/// # Errors
///
/// - `400 invalid_payload`: No `file` part, empty file or MIME type not allowed
/// - `413 payload_too_large`: File larger than `MAX_UPLOAD_BYTES`
pub async fn upload_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> ApiResult<ApiResponse<FileRecord>> {
    let multipart = multipart.map_err(|e| ApiError::invalid_payload(e.body_text()))?;
    let form = read_form(multipart).await?;

    let content = form
        .content
        .ok_or_else(|| ApiError::invalid_field("file", "File is required"))?;
    if content.is_empty() {
        return Err(ApiError::invalid_field("file", "File is empty"));
    }

    let max_bytes = state.config.upload.max_bytes;
    if content.len() > max_bytes {
        return Err(ApiError::PayloadTooLarge(format!(
            "File exceeds the {} byte limit",
            max_bytes
        )));
    }

    let mime_type = form
        .content_type
        .filter(|m| file::is_allowed_mime(m))
        .ok_or_else(|| ApiError::invalid_field("file", "File type not allowed"))?;

    let descricao = non_empty(form.descricao);
    if descricao.as_ref().is_some_and(|d| d.chars().count() > MAX_DESCRICAO_LEN) {
        return Err(ApiError::invalid_field(
            "descricao",
            format!("Description must be at most {} characters", MAX_DESCRICAO_LEN),
        ));
    }

    let regional = assigned_regional(&auth, form.regional.as_deref())?;

    let nome = form
        .file_name
        .and_then(|n| non_empty(Some(n)))
        .unwrap_or_else(|| "arquivo".to_string());
    let path = file::object_path(regional.as_deref(), auth.member_id(), &nome);
    let checksum = file::checksum(&content);
    let tamanho = content.len() as i64;

    let db = &state.supabase;
    let scope = auth.scope();

    db.upload_object(&scope, &path, content, &mime_type).await?;

    let record = CreateFileRecord {
        member_id: auth.member_id(),
        nome,
        path: path.clone(),
        mime_type,
        tamanho,
        checksum,
        regional,
        descricao,
    };

    let record = match FileRecord::create(db, &scope, &record).await {
        Ok(record) => record,
        Err(e) => {
            // Don't keep bytes nobody can find
            if let Err(cleanup) = db.remove_objects(&scope, &[path.clone()]).await {
                tracing::error!(error = %cleanup, path = %path, "Failed to remove orphaned upload");
            }
            return Err(e.into());
        }
    };

    tracing::info!(
        file_id = %record.id,
        member_id = %record.member_id,
        size = record.tamanho,
        mime_type = %record.mime_type,
        "File uploaded"
    );

    Ok(ApiResponse::created(record))
}

/// File metadata with a signed download URL
///
/// # Errors
///
/// - `404 file_not_found`
pub async fn get_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<FileDownload>> {
    let db = &state.supabase;
    let scope = auth.scope();

    let file = find_file(db, &scope, &auth, id).await?;
    let download_url = db
        .create_signed_url(&scope, &file.path, SIGNED_URL_TTL_SECS)
        .await?;

    Ok(ApiResponse::success(FileDownload {
        file,
        download_url,
        expires_in: SIGNED_URL_TTL_SECS,
    }))
}

/// Delete a file
///
/// # Errors
///
/// - `403 forbidden`: Caller neither uploaded the file nor is coordenador+
/// - `404 file_not_found`
pub async fn delete_file(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    PathId(id): PathId,
) -> ApiResult<ApiResponse<Value>> {
    let db = &state.supabase;
    let scope = auth.scope();

    let file = find_file(db, &scope, &auth, id).await?;
    require_owner_or_role(&auth, file.member_id, UserRole::Coordenador)?;

    match db.remove_objects(&scope, &[file.path.clone()]).await {
        Ok(()) => {}
        Err(e) if e.is_not_found() => {
            tracing::warn!(file_id = %id, path = %file.path, "Stored object already missing");
        }
        Err(e) => return Err(e.into()),
    }

    FileRecord::delete(db, &scope, id)
        .await?
        .ok_or(ApiError::NotFound("file_not_found"))?;

    tracing::info!(file_id = %id, deleted_by = %auth.member_id(), "File deleted");

    Ok(ApiResponse::success(json!({ "id": id })))
}
