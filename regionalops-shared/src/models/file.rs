/// Uploaded document metadata
///
/// The bytes live in Supabase Storage under [`object_path`]; the `files`
/// table records who uploaded what, where it is stored and its SHA-256
/// checksum.

use crate::supabase::{Scope, SupabaseClient, SupabaseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use uuid::Uuid;

/// MIME types accepted for upload
pub const ALLOWED_MIME_TYPES: &[&str] = &[
    "application/pdf",
    "image/jpeg",
    "image/png",
    "image/webp",
    "text/plain",
    "text/csv",
    "application/msword",
    "application/vnd.openxmlformats-officedocument.wordprocessingml.document",
    "application/vnd.ms-excel",
    "application/vnd.openxmlformats-officedocument.spreadsheetml.sheet",
];

/// Longest file name kept in object paths
const MAX_NAME_LEN: usize = 100;

/// File metadata record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FileRecord {
    pub id: Uuid,
    pub member_id: Uuid,

    /// Original file name as uploaded
    pub nome: String,

    /// Object path inside the storage bucket
    pub path: String,

    pub mime_type: String,

    /// Size in bytes
    pub tamanho: i64,

    /// SHA-256 of the content, lowercase hex
    #[serde(default)]
    pub checksum: Option<String>,

    #[serde(default)]
    pub regional: Option<String>,

    #[serde(default)]
    pub descricao: Option<String>,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateFileRecord {
    pub member_id: Uuid,
    pub nome: String,
    pub path: String,
    pub mime_type: String,
    pub tamanho: i64,
    pub checksum: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub descricao: Option<String>,
}

#[derive(Debug, Clone, Default)]
pub struct FileFilter {
    pub regional: Option<String>,
    pub member_id: Option<Uuid>,
}

impl FileRecord {
    pub const TABLE: &'static str = "files";

    pub async fn create(
        db: &SupabaseClient,
        scope: &Scope,
        data: &CreateFileRecord,
    ) -> Result<Self, SupabaseError> {
        db.from(Self::TABLE).insert_one(scope, data).await
    }

    pub async fn find_by_id(
        db: &SupabaseClient,
        scope: &Scope,
        id: Uuid,
    ) -> Result<Option<Self>, SupabaseError> {
        db.from(Self::TABLE).eq("id", id).fetch_optional(scope).await
    }

    pub async fn list(
        db: &SupabaseClient,
        scope: &Scope,
        filter: &FileFilter,
    ) -> Result<Vec<Self>, SupabaseError> {
        let mut query = db.from(Self::TABLE).order("created_at", false);

        if let Some(regional) = &filter.regional {
            query = query.eq("regional", regional);
        }
        if let Some(member_id) = filter.member_id {
            query = query.eq("member_id", member_id);
        }

        query.fetch(scope).await
    }

    pub async fn delete(
        db: &SupabaseClient,
        scope: &Scope,
        id: Uuid,
    ) -> Result<Option<Self>, SupabaseError> {
        let rows: Vec<Self> = db.from(Self::TABLE).eq("id", id).delete(scope).await?;
        Ok(rows.into_iter().next())
    }
}

/// Whether `mime_type` (parameters ignored) may be uploaded
pub fn is_allowed_mime(mime_type: &str) -> bool {
    let essence = mime_type
        .split(';')
        .next()
        .unwrap_or_default()
        .trim()
        .to_ascii_lowercase();
    ALLOWED_MIME_TYPES.contains(&essence.as_str())
}

/// Lowercase hex SHA-256 of `content`
pub fn checksum(content: &[u8]) -> String {
    hex::encode(Sha256::digest(content))
}

/// Reduces a client-supplied file name to `[A-Za-z0-9._-]`
///
/// Directory components are dropped. Returns `"arquivo"` when nothing usable
/// remains.
pub fn sanitize_file_name(name: &str) -> String {
    let base = name.rsplit(['/', '\\']).next().unwrap_or_default();

    let mut cleaned = String::with_capacity(base.len());
    for c in base.chars() {
        if c.is_ascii_alphanumeric() || matches!(c, '.' | '-' | '_') {
            cleaned.push(c);
        } else if !cleaned.ends_with('_') {
            cleaned.push('_');
        }
    }

    let cleaned = cleaned.trim_matches(|c| c == '.' || c == '_').to_string();
    if cleaned.is_empty() {
        return "arquivo".to_string();
    }

    if cleaned.len() > MAX_NAME_LEN {
        // Keep the extension when truncating
        let ext = cleaned
            .rfind('.')
            .map(|i| &cleaned[i..])
            .filter(|e| e.len() <= 10)
            .unwrap_or("");
        let stem_len = MAX_NAME_LEN - ext.len();
        return format!("{}{}", &cleaned[..stem_len], ext);
    }

    cleaned
}

/// Storage path for a new upload: `<regional>/<member_id>/<uuid>-<name>`
pub fn object_path(regional: Option<&str>, member_id: Uuid, file_name: &str) -> String {
    let folder = regional
        .map(slug)
        .filter(|s| !s.is_empty())
        .unwrap_or_else(|| "geral".to_string());
    format!(
        "{}/{}/{}-{}",
        folder,
        member_id,
        Uuid::new_v4(),
        sanitize_file_name(file_name)
    )
}

fn slug(value: &str) -> String {
    crate::dashboard::normalize::strip_accents(value)
        .to_ascii_lowercase()
        .split(|c: char| !c.is_ascii_alphanumeric())
        .filter(|s| !s.is_empty())
        .collect::<Vec<_>>()
        .join("-")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mime_allowlist() {
        assert!(is_allowed_mime("application/pdf"));
        assert!(is_allowed_mime("text/plain; charset=utf-8"));
        assert!(is_allowed_mime("IMAGE/PNG"));
        assert!(!is_allowed_mime("application/x-msdownload"));
        assert!(!is_allowed_mime(""));
    }

    #[test]
    fn test_checksum_is_sha256_hex() {
        assert_eq!(
            checksum(b"abc"),
            "ba7816bf8f01cfea414140de5dae2223b00361a396177a9cb410ff61f20015ad"
        );
    }

    #[test]
    fn test_sanitize_file_name() {
        assert_eq!(sanitize_file_name("relatório final.pdf"), "relat_rio_final.pdf");
        assert_eq!(sanitize_file_name("../../etc/passwd"), "passwd");
        assert_eq!(sanitize_file_name("C:\\docs\\ata.docx"), "ata.docx");
        assert_eq!(sanitize_file_name("..."), "arquivo");
    }

    #[test]
    fn test_sanitize_keeps_extension_when_truncating() {
        let long = format!("{}.pdf", "a".repeat(300));
        let cleaned = sanitize_file_name(&long);
        assert_eq!(cleaned.len(), MAX_NAME_LEN);
        assert!(cleaned.ends_with(".pdf"));
    }

    #[test]
    fn test_object_path_layout() {
        let member_id = Uuid::new_v4();
        let path = object_path(Some("Região Norte"), member_id, "ata.pdf");
        let parts: Vec<&str> = path.split('/').collect();
        assert_eq!(parts.len(), 3);
        assert_eq!(parts[0], "regiao-norte");
        assert_eq!(parts[1], member_id.to_string());
        assert!(parts[2].ends_with("-ata.pdf"));

        assert!(object_path(None, member_id, "x.txt").starts_with("geral/"));
    }
}
