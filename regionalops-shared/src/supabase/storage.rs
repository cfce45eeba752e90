/// Supabase Storage operations
///
/// All operations target the bucket named in `SupabaseConfig::storage_bucket`.
/// Object paths are produced by the caller (see `models::file`) and are
/// expected to be URL-safe already.

use super::client::{send_json, Scope, SupabaseClient, SupabaseError};
use bytes::Bytes;
use reqwest::Method;
use serde::Deserialize;
use serde_json::json;

/// Result of an upload
#[derive(Debug, Clone, Deserialize)]
pub struct StoredObject {
    /// `<bucket>/<path>`
    #[serde(rename = "Key")]
    pub key: String,
}

#[derive(Debug, Deserialize)]
struct SignedUrl {
    #[serde(rename = "signedURL")]
    signed_url: String,
}

impl SupabaseClient {
    /// Uploads `content` to `path`
    pub async fn upload_object(
        &self,
        scope: &Scope,
        path: &str,
        content: Bytes,
        content_type: &str,
    ) -> Result<StoredObject, SupabaseError> {
        let bucket = &self.config().storage_bucket;
        tracing::debug!(bucket = %bucket, path, size = content.len(), "Storage upload");
        let req = self
            .request(
                Method::POST,
                &format!("storage/v1/object/{}/{}", bucket, path),
                scope,
            )?
            .header("Content-Type", content_type)
            .header("x-upsert", "false")
            .body(content);
        send_json(req).await
    }

    /// Removes objects
    pub async fn remove_objects(&self, scope: &Scope, paths: &[String]) -> Result<(), SupabaseError> {
        let bucket = &self.config().storage_bucket;
        tracing::debug!(bucket = %bucket, count = paths.len(), "Storage remove");
        let req = self
            .request(
                Method::DELETE,
                &format!("storage/v1/object/{}", bucket),
                scope,
            )?
            .json(&json!({ "prefixes": paths }));
        let _removed: serde_json::Value = send_json(req).await?;
        Ok(())
    }

    /// Creates a time-limited download URL
    pub async fn create_signed_url(
        &self,
        scope: &Scope,
        path: &str,
        expires_in_secs: u64,
    ) -> Result<String, SupabaseError> {
        let bucket = &self.config().storage_bucket;
        let req = self
            .request(
                Method::POST,
                &format!("storage/v1/object/sign/{}/{}", bucket, path),
                scope,
            )?
            .json(&json!({ "expiresIn": expires_in_secs }));
        let signed: SignedUrl = send_json(req).await?;
        Ok(self.absolute_storage_url(&signed.signed_url))
    }

    /// Storage answers with a path relative to `/storage/v1`
    fn absolute_storage_url(&self, signed_path: &str) -> String {
        if signed_path.starts_with("http://") || signed_path.starts_with("https://") {
            return signed_path.to_string();
        }
        self.endpoint(&format!("storage/v1/{}", signed_path.trim_start_matches('/')))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::supabase::SupabaseConfig;

    #[test]
    fn test_signed_url_is_made_absolute() {
        let client = SupabaseClient::new(SupabaseConfig {
            url: "https://project.supabase.co".to_string(),
            anon_key: "anon".to_string(),
            service_role_key: None,
            jwt_secret: None,
            storage_bucket: "documents".to_string(),
            timeout_secs: 5,
        })
        .unwrap();

        assert_eq!(
            client.absolute_storage_url("/object/sign/documents/a.pdf?token=x"),
            "https://project.supabase.co/storage/v1/object/sign/documents/a.pdf?token=x"
        );
        assert_eq!(
            client.absolute_storage_url("https://cdn.example.org/a.pdf"),
            "https://cdn.example.org/a.pdf"
        );
    }
}
