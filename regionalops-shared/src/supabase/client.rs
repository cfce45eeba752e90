/// Supabase HTTP client wrapper
///
/// Holds a pooled `reqwest::Client` together with the project URL and keys,
/// and decides which credentials a request carries:
///
/// - [`Scope::User`]: anon key + the caller's access token. Row-level security
///   is enforced by the database for everything done in this scope.
/// - [`Scope::Service`]: service-role key. Bypasses row-level security and is
///   required for admin user management.
///
/// # Example
///
/// ```no_run
/// use regionalops_shared::supabase::{SupabaseClient, SupabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let config = SupabaseConfig::from_env()?;
/// let client = SupabaseClient::new(config)?;
///
/// let healthy = client.health().await;
/// println!("Supabase reachable: {}", healthy);
/// # Ok(())
/// # }
/// ```

use reqwest::{Client, Method, RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::env;
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Supabase client errors
#[derive(Error, Debug)]
pub enum SupabaseError {
    /// Transport failure (connection refused, timeout, TLS)
    #[error("Supabase request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Supabase answered with a non-success status
    #[error("Supabase returned {status}: {message}")]
    Api {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// An operation needed the service-role key but none is configured
    #[error("Supabase service role key is not configured")]
    ServiceKeyMissing,

    /// Response body did not have the expected shape
    #[error("Failed to decode Supabase response: {0}")]
    Decode(String),

    /// Configuration error
    #[error("Supabase configuration error: {0}")]
    Config(String),
}

impl SupabaseError {
    /// Builds an [`SupabaseError::Api`] from a raw error body.
    ///
    /// PostgREST, GoTrue and Storage each use a different error envelope, so
    /// the message is taken from the first of `message`, `msg`,
    /// `error_description` or `error` that is present.
    pub fn from_body(status: u16, body: &str) -> Self {
        let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();

        let message = parsed
            .as_ref()
            .and_then(|v| {
                ["message", "msg", "error_description", "error"]
                    .iter()
                    .find_map(|key| v.get(*key).and_then(|m| m.as_str()))
            })
            .map(str::to_string)
            .unwrap_or_else(|| {
                if body.trim().is_empty() {
                    format!("HTTP {}", status)
                } else {
                    body.trim().to_string()
                }
            });

        let code = parsed.as_ref().and_then(|v| {
            ["error_code", "code"].iter().find_map(|key| match v.get(*key) {
                Some(serde_json::Value::String(s)) => Some(s.clone()),
                Some(serde_json::Value::Number(n)) => Some(n.to_string()),
                _ => None,
            })
        });

        SupabaseError::Api {
            status,
            message,
            code,
        }
    }

    /// Status code returned by Supabase, if the error came from a response
    pub fn status(&self) -> Option<u16> {
        match self {
            SupabaseError::Api { status, .. } => Some(*status),
            SupabaseError::Http(err) => err.status().map(|s| s.as_u16()),
            _ => None,
        }
    }

    /// Whether Supabase reported the resource as missing
    pub fn is_not_found(&self) -> bool {
        self.status() == Some(404)
    }
}

/// Supabase configuration
///
/// Can be loaded from environment variables or constructed manually.
#[derive(Clone, Serialize, Deserialize)]
pub struct SupabaseConfig {
    /// Project URL, e.g. `https://xyzcompany.supabase.co`
    pub url: String,

    /// Public anon key (sent as `apikey` on user-scoped requests)
    pub anon_key: String,

    /// Service-role key (admin operations)
    pub service_role_key: Option<String>,

    /// JWT secret used to pre-verify access tokens locally
    pub jwt_secret: Option<String>,

    /// Storage bucket holding uploaded documents
    pub storage_bucket: String,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl fmt::Debug for SupabaseConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseConfig")
            .field("url", &self.url)
            .field("service_role_key", &self.service_role_key.as_ref().map(|_| "<redacted>"))
            .field("jwt_secret", &self.jwt_secret.as_ref().map(|_| "<redacted>"))
            .field("storage_bucket", &self.storage_bucket)
            .field("timeout_secs", &self.timeout_secs)
            .finish()
    }
}

impl SupabaseConfig {
    /// Creates a new Supabase configuration from environment variables
    ///
    /// # Environment Variables
    ///
    /// - `SUPABASE_URL`: Project URL (required)
    /// - `SUPABASE_ANON_KEY`: Anon key (required)
    /// - `SUPABASE_SERVICE_ROLE_KEY`: Service-role key (optional, admin routes)
    /// - `SUPABASE_JWT_SECRET`: JWT secret (optional, local token checks)
    /// - `SUPABASE_STORAGE_BUCKET`: Bucket for uploads (default: documents)
    /// - `SUPABASE_TIMEOUT_SECS`: Request timeout (default: 15)
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or the URL is not http(s).
    pub fn from_env() -> Result<Self, SupabaseError> {
        // Load .env if present
        dotenvy::dotenv().ok();

        let url = env::var("SUPABASE_URL").map_err(|_| {
            SupabaseError::Config("SUPABASE_URL environment variable is required".to_string())
        })?;

        if !url.starts_with("http://") && !url.starts_with("https://") {
            return Err(SupabaseError::Config(format!(
                "SUPABASE_URL must be an http(s) URL, got {}",
                url
            )));
        }

        let anon_key = env::var("SUPABASE_ANON_KEY").map_err(|_| {
            SupabaseError::Config("SUPABASE_ANON_KEY environment variable is required".to_string())
        })?;

        let service_role_key = env::var("SUPABASE_SERVICE_ROLE_KEY")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let jwt_secret = env::var("SUPABASE_JWT_SECRET")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let storage_bucket =
            env::var("SUPABASE_STORAGE_BUCKET").unwrap_or_else(|_| "documents".to_string());

        let timeout_secs = env::var("SUPABASE_TIMEOUT_SECS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(15);

        Ok(Self {
            url: url.trim_end_matches('/').to_string(),
            anon_key,
            service_role_key,
            jwt_secret,
            storage_bucket,
            timeout_secs,
        })
    }
}

/// Credentials a request is made with
#[derive(Clone, PartialEq, Eq)]
pub enum Scope {
    /// Caller's access token; row-level security applies
    User(String),

    /// Service-role key; bypasses row-level security
    Service,
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scope::User(_) => f.write_str("Scope::User(<token>)"),
            Scope::Service => f.write_str("Scope::Service"),
        }
    }
}

/// Supabase client
///
/// Cheap to clone: the HTTP pool and configuration are shared.
#[derive(Clone)]
pub struct SupabaseClient {
    http: Client,
    config: Arc<SupabaseConfig>,
}

impl fmt::Debug for SupabaseClient {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SupabaseClient")
            .field("config", &self.config)
            .finish()
    }
}

impl SupabaseClient {
    /// Creates a new client
    ///
    /// # Errors
    ///
    /// Returns an error if the HTTP client cannot be built.
    pub fn new(config: SupabaseConfig) -> Result<Self, SupabaseError> {
        let http = Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()?;

        tracing::info!(url = %config.url, service_role = config.service_role_key.is_some(), "Supabase client initialized");

        Ok(Self {
            http,
            config: Arc::new(config),
        })
    }

    /// Client configuration
    pub fn config(&self) -> &SupabaseConfig {
        &self.config
    }

    /// Whether admin operations are available
    pub fn has_service_role(&self) -> bool {
        self.config.service_role_key.is_some()
    }

    /// Service scope when the key is configured, otherwise the caller's token
    pub fn preferred_scope(&self, token: &str) -> Scope {
        if self.has_service_role() {
            Scope::Service
        } else {
            Scope::User(token.to_string())
        }
    }

    pub(crate) fn endpoint(&self, path: &str) -> String {
        format!(
            "{}/{}",
            self.config.url.trim_end_matches('/'),
            path.trim_start_matches('/')
        )
    }

    /// Request carrying the credentials for `scope`
    pub(crate) fn request(
        &self,
        method: Method,
        path: &str,
        scope: &Scope,
    ) -> Result<RequestBuilder, SupabaseError> {
        let (apikey, bearer) = match scope {
            Scope::User(token) => (self.config.anon_key.as_str(), token.as_str()),
            Scope::Service => {
                let key = self
                    .config
                    .service_role_key
                    .as_deref()
                    .ok_or(SupabaseError::ServiceKeyMissing)?;
                (key, key)
            }
        };

        Ok(self
            .http
            .request(method, self.endpoint(path))
            .header("apikey", apikey)
            .bearer_auth(bearer))
    }

    /// Request carrying only the anon key (sign-in, refresh, recovery)
    pub(crate) fn anon_request(&self, method: Method, path: &str) -> RequestBuilder {
        self.http
            .request(method, self.endpoint(path))
            .header("apikey", &self.config.anon_key)
            .bearer_auth(&self.config.anon_key)
    }

    /// Checks that the auth service answers
    pub async fn health(&self) -> bool {
        match self.anon_request(Method::GET, "auth/v1/health").send().await {
            Ok(response) => response.status().is_success(),
            Err(e) => {
                tracing::warn!(error = %e, "Supabase health check failed");
                false
            }
        }
    }
}

/// Sends a request and decodes a JSON body
pub(crate) async fn send_json<T: DeserializeOwned>(req: RequestBuilder) -> Result<T, SupabaseError> {
    let response = check_status(req.send().await?).await?;
    let bytes = response.bytes().await?;
    serde_json::from_slice(&bytes).map_err(|e| SupabaseError::Decode(e.to_string()))
}

/// Sends a request and discards the body
pub(crate) async fn send_empty(req: RequestBuilder) -> Result<(), SupabaseError> {
    check_status(req.send().await?).await?;
    Ok(())
}

async fn check_status(response: Response) -> Result<Response, SupabaseError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    let err = SupabaseError::from_body(status.as_u16(), &body);
    tracing::debug!(status = status.as_u16(), error = %err, "Supabase request rejected");
    Err(err)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn test_config() -> SupabaseConfig {
        SupabaseConfig {
            url: "http://localhost:54321/".to_string(),
            anon_key: "anon".to_string(),
            service_role_key: None,
            jwt_secret: None,
            storage_bucket: "documents".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_error_from_postgrest_body() {
        let err = SupabaseError::from_body(
            409,
            r#"{"code":"23505","details":null,"hint":null,"message":"duplicate key value"}"#,
        );
        match err {
            SupabaseError::Api { status, message, code } => {
                assert_eq!(status, 409);
                assert_eq!(message, "duplicate key value");
                assert_eq!(code.as_deref(), Some("23505"));
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_error_from_gotrue_body() {
        let err = SupabaseError::from_body(
            400,
            r#"{"error":"invalid_grant","error_description":"Invalid login credentials"}"#,
        );
        assert_eq!(err.to_string(), "Supabase returned 400: Invalid login credentials");
    }

    #[test]
    fn test_error_from_plain_body() {
        let err = SupabaseError::from_body(502, "");
        assert_eq!(err.to_string(), "Supabase returned 502: HTTP 502");
        assert_eq!(err.status(), Some(502));
        assert!(!err.is_not_found());
        assert!(SupabaseError::from_body(404, "{}").is_not_found());
    }

    #[test]
    fn test_endpoint_joins_paths() {
        let client = SupabaseClient::new(test_config()).unwrap();
        assert_eq!(
            client.endpoint("/rest/v1/members"),
            "http://localhost:54321/rest/v1/members"
        );
    }

    #[test]
    fn test_service_scope_requires_key() {
        let client = SupabaseClient::new(test_config()).unwrap();
        assert!(!client.has_service_role());
        assert!(matches!(
            client.request(Method::GET, "rest/v1/members", &Scope::Service),
            Err(SupabaseError::ServiceKeyMissing)
        ));
        assert_eq!(client.preferred_scope("tok"), Scope::User("tok".to_string()));
    }

    #[test]
    fn test_debug_redacts_secrets() {
        let mut config = test_config();
        config.service_role_key = Some("super-secret".to_string());
        let printed = format!("{:?}", config);
        assert!(!printed.contains("super-secret"));
        assert!(!format!("{:?}", Scope::User("abc".to_string())).contains("abc"));
    }
}
