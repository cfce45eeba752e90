/// Error handling for the API server
///
/// This module provides a unified error type that maps to HTTP responses.
/// All handlers return `Result<T, ApiError>`; the error body is always
///
/// ```json
/// { "error": "<code>", "details": { ... } }
/// ```
///
/// with `details` omitted when there is nothing useful to add.
///
/// # Example
///
/// ```
/// use regionalops_api::error::{ApiError, ApiResult};
/// use regionalops_api::response::ApiResponse;
///
/// async fn handler(found: bool) -> ApiResult<ApiResponse<&'static str>> {
///     if !found {
///         return Err(ApiError::NotFound("goal_not_found"));
///     }
///     Ok(ApiResponse::success("ok"))
/// }
/// ```

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use regionalops_shared::auth::authorization::AuthzError;
use regionalops_shared::auth::middleware::AuthError;
use regionalops_shared::supabase::SupabaseError;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use std::fmt;

/// API result type alias
pub type ApiResult<T> = Result<T, ApiError>;

/// Postgres unique-violation code
const UNIQUE_VIOLATION: &str = "23505";

/// Unified API error type
#[derive(Debug)]
pub enum ApiError {
    /// Bad request (400)
    BadRequest(String),

    /// Payload failed validation (400)
    InvalidPayload {
        message: String,
        fields: Vec<FieldError>,
    },

    /// Unauthorized (401)
    Unauthorized(String),

    /// Wrong e-mail or password (401)
    InvalidCredentials,

    /// Forbidden (403); `code` narrows the reason
    Forbidden { code: &'static str, message: String },

    /// Not found (404); carries the `<resource>_not_found` code
    NotFound(&'static str),

    /// Conflict (409) - e.g., duplicate e-mail
    Conflict(String),

    /// Payload too large (413)
    PayloadTooLarge(String),

    /// Too many requests (429)
    RateLimitExceeded { retry_after: u64, message: String },

    /// Supabase rejected the request; status is passed through
    Upstream {
        status: u16,
        message: String,
        code: Option<String>,
    },

    /// Service unavailable (503)
    ServiceUnavailable { code: &'static str, message: String },

    /// Internal server error (500)
    InternalError(String),
}

/// Validation error detail
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Field that failed validation
    pub field: String,

    /// Error message
    pub message: String,
}

/// Error response format
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    /// Error code (e.g., "invalid_payload", "unauthorized")
    pub error: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    /// 403 with the generic `forbidden` code
    pub fn forbidden(message: impl Into<String>) -> Self {
        ApiError::Forbidden {
            code: "forbidden",
            message: message.into(),
        }
    }

    /// 400 `invalid_payload` without field details
    pub fn invalid_payload(message: impl Into<String>) -> Self {
        ApiError::InvalidPayload {
            message: message.into(),
            fields: Vec::new(),
        }
    }

    /// 400 `invalid_payload` for a single field
    pub fn invalid_field(field: &str, message: impl Into<String>) -> Self {
        let message = message.into();
        ApiError::InvalidPayload {
            message: message.clone(),
            fields: vec![FieldError {
                field: field.to_string(),
                message,
            }],
        }
    }

    /// HTTP status of this error
    pub fn status(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) | ApiError::InvalidPayload { .. } => StatusCode::BAD_REQUEST,
            ApiError::Unauthorized(_) | ApiError::InvalidCredentials => StatusCode::UNAUTHORIZED,
            ApiError::Forbidden { .. } => StatusCode::FORBIDDEN,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::Conflict(_) => StatusCode::CONFLICT,
            ApiError::PayloadTooLarge(_) => StatusCode::PAYLOAD_TOO_LARGE,
            ApiError::RateLimitExceeded { .. } => StatusCode::TOO_MANY_REQUESTS,
            ApiError::Upstream { status, .. } => {
                StatusCode::from_u16(*status).unwrap_or(StatusCode::BAD_GATEWAY)
            }
            ApiError::ServiceUnavailable { .. } => StatusCode::SERVICE_UNAVAILABLE,
            ApiError::InternalError(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Machine-readable error code
    pub fn code(&self) -> &'static str {
        match self {
            ApiError::BadRequest(_) => "bad_request",
            ApiError::InvalidPayload { .. } => "invalid_payload",
            ApiError::Unauthorized(_) => "unauthorized",
            ApiError::InvalidCredentials => "invalid_credentials",
            ApiError::Forbidden { code, .. } => *code,
            ApiError::NotFound(code) => *code,
            ApiError::Conflict(_) => "conflict",
            ApiError::PayloadTooLarge(_) => "payload_too_large",
            ApiError::RateLimitExceeded { .. } => "rate_limit_exceeded",
            ApiError::Upstream { .. } => "supabase_error",
            ApiError::ServiceUnavailable { code, .. } => *code,
            ApiError::InternalError(_) => "internal_error",
        }
    }

    fn details(&self) -> Option<Value> {
        match self {
            ApiError::BadRequest(message)
            | ApiError::Unauthorized(message)
            | ApiError::Forbidden { message, .. }
            | ApiError::Conflict(message)
            | ApiError::PayloadTooLarge(message)
            | ApiError::RateLimitExceeded { message, .. }
            | ApiError::ServiceUnavailable { message, .. } => Some(json!({ "message": message })),
            ApiError::InvalidPayload { message, fields } if fields.is_empty() => {
                Some(json!({ "message": message }))
            }
            ApiError::InvalidPayload { message, fields } => {
                Some(json!({ "message": message, "fields": fields }))
            }
            ApiError::Upstream { message, code, .. } => match code {
                Some(code) => Some(json!({ "message": message, "code": code })),
                None => Some(json!({ "message": message })),
            },
            ApiError::InvalidCredentials | ApiError::NotFound(_) | ApiError::InternalError(_) => None,
        }
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ApiError::BadRequest(msg) => write!(f, "Bad request: {}", msg),
            ApiError::InvalidPayload { message, fields } => {
                write!(f, "Invalid payload: {} ({} field errors)", message, fields.len())
            }
            ApiError::Unauthorized(msg) => write!(f, "Unauthorized: {}", msg),
            ApiError::InvalidCredentials => write!(f, "Invalid credentials"),
            ApiError::Forbidden { code, message } => write!(f, "Forbidden ({}): {}", code, message),
            ApiError::NotFound(code) => write!(f, "Not found: {}", code),
            ApiError::Conflict(msg) => write!(f, "Conflict: {}", msg),
            ApiError::PayloadTooLarge(msg) => write!(f, "Payload too large: {}", msg),
            ApiError::RateLimitExceeded { message, .. } => {
                write!(f, "Rate limit exceeded: {}", message)
            }
            ApiError::Upstream { status, message, .. } => {
                write!(f, "Supabase error {}: {}", status, message)
            }
            ApiError::ServiceUnavailable { message, .. } => {
                write!(f, "Service unavailable: {}", message)
            }
            ApiError::InternalError(msg) => write!(f, "Internal error: {}", msg),
        }
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status();

        match &self {
            ApiError::InternalError(msg) => {
                // Log internal errors but don't expose details to clients
                tracing::error!(error = %msg, "Internal error");
            }
            ApiError::Upstream { status, message, .. } if *status >= 500 => {
                tracing::warn!(status, error = %message, "Supabase failure");
            }
            _ => {}
        }

        let body = Json(ErrorResponse {
            error: self.code().to_string(),
            details: self.details(),
        });

        let mut response = (status, body).into_response();

        // Add Retry-After header for rate limiting
        if let ApiError::RateLimitExceeded { retry_after, .. } = &self {
            if let Ok(value) = HeaderValue::from_str(&retry_after.to_string()) {
                response.headers_mut().insert(header::RETRY_AFTER, value);
            }
        }

        response
    }
}

/// Convert Supabase errors to API errors
impl From<SupabaseError> for ApiError {
    fn from(err: SupabaseError) -> Self {
        match err {
            SupabaseError::ServiceKeyMissing => ApiError::ServiceUnavailable {
                code: "supabase_client_unavailable",
                message: "Supabase service client is not configured".to_string(),
            },
            SupabaseError::Api { status, message, code } => {
                if status == 409 || code.as_deref() == Some(UNIQUE_VIOLATION) {
                    return ApiError::Conflict(message);
                }
                let status = if (400..=599).contains(&status) { status } else { 502 };
                ApiError::Upstream { status, message, code }
            }
            SupabaseError::Http(e) => ApiError::Upstream {
                status: 502,
                message: format!("Supabase unreachable: {}", e),
                code: None,
            },
            SupabaseError::Decode(msg) => {
                ApiError::InternalError(format!("Unexpected Supabase response: {}", msg))
            }
            SupabaseError::Config(msg) => ApiError::InternalError(msg),
        }
    }
}

/// Convert auth errors to API errors
impl From<AuthError> for ApiError {
    fn from(err: AuthError) -> Self {
        match err {
            AuthError::MissingCredentials => ApiError::Unauthorized("Missing credentials".to_string()),
            AuthError::InvalidFormat(msg) | AuthError::InvalidToken(msg) => ApiError::Unauthorized(msg),
            AuthError::MemberNotFound => ApiError::Forbidden {
                code: "member_not_found",
                message: "No member profile is linked to this user".to_string(),
            },
            AuthError::MemberInactive => ApiError::Forbidden {
                code: "member_inactive",
                message: "Member is inactive".to_string(),
            },
            AuthError::Upstream(e) => e.into(),
        }
    }
}

/// Convert authorization errors to API errors
impl From<AuthzError> for ApiError {
    fn from(err: AuthzError) -> Self {
        match err {
            AuthzError::InsufficientRole { .. } => ApiError::forbidden("Insufficient permissions"),
            AuthzError::OutsideRegional => {
                ApiError::forbidden("Resource belongs to another regional")
            }
            AuthzError::NotOwner => ApiError::forbidden("Not authorized to access this resource"),
            AuthzError::RegionalNotAssigned => ApiError::Forbidden {
                code: "regional_not_assigned",
                message: "No regional assigned to this member".to_string(),
            },
        }
    }
}

/// Convert validator errors to API errors
impl From<validator::ValidationErrors> for ApiError {
    fn from(errors: validator::ValidationErrors) -> Self {
        let mut fields: Vec<FieldError> = errors
            .field_errors()
            .into_iter()
            .flat_map(|(field, errs)| {
                let field = field.to_string();
                errs.iter().map(move |e| FieldError {
                    field: field.clone(),
                    message: e
                        .message
                        .as_ref()
                        .map(|m| m.to_string())
                        .unwrap_or_else(|| e.code.to_string()),
                })
            })
            .collect();
        fields.sort_by(|a, b| a.field.cmp(&b.field));

        ApiError::InvalidPayload {
            message: "Request validation failed".to_string(),
            fields,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = ApiError::BadRequest("Invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: Invalid input");

        let err = ApiError::NotFound("goal_not_found");
        assert_eq!(err.to_string(), "Not found: goal_not_found");
    }

    #[test]
    fn test_status_and_code() {
        assert_eq!(ApiError::InvalidCredentials.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(ApiError::InvalidCredentials.code(), "invalid_credentials");
        assert_eq!(ApiError::NotFound("file_not_found").code(), "file_not_found");
        assert_eq!(
            ApiError::PayloadTooLarge("big".to_string()).status(),
            StatusCode::PAYLOAD_TOO_LARGE
        );
    }

    #[test]
    fn test_supabase_error_mapping() {
        let err: ApiError = SupabaseError::ServiceKeyMissing.into();
        assert_eq!(err.status(), StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(err.code(), "supabase_client_unavailable");

        let err: ApiError = SupabaseError::from_body(
            409,
            r#"{"code":"23505","message":"duplicate key value"}"#,
        )
        .into();
        assert_eq!(err.code(), "conflict");

        let err: ApiError = SupabaseError::from_body(422, r#"{"msg":"weak password"}"#).into();
        assert_eq!(err.status(), StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(err.code(), "supabase_error");
    }

    #[test]
    fn test_auth_error_mapping() {
        let err: ApiError = AuthError::MissingCredentials.into();
        assert_eq!(err.status(), StatusCode::UNAUTHORIZED);

        let err: ApiError = AuthError::MemberNotFound.into();
        assert_eq!(err.status(), StatusCode::FORBIDDEN);
        assert_eq!(err.code(), "member_not_found");

        let err: ApiError = AuthzError::RegionalNotAssigned.into();
        assert_eq!(err.code(), "regional_not_assigned");
    }

    #[test]
    fn test_invalid_payload_details() {
        let err = ApiError::invalid_field("member_id", "Field is not allowed");
        let details = err.details().unwrap();
        assert_eq!(details["fields"][0]["field"], "member_id");
        assert_eq!(err.status(), StatusCode::BAD_REQUEST);
    }

    #[test]
    fn test_rate_limit_response_has_retry_after() {
        let response = ApiError::RateLimitExceeded {
            retry_after: 12,
            message: "slow down".to_string(),
        }
        .into_response();

        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(response.headers().get(header::RETRY_AFTER).unwrap(), "12");
    }
}
