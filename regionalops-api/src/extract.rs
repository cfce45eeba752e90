/// Request extractors with API-shaped rejections
///
/// axum's stock extractors reject with plain-text bodies. These wrappers turn
/// every rejection into an [`ApiError`] so clients always get the JSON error
/// envelope.
///
/// - [`Payload`]: JSON body, checked for forbidden fields before it is typed
/// - [`OptionalPayload`]: same, for endpoints where the body may be left out
/// - [`QueryParams`]: query string
/// - [`PathId`]: a UUID path segment

use crate::error::{ApiError, ApiResult};
use async_trait::async_trait;
use axum::{
    body::Bytes,
    extract::{FromRequest, FromRequestParts, Path, Query, Request},
    http::request::Parts,
    Json,
};
use serde::de::DeserializeOwned;
use serde_json::Value;
use uuid::Uuid;
use validator::{Validate, ValidationError};

/// Fields clients may never set on a record
pub const SERVER_OWNED_FIELDS: &[&str] = &["id", "member_id", "auth_user_id", "created_at"];

/// Raw JSON body
#[derive(Debug, Clone)]
pub struct Payload(pub Value);

impl Payload {
    /// Rejects `forbidden` fields, then deserializes and validates the body
    ///
    /// # Errors
    ///
    /// `400 invalid_payload` when the body is not an object, carries a
    /// forbidden field, has the wrong shape or fails validation.
    pub fn parse<T>(self, forbidden: &[&str]) -> ApiResult<T>
    where
        T: DeserializeOwned + Validate,
    {
        let Value::Object(map) = &self.0 else {
            return Err(ApiError::invalid_payload("Request body must be a JSON object"));
        };

        if let Some(field) = forbidden.iter().find(|f| map.contains_key(**f)) {
            return Err(ApiError::invalid_field(
                field,
                format!("Field '{}' cannot be set by the client", field),
            ));
        }

        let value: T = serde_json::from_value(self.0)
            .map_err(|e| ApiError::invalid_payload(e.to_string()))?;
        value.validate()?;

        Ok(value)
    }
}

#[async_trait]
impl<S> FromRequest<S> for Payload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let Json(value) = Json::<Value>::from_request(req, state)
            .await
            .map_err(|e| ApiError::invalid_payload(e.body_text()))?;
        Ok(Payload(value))
    }
}

/// JSON body that may be absent
///
/// An empty body is `None`. Anything else must be valid JSON.
#[derive(Debug, Clone)]
pub struct OptionalPayload(pub Option<Payload>);

#[async_trait]
impl<S> FromRequest<S> for OptionalPayload
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        let bytes = Bytes::from_request(req, state)
            .await
            .map_err(|e| ApiError::invalid_payload(e.body_text()))?;

        if bytes.iter().all(u8::is_ascii_whitespace) {
            return Ok(OptionalPayload(None));
        }

        let Json(value) =
            Json::<Value>::from_bytes(&bytes).map_err(|e| ApiError::invalid_payload(e.body_text()))?;
        Ok(OptionalPayload(Some(Payload(value))))
    }
}

/// Query string deserialized into `T`
#[derive(Debug, Clone, Default)]
pub struct QueryParams<T>(pub T);

#[async_trait]
impl<T, S> FromRequestParts<S> for QueryParams<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Query(value) = Query::<T>::from_request_parts(parts, state)
            .await
            .map_err(|e| ApiError::invalid_payload(e.body_text()))?;
        Ok(QueryParams(value))
    }
}

/// `:id` path segment parsed as a UUID
#[derive(Debug, Clone, Copy)]
pub struct PathId(pub Uuid);

#[async_trait]
impl<S> FromRequestParts<S> for PathId
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let Path(id) = Path::<Uuid>::from_request_parts(parts, state)
            .await
            .map_err(|_| ApiError::invalid_field("id", "Path id must be a UUID"))?;
        Ok(PathId(id))
    }
}

/// Rejects text that is empty once trimmed
///
/// Pair with `length(min = 1)`; the length check alone accepts `"   "`.
pub fn not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Must not be blank".into());
        return Err(err);
    }
    Ok(())
}

/// Empty strings in optional text fields mean "not set"
pub fn non_empty(value: Option<String>) -> Option<String> {
    value.map(|v| v.trim().to_string()).filter(|v| !v.is_empty())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize, Validate)]
    struct Sample {
        #[validate(
            length(min = 1, message = "Title is required"),
            custom(function = "not_blank")
        )]
        titulo: String,
    }

    #[test]
    fn test_parse_accepts_valid_body() {
        let sample: Sample = Payload(json!({ "titulo": "Oficina" }))
            .parse(SERVER_OWNED_FIELDS)
            .unwrap();
        assert_eq!(sample.titulo, "Oficina");
    }

    #[test]
    fn test_parse_rejects_forbidden_field() {
        let err = Payload(json!({ "titulo": "Oficina", "member_id": "x" }))
            .parse::<Sample>(SERVER_OWNED_FIELDS)
            .unwrap_err();

        match err {
            ApiError::InvalidPayload { fields, .. } => assert_eq!(fields[0].field, "member_id"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_parse_rejects_non_object_and_invalid() {
        assert_eq!(
            Payload(json!([1, 2])).parse::<Sample>(&[]).unwrap_err().code(),
            "invalid_payload"
        );
        assert_eq!(
            Payload(json!({ "titulo": "" })).parse::<Sample>(&[]).unwrap_err().code(),
            "invalid_payload"
        );
        assert_eq!(
            Payload(json!({ "outro": 1 })).parse::<Sample>(&[]).unwrap_err().code(),
            "invalid_payload"
        );
    }

    #[test]
    fn test_parse_rejects_blank_text() {
        let err = Payload(json!({ "titulo": "   " }))
            .parse::<Sample>(&[])
            .unwrap_err();

        match err {
            ApiError::InvalidPayload { fields, .. } => assert_eq!(fields[0].field, "titulo"),
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_non_empty() {
        assert_eq!(non_empty(Some("  Norte ".to_string())).as_deref(), Some("Norte"));
        assert_eq!(non_empty(Some("   ".to_string())), None);
        assert_eq!(non_empty(None), None);
    }
}
