/// Local verification of Supabase access tokens
///
/// Supabase signs access tokens with the project's JWT secret (HS256,
/// audience `authenticated`). When the secret is configured, tokens are
/// checked here first so that expired or forged tokens are rejected without
/// a round trip to the auth service.
///
/// # Security
///
/// - **Algorithm**: HS256 only
/// - **Validation**: signature, `exp`, `nbf` (when present) and `aud`
/// - The auth service remains the authority: a locally valid token is still
///   resolved through `GET /auth/v1/user`
///
/// # Example
///
/// ```
/// use regionalops_shared::auth::jwt::{create_token, validate_token, Claims};
/// use chrono::Duration;
/// use uuid::Uuid;
///
/// # fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let user_id = Uuid::new_v4();
/// let claims = Claims::new(user_id, Some("ana@example.org".to_string()), Duration::hours(1));
/// let token = create_token(&claims, "project-jwt-secret")?;
///
/// let validated = validate_token(&token, "project-jwt-secret")?;
/// assert_eq!(validated.sub, user_id);
/// # Ok(())
/// # }
/// ```

use chrono::{Duration, Utc};
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Audience Supabase puts on tokens of signed-in users
pub const AUTHENTICATED_AUDIENCE: &str = "authenticated";

/// Error type for JWT operations
#[derive(Debug, thiserror::Error)]
pub enum JwtError {
    /// Failed to create token
    #[error("Failed to create token: {0}")]
    CreateError(String),

    /// Failed to validate token
    #[error("Failed to validate token: {0}")]
    ValidationError(String),

    /// Token has expired
    #[error("Token has expired")]
    Expired,

    /// Token was issued for another audience
    #[error("Invalid audience")]
    InvalidAudience,
}

/// Claims of a Supabase access token
///
/// Only the claims this service reads are modeled; everything else in the
/// token is ignored.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    /// Subject - auth user ID
    pub sub: Uuid,

    /// Audience - "authenticated" for signed-in users
    pub aud: String,

    /// Expiration time (Unix timestamp)
    pub exp: i64,

    /// Issued at (Unix timestamp)
    #[serde(default)]
    pub iat: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    /// Postgres role the token maps to
    #[serde(default)]
    pub role: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub session_id: Option<String>,
}

impl Claims {
    /// Creates claims for a signed-in user expiring after `expires_in`
    pub fn new(user_id: Uuid, email: Option<String>, expires_in: Duration) -> Self {
        let now = Utc::now();

        Self {
            sub: user_id,
            aud: AUTHENTICATED_AUDIENCE.to_string(),
            exp: (now + expires_in).timestamp(),
            iat: now.timestamp(),
            email,
            role: AUTHENTICATED_AUDIENCE.to_string(),
            session_id: None,
        }
    }
}

/// Signs claims with HS256
///
/// Access tokens are normally minted by Supabase; this is used to produce
/// tokens for local tooling and tests.
pub fn create_token(claims: &Claims, secret: &str) -> Result<String, JwtError> {
    let header = Header::new(Algorithm::HS256);
    let key = EncodingKey::from_secret(secret.as_bytes());

    encode(&header, claims, &key)
        .map_err(|e| JwtError::CreateError(format!("Token encoding failed: {}", e)))
}

/// Validates a Supabase access token and extracts its claims
///
/// # Errors
///
/// Returns error if:
/// - Signature is invalid
/// - Token has expired
/// - Audience is not `authenticated`
/// - Token format is invalid
pub fn validate_token(token: &str, secret: &str) -> Result<Claims, JwtError> {
    let key = DecodingKey::from_secret(secret.as_bytes());

    let mut validation = Validation::new(Algorithm::HS256);
    validation.set_audience(&[AUTHENTICATED_AUDIENCE]);
    validation.validate_exp = true;
    validation.validate_nbf = true;
    validation.leeway = 0;

    let token_data = decode::<Claims>(token, &key, &validation).map_err(|e| match e.kind() {
        jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::Expired,
        jsonwebtoken::errors::ErrorKind::InvalidAudience => JwtError::InvalidAudience,
        _ => JwtError::ValidationError(format!("Token validation failed: {}", e)),
    })?;

    Ok(token_data.claims)
}

#[cfg(test)]
mod tests {
    use super::*;

    const SECRET: &str = "super-secret-jwt-token-with-at-least-32-characters";

    #[test]
    fn test_claims_creation() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, None, Duration::hours(1));

        assert_eq!(claims.sub, user_id);
        assert_eq!(claims.aud, "authenticated");
        assert_eq!(claims.exp - claims.iat, 3600);
    }

    #[test]
    fn test_create_and_validate_token() {
        let user_id = Uuid::new_v4();
        let claims = Claims::new(user_id, Some("ana@example.org".to_string()), Duration::hours(1));
        let token = create_token(&claims, SECRET).expect("Should create token");

        let validated = validate_token(&token, SECRET).expect("Should validate token");
        assert_eq!(validated.sub, user_id);
        assert_eq!(validated.email.as_deref(), Some("ana@example.org"));
    }

    #[test]
    fn test_validate_with_wrong_secret() {
        let claims = Claims::new(Uuid::new_v4(), None, Duration::hours(1));
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(
            validate_token(&token, "another-secret"),
            Err(JwtError::ValidationError(_))
        ));
    }

    #[test]
    fn test_validate_expired_token() {
        let claims = Claims::new(Uuid::new_v4(), None, Duration::seconds(-3600));
        let token = create_token(&claims, SECRET).unwrap();
        assert!(matches!(validate_token(&token, SECRET), Err(JwtError::Expired)));
    }

    #[test]
    fn test_validate_rejects_other_audience() {
        let mut claims = Claims::new(Uuid::new_v4(), None, Duration::hours(1));
        claims.aud = "anon".to_string();
        let token = create_token(&claims, SECRET).unwrap();

        assert!(matches!(
            validate_token(&token, SECRET),
            Err(JwtError::InvalidAudience)
        ));
    }

    #[test]
    fn test_validate_garbage() {
        assert!(validate_token("not-a-jwt", SECRET).is_err());
    }
}
