/// Authentication and authorization utilities
///
/// Supabase Auth owns credentials and sessions; this module turns a
/// request's access token into an authenticated caller and decides what
/// that caller may do.
///
/// # Modules
///
/// - [`jwt`]: Local verification of Supabase access tokens
/// - [`middleware`]: Bearer token extraction and `AuthContext` resolution
/// - [`authorization`]: Role hierarchy, regional scoping and ownership checks
/// - [`password`]: Password policy for new passwords
///
/// # Example
///
/// ```no_run
/// use regionalops_shared::auth::middleware::authenticate;
/// use regionalops_shared::auth::authorization::require_role;
/// use regionalops_shared::models::member::UserRole;
/// use regionalops_shared::supabase::{SupabaseClient, SupabaseConfig};
///
/// # async fn example(token: &str) -> Result<(), Box<dyn std::error::Error>> {
/// let client = SupabaseClient::new(SupabaseConfig::from_env()?)?;
///
/// let auth = authenticate(&client, token).await?;
/// require_role(&auth, UserRole::Coordenador)?;
/// # Ok(())
/// # }
/// ```

pub mod authorization;
pub mod jwt;
pub mod middleware;
pub mod password;
