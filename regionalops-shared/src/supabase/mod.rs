/// Supabase client
///
/// The managed backend is the system of record for RegionalOps. This module
/// talks to its three HTTP surfaces:
///
/// - [`postgrest`]: table access under `/rest/v1` (row-level security applies
///   when a user token is used)
/// - [`auth`]: GoTrue under `/auth/v1` (sign-in, sessions, admin user management)
/// - [`storage`]: object storage under `/storage/v1` (document uploads)
///
/// # Example
///
/// ```no_run
/// use regionalops_shared::supabase::{Scope, SupabaseClient, SupabaseConfig};
/// use regionalops_shared::models::member::Member;
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SupabaseClient::new(SupabaseConfig::from_env()?)?;
///
/// let members: Vec<Member> = client
///     .from("members")
///     .select("*")
///     .eq("regional", "Norte")
///     .fetch(&Scope::Service)
///     .await?;
/// # Ok(())
/// # }
/// ```

pub mod auth;
pub mod client;
pub mod postgrest;
pub mod storage;

pub use client::{Scope, SupabaseClient, SupabaseConfig, SupabaseError};
pub use postgrest::Query;
