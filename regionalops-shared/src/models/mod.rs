/// Domain models for RegionalOps
///
/// Each model maps one Supabase table and exposes its repository operations
/// as associated functions taking a [`SupabaseClient`] and a [`Scope`].
///
/// # Models
///
/// - `member`: Application profiles, roles and regionals
/// - `usuario`: Mirror of profile fields kept for database-side consumers
/// - `activity`: Recorded field activities
/// - `goal`: Regional targets (metas)
/// - `file`: Uploaded document metadata
/// - `instituicao`: Partner institutions and their per-regional counts
///
/// # Example
///
/// ```no_run
/// use regionalops_shared::models::goal::{Goal, GoalFilter};
/// use regionalops_shared::supabase::{Scope, SupabaseClient, SupabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SupabaseClient::new(SupabaseConfig::from_env()?)?;
/// let scope = Scope::User("<access token>".to_string());
///
/// let goals = Goal::list(&client, &scope, &GoalFilter::default()).await?;
/// # Ok(())
/// # }
/// ```
///
/// [`SupabaseClient`]: crate::supabase::SupabaseClient
/// [`Scope`]: crate::supabase::Scope

pub mod activity;
pub mod file;
pub mod goal;
pub mod instituicao;
pub mod member;
pub mod usuario;
