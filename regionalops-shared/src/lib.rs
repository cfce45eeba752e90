//! # RegionalOps Shared Library
//!
//! This crate contains the types and business logic shared by the RegionalOps
//! API server: the Supabase client, authentication/authorization, domain
//! models and the dashboard aggregation.
//!
//! ## Module Organization
//!
//! - `supabase`: PostgREST, Auth (GoTrue) and Storage client
//! - `auth`: Request authentication context, roles and regional scoping
//! - `models`: Domain records and their repository operations
//! - `dashboard`: Goal/activity matching and progress roll-ups

pub mod auth;
pub mod dashboard;
pub mod models;
pub mod supabase;

/// Current version of the RegionalOps shared library
pub const VERSION: &str = env!("CARGO_PKG_VERSION");

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_is_set() {
        assert!(!VERSION.is_empty());
    }
}
