/// Member model and repository operations
///
/// A member is the application profile behind an auth user: display name,
/// contact data, role and the regional the member works in. Members are
/// linked to the auth provider through `auth_user_id`.
///
/// # Table
///
/// ```text
/// members (
///     id              uuid primary key,
///     auth_user_id    uuid unique null,
///     nome            text not null,
///     email           text,
///     telefone        text,
///     role            text not null default 'membro',
///     regional        text,
///     instituicao_id  uuid null references instituicoes(id),
///     ativo           boolean not null default true,
///     created_at      timestamptz not null default now(),
///     updated_at      timestamptz
/// )
/// ```
///
/// # Roles
///
/// - **admin**: every regional, user administration
/// - **coordenador**: manages members, goals and institutions of a regional
/// - **membro**: records activities and uploads documents in a regional
///
/// # Example
///
/// ```no_run
/// use regionalops_shared::models::member::{Member, MemberFilter};
/// use regionalops_shared::supabase::{Scope, SupabaseClient, SupabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let client = SupabaseClient::new(SupabaseConfig::from_env()?)?;
///
/// let filter = MemberFilter {
///     regional: Some("Norte".to_string()),
///     ..Default::default()
/// };
/// let members = Member::list(&client, &Scope::Service, &filter).await?;
/// # Ok(())
/// # }
/// ```

use crate::supabase::{Scope, SupabaseClient, SupabaseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use uuid::Uuid;

/// Roles a member can hold
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum UserRole {
    /// Full access across regionals, manages user accounts
    Admin,

    /// Manages the data of one regional
    Coordenador,

    /// Records activities in one regional
    #[default]
    Membro,
}

impl UserRole {
    /// Converts role to string for display
    pub fn as_str(&self) -> &'static str {
        match self {
            UserRole::Admin => "admin",
            UserRole::Coordenador => "coordenador",
            UserRole::Membro => "membro",
        }
    }

    /// Checks if this role has the permission level of the required role
    ///
    /// Hierarchy: Admin > Coordenador > Membro
    pub fn has_permission(&self, required: &UserRole) -> bool {
        self.permission_level() >= required.permission_level()
    }

    fn permission_level(&self) -> u8 {
        match self {
            UserRole::Admin => 3,
            UserRole::Coordenador => 2,
            UserRole::Membro => 1,
        }
    }
}

impl fmt::Display for UserRole {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for UserRole {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "admin" => Ok(UserRole::Admin),
            "coordenador" => Ok(UserRole::Coordenador),
            "membro" => Ok(UserRole::Membro),
            other => Err(format!("unknown role: {}", other)),
        }
    }
}

fn default_true() -> bool {
    true
}

/// Member record
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Member {
    /// Unique member ID
    pub id: Uuid,

    /// Linked auth user (None for members without a login)
    #[serde(default)]
    pub auth_user_id: Option<Uuid>,

    /// Display name
    pub nome: String,

    #[serde(default)]
    pub email: Option<String>,

    #[serde(default)]
    pub telefone: Option<String>,

    #[serde(default)]
    pub role: UserRole,

    /// Regional the member belongs to (None for admins working across all)
    #[serde(default)]
    pub regional: Option<String>,

    #[serde(default)]
    pub instituicao_id: Option<Uuid>,

    /// Inactive members cannot use the API
    #[serde(default = "default_true")]
    pub ativo: bool,

    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

/// Input for creating a member
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateMember {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub auth_user_id: Option<Uuid>,

    pub nome: String,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,

    pub role: UserRole,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instituicao_id: Option<Uuid>,

    pub ativo: bool,
}

/// Input for updating a member
///
/// Only non-None fields are sent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateMember {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nome: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub email: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub telefone: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub role: Option<UserRole>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub regional: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub instituicao_id: Option<Uuid>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub ativo: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub updated_at: Option<DateTime<Utc>>,
}

impl UpdateMember {
    /// Whether the update touches fields only coordinators may change
    pub fn changes_privileges(&self) -> bool {
        self.role.is_some()
            || self.regional.is_some()
            || self.ativo.is_some()
            || self.instituicao_id.is_some()
    }
}

/// List filters
#[derive(Debug, Clone, Default)]
pub struct MemberFilter {
    pub regional: Option<String>,
    pub ativo: Option<bool>,
    pub role: Option<UserRole>,
    /// Substring of name or e-mail
    pub search: Option<String>,
}

impl Member {
    pub const TABLE: &'static str = "members";

    /// Creates a new member
    ///
    /// # Errors
    ///
    /// Returns an error if the insert is rejected (row-level security,
    /// duplicate `auth_user_id`) or Supabase is unreachable.
    pub async fn create(
        db: &SupabaseClient,
        scope: &Scope,
        data: &CreateMember,
    ) -> Result<Self, SupabaseError> {
        db.from(Self::TABLE).insert_one(scope, data).await
    }

    /// Finds a member by ID
    pub async fn find_by_id(
        db: &SupabaseClient,
        scope: &Scope,
        id: Uuid,
    ) -> Result<Option<Self>, SupabaseError> {
        db.from(Self::TABLE).eq("id", id).fetch_optional(scope).await
    }

    /// Finds the member linked to an auth user
    pub async fn find_by_auth_user_id(
        db: &SupabaseClient,
        scope: &Scope,
        auth_user_id: Uuid,
    ) -> Result<Option<Self>, SupabaseError> {
        db.from(Self::TABLE)
            .eq("auth_user_id", auth_user_id)
            .fetch_optional(scope)
            .await
    }

    /// Lists members, ordered by name
    pub async fn list(
        db: &SupabaseClient,
        scope: &Scope,
        filter: &MemberFilter,
    ) -> Result<Vec<Self>, SupabaseError> {
        let mut query = db.from(Self::TABLE).order("nome", true);

        if let Some(regional) = &filter.regional {
            query = query.eq("regional", regional);
        }
        if let Some(ativo) = filter.ativo {
            query = query.eq("ativo", ativo);
        }
        if let Some(role) = filter.role {
            query = query.eq("role", role);
        }
        if let Some(search) = &filter.search {
            query = query.search(&["nome", "email"], search);
        }

        query.fetch(scope).await
    }

    /// Updates a member
    ///
    /// # Returns
    ///
    /// The updated member, or None if no row matched
    pub async fn update(
        db: &SupabaseClient,
        scope: &Scope,
        id: Uuid,
        data: &UpdateMember,
    ) -> Result<Option<Self>, SupabaseError> {
        let mut data = data.clone();
        data.updated_at = Some(Utc::now());

        let rows: Vec<Self> = db.from(Self::TABLE).eq("id", id).update(scope, &data).await?;
        Ok(rows.into_iter().next())
    }

    /// Deletes a member
    ///
    /// # Returns
    ///
    /// The deleted member, or None if no row matched
    pub async fn delete(
        db: &SupabaseClient,
        scope: &Scope,
        id: Uuid,
    ) -> Result<Option<Self>, SupabaseError> {
        let rows: Vec<Self> = db.from(Self::TABLE).eq("id", id).delete(scope).await?;
        Ok(rows.into_iter().next())
    }
}
