/// Mirror of user profile fields in the `usuarios` table
///
/// Other parts of the system (reports, database triggers) read names, roles
/// and regionals from `usuarios` keyed by the auth user id. The API keeps it
/// in step whenever a user account is created, updated or deleted.

use super::member::{Member, UserRole};
use crate::supabase::{Scope, SupabaseClient, SupabaseError};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Row of the `usuarios` table
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Usuario {
    pub auth_user_id: Uuid,

    #[serde(default)]
    pub email: Option<String>,

    pub nome: String,

    #[serde(default)]
    pub role: UserRole,

    #[serde(default)]
    pub regional: Option<String>,

    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

impl Usuario {
    pub const TABLE: &'static str = "usuarios";

    /// Builds the mirror row for a member; None when the member has no login
    pub fn from_member(member: &Member) -> Option<Self> {
        Some(Self {
            auth_user_id: member.auth_user_id?,
            email: member.email.clone(),
            nome: member.nome.clone(),
            role: member.role,
            regional: member.regional.clone(),
            updated_at: Some(Utc::now()),
        })
    }

    /// Inserts or refreshes the mirror row of `member`
    pub async fn sync(
        db: &SupabaseClient,
        scope: &Scope,
        member: &Member,
    ) -> Result<Option<Self>, SupabaseError> {
        let Some(row) = Self::from_member(member) else {
            return Ok(None);
        };

        let rows: Vec<Self> = db
            .from(Self::TABLE)
            .upsert(scope, &row, "auth_user_id")
            .await?;
        Ok(rows.into_iter().next())
    }

    /// Removes the mirror row of an auth user
    pub async fn delete_by_auth_user_id(
        db: &SupabaseClient,
        scope: &Scope,
        auth_user_id: Uuid,
    ) -> Result<(), SupabaseError> {
        let _rows: Vec<Self> = db
            .from(Self::TABLE)
            .eq("auth_user_id", auth_user_id)
            .delete(scope)
            .await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn member(auth_user_id: Option<Uuid>) -> Member {
        Member {
            id: Uuid::new_v4(),
            auth_user_id,
            nome: "João".to_string(),
            email: Some("joao@example.org".to_string()),
            telefone: None,
            role: UserRole::Coordenador,
            regional: Some("Sertão".to_string()),
            instituicao_id: None,
            ativo: true,
            created_at: None,
            updated_at: None,
        }
    }

    #[test]
    fn test_mirror_copies_profile_fields() {
        let auth_id = Uuid::new_v4();
        let row = Usuario::from_member(&member(Some(auth_id))).unwrap();
        assert_eq!(row.auth_user_id, auth_id);
        assert_eq!(row.nome, "João");
        assert_eq!(row.role, UserRole::Coordenador);
        assert_eq!(row.regional.as_deref(), Some("Sertão"));
    }

    #[test]
    fn test_member_without_login_has_no_mirror() {
        assert!(Usuario::from_member(&member(None)).is_none());
    }
}
