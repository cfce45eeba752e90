/// Authorization helpers and permission checks
///
/// This module provides role-based access control (RBAC) and regional
/// scoping for RegionalOps.
///
/// # Permission Model
///
/// 1. **Role hierarchy**: `admin > coordenador > membro`
/// 2. **Regional scoping**: admins see every regional; everybody else is
///    pinned to the regional of their member profile
/// 3. **Ownership**: activities and files may be changed by the member who
///    recorded them or by a coordenador+
///
/// Row-level security in the database applies on top of these checks for
/// every request made with the caller's token.
///
/// # Example
///
/// ```no_run
/// use regionalops_shared::auth::authorization::{require_role, scoped_regional};
/// use regionalops_shared::auth::middleware::AuthContext;
/// use regionalops_shared::models::member::UserRole;
///
/// fn check(auth: &AuthContext) -> Result<(), Box<dyn std::error::Error>> {
///     require_role(auth, UserRole::Coordenador)?;
///
///     // None for admins without a filter, the caller's regional otherwise
///     let regional = scoped_regional(auth, None)?;
///     Ok(())
/// }
/// ```

use uuid::Uuid;

use super::middleware::AuthContext;
use crate::dashboard::normalize::{normalize_regional, RegionalAliases};
use crate::models::member::UserRole;

/// Error type for authorization checks
#[derive(Debug, thiserror::Error)]
pub enum AuthzError {
    /// User doesn't have required role
    #[error("Insufficient permissions: requires {required}, has {actual}")]
    InsufficientRole { required: UserRole, actual: UserRole },

    /// Resource belongs to another regional
    #[error("Resource belongs to another regional")]
    OutsideRegional,

    /// Non-admin caller has no regional on their profile
    #[error("No regional assigned to this member")]
    RegionalNotAssigned,

    /// Caller neither owns the resource nor has the role to manage it
    #[error("Not authorized to access this resource")]
    NotOwner,
}

/// Whether two regional names refer to the same regional
///
/// Comparison ignores case, accents and a leading "Regional"/"Região".
pub fn same_regional(a: &str, b: &str) -> bool {
    let none = RegionalAliases::new();
    normalize_regional(a, &none) == normalize_regional(b, &none)
}

/// Checks that the caller has at least `required`
pub fn require_role(auth: &AuthContext, required: UserRole) -> Result<(), AuthzError> {
    let actual = auth.role();
    if !actual.has_permission(&required) {
        return Err(AuthzError::InsufficientRole { required, actual });
    }

    Ok(())
}

/// Regional filter to apply to a list query
///
/// - Admins get `requested` back (None means every regional).
/// - Other roles always get their own regional; asking for another one is
///   an error.
pub fn scoped_regional(
    auth: &AuthContext,
    requested: Option<&str>,
) -> Result<Option<String>, AuthzError> {
    let requested = requested.map(str::trim).filter(|r| !r.is_empty());

    if auth.is_admin() {
        return Ok(requested.map(str::to_string));
    }

    let own = auth.regional().ok_or(AuthzError::RegionalNotAssigned)?;
    if let Some(requested) = requested {
        if !same_regional(requested, own) {
            return Err(AuthzError::OutsideRegional);
        }
    }

    Ok(Some(own.to_string()))
}

/// Checks that the caller may see a resource of `resource_regional`
///
/// Resources without a regional are visible to everybody.
pub fn require_regional_access(
    auth: &AuthContext,
    resource_regional: Option<&str>,
) -> Result<(), AuthzError> {
    if auth.is_admin() {
        return Ok(());
    }

    let Some(resource_regional) = resource_regional.map(str::trim).filter(|r| !r.is_empty()) else {
        return Ok(());
    };

    let own = auth.regional().ok_or(AuthzError::RegionalNotAssigned)?;
    if !same_regional(resource_regional, own) {
        return Err(AuthzError::OutsideRegional);
    }

    Ok(())
}

/// Regional stored on a record the caller creates or moves
///
/// Admins write what they ask for, defaulting to their own regional.
/// Everybody else always writes their profile's spelling, which is the value
/// list queries filter on.
pub fn assigned_regional(
    auth: &AuthContext,
    requested: Option<&str>,
) -> Result<Option<String>, AuthzError> {
    let regional = scoped_regional(auth, requested)?;
    if auth.is_admin() {
        return Ok(regional.or_else(|| auth.regional().map(str::to_string)));
    }

    Ok(regional)
}

/// Allows the member that owns a resource, or anyone with `role`
pub fn require_owner_or_role(
    auth: &AuthContext,
    owner_member_id: Uuid,
    role: UserRole,
) -> Result<(), AuthzError> {
    if auth.member_id() == owner_member_id {
        return Ok(());
    }

    require_role(auth, role).map_err(|_| AuthzError::NotOwner)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::member::Member;
    use crate::supabase::auth::AuthUser;

    fn ctx(role: UserRole, regional: Option<&str>) -> AuthContext {
        let user: AuthUser =
            serde_json::from_value(serde_json::json!({ "id": Uuid::new_v4() })).unwrap();
        let member = Member {
            id: Uuid::new_v4(),
            auth_user_id: Some(user.id),
            nome: "Teste".to_string(),
            email: None,
            telefone: None,
            role,
            regional: regional.map(str::to_string),
            instituicao_id: None,
            ativo: true,
            created_at: None,
            updated_at: None,
        };
        AuthContext::new(user, member, "token".to_string())
    }

    #[test]
    fn test_require_role() {
        assert!(require_role(&ctx(UserRole::Admin, None), UserRole::Coordenador).is_ok());
        assert!(require_role(&ctx(UserRole::Coordenador, None), UserRole::Coordenador).is_ok());
        assert!(matches!(
            require_role(&ctx(UserRole::Membro, None), UserRole::Coordenador),
            Err(AuthzError::InsufficientRole { .. })
        ));
    }

    #[test]
    fn test_scoped_regional_admin_passthrough() {
        let admin = ctx(UserRole::Admin, None);
        assert_eq!(scoped_regional(&admin, None).unwrap(), None);
        assert_eq!(scoped_regional(&admin, Some("Sul")).unwrap().as_deref(), Some("Sul"));
        assert_eq!(scoped_regional(&admin, Some("  ")).unwrap(), None);
    }

    #[test]
    fn test_scoped_regional_pins_non_admins() {
        let membro = ctx(UserRole::Membro, Some("Norte"));
        assert_eq!(scoped_regional(&membro, None).unwrap().as_deref(), Some("Norte"));
        assert_eq!(
            scoped_regional(&membro, Some("regional norte")).unwrap().as_deref(),
            Some("Norte")
        );
        assert!(matches!(
            scoped_regional(&membro, Some("Sul")),
            Err(AuthzError::OutsideRegional)
        ));

        let unassigned = ctx(UserRole::Coordenador, None);
        assert!(matches!(
            scoped_regional(&unassigned, None),
            Err(AuthzError::RegionalNotAssigned)
        ));
    }

    #[test]
    fn test_require_regional_access() {
        let membro = ctx(UserRole::Membro, Some("Região Norte"));
        assert!(require_regional_access(&membro, Some("Norte")).is_ok());
        assert!(require_regional_access(&membro, None).is_ok());
        assert!(require_regional_access(&membro, Some("Sul")).is_err());
        assert!(require_regional_access(&ctx(UserRole::Admin, None), Some("Sul")).is_ok());
    }

    #[test]
    fn test_assigned_regional_uses_profile_spelling() {
        let membro = ctx(UserRole::Membro, Some("Norte"));
        assert_eq!(
            assigned_regional(&membro, Some("Regional Norte")).unwrap().as_deref(),
            Some("Norte")
        );
        assert_eq!(assigned_regional(&membro, None).unwrap().as_deref(), Some("Norte"));
        assert!(matches!(
            assigned_regional(&membro, Some("Sul")),
            Err(AuthzError::OutsideRegional)
        ));

        let admin = ctx(UserRole::Admin, Some("Centro"));
        assert_eq!(assigned_regional(&admin, Some("Sul")).unwrap().as_deref(), Some("Sul"));
        assert_eq!(assigned_regional(&admin, None).unwrap().as_deref(), Some("Centro"));
    }

    #[test]
    fn test_require_owner_or_role() {
        let membro = ctx(UserRole::Membro, Some("Norte"));
        assert!(require_owner_or_role(&membro, membro.member_id(), UserRole::Coordenador).is_ok());
        assert!(matches!(
            require_owner_or_role(&membro, Uuid::new_v4(), UserRole::Coordenador),
            Err(AuthzError::NotOwner)
        ));

        let coord = ctx(UserRole::Coordenador, Some("Norte"));
        assert!(require_owner_or_role(&coord, Uuid::new_v4(), UserRole::Coordenador).is_ok());
    }

    #[test]
    fn test_authz_error_display() {
        let err = AuthzError::InsufficientRole {
            required: UserRole::Admin,
            actual: UserRole::Membro,
        };
        assert_eq!(err.to_string(), "Insufficient permissions: requires admin, has membro");
    }
}
