/// Password policy checks
///
/// Passwords are hashed and stored by Supabase Auth; this module only
/// decides whether a new password is acceptable before it is sent there.
///
/// # Policy
///
/// - 8 to 72 characters (72 bytes is the bcrypt limit Supabase hashes with)
/// - at least one letter
/// - at least one digit
///
/// # Example
///
/// ```
/// use regionalops_shared::auth::password::validate_password_strength;
///
/// assert!(validate_password_strength("senha2024").is_ok());
/// assert!(validate_password_strength("curta1").is_err());
/// assert!(validate_password_strength("somenteletras").is_err());
/// ```

/// Minimum password length in characters
pub const MIN_PASSWORD_LEN: usize = 8;

/// Maximum password length in bytes
pub const MAX_PASSWORD_BYTES: usize = 72;

/// Validates password strength
///
/// Returns `Err` with a human-readable description of the first rule the
/// password breaks.
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(format!(
            "Password must be at least {} characters long",
            MIN_PASSWORD_LEN
        ));
    }

    if password.len() > MAX_PASSWORD_BYTES {
        return Err(format!(
            "Password must be at most {} bytes long",
            MAX_PASSWORD_BYTES
        ));
    }

    if !password.chars().any(|c| c.is_alphabetic()) {
        return Err("Password must contain at least one letter".to_string());
    }

    if !password.chars().any(|c| c.is_numeric()) {
        return Err("Password must contain at least one digit".to_string());
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_password_strength_valid() {
        for password in ["senha2024", "Str0ng!Pass", "coordenação1", "12345678a"] {
            assert!(
                validate_password_strength(password).is_ok(),
                "Password '{}' should be valid",
                password
            );
        }
    }

    #[test]
    fn test_validate_password_strength_too_short() {
        let result = validate_password_strength("abc123");
        assert!(result.unwrap_err().contains("at least 8 characters"));
    }

    #[test]
    fn test_validate_password_strength_too_long() {
        let password = format!("a1{}", "x".repeat(80));
        let result = validate_password_strength(&password);
        assert!(result.unwrap_err().contains("at most 72 bytes"));
    }

    #[test]
    fn test_validate_password_strength_no_letter() {
        let result = validate_password_strength("1234567890");
        assert!(result.unwrap_err().contains("letter"));
    }

    #[test]
    fn test_validate_password_strength_no_digit() {
        let result = validate_password_strength("SemDigitos!");
        assert!(result.unwrap_err().contains("digit"));
    }
}
