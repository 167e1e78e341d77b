//! Validation helpers for DTOs.

use validator::ValidationError;

/// Rejects values made only of whitespace.
///
/// # Examples
///
/// ```ignore
/// validate_not_blank("zach") // Ok
/// validate_not_blank("   ")  // Err
/// ```
pub fn validate_not_blank(value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        let mut err = ValidationError::new("blank");
        err.message = Some("Value must not be blank".into());
        return Err(err);
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_not_blank_accepts_text() {
        assert!(validate_not_blank("zach").is_ok());
        assert!(validate_not_blank(" jess ").is_ok());
    }

    #[test]
    fn test_validate_not_blank_rejects_whitespace() {
        assert!(validate_not_blank("").is_err());
        assert!(validate_not_blank(" \t\n").is_err());
    }
}
