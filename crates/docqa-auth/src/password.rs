use bcrypt::{hash, verify, DEFAULT_COST};
use docqa_error::{DocqaError, Result};

/// Password hashing and verification (bcrypt, default cost).
pub struct PasswordService;

impl PasswordService {
    pub fn hash_password(password: &str) -> Result<String> {
        Self::validate_password(password)?;

        hash(password, DEFAULT_COST).map_err(|e| DocqaError::Internal {
            message: format!("failed to hash password: {}", e),
        })
    }

    pub fn verify_password(password: &str, hash: &str) -> Result<bool> {
        verify(password, hash).map_err(|e| DocqaError::Internal {
            message: format!("failed to verify password: {}", e),
        })
    }

    pub fn validate_password(password: &str) -> Result<()> {
        if password.len() < 8 {
            return Err(DocqaError::Validation {
                reason: "password must be at least 8 characters".to_string(),
            });
        }

        if password.len() > 128 {
            return Err(DocqaError::Validation {
                reason: "password must be at most 128 characters".to_string(),
            });
        }

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_password_hashing() {
        let password = "correct horse battery";
        let hash = PasswordService::hash_password(password).unwrap();

        assert!(PasswordService::verify_password(password, &hash).unwrap());
        assert!(!PasswordService::verify_password("wrong password", &hash).unwrap());
    }

    #[test]
    fn test_password_validation() {
        assert!(PasswordService::validate_password("long enough").is_ok());
        assert!(PasswordService::validate_password("short").is_err());
        assert!(PasswordService::validate_password(&"x".repeat(129)).is_err());
    }
}
