use anyhow::{Context, Result};
use keyring::Entry;
use thiserror::Error;

const SERVICE_NAME: &str = "volunteermap";

/// Minimum password length accepted by the login form
pub const MIN_PASSWORD_LENGTH: usize = 6;

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum CredentialsError {
    #[error("Invalid email")]
    InvalidEmail,

    #[error("Password must be at least {min} characters")]
    PasswordTooShort { min: usize },
}

/// Loose shape check: `local@domain.tld`, no whitespace.
pub fn validate_email(email: &str) -> Result<(), CredentialsError> {
    let email = email.trim();
    if email.chars().any(char::is_whitespace) {
        return Err(CredentialsError::InvalidEmail);
    }

    let (local, domain) = email.split_once('@').ok_or(CredentialsError::InvalidEmail)?;
    let domain_ok = !domain.contains('@')
        && domain.contains('.')
        && !domain.starts_with('.')
        && !domain.ends_with('.');
    if local.is_empty() || !domain_ok {
        return Err(CredentialsError::InvalidEmail);
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<(), CredentialsError> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(CredentialsError::PasswordTooShort {
            min: MIN_PASSWORD_LENGTH,
        });
    }
    Ok(())
}

pub struct CredentialStore;

impl CredentialStore {
    /// Store email and password in the OS keychain
    pub fn store(email: &str, password: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        entry
            .set_password(password)
            .context("Failed to store password in keychain")?;
        Ok(())
    }

    /// Retrieve password for an email from the OS keychain
    pub fn get_password(email: &str) -> Result<String> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        entry
            .get_password()
            .context("Failed to retrieve password from keychain")
    }

    /// Delete stored credentials for an email
    pub fn delete(email: &str) -> Result<()> {
        let entry = Entry::new(SERVICE_NAME, email)
            .context("Failed to create keyring entry")?;
        entry
            .delete_credential()
            .context("Failed to delete credential from keychain")?;
        Ok(())
    }

    pub fn has_credentials(email: &str) -> bool {
        Entry::new(SERVICE_NAME, email)
            .and_then(|entry| entry.get_password())
            .is_ok()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_validate_email() {
        assert_eq!(validate_email("eva.young@example.com"), Ok(()));
        assert_eq!(validate_email(" eva@example.co "), Ok(()));

        assert_eq!(validate_email(""), Err(CredentialsError::InvalidEmail));
        assert_eq!(validate_email("eva.young"), Err(CredentialsError::InvalidEmail));
        assert_eq!(validate_email("@example.com"), Err(CredentialsError::InvalidEmail));
        assert_eq!(validate_email("eva@localhost"), Err(CredentialsError::InvalidEmail));
        assert_eq!(validate_email("eva@example."), Err(CredentialsError::InvalidEmail));
        assert_eq!(validate_email("eva@ex@ample.com"), Err(CredentialsError::InvalidEmail));
        assert_eq!(validate_email("eva young@example.com"), Err(CredentialsError::InvalidEmail));
    }

    #[test]
    fn test_validate_password() {
        assert_eq!(validate_password("secret"), Ok(()));
        assert_eq!(
            validate_password("12345"),
            Err(CredentialsError::PasswordTooShort { min: 6 })
        );
    }
}
