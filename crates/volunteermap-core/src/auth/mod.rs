//! Authentication module for managing user sessions and credentials.
//!
//! This module provides:
//! - `Session`: the signed-in user and access token, persisted in the cache
//! - `CredentialStore`: secure OS-level credential storage via keyring
//! - Login form checks for email and password
//!
//! Access tokens are JWTs; their `exp` claim decides when a session ends.

pub mod credentials;
pub mod session;

pub use credentials::{validate_email, validate_password, CredentialStore, CredentialsError};
pub use session::{is_token_expired, token_expiry, Session, SessionData};
