use anyhow::Result;
use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::{CacheManager, ACCESS_TOKEN_KEY, USER_INFO_KEY};
use crate::models::User;

/// Buffer time before expiry to trigger refresh (5 minutes)
const TOKEN_REFRESH_BUFFER_MINUTES: i64 = 5;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionData {
    pub access_token: String,
    pub user: User,
    pub created_at: DateTime<Utc>,
}

#[derive(Debug, Deserialize)]
struct TokenClaims {
    exp: Option<i64>,
}

/// Read the `exp` claim of a JWT without verifying its signature.
pub fn token_expiry(token: &str) -> Option<DateTime<Utc>> {
    let payload = token.split('.').nth(1)?;
    let bytes = URL_SAFE_NO_PAD.decode(payload.trim_end_matches('=')).ok()?;
    let claims: TokenClaims = serde_json::from_slice(&bytes).ok()?;
    DateTime::from_timestamp(claims.exp?, 0)
}

/// A token counts as expired once its `exp` has passed, or when it carries
/// no readable expiry at all.
pub fn is_token_expired(token: &str) -> bool {
    match token_expiry(token) {
        Some(expiry) => Utc::now() >= expiry,
        None => true,
    }
}

impl SessionData {
    pub fn expires_at(&self) -> Option<DateTime<Utc>> {
        token_expiry(&self.access_token)
    }

    pub fn is_expired(&self) -> bool {
        is_token_expired(&self.access_token)
    }

    /// Check if the session will expire soon and should be renewed
    pub fn needs_refresh(&self) -> bool {
        match self.expires_at() {
            Some(expiry) => Utc::now() > expiry - Duration::minutes(TOKEN_REFRESH_BUFFER_MINUTES),
            None => true,
        }
    }

    /// Get minutes remaining until expiry (for display)
    pub fn minutes_until_expiry(&self) -> i64 {
        self.expires_at()
            .map(|expiry| (expiry - Utc::now()).num_minutes().max(0))
            .unwrap_or(0)
    }
}

/// The signed-in user, persisted through the cache under the `accessToken`
/// and `userInfo` keys.
pub struct Session {
    cache: CacheManager,
    pub data: Option<SessionData>,
}

impl Session {
    pub fn new(cache: CacheManager) -> Self {
        Self { cache, data: None }
    }

    /// Restore the session from the cache. Returns `true` when a session with
    /// an unexpired token was found.
    pub async fn load(&mut self) -> Result<bool> {
        let token = self.cache.load::<String>(ACCESS_TOKEN_KEY).await?;
        let user = self.cache.load::<User>(USER_INFO_KEY).await?;

        if let (Some(token), Some(user)) = (token, user) {
            if !is_token_expired(&token.data) {
                self.data = Some(SessionData {
                    access_token: token.data,
                    user: user.data,
                    created_at: token.cached_at,
                });
                return Ok(true);
            }
            debug!(user_id = %user.data.id, "Cached access token has expired");
        }
        Ok(false)
    }

    /// The last signed-in user, even when their token has expired. Enough to
    /// resolve volunteering status while offline.
    pub async fn cached_user(&self) -> Result<Option<User>> {
        if let Some(ref data) = self.data {
            return Ok(Some(data.user.clone()));
        }
        Ok(self.cache.load::<User>(USER_INFO_KEY).await?.map(|c| c.data))
    }

    pub async fn save(&self) -> Result<()> {
        if let Some(ref data) = self.data {
            self.cache.set_in_cache(ACCESS_TOKEN_KEY, &data.access_token).await?;
            self.cache.set_in_cache(USER_INFO_KEY, &data.user).await?;
        }
        Ok(())
    }

    /// Clear session data, in memory and in the cache
    pub async fn clear(&mut self) -> Result<()> {
        self.data = None;
        self.cache.remove(&[ACCESS_TOKEN_KEY, USER_INFO_KEY]).await?;
        Ok(())
    }

    pub fn update(&mut self, data: SessionData) {
        self.data = Some(data);
    }

    /// Get the bearer token if a session is loaded
    pub fn token(&self) -> Option<&str> {
        self.data.as_ref().map(|d| d.access_token.as_str())
    }

    pub fn user(&self) -> Option<&User> {
        self.data.as_ref().map(|d| &d.user)
    }

    /// Check if session is valid (exists and not expired)
    pub fn is_valid(&self) -> bool {
        self.data.as_ref().map(|d| !d.is_expired()).unwrap_or(false)
    }
}
