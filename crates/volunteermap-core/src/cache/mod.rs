//! Local caching module for offline data access.
//!
//! Reads are network-first: every successful request refreshes the cached
//! copy, and the cached copy is only consulted when the request fails.
//! Entries never expire; each key simply holds the last known good value.
//!
//! Cached data:
//! - Upcoming events (`events`)
//! - The signed-in user's profile (`userInfo`) and access token (`accessToken`)
//! - Other users' profiles (`user_<id>`)

pub mod crypto;
pub mod manager;
pub mod store;

pub use crypto::EncryptedStore;
pub use manager::{
    age_display, CacheAges, CacheError, CacheManager, CachedData, DataOrigin, Fetched,
};
pub use store::{FileStore, KeyValueStore, MemoryStore, StoreError};

pub const EVENTS_KEY: &str = "events";
pub const USER_INFO_KEY: &str = "userInfo";
pub const ACCESS_TOKEN_KEY: &str = "accessToken";

/// Cache key for a user profile other than the signed-in user's
pub fn user_key(user_id: &str) -> String {
    format!("user_{}", user_id)
}
