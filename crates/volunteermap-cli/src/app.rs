//! Application state for the volunteermap CLI.
//!
//! `App` owns the configuration, the session, the API clients and the
//! cache. Everything a command needs is passed through it explicitly.

use std::io::{self, Write};
use std::path::{Path, PathBuf};

use anyhow::{anyhow, Context, Result};
use base64::{engine::general_purpose::STANDARD, Engine as _};
use chrono::Utc;
use tracing::{debug, error, info, warn};

use volunteermap_core::api::{ApiClient, ApiError, ImageUploader};
use volunteermap_core::auth::{
    validate_email, validate_password, CredentialStore, Session, SessionData,
};
use volunteermap_core::cache::{
    user_key, CacheManager, DataOrigin, EncryptedStore, FileStore, Fetched, EVENTS_KEY,
    USER_INFO_KEY,
};
use volunteermap_core::config::{Config, CACHE_PASSPHRASE_ENV};
use volunteermap_core::models::{NewEvent, UploadedImage, User, VolunteeringEvent};

pub struct App {
    pub config: Config,
    pub session: Session,
    pub api: ApiClient,
    pub cache: CacheManager,
    pub offline: bool,
}

impl App {
    /// Create a new application instance
    pub async fn new(offline: bool) -> Result<Self> {
        let config = match Config::load() {
            Ok(c) => c,
            Err(e) => {
                warn!(error = %e, "Failed to load config, using defaults");
                Config::default()
            }
        };
        debug!(api = %config.api_base_url, "Config loaded");

        let cache_dir = config.cache_dir().unwrap_or_else(|_| PathBuf::from("./cache"));
        debug!(?cache_dir, "Cache directory configured");
        let cache = Self::open_cache(&config, cache_dir).await?;

        let api = ApiClient::new(&config.api_base_url)?;
        let offline = offline || config.offline;
        Ok(Self::from_parts(config, cache, api, offline).await)
    }

    /// Assemble an app around an existing cache and client, restoring any
    /// session the cache holds
    pub async fn from_parts(
        config: Config,
        cache: CacheManager,
        mut api: ApiClient,
        offline: bool,
    ) -> Self {
        let mut session = Session::new(cache.clone());
        let load_result = session.load().await;
        debug!(?load_result, has_data = session.data.is_some(), "Session loaded");

        if let Some(token) = session.token() {
            api.set_token(token.to_string());
        }

        Self {
            config,
            session,
            api,
            cache,
            offline,
        }
    }

    async fn open_cache(config: &Config, cache_dir: PathBuf) -> Result<CacheManager> {
        let store = FileStore::new(cache_dir).context("Failed to open cache directory")?;
        if !config.encrypt_cache {
            return Ok(CacheManager::new(store));
        }

        let passphrase = config.cache_passphrase().ok_or_else(|| {
            anyhow!("Cache encryption is enabled but {} is not set", CACHE_PASSPHRASE_ENV)
        })?;
        let encrypted = EncryptedStore::open(store, &passphrase)
            .await
            .context("Failed to unlock encrypted cache")?;
        Ok(CacheManager::new(encrypted))
    }

    // =========================================================================
    // Authentication
    // =========================================================================

    pub fn is_authenticated(&self) -> bool {
        self.session.is_valid()
    }

    /// The signed-in user, or the last one seen when working offline
    pub async fn current_user(&self) -> Result<Option<User>> {
        self.session.cached_user().await
    }

    /// Interactive login
    pub async fn login_interactive(&mut self, email: Option<String>, remember: bool) -> Result<()> {
        let email = match email.or_else(|| self.config.last_email.clone()) {
            Some(last) => {
                let input = prompt(&format!("Email [{}]: ", last))?;
                if input.is_empty() { last } else { input }
            }
            None => prompt("Email: ")?,
        };
        validate_email(&email)?;

        let password = if CredentialStore::has_credentials(&email) {
            let input = prompt("Use stored password? [Y/n]: ")?;
            if input.to_lowercase() != "n" {
                CredentialStore::get_password(&email)?
            } else {
                rpassword::prompt_password("Password: ")?
            }
        } else {
            rpassword::prompt_password("Password: ")?
        };
        validate_password(&password)?;

        println!("\nAuthenticating...");
        let session_data = self.api.authenticate(&email, &password).await.map_err(|e| {
            error!(error = %e, "Login failed");
            anyhow!(login_error_message(&e))
        })?;

        if remember {
            if let Err(e) = CredentialStore::store(&email, &password) {
                warn!(error = %e, "Failed to store credentials");
            }
        }

        self.config.last_email = Some(email);
        if let Err(e) = self.config.save() {
            warn!(error = %e, "Failed to save config");
        }

        self.start_session(session_data).await;
        println!("Login successful!");
        Ok(())
    }

    /// Renew an expired session with the password kept in the keychain.
    /// Returns `false` when there is nothing to renew with.
    pub async fn renew_session(&mut self) -> Result<bool> {
        if self.is_authenticated() {
            return Ok(true);
        }
        if self.offline {
            return Ok(false);
        }
        let Some(email) = self.config.last_email.clone() else {
            return Ok(false);
        };
        if !CredentialStore::has_credentials(&email) {
            return Ok(false);
        }

        let password = CredentialStore::get_password(&email)?;
        let session_data = self.api.authenticate(&email, &password).await?;
        self.start_session(session_data).await;
        info!("Session renewed from stored credentials");
        Ok(true)
    }

    async fn start_session(&mut self, data: SessionData) {
        self.api.set_token(data.access_token.clone());
        self.session.update(data);
        if let Err(e) = self.session.save().await {
            warn!(error = %e, "Failed to save session");
        }
    }

    pub async fn logout(&mut self, forget: bool) -> Result<()> {
        if forget {
            if let Some(ref email) = self.config.last_email {
                if let Err(e) = CredentialStore::delete(email) {
                    debug!(error = %e, "No stored credentials to delete");
                }
            }
        }
        self.session.clear().await?;
        info!("Logged out");
        Ok(())
    }

    /// Require a valid session, renewing it silently when possible
    async fn require_session(&mut self) -> Result<User> {
        if !self.renew_session().await? {
            return Err(anyhow!("Not logged in. Run `volunteermap login` first."));
        }
        self.session
            .user()
            .cloned()
            .ok_or_else(|| anyhow!("Session has no user"))
    }

    // =========================================================================
    // Data
    // =========================================================================

    /// Upcoming events, network first. Past events are dropped from cached
    /// snapshots too.
    pub async fn load_events(&self) -> Result<Fetched<Vec<VolunteeringEvent>>> {
        let now = Utc::now();
        let mut fetched = if self.offline {
            let cached = self.cache.get_from_cache::<Vec<VolunteeringEvent>>(EVENTS_KEY).await?;
            Fetched {
                value: cached.data,
                origin: DataOrigin::Cache {
                    cached_at: cached.cached_at,
                },
            }
        } else {
            self.cache
                .fetch_with_origin(EVENTS_KEY, self.api.fetch_future_events(now))
                .await?
        };

        fetched.value.retain(|event| event.is_upcoming(now));
        fetched.value.sort_by_key(|event| event.date_time);
        Ok(fetched)
    }

    pub async fn load_user(&self, user_id: &str) -> Result<Fetched<User>> {
        let key = user_key(user_id);
        if self.offline {
            let cached = self.cache.get_from_cache::<User>(&key).await?;
            return Ok(Fetched {
                value: cached.data,
                origin: DataOrigin::Cache {
                    cached_at: cached.cached_at,
                },
            });
        }
        Ok(self.cache.fetch_with_origin(&key, self.api.fetch_user(user_id)).await?)
    }

    pub async fn find_event(&self, event_id: &str) -> Result<(VolunteeringEvent, DataOrigin)> {
        let fetched = self.load_events().await?;
        let event = fetched
            .value
            .into_iter()
            .find(|e| e.id == event_id)
            .ok_or_else(|| anyhow!("No upcoming event with id {}", event_id))?;
        Ok((event, fetched.origin))
    }

    /// The signed-in user's own profile, kept under `userInfo` so the
    /// session and offline status resolution see the refreshed copy
    async fn load_profile(&self) -> Result<Option<Fetched<User>>> {
        let Some(user_id) = self.session.user().map(|u| u.id.clone()) else {
            return Ok(None);
        };
        if self.offline {
            let cached = self.cache.get_from_cache::<User>(USER_INFO_KEY).await?;
            return Ok(Some(Fetched {
                value: cached.data,
                origin: DataOrigin::Cache {
                    cached_at: cached.cached_at,
                },
            }));
        }
        let fetched = self
            .cache
            .fetch_with_origin(USER_INFO_KEY, self.api.fetch_user(&user_id))
            .await?;
        Ok(Some(fetched))
    }

    /// Refresh the events list and the signed-in user's profile together
    pub async fn sync(
        &mut self,
    ) -> Result<(Fetched<Vec<VolunteeringEvent>>, Option<Fetched<User>>)> {
        let (events, profile) =
            futures::future::join(self.load_events(), self.load_profile()).await;
        let profile = profile?;

        if let (Some(fetched), Some(data)) = (&profile, self.session.data.as_mut()) {
            if fetched.origin == DataOrigin::Network {
                data.user = fetched.value.clone();
            }
        }
        Ok((events?, profile))
    }

    /// Replace one event in the cached events list, appending it if new
    async fn update_cached_event(&self, event: &VolunteeringEvent) {
        let mut events = match self.cache.load::<Vec<VolunteeringEvent>>(EVENTS_KEY).await {
            Ok(Some(cached)) => cached.data,
            Ok(None) => Vec::new(),
            Err(e) => {
                warn!(error = %e, "Failed to read cached events");
                return;
            }
        };

        match events.iter_mut().find(|e| e.id == event.id) {
            Some(existing) => *existing = event.clone(),
            None => events.push(event.clone()),
        }

        if let Err(e) = self.cache.set_in_cache(EVENTS_KEY, &events).await {
            warn!(error = %e, "Failed to update cached events");
        }
    }

    // =========================================================================
    // Actions
    // =========================================================================

    pub async fn create_event(&mut self, form: NewEvent) -> Result<VolunteeringEvent> {
        form.validate(Utc::now())?;
        let organizer = self.require_session().await?;

        let created = self.api.create_event(&form.into_event(&organizer)).await?;
        self.update_cached_event(&created).await;
        Ok(created)
    }

    pub async fn apply(&mut self, event_id: &str) -> Result<VolunteeringEvent> {
        if self.offline {
            return Err(anyhow!("Cannot volunteer while offline"));
        }
        let user = self.require_session().await?;
        let (event, origin) = self.find_event(event_id).await?;
        if origin.is_offline() {
            return Err(anyhow!("Cannot volunteer while the server is unreachable"));
        }

        let updated = self.api.update_volunteers(&event, &user.id).await?;
        self.update_cached_event(&updated).await;
        Ok(updated)
    }

    pub async fn upload_image(&self, path: &Path) -> Result<UploadedImage> {
        let api_key = self
            .config
            .image_api_key
            .clone()
            .ok_or_else(|| anyhow!("IMGBB_API_KEY not found."))?;

        let bytes = tokio::fs::read(path)
            .await
            .with_context(|| format!("Failed to read image {}", path.display()))?;
        debug!(path = %path.display(), bytes = bytes.len(), "Uploading image");

        let uploader = ImageUploader::new(&self.config.image_api_base_url, api_key)?;
        uploader.upload(STANDARD.encode(bytes)).await
    }
}

fn prompt(label: &str) -> Result<String> {
    print!("{}", label);
    io::stdout().flush()?;

    let mut input = String::new();
    io::stdin().read_line(&mut input)?;
    Ok(input.trim().to_string())
}

/// User-facing message for a failed login
fn login_error_message(e: &anyhow::Error) -> String {
    match e.downcast_ref::<ApiError>() {
        Some(ApiError::BadRequest(_)) | Some(ApiError::Unauthorized) => {
            "Invalid email or password".to_string()
        }
        Some(ApiError::NetworkError(err)) if err.is_timeout() => {
            "Connection timed out. Please try again.".to_string()
        }
        Some(ApiError::NetworkError(_)) => {
            "Unable to connect to server. Check your internet connection.".to_string()
        }
        _ => format!("Login failed: {:#}", e),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine as _};
    use chrono::{DateTime, Duration, TimeZone};
    use volunteermap_core::cache::{CacheError, ACCESS_TOKEN_KEY};
    use volunteermap_core::models::{Coordinate, PersonName};

    /// Nothing listens on the discard port, so every request fails fast
    const UNREACHABLE_API: &str = "http://127.0.0.1:9";

    fn event(id: &str, date_time: DateTime<Utc>) -> VolunteeringEvent {
        VolunteeringEvent {
            id: id.to_string(),
            name: format!("Event {}", id),
            description: String::new(),
            volunteers_needed: 3,
            organizer_id: "org-1".to_string(),
            date_time,
            position: Coordinate::new(51.04, -114.10),
            volunteers_ids: Vec::new(),
            image_url: None,
        }
    }

    fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: PersonName {
                first: "Eva".to_string(),
                last: "Young".to_string(),
            },
            email: "eva.young@example.com".to_string(),
            mobile: String::new(),
        }
    }

    fn jwt_expiring_at(exp: i64) -> String {
        let header = URL_SAFE_NO_PAD.encode(r#"{"alg":"HS256","typ":"JWT"}"#);
        let payload = URL_SAFE_NO_PAD.encode(format!(r#"{{"exp":{}}}"#, exp));
        format!("{}.{}.signature", header, payload)
    }

    async fn app(cache: CacheManager, offline: bool) -> App {
        let api = ApiClient::new(UNREACHABLE_API).unwrap();
        App::from_parts(Config::default(), cache, api, offline).await
    }

    #[tokio::test]
    async fn test_offline_events_drop_past_and_sort() {
        let cache = CacheManager::in_memory();
        let now = Utc::now();
        let snapshot = vec![
            event("later", now + Duration::days(3)),
            event("past", Utc.with_ymd_and_hms(2023, 10, 20, 17, 0, 0).unwrap()),
            event("soon", now + Duration::hours(2)),
        ];
        cache.set_in_cache(EVENTS_KEY, &snapshot).await.unwrap();

        let app = app(cache, true).await;
        let fetched = app.load_events().await.unwrap();
        let ids: Vec<&str> = fetched.value.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["soon", "later"]);
        assert!(fetched.origin.is_offline());
    }

    #[tokio::test]
    async fn test_offline_without_snapshot_is_miss() {
        let app = app(CacheManager::in_memory(), true).await;
        let err = app.load_events().await.unwrap_err();
        let cache_error = err.downcast_ref::<CacheError>().expect("cache error");
        assert!(cache_error.is_miss());
    }

    #[tokio::test]
    async fn test_failed_request_falls_back_to_snapshot() {
        let cache = CacheManager::in_memory();
        let snapshot = vec![event("soon", Utc::now() + Duration::hours(2))];
        cache.set_in_cache(EVENTS_KEY, &snapshot).await.unwrap();

        let app = app(cache, false).await;
        let fetched = app.load_events().await.unwrap();
        assert_eq!(fetched.value.len(), 1);
        assert!(fetched.origin.is_offline());
    }

    #[tokio::test]
    async fn test_update_cached_event_replaces_or_appends() {
        let cache = CacheManager::in_memory();
        let start = Utc::now() + Duration::days(1);
        let events = vec![event("a", start), event("b", start)];
        cache.set_in_cache(EVENTS_KEY, &events).await.unwrap();
        let app = app(cache.clone(), true).await;

        let mut joined = event("a", start);
        joined.volunteers_ids = vec!["ajY8pM2".to_string()];
        app.update_cached_event(&joined).await;
        app.update_cached_event(&event("c", start)).await;

        let cached = cache.get_from_cache::<Vec<VolunteeringEvent>>(EVENTS_KEY).await.unwrap();
        let ids: Vec<&str> = cached.data.iter().map(|e| e.id.as_str()).collect();
        assert_eq!(ids, vec!["a", "b", "c"]);
        assert_eq!(cached.data[0].volunteers_ids, vec!["ajY8pM2".to_string()]);
    }

    #[tokio::test]
    async fn test_sync_reads_signed_in_profile_from_user_info() {
        let cache = CacheManager::in_memory();
        let token = jwt_expiring_at((Utc::now() + Duration::hours(1)).timestamp());
        cache.set_in_cache(ACCESS_TOKEN_KEY, &token).await.unwrap();
        cache.set_in_cache(USER_INFO_KEY, &user("ajY8pM2")).await.unwrap();
        cache.set_in_cache(EVENTS_KEY, &Vec::<VolunteeringEvent>::new()).await.unwrap();

        let mut app = app(cache, false).await;
        assert!(app.is_authenticated());

        let (events, profile) = app.sync().await.unwrap();
        assert!(events.value.is_empty());
        let profile = profile.expect("signed-in profile");
        assert_eq!(profile.value.id, "ajY8pM2");
        assert!(profile.origin.is_offline());
    }

    #[tokio::test]
    async fn test_apply_offline_refuses_before_renewing() {
        let cache = CacheManager::in_memory();
        cache.set_in_cache(ACCESS_TOKEN_KEY, &jwt_expiring_at(1_700_000_000)).await.unwrap();
        cache.set_in_cache(USER_INFO_KEY, &user("ajY8pM2")).await.unwrap();

        let mut app = app(cache, true).await;
        app.config.last_email = Some("eva.young@example.com".to_string());
        assert!(!app.is_authenticated());
        assert!(!app.renew_session().await.unwrap());

        let err = app.apply("a").await.unwrap_err();
        assert_eq!(err.to_string(), "Cannot volunteer while offline");
    }
}
