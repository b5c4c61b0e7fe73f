//! API client for the volunteering events REST backend.
//!
//! The backend is a JSON server exposing `/login`, `/events` and `/users`.
//! Event times travel as ISO-8601 strings and are parsed into UTC instants.

use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::{header, Client, Method, Url};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::auth::SessionData;
use crate::models::{User, VolunteeringEvent};

use super::ApiError;

// ============================================================================
// Constants
// ============================================================================

/// Base URL of a locally running mock server
pub const DEFAULT_API_BASE_URL: &str = "http://localhost:3333";

/// HTTP request timeout in seconds.
const REQUEST_TIMEOUT_SECS: u64 = 30;

/// Maximum number of retries for rate-limited (429) requests.
const MAX_RATE_LIMIT_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds for rate limiting.
const INITIAL_BACKOFF_MS: u64 = 1000;

#[derive(Debug, Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct LoginResponse {
    access_token: String,
    user: User,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct VolunteersPatch<'a> {
    volunteers_ids: &'a [String],
}

/// API client for the events backend.
/// Clone is cheap - reqwest::Client uses Arc internally for connection pooling.
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
    token: Option<String>,
}

impl ApiClient {
    pub fn new(base_url: &str) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(REQUEST_TIMEOUT_SECS))
            .build()?;

        Ok(Self {
            client,
            base_url: base_url.trim_end_matches('/').to_string(),
            token: None,
        })
    }

    /// Set the bearer token for authenticated requests
    pub fn set_token(&mut self, token: String) {
        self.token = Some(token);
    }

    /// Create a new ApiClient with the given token, sharing the connection pool.
    pub fn with_token(&self, token: String) -> Self {
        Self {
            client: self.client.clone(),
            base_url: self.base_url.clone(),
            token: Some(token),
        }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path.trim_start_matches('/'))
    }

    fn auth_headers(&self) -> Result<header::HeaderMap> {
        let mut headers = header::HeaderMap::new();
        if let Some(ref token) = self.token {
            headers.insert(
                header::AUTHORIZATION,
                header::HeaderValue::from_str(&format!("Bearer {}", token))?,
            );
        }
        Ok(headers)
    }

    /// Check if response is successful, returning an error with body if not.
    pub(crate) async fn check_response(response: reqwest::Response) -> Result<reqwest::Response> {
        if response.status().is_success() {
            Ok(response)
        } else {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            Err(ApiError::from_status(status, &body).into())
        }
    }

    /// Send a JSON request, backing off exponentially while rate limited.
    async fn request<T, B>(&self, method: Method, url: &str, body: Option<&B>) -> Result<T>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let mut retries = 0;
        let mut backoff_ms = INITIAL_BACKOFF_MS;

        loop {
            let mut builder = self
                .client
                .request(method.clone(), url)
                .headers(self.auth_headers()?);
            if let Some(body) = body {
                builder = builder.json(body);
            }

            let response = builder
                .send()
                .await
                .map_err(ApiError::from)
                .with_context(|| format!("Failed to send {} request to {}", method, url))?;

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                retries += 1;
                if retries > MAX_RATE_LIMIT_RETRIES {
                    return Err(ApiError::RateLimited.into());
                }
                warn!(
                    url = url,
                    retry = retries,
                    backoff_ms = backoff_ms,
                    "Rate limited, backing off"
                );
                tokio::time::sleep(Duration::from_millis(backoff_ms)).await;
                backoff_ms *= 2;
                continue;
            }

            let response = Self::check_response(response).await?;
            let text = response
                .text()
                .await
                .with_context(|| format!("Failed to read response body from {}", url))?;
            return serde_json::from_str(&text)
                .map_err(|e| ApiError::InvalidResponse(e.to_string()))
                .with_context(|| format!("Failed to parse JSON response from {}", url));
        }
    }

    async fn get<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        self.request::<T, ()>(Method::GET, url, None).await
    }

    // ===== Authentication =====

    /// Log in with email and password and return the new session
    pub async fn authenticate(&self, email: &str, password: &str) -> Result<SessionData> {
        let url = self.url("login");
        let login: LoginResponse = self
            .request(Method::POST, &url, Some(&LoginRequest { email, password }))
            .await
            .context("Authentication failed")?;

        info!(user_id = %login.user.id, "Authenticated");
        Ok(SessionData {
            access_token: login.access_token,
            user: login.user,
            created_at: Utc::now(),
        })
    }

    // ===== Events =====

    /// Fetch events happening at or after `now`
    pub async fn fetch_future_events(&self, now: DateTime<Utc>) -> Result<Vec<VolunteeringEvent>> {
        let url = future_events_url(&self.url("events"), now)?;
        let events: Vec<VolunteeringEvent> = self.get(url.as_str()).await?;
        debug!(count = events.len(), "Fetched upcoming events");
        Ok(events)
    }

    pub async fn create_event(&self, event: &VolunteeringEvent) -> Result<VolunteeringEvent> {
        let url = self.url("events");
        let created: VolunteeringEvent = self
            .request(Method::POST, &url, Some(event))
            .await
            .context("Failed to create event")?;
        info!(event_id = %created.id, "Created event");
        Ok(created)
    }

    /// Add `user_id` to the event's volunteer roster.
    ///
    /// Nothing is sent when the user already applied or the team is full;
    /// the returned error downcasts to [`crate::models::ApplyError`].
    pub async fn update_volunteers(
        &self,
        event: &VolunteeringEvent,
        user_id: &str,
    ) -> Result<VolunteeringEvent> {
        let roster = event.roster_with(user_id)?;
        let url = self.url(&format!("events/{}", event.id));
        let updated: VolunteeringEvent = self
            .request(Method::PATCH, &url, Some(&VolunteersPatch { volunteers_ids: &roster }))
            .await
            .with_context(|| format!("Failed to update volunteers for event {}", event.id))?;
        info!(
            event_id = %updated.id,
            volunteers = updated.volunteers_ids.len(),
            "Updated volunteers"
        );
        Ok(updated)
    }

    // ===== Users =====

    pub async fn fetch_user(&self, user_id: &str) -> Result<User> {
        let url = self.url(&format!("users/{}", user_id));
        self.get(&url)
            .await
            .with_context(|| format!("Failed to fetch user {}", user_id))
    }
}

/// `GET /events?dateTime_gte=<now>` with millisecond precision, the format
/// the server stores event times in.
fn future_events_url(events_url: &str, now: DateTime<Utc>) -> Result<Url> {
    let since = now.to_rfc3339_opts(SecondsFormat::Millis, true);
    Url::parse_with_params(events_url, &[("dateTime_gte", since)])
        .with_context(|| format!("Invalid events URL: {}", events_url))
}
