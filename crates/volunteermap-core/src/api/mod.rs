//! REST clients for the events backend and the image host.
//!
//! `ApiClient` talks to the JSON events server (login, events, users) and
//! attaches the session's bearer token. `ImageUploader` posts event images
//! to the image host, which authenticates with an API key instead.

pub mod client;
pub mod error;
pub mod image;

pub use client::{ApiClient, DEFAULT_API_BASE_URL};
pub use error::ApiError;
pub use image::{ImageUploader, DEFAULT_IMAGE_API_BASE_URL};
