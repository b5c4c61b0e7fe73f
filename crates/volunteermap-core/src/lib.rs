//! Core library for volunteermap.
//!
//! Discover local volunteering events, create new ones and apply to
//! volunteer, with the events list and user profile kept available offline
//! through a network-first cache.

pub mod api;
pub mod auth;
pub mod cache;
pub mod config;
pub mod map;
pub mod models;
pub mod utils;
