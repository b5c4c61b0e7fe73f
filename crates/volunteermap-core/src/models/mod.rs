//! Data models for volunteering events and users.
//!
//! - `VolunteeringEvent`, `NewEvent`: events as stored by the server and as
//!   collected by the create form
//! - `VolunteeringStatus`: derived roster status for the acting user
//! - `User`: registered user reference data
//! - `UploadedImage`: result of an image host upload

pub mod event;
pub mod image;
pub mod user;

pub use event::{
    resolve_status, ApplyError, Coordinate, EventValidationError, NewEvent, VolunteeringEvent,
    VolunteeringStatus,
};
pub use image::UploadedImage;
pub use user::{PersonName, User};
