use chrono::{DateTime, Local, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

use crate::utils::{format_ampm, format_event_date};

use super::User;

/// Maximum length of an event description, matching the create form.
pub const MAX_DESCRIPTION_LENGTH: usize = 300;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Coordinate {
    pub latitude: f64,
    pub longitude: f64,
}

impl Coordinate {
    pub const fn new(latitude: f64, longitude: f64) -> Self {
        Self { latitude, longitude }
    }
}

impl std::fmt::Display for Coordinate {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:.5}, {:.5}", self.latitude, self.longitude)
    }
}

/// A user's relationship to an event's volunteer roster. Always derived from
/// the event and the acting user, never stored.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum VolunteeringStatus {
    NotApplied,
    Applied,
    Full,
}

impl std::fmt::Display for VolunteeringStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VolunteeringStatus::NotApplied => write!(f, "Not Applied"),
            VolunteeringStatus::Applied => write!(f, "Applied"),
            VolunteeringStatus::Full => write!(f, "Full"),
        }
    }
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ApplyError {
    #[error("You have already volunteered for this event")]
    AlreadyApplied,

    #[error("This event's team is full")]
    EventFull,
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventValidationError {
    #[error("Event name is required")]
    MissingName,

    #[error("Description is longer than {max} characters")]
    DescriptionTooLong { max: usize },

    #[error("At least one volunteer must be needed")]
    NoVolunteersNeeded,

    #[error("Event date must be in the future")]
    InPast,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct VolunteeringEvent {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub volunteers_needed: u32,
    pub organizer_id: String,
    pub date_time: DateTime<Utc>,
    pub position: Coordinate,
    #[serde(default)]
    pub volunteers_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image_url: Option<String>,
}

/// Resolve the volunteering status of `user` for `event`.
///
/// Capacity wins over membership: a user already on the roster of a full
/// event sees `Full`, not `Applied`. A roster larger than
/// `volunteers_needed` also counts as full.
pub fn resolve_status(event: &VolunteeringEvent, user: &User) -> VolunteeringStatus {
    event.status_for(&user.id)
}

impl VolunteeringEvent {
    pub fn volunteers_count(&self) -> u32 {
        u32::try_from(self.volunteers_ids.len()).unwrap_or(u32::MAX)
    }

    /// Rosters larger than `volunteers_needed` count as full too; the server
    /// never enforces the limit.
    pub fn is_full(&self) -> bool {
        self.volunteers_count() >= self.volunteers_needed
    }

    pub fn has_volunteer(&self, user_id: &str) -> bool {
        self.volunteers_ids.iter().any(|id| id == user_id)
    }

    pub fn spots_remaining(&self) -> u32 {
        self.volunteers_needed.saturating_sub(self.volunteers_count())
    }

    pub fn status_for(&self, user_id: &str) -> VolunteeringStatus {
        if self.is_full() {
            VolunteeringStatus::Full
        } else if self.has_volunteer(user_id) {
            VolunteeringStatus::Applied
        } else {
            VolunteeringStatus::NotApplied
        }
    }

    /// Status as seen by an optional signed-in user. Without a user nobody
    /// can have applied, so only capacity matters.
    pub fn status_for_viewer(&self, user_id: Option<&str>) -> VolunteeringStatus {
        match user_id {
            Some(id) => self.status_for(id),
            None if self.is_full() => VolunteeringStatus::Full,
            None => VolunteeringStatus::NotApplied,
        }
    }

    /// Roster after `user_id` joins. Only users who have not applied to an
    /// event with free spots can join.
    pub fn roster_with(&self, user_id: &str) -> Result<Vec<String>, ApplyError> {
        match self.status_for(user_id) {
            VolunteeringStatus::Full => Err(ApplyError::EventFull),
            VolunteeringStatus::Applied => Err(ApplyError::AlreadyApplied),
            VolunteeringStatus::NotApplied => {
                let mut roster = self.volunteers_ids.clone();
                roster.push(user_id.to_string());
                Ok(roster)
            }
        }
    }

    pub fn is_upcoming(&self, now: DateTime<Utc>) -> bool {
        self.date_time >= now
    }

    /// Card copy for the volunteering box
    pub fn volunteering_summary(&self, status: VolunteeringStatus) -> String {
        match status {
            VolunteeringStatus::NotApplied => format!(
                "{} of {} Volunteer(s) needed",
                self.volunteers_count(),
                self.volunteers_needed
            ),
            VolunteeringStatus::Applied => "Volunteered!".to_string(),
            VolunteeringStatus::Full => "Team is full!".to_string(),
        }
    }

    /// "Fri Oct 20 2023 @ 11:00 AM" in the local time zone
    pub fn formatted_datetime(&self) -> String {
        let local = self.date_time.with_timezone(&Local);
        format!("{} @ {}", format_event_date(&local), format_ampm(&local))
    }
}

/// Data collected by the create-event form.
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub name: String,
    pub description: String,
    pub volunteers_needed: u32,
    pub date_time: DateTime<Utc>,
    pub position: Coordinate,
    pub image_url: Option<String>,
}

impl NewEvent {
    pub fn validate(&self, now: DateTime<Utc>) -> Result<(), EventValidationError> {
        if self.name.trim().is_empty() {
            return Err(EventValidationError::MissingName);
        }
        if self.description.chars().count() > MAX_DESCRIPTION_LENGTH {
            return Err(EventValidationError::DescriptionTooLong {
                max: MAX_DESCRIPTION_LENGTH,
            });
        }
        if self.volunteers_needed == 0 {
            return Err(EventValidationError::NoVolunteersNeeded);
        }
        if self.date_time <= now {
            return Err(EventValidationError::InPast);
        }
        Ok(())
    }

    /// Build the event to submit, with a fresh id and an empty roster.
    pub fn into_event(self, organizer: &User) -> VolunteeringEvent {
        VolunteeringEvent {
            id: Uuid::new_v4().to_string(),
            name: self.name.trim().to_string(),
            description: self.description,
            volunteers_needed: self.volunteers_needed,
            organizer_id: organizer.id.clone(),
            date_time: self.date_time,
            position: self.position,
            volunteers_ids: Vec::new(),
            image_url: self.image_url,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::models::PersonName;
    use chrono::{Duration, TimeZone};

    pub(crate) fn event(needed: u32, volunteers: &[&str]) -> VolunteeringEvent {
        VolunteeringEvent {
            id: "evt-1".to_string(),
            name: "Food Distribution".to_string(),
            description: "Calgary Drop-In is recruiting volunteers".to_string(),
            volunteers_needed: needed,
            organizer_id: "org-1".to_string(),
            date_time: Utc.with_ymd_and_hms(2023, 10, 20, 17, 0, 0).unwrap(),
            position: Coordinate::new(51.04, -114.10),
            volunteers_ids: volunteers.iter().map(|v| v.to_string()).collect(),
            image_url: None,
        }
    }

    pub(crate) fn user(id: &str) -> User {
        User {
            id: id.to_string(),
            name: PersonName {
                first: "Eva".to_string(),
                last: "Young".to_string(),
            },
            email: "eva.young@example.com".to_string(),
            mobile: "(543) 905-5629".to_string(),
        }
    }

    fn new_event() -> NewEvent {
        NewEvent {
            name: "Park cleanup".to_string(),
            description: "Bring gloves".to_string(),
            volunteers_needed: 4,
            date_time: Utc.with_ymd_and_hms(2030, 5, 1, 15, 0, 0).unwrap(),
            position: Coordinate::new(51.03, -114.093),
            image_url: None,
        }
    }

    #[test]
    fn test_full_takes_precedence_over_applied() {
        let e = event(2, &["A", "B"]);
        assert_eq!(resolve_status(&e, &user("A")), VolunteeringStatus::Full);
    }

    #[test]
    fn test_applied() {
        let e = event(3, &["A"]);
        assert_eq!(resolve_status(&e, &user("A")), VolunteeringStatus::Applied);
    }

    #[test]
    fn test_not_applied() {
        let e = event(3, &[]);
        assert_eq!(resolve_status(&e, &user("Z")), VolunteeringStatus::NotApplied);
    }

    #[test]
    fn test_oversubscribed_roster_is_full() {
        let e = event(1, &["A", "B"]);
        assert_eq!(e.status_for("C"), VolunteeringStatus::Full);
        assert_eq!(resolve_status(&e, &user("B")), VolunteeringStatus::Full);
        assert_eq!(e.spots_remaining(), 0);
    }

    #[test]
    fn test_roster_with() {
        let e = event(3, &["A"]);
        assert_eq!(e.roster_with("B"), Ok(vec!["A".to_string(), "B".to_string()]));
        assert_eq!(e.roster_with("A"), Err(ApplyError::AlreadyApplied));

        let full = event(1, &["A"]);
        assert_eq!(full.roster_with("B"), Err(ApplyError::EventFull));
    }

    #[test]
    fn test_volunteering_summary() {
        let e = event(10, &["A"]);
        assert_eq!(
            e.volunteering_summary(VolunteeringStatus::NotApplied),
            "1 of 10 Volunteer(s) needed"
        );
        assert_eq!(e.volunteering_summary(VolunteeringStatus::Applied), "Volunteered!");
        assert_eq!(e.volunteering_summary(VolunteeringStatus::Full), "Team is full!");
    }

    #[test]
    fn test_parse_event_from_server() {
        let json = r#"{
            "id": "a1b2",
            "name": "Food Distribution",
            "description": "Help out",
            "volunteersNeeded": 10,
            "organizerId": "ajY8pM2",
            "dateTime": "2023-10-20T17:00:00.000Z",
            "position": {"latitude": 51.0405, "longitude": -114.0931},
            "volunteersIds": ["89ae4e45"]
        }"#;
        let e: VolunteeringEvent =
            serde_json::from_str(json).expect("Failed to parse event test JSON");
        assert_eq!(e.date_time, Utc.with_ymd_and_hms(2023, 10, 20, 17, 0, 0).unwrap());
        assert_eq!(e.volunteers_count(), 1);
        assert!(e.image_url.is_none());

        let back = serde_json::to_value(&e).unwrap();
        assert!(back.get("imageUrl").is_none());
        assert_eq!(back["volunteersNeeded"], 10);
    }

    #[test]
    fn test_status_serializes_as_tag() {
        let json = serde_json::to_string(&VolunteeringStatus::NotApplied).unwrap();
        assert_eq!(json, "\"NOT_APPLIED\"");
    }

    #[test]
    fn test_new_event_validation() {
        let now = Utc.with_ymd_and_hms(2030, 1, 1, 0, 0, 0).unwrap();
        assert_eq!(new_event().validate(now), Ok(()));

        let mut blank = new_event();
        blank.name = "   ".to_string();
        assert_eq!(blank.validate(now), Err(EventValidationError::MissingName));

        let mut nobody = new_event();
        nobody.volunteers_needed = 0;
        assert_eq!(nobody.validate(now), Err(EventValidationError::NoVolunteersNeeded));

        let mut past = new_event();
        past.date_time = now - Duration::hours(1);
        assert_eq!(past.validate(now), Err(EventValidationError::InPast));

        let mut wordy = new_event();
        wordy.description = "x".repeat(MAX_DESCRIPTION_LENGTH + 1);
        assert_eq!(
            wordy.validate(now),
            Err(EventValidationError::DescriptionTooLong { max: MAX_DESCRIPTION_LENGTH })
        );
    }

    #[test]
    fn test_into_event() {
        let organizer = user("ajY8pM2");
        let e = new_event().into_event(&organizer);
        assert_eq!(e.organizer_id, "ajY8pM2");
        assert!(e.volunteers_ids.is_empty());
        assert_eq!(e.id.len(), 36);
        assert_eq!(e.status_for("ajY8pM2"), VolunteeringStatus::NotApplied);
    }
}
