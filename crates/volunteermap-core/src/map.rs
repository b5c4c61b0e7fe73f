//! Map viewport and marker aggregation.
//!
//! The map shows every upcoming event plus the user's own location. The
//! viewport is the axis-aligned bounding box of those points, with a fixed
//! edge padding so markers are not hidden behind the header and footer
//! overlays.

use serde::{Deserialize, Serialize};

use crate::models::{Coordinate, VolunteeringEvent, VolunteeringStatus};

/// Where the map starts before the user's location is known (Calgary).
pub const DEFAULT_POSITION: Coordinate = Coordinate::new(51.03, -114.093);

/// Latitude/longitude span used when there is nothing to fit.
pub const DEFAULT_DELTA: f64 = 0.008;

pub const DEFAULT_REGION: Region = Region {
    latitude: DEFAULT_POSITION.latitude,
    longitude: DEFAULT_POSITION.longitude,
    latitude_delta: DEFAULT_DELTA,
    longitude_delta: DEFAULT_DELTA,
};

/// Padding around fitted markers, in screen points.
pub const MAP_EDGE_PADDING: EdgePadding = EdgePadding {
    top: 64,
    right: 16,
    bottom: 104,
    left: 16,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct EdgePadding {
    pub top: u32,
    pub right: u32,
    pub bottom: u32,
    pub left: u32,
}

/// Center plus span, the form map widgets take as an initial region.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Region {
    pub latitude: f64,
    pub longitude: f64,
    pub latitude_delta: f64,
    pub longitude_delta: f64,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Bounds {
    pub south: f64,
    pub west: f64,
    pub north: f64,
    pub east: f64,
}

impl Bounds {
    pub fn from_point(point: Coordinate) -> Self {
        Self {
            south: point.latitude,
            west: point.longitude,
            north: point.latitude,
            east: point.longitude,
        }
    }

    pub fn extend(&mut self, point: Coordinate) {
        self.south = self.south.min(point.latitude);
        self.north = self.north.max(point.latitude);
        self.west = self.west.min(point.longitude);
        self.east = self.east.max(point.longitude);
    }

    pub fn contains(&self, point: Coordinate) -> bool {
        (self.south..=self.north).contains(&point.latitude)
            && (self.west..=self.east).contains(&point.longitude)
    }

    pub fn center(&self) -> Coordinate {
        Coordinate::new(
            (self.south + self.north) / 2.0,
            (self.west + self.east) / 2.0,
        )
    }

    pub fn is_point(&self) -> bool {
        self.south == self.north && self.west == self.east
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct Viewport {
    pub bounds: Bounds,
    pub padding: EdgePadding,
}

impl Viewport {
    /// Region covering the bounds. A single point gets the default span so
    /// the map still shows its surroundings.
    pub fn region(&self) -> Region {
        let center = self.bounds.center();
        let latitude_delta = self.bounds.north - self.bounds.south;
        let longitude_delta = self.bounds.east - self.bounds.west;
        Region {
            latitude: center.latitude,
            longitude: center.longitude,
            latitude_delta: if latitude_delta > 0.0 { latitude_delta } else { DEFAULT_DELTA },
            longitude_delta: if longitude_delta > 0.0 { longitude_delta } else { DEFAULT_DELTA },
        }
    }
}

/// Fit the viewport to every event position and the user's location.
/// With no events the bounds collapse to the user's location.
pub fn fit_to_coordinates(user_location: Coordinate, events: &[VolunteeringEvent]) -> Viewport {
    let bounds = events
        .iter()
        .map(|event| event.position)
        .fold(Bounds::from_point(user_location), |mut bounds, point| {
            bounds.extend(point);
            bounds
        });

    Viewport {
        bounds,
        padding: MAP_EDGE_PADDING,
    }
}

/// Marker artwork picked from the volunteering status
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub enum MarkerKind {
    Default,
    Applied,
    Full,
}

impl From<VolunteeringStatus> for MarkerKind {
    fn from(status: VolunteeringStatus) -> Self {
        match status {
            VolunteeringStatus::NotApplied => MarkerKind::Default,
            VolunteeringStatus::Applied => MarkerKind::Applied,
            VolunteeringStatus::Full => MarkerKind::Full,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
#[cfg_attr(feature = "ts", derive(ts_rs::TS), ts(export))]
pub struct MapMarker {
    pub event_id: String,
    pub position: Coordinate,
    pub kind: MarkerKind,
}

/// One marker per event, styled for the optional signed-in user
pub fn markers(events: &[VolunteeringEvent], user_id: Option<&str>) -> Vec<MapMarker> {
    events
        .iter()
        .map(|event| MapMarker {
            event_id: event.id.clone(),
            position: event.position,
            kind: event.status_for_viewer(user_id).into(),
        })
        .collect()
}

pub fn events_found_label(count: usize) -> String {
    if count == 0 {
        "No events found".to_string()
    } else {
        format!("{} event(s) found", count)
    }
}
