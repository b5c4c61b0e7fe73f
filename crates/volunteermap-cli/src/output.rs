//! Plain-text rendering of events, users and map data for the terminal.

use volunteermap_core::cache::{age_display, DataOrigin};
use volunteermap_core::map::{self, MarkerKind, Viewport};
use volunteermap_core::models::{UploadedImage, User, VolunteeringEvent, VolunteeringStatus};
use volunteermap_core::utils::truncate_string;

/// Width of the name column in the events table
const NAME_WIDTH: usize = 28;

/// Width of the description preview in the events table
const DESCRIPTION_WIDTH: usize = 40;

pub fn origin_notice(origin: &DataOrigin) -> Option<String> {
    match origin {
        DataOrigin::Network => None,
        DataOrigin::Cache { cached_at } => Some(format!(
            "Offline - showing data cached {}",
            age_display(*cached_at)
        )),
    }
}

fn status_for(event: &VolunteeringEvent, user: Option<&User>) -> VolunteeringStatus {
    event.status_for_viewer(user.map(|u| u.id.as_str()))
}

fn marker_symbol(kind: MarkerKind) -> char {
    match kind {
        MarkerKind::Default => '●',
        MarkerKind::Applied => '✓',
        MarkerKind::Full => '○',
    }
}

pub fn print_events(events: &[VolunteeringEvent], user: Option<&User>) {
    println!("{}", map::events_found_label(events.len()));
    if events.is_empty() {
        return;
    }
    println!();

    for event in events {
        let status = status_for(event, user);
        println!(
            "{} {:<name_width$}  {:<26}  {}",
            marker_symbol(status.into()),
            truncate_string(&event.name, NAME_WIDTH),
            event.formatted_datetime(),
            event.volunteering_summary(status),
            name_width = NAME_WIDTH,
        );
        println!(
            "  {:<name_width$}  {}",
            event.id,
            truncate_string(&event.description, DESCRIPTION_WIDTH),
            name_width = NAME_WIDTH,
        );
    }
}

pub fn print_event(event: &VolunteeringEvent, organizer: Option<&User>, user: Option<&User>) {
    let status = status_for(event, user);

    println!("{}", event.name);
    if let Some(organizer) = organizer {
        println!("organized by {}", organizer.full_name());
    }
    println!();
    if !event.description.is_empty() {
        println!("{}", event.description);
        println!();
    }
    println!("When:       {}", event.formatted_datetime());
    println!("Where:      {}", event.position);
    println!("Volunteers: {}", event.volunteering_summary(status));
    if status == VolunteeringStatus::NotApplied {
        println!("            {} spot(s) left", event.spots_remaining());
    }
    if let Some(ref url) = event.image_url {
        println!("Image:      {}", url);
    }
    println!(
        "Route:      https://www.google.com/maps/dir/?api=1&destination={},{}",
        event.position.latitude, event.position.longitude
    );
    if let Some(organizer) = organizer {
        println!("Contact:    {} {}", organizer.email, organizer.formatted_mobile());
    }
}

pub fn print_viewport(viewport: &Viewport) {
    let region = viewport.region();
    let b = &viewport.bounds;
    let p = &viewport.padding;
    println!(
        "Bounds: S {:.5}  W {:.5}  N {:.5}  E {:.5}",
        b.south, b.west, b.north, b.east
    );
    println!(
        "Region: center {:.5}, {:.5}  span {:.5} x {:.5}",
        region.latitude, region.longitude, region.latitude_delta, region.longitude_delta
    );
    println!(
        "Padding: top {} right {} bottom {} left {}",
        p.top, p.right, p.bottom, p.left
    );
}

pub fn print_user(user: &User) {
    println!("{}", user.full_name());
    println!("Email:  {}", user.email);
    if !user.mobile.is_empty() {
        println!("Mobile: {}", user.formatted_mobile());
    }
    println!("Id:     {}", user.id);
}

pub fn print_uploaded_image(image: &UploadedImage) {
    println!("Uploaded {} ({})", image.filename, image.size_display());
    println!("{}", image.url);
}
