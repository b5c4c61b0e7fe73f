//! volunteermap - find, create and volunteer for local events from the
//! terminal.
//!
//! Events and the signed-in user's profile are fetched network first and
//! fall back to the local cache, so every read command keeps working
//! offline.

mod app;
mod output;

use std::io;
use std::path::PathBuf;

use anyhow::{anyhow, Result};
use chrono::{Local, NaiveDate, NaiveTime, TimeZone, Utc};
use clap::{Parser, Subcommand};
use tracing::{debug, info};
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use volunteermap_core::cache::CacheError;
use volunteermap_core::map::{self, DEFAULT_POSITION};
use volunteermap_core::models::{Coordinate, NewEvent};
use volunteermap_core::utils::{add_hours, parse_count, update_date_with_new_time};

use app::App;

/// Hours ahead of now that a new event defaults to
const DEFAULT_EVENT_LEAD_HOURS: i64 = 2;

#[derive(Parser, Debug)]
#[command(name = "volunteermap", version, about = "Local volunteering events, online or offline")]
struct Cli {
    /// Skip the network and read from the local cache only
    #[arg(long, global = true)]
    offline: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Sign in and keep the session for later commands
    Login {
        #[arg(long)]
        email: Option<String>,
        /// Keep the password in the system keychain
        #[arg(long)]
        remember: bool,
    },
    /// End the session
    Logout {
        /// Also delete the stored password
        #[arg(long)]
        forget: bool,
    },
    /// Show the signed-in user
    Whoami,
    /// List upcoming events and the map viewport that fits them
    Events {
        /// Your latitude, used to fit the map
        #[arg(long, requires = "lon", allow_hyphen_values = true)]
        lat: Option<f64>,
        /// Your longitude, used to fit the map
        #[arg(long, requires = "lat", allow_hyphen_values = true)]
        lon: Option<f64>,
    },
    /// Show one event with its organizer
    Show { id: String },
    /// Create a new event
    Create {
        #[arg(long)]
        name: String,
        #[arg(long, default_value = "")]
        description: String,
        /// Number of volunteers needed
        #[arg(long, value_parser = parse_needed)]
        needed: u32,
        #[arg(long, allow_hyphen_values = true)]
        lat: f64,
        #[arg(long, allow_hyphen_values = true)]
        lon: f64,
        /// Event date (YYYY-MM-DD), defaults to today
        #[arg(long)]
        date: Option<NaiveDate>,
        /// Event time (HH:MM), defaults to two hours from now
        #[arg(long, value_parser = parse_time)]
        time: Option<NaiveTime>,
        /// Image to upload and attach to the event
        #[arg(long)]
        image: Option<PathBuf>,
    },
    /// Volunteer for an event
    Apply { id: String },
    /// Upload an image and print its hosted URL
    Upload { path: PathBuf },
    /// Refresh the events list and your profile
    Sync,
}

fn parse_needed(text: &str) -> Result<u32, String> {
    parse_count(text).ok_or_else(|| format!("'{}' is not a number", text))
}

fn parse_time(text: &str) -> Result<NaiveTime, String> {
    NaiveTime::parse_from_str(text, "%H:%M").map_err(|e| format!("'{}': {}", text, e))
}

/// Initialize the tracing subscriber for logging.
/// Use RUST_LOG to control the level (e.g. RUST_LOG=debug).
fn init_tracing(log_dir: Option<PathBuf>) -> Option<WorkerGuard> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            let appender = tracing_appender::rolling::daily(dir, "volunteermap.log");
            let (writer, guard) = tracing_appender::non_blocking(appender);
            (Some(fmt::layer().with_ansi(false).with_writer(writer)), Some(guard))
        }
        None => (None, None),
    };

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(file_layer)
        .with(filter)
        .init();

    guard
}

/// Combine the optional date and time with the default start
fn event_start(date: Option<NaiveDate>, time: Option<NaiveTime>) -> Result<chrono::DateTime<Utc>> {
    let mut start = add_hours(Local::now(), DEFAULT_EVENT_LEAD_HOURS);
    if let Some(date) = date {
        start = Local
            .from_local_datetime(&date.and_time(start.time()))
            .single()
            .ok_or_else(|| anyhow!("{} is not a valid local date", date))?;
    }
    if let Some(time) = time {
        start = update_date_with_new_time(&start, time)
            .ok_or_else(|| anyhow!("{} does not exist on {}", time, start.date_naive()))?;
    }
    Ok(start.with_timezone(&Utc))
}

async fn run(cli: Cli) -> Result<()> {
    let mut app = App::new(cli.offline).await?;

    match cli.command {
        Command::Login { email, remember } => {
            app.login_interactive(email, remember).await?;
        }
        Command::Logout { forget } => {
            app.logout(forget).await?;
            println!("Logged out.");
        }
        Command::Whoami => {
            match app.current_user().await? {
                Some(user) => output::print_user(&user),
                None => println!("Not logged in."),
            }
            match app.session.data {
                Some(ref data) if !data.is_expired() => {
                    println!("Session expires in {} min", data.minutes_until_expiry());
                }
                Some(_) => println!("Session expired. Run `volunteermap login`."),
                None => {}
            }
            let ages = app.cache.get_cache_ages().await;
            println!("Events cached:  {}", ages.events_age());
            println!("Profile cached: {}", ages.user_info_age());
        }
        Command::Events { lat, lon } => {
            let fetched = app.load_events().await?;
            if let Some(notice) = output::origin_notice(&fetched.origin) {
                println!("{}\n", notice);
            }
            let user = app.current_user().await?;
            output::print_events(&fetched.value, user.as_ref());

            let user_location = match (lat, lon) {
                (Some(lat), Some(lon)) => Coordinate::new(lat, lon),
                _ => DEFAULT_POSITION,
            };
            println!();
            output::print_viewport(&map::fit_to_coordinates(user_location, &fetched.value));
        }
        Command::Show { id } => {
            let (event, origin) = app.find_event(&id).await?;
            if let Some(notice) = output::origin_notice(&origin) {
                println!("{}\n", notice);
            }
            let organizer = match app.load_user(&event.organizer_id).await {
                Ok(fetched) => Some(fetched.value),
                Err(e) => {
                    debug!(error = %e, organizer = %event.organizer_id, "Organizer unavailable");
                    None
                }
            };
            let user = app.current_user().await?;
            output::print_event(&event, organizer.as_ref(), user.as_ref());
        }
        Command::Create {
            name,
            description,
            needed,
            lat,
            lon,
            date,
            time,
            image,
        } => {
            if app.offline {
                return Err(anyhow!("Cannot create events while offline"));
            }
            let mut form = NewEvent {
                name,
                description,
                volunteers_needed: needed,
                date_time: event_start(date, time)?,
                position: Coordinate::new(lat, lon),
                image_url: None,
            };
            form.validate(Utc::now())?;

            if let Some(path) = image {
                let uploaded = app.upload_image(&path).await?;
                output::print_uploaded_image(&uploaded);
                form.image_url = Some(uploaded.url);
            }

            let created = app.create_event(form).await?;
            println!("Created \"{}\" ({})", created.name, created.id);
            println!("{}", created.formatted_datetime());
        }
        Command::Apply { id } => {
            let updated = app.apply(&id).await?;
            println!("You volunteered for \"{}\"!", updated.name);
            let status = updated.status_for_viewer(app.session.user().map(|u| u.id.as_str()));
            println!("{}", updated.volunteering_summary(status));
        }
        Command::Upload { path } => {
            if app.offline {
                return Err(anyhow!("Cannot upload images while offline"));
            }
            let uploaded = app.upload_image(&path).await?;
            output::print_uploaded_image(&uploaded);
        }
        Command::Sync => {
            let (events, profile) = app.sync().await?;
            println!(
                "{} ({})",
                map::events_found_label(events.value.len()),
                output::origin_notice(&events.origin).unwrap_or_else(|| "up to date".to_string())
            );
            if let Some(profile) = profile {
                println!(
                    "Profile: {} ({})",
                    profile.value.full_name(),
                    output::origin_notice(&profile.origin)
                        .unwrap_or_else(|| "up to date".to_string())
                );
            }
        }
    }

    Ok(())
}

#[tokio::main]
async fn main() {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();

    let cli = Cli::parse();

    let log_dir = dirs::cache_dir().map(|dir| dir.join("volunteermap").join("logs"));
    let _guard = init_tracing(log_dir);
    info!(command = ?cli.command, offline = cli.offline, "volunteermap starting");

    if let Err(e) = run(cli).await {
        match e.downcast_ref::<CacheError>() {
            Some(cache_error) if cache_error.is_miss() => {
                eprintln!("No network connection and nothing cached yet.");
            }
            _ => eprintln!("Error: {:#}", e),
        }
        std::process::exit(1);
    }
}
