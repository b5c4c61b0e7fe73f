//! Formatting helpers shared by the library and the CLI.

pub mod format;

pub use format::{
    add_hours, format_ampm, format_bytes, format_event_date, format_phone, parse_count,
    truncate_string, update_date_with_new_time,
};
