//! Output formatting and persistence for board views and feed statistics.
//!
//! Supports a plain-text board, JSON serialization, and CSV append.

use std::fmt::Write as _;
use std::fs::OpenOptions;
use std::path::Path;

use anyhow::Result;
use chrono::{DateTime, Utc};
use csv::WriterBuilder;
use serde::Serialize;
use tracing::debug;

use crate::views::{FeedView, NO_UPCOMING_STOPS, TripView};

/// One CSV row per trip; the nested stop list is reduced to its length.
#[derive(Debug, Serialize)]
pub struct TripRow<'a> {
    pub sampled_at: DateTime<Utc>,
    pub trip_id: &'a str,
    pub route_id: &'a str,
    pub train_id: &'a str,
    pub direction: String,
    pub is_assigned: bool,
    pub next_stop_id: &'a str,
    pub next_stop_name: &'a str,
    pub arrival: &'a str,
    pub departure: &'a str,
    pub track: &'a str,
    pub train_status: &'a str,
    pub stops: usize,
}

impl<'a> TripRow<'a> {
    pub fn new(sampled_at: DateTime<Utc>, trip: &'a TripView) -> Self {
        Self {
            sampled_at,
            trip_id: &trip.trip_id,
            route_id: &trip.route_id,
            train_id: &trip.train_id,
            direction: trip.direction.to_string(),
            is_assigned: trip.is_assigned,
            next_stop_id: &trip.next_stop_id,
            next_stop_name: &trip.next_stop_name,
            arrival: &trip.arrival,
            departure: &trip.departure,
            track: &trip.track,
            train_status: &trip.train_status,
            stops: trip.stops.len(),
        }
    }
}

/// Renders the view as a human readable board.
pub fn render_board(view: &FeedView) -> String {
    let mut out = String::new();

    if view.trips.is_empty() {
        let _ = writeln!(out, "No trains found.");
    }
    for trip in &view.trips {
        let _ = writeln!(
            out,
            "[{}] {} {} {}",
            trip.route_id, trip.trip_id, trip.direction, trip.headsign
        );
        if trip.next_stop_id.is_empty() {
            let _ = writeln!(out, "    {NO_UPCOMING_STOPS}");
            continue;
        }
        let _ = write!(
            out,
            "    next: {} ({}) arr {}",
            trip.next_stop_name, trip.next_stop_id, trip.arrival
        );
        if !trip.track.is_empty() {
            let _ = write!(out, " track {}", trip.track);
        }
        if !trip.train_status.is_empty() {
            let _ = write!(out, " [{}]", trip.train_status);
        }
        out.push('\n');
    }

    if !view.vehicles.is_empty() {
        let _ = writeln!(out, "{} vehicle positions", view.vehicles.len());
    }
    for alert in &view.alerts {
        let _ = writeln!(out, "! {} ({})", alert.header, alert.route_ids.join(","));
    }
    out
}

/// Logs any record using Rust's debug pretty-print format.
pub fn print_pretty<T: std::fmt::Debug>(record: &T) {
    debug!("{:#?}", record);
}

/// Writes any serializable record to stdout as pretty-printed JSON.
pub fn print_json<T: Serialize>(record: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(record)?);
    Ok(())
}

/// Appends serializable records as rows of a CSV file.
///
/// Creates the file with headers if it does not already exist.
pub fn append_records<T: Serialize>(path: impl AsRef<Path>, records: &[T]) -> Result<()> {
    let path = path.as_ref();
    let file_exists = path.exists();
    debug!(path = %path.display(), file_exists, rows = records.len(), "Appending CSV records");

    let file = OpenOptions::new().append(true).create(true).open(path)?;

    let mut writer = WriterBuilder::new()
        .has_headers(!file_exists) // IMPORTANT when appending
        .from_writer(file);

    for record in records {
        writer.serialize(record)?;
    }
    writer.flush()?;

    Ok(())
}

/// Appends one row per trip in `view`, all stamped with `sampled_at`.
pub fn append_trips(path: impl AsRef<Path>, sampled_at: DateTime<Utc>, view: &FeedView) -> Result<()> {
    let rows: Vec<TripRow<'_>> = view
        .trips
        .iter()
        .map(|t| TripRow::new(sampled_at, t))
        .collect();
    append_records(path, &rows)
}
