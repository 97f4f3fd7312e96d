//! Fallback chains used by the normalizer.
//!
//! Each function is pure and encodes its priority order literally; every
//! place that needs a stop name, route or direction goes through here.

use std::fmt;
use std::ops::Bound;

use chrono::DateTime;
use chrono_tz::Tz;
use serde::Serialize;

use crate::model::{NyctDirection, StopTimeUpdate, Translation, TripExtension, TripUpdate};
use crate::reference::StaticStore;

pub const UNKNOWN: &str = "Unknown";
pub const DEFAULT_ROUTE_COLOR: &str = "#FFFFFF";
pub const DEFAULT_ROUTE_TEXT_COLOR: &str = "#000000";

/// Stop name for `stop_id`: exact match, then the id without its last
/// character (direction suffixes such as `A27S`), then the id itself.
pub fn resolve_station_name(stop_id: &str, store: &StaticStore) -> String {
    let stop_id = stop_id.trim();
    if let Some(name) = store.stop_name(stop_id) {
        return name.to_string();
    }
    if let Some((idx, _)) = stop_id.char_indices().last() {
        if let Some(name) = store.stop_name(&stop_id[..idx]) {
            return name.to_string();
        }
    }
    stop_id.to_string()
}

/// Key of the static trip matching a realtime `trip_id`.
///
/// Exact match first. Static trip ids often carry a longer dated prefix, so
/// the next candidate is the first key ending with `trip_id`; failing that,
/// the first key that extends it with a `_`-separated suffix (railroad ids).
pub fn resolve_static_trip_key<'a>(trip_id: &str, store: &'a StaticStore) -> Option<&'a str> {
    let trip_id = trip_id.trim();
    if trip_id.is_empty() {
        return None;
    }
    if let Some((key, _)) = store.trips.get_key_value(trip_id) {
        return Some(key.as_str());
    }
    store
        .trips()
        .find(|(key, _)| key.ends_with(trip_id))
        .map(|(key, _)| key)
        .or_else(|| extended_trip_key(trip_id, store))
}

/// Keys starting with `trip_id` sort contiguously right after it.
fn extended_trip_key<'a>(trip_id: &str, store: &'a StaticStore) -> Option<&'a str> {
    store
        .trips
        .range::<str, _>((Bound::Excluded(trip_id), Bound::Unbounded))
        .map(|(key, _)| key.as_str())
        .take_while(|key| key.starts_with(trip_id))
        .find(|key| key[trip_id.len()..].starts_with('_'))
}

/// Route of a trip: the id carried on the trip, else the static trip table.
pub fn resolve_route_id(trip: &TripUpdate, store: &StaticStore) -> Option<String> {
    if let Some(route_id) = feed_route_id(trip) {
        return Some(route_id);
    }
    static_route_id(&trip.trip.trip_id, store)
}

/// Same as [`resolve_route_id`] for a trip whose static key is already known.
pub fn route_id_for_key(
    trip: &TripUpdate,
    static_key: Option<&str>,
    store: &StaticStore,
) -> Option<String> {
    feed_route_id(trip).or_else(|| static_key.and_then(|key| route_of_key(key, store)))
}

fn feed_route_id(trip: &TripUpdate) -> Option<String> {
    trip.trip
        .route_id
        .as_deref()
        .filter(|r| !r.is_empty())
        .map(str::to_string)
}

fn route_of_key(key: &str, store: &StaticStore) -> Option<String> {
    store
        .trip(key)
        .map(|t| t.route_id.clone())
        .filter(|r| !r.is_empty())
}

/// Route of a realtime trip id according to the static trip table alone.
pub fn static_route_id(trip_id: &str, store: &StaticStore) -> Option<String> {
    resolve_static_trip_key(trip_id, store).and_then(|key| route_of_key(key, store))
}

/// Display attributes of a route.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteDisplay {
    pub name: String,
    pub color: String,
    pub text_color: String,
}

fn display_color(stored: Option<&str>, default: &str) -> String {
    match stored.map(|c| c.trim().trim_start_matches('#')) {
        Some(c) if !c.is_empty() => format!("#{c}"),
        _ => default.to_string(),
    }
}

pub fn route_display(route_id: Option<&str>, store: &StaticStore) -> RouteDisplay {
    let route = route_id.and_then(|id| store.route(id));
    RouteDisplay {
        name: route
            .map(|r| r.long_name.as_str())
            .filter(|n| !n.is_empty())
            .unwrap_or(UNKNOWN)
            .to_string(),
        color: display_color(route.map(|r| r.color.as_str()), DEFAULT_ROUTE_COLOR),
        text_color: display_color(
            route.map(|r| r.text_color.as_str()),
            DEFAULT_ROUTE_TEXT_COLOR,
        ),
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub enum Direction {
    Northbound,
    Southbound,
    Eastbound,
    Westbound,
    Unknown,
}

impl fmt::Display for Direction {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Direction::Northbound => "Northbound",
            Direction::Southbound => "Southbound",
            Direction::Eastbound => "Eastbound",
            Direction::Westbound => "Westbound",
            Direction::Unknown => UNKNOWN,
        };
        f.write_str(name)
    }
}

fn direction_from_suffix(id: &str) -> Option<Direction> {
    match id.trim().chars().last()? {
        'N' => Some(Direction::Northbound),
        'S' => Some(Direction::Southbound),
        'E' => Some(Direction::Eastbound),
        'W' => Some(Direction::Westbound),
        _ => None,
    }
}

fn direction_from_explicit(direction_id: Option<u32>, ext: &TripExtension) -> Option<Direction> {
    match direction_id {
        Some(0) => return Some(Direction::Northbound),
        Some(1) => return Some(Direction::Southbound),
        _ => {}
    }
    match ext.direction() {
        NyctDirection::North => Some(Direction::Northbound),
        NyctDirection::South => Some(Direction::Southbound),
        NyctDirection::East => Some(Direction::Eastbound),
        NyctDirection::West => Some(Direction::Westbound),
        NyctDirection::Unknown => None,
    }
}

/// Direction of travel, first match wins:
/// 1. explicit `direction_id` (0/1) or agency direction enum,
/// 2. N/S/E/W suffix on the trip id,
/// 3. N/S/E/W suffix on the next stop id,
/// 4. unknown.
pub fn infer_direction(trip: &TripUpdate, next_stop: Option<&StopTimeUpdate>) -> Direction {
    direction_from_explicit(trip.trip.direction_id, &trip.extension)
        .or_else(|| direction_from_suffix(&trip.trip.trip_id))
        .or_else(|| next_stop.and_then(|s| direction_from_suffix(&s.stop_id)))
        .unwrap_or(Direction::Unknown)
}

/// `HH:MM:SS` in `tz`, or an empty string when the time is absent.
pub fn format_time(epoch_secs: Option<i64>, tz: Tz) -> String {
    let Some(ts) = epoch_secs else {
        return String::new();
    };
    match DateTime::from_timestamp(ts, 0) {
        Some(dt) => dt.with_timezone(&tz).format("%H:%M:%S").to_string(),
        None => ts.to_string(),
    }
}

/// [`format_time`] for unsigned feed timestamps; values beyond `i64` are
/// printed raw.
pub fn format_timestamp(epoch_secs: Option<u64>, tz: Tz) -> String {
    let Some(ts) = epoch_secs else {
        return String::new();
    };
    match i64::try_from(ts) {
        Ok(ts) => format_time(Some(ts), tz),
        Err(_) => ts.to_string(),
    }
}

/// Text of the first translation, or an empty string.
pub fn first_translation(translations: &[Translation]) -> String {
    translations
        .first()
        .map(|t| t.text.clone())
        .unwrap_or_default()
}
