//! Decoded feed model.
//!
//! An [`Envelope`] is produced per decode call and consumed by the
//! normalizer. Base GTFS-realtime fields that may be missing on the wire are
//! kept as `Option`; agency extension data is attached as a tagged payload
//! whose `None` variant stands for "this agency sent nothing".

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// Which extension schema applies to a feed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Agency {
    /// Plain GTFS-realtime, no proprietary extensions.
    #[default]
    Generic,
    /// NYC Transit subway (`nyct-subway.proto`, extension 1001).
    Nyct,
    /// MTA commuter railroads (`mta-railroad.proto`, extension 1005).
    Railroad,
}

impl FromStr for Agency {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "generic" | "gtfs" => Ok(Agency::Generic),
            "nyct" | "subway" => Ok(Agency::Nyct),
            "railroad" | "lirr" | "mnr" | "mtarr" => Ok(Agency::Railroad),
            other => Err(anyhow::anyhow!("unknown agency {other:?}")),
        }
    }
}

impl fmt::Display for Agency {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Agency::Generic => "generic",
            Agency::Nyct => "nyct",
            Agency::Railroad => "railroad",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct Envelope {
    pub header: EnvelopeHeader,
    pub entities: Vec<Entity>,
}

impl Envelope {
    pub fn trip_updates(&self) -> impl Iterator<Item = &TripUpdate> {
        self.entities.iter().filter_map(|e| match &e.kind {
            EntityKind::TripUpdate(t) => Some(t),
            _ => None,
        })
    }

    pub fn vehicles(&self) -> impl Iterator<Item = &VehiclePosition> {
        self.entities.iter().filter_map(|e| match &e.kind {
            EntityKind::Vehicle(v) => Some(v),
            _ => None,
        })
    }

    pub fn alerts(&self) -> impl Iterator<Item = &Alert> {
        self.entities.iter().filter_map(|e| match &e.kind {
            EntityKind::Alert(a) => Some(a),
            _ => None,
        })
    }

    /// Appends another envelope's entities. The header of `self` is kept.
    pub fn merge(&mut self, other: Envelope) {
        self.entities.extend(other.entities);
        if self.header.timestamp.is_none() {
            self.header.timestamp = other.header.timestamp;
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct EnvelopeHeader {
    pub version: String,
    pub timestamp: Option<u64>,
    pub extension: HeaderExtension,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum HeaderExtension {
    #[default]
    None,
    Nyct {
        subway_version: String,
        trip_replacement_periods: Vec<TripReplacementPeriod>,
    },
}

/// How far ahead the NYCT feed guarantees complete trip coverage for a route.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TripReplacementPeriod {
    pub route_id: String,
    pub end: Option<u64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Entity {
    pub id: String,
    pub kind: EntityKind,
}

/// Exactly one update unit per entity.
#[derive(Debug, Clone, PartialEq)]
pub enum EntityKind {
    TripUpdate(TripUpdate),
    Vehicle(VehiclePosition),
    Alert(Alert),
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripDescriptor {
    pub trip_id: String,
    pub route_id: Option<String>,
    pub start_time: Option<String>,
    pub start_date: Option<String>,
    pub direction_id: Option<u32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TripUpdate {
    pub trip: TripDescriptor,
    /// Upcoming stops only; index 0 is the stop the train is approaching,
    /// stopped at, or about to leave.
    pub stop_time_updates: Vec<StopTimeUpdate>,
    pub extension: TripExtension,
}

impl TripUpdate {
    pub fn next_stop(&self) -> Option<&StopTimeUpdate> {
        self.stop_time_updates.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct StopTimeUpdate {
    pub stop_id: String,
    pub stop_sequence: Option<u32>,
    /// Epoch seconds.
    pub arrival: Option<i64>,
    /// Epoch seconds.
    pub departure: Option<i64>,
    pub extension: StopExtension,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum VehicleStatus {
    IncomingAt,
    StoppedAt,
    #[default]
    InTransitTo,
}

impl fmt::Display for VehicleStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            VehicleStatus::IncomingAt => "INCOMING_AT",
            VehicleStatus::StoppedAt => "STOPPED_AT",
            VehicleStatus::InTransitTo => "IN_TRANSIT_TO",
        };
        f.write_str(name)
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct VehiclePosition {
    /// Weak reference to a trip; the trip may not be present in the feed.
    pub trip_id: Option<String>,
    pub current_status: VehicleStatus,
    pub stop_id: Option<String>,
    pub current_stop_sequence: Option<u32>,
    pub timestamp: Option<u64>,
    /// Agency data attached to the vehicle's trip descriptor.
    pub trip_extension: TripExtension,
    pub extension: VehicleExtension,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Translation {
    pub text: String,
    pub language: Option<String>,
}

pub use crate::gtfs_rt::alert::{Cause as AlertCause, Effect as AlertEffect};

#[derive(Debug, Clone, PartialEq)]
pub struct Alert {
    pub header_text: Vec<Translation>,
    pub description_text: Vec<Translation>,
    pub cause: AlertCause,
    pub effect: AlertEffect,
    pub route_ids: Vec<String>,
    pub stop_ids: Vec<String>,
    pub active_periods: Vec<(Option<u64>, Option<u64>)>,
}

impl Default for Alert {
    fn default() -> Self {
        Self {
            header_text: Vec::new(),
            description_text: Vec::new(),
            cause: AlertCause::UnknownCause,
            effect: AlertEffect::UnknownEffect,
            route_ids: Vec::new(),
            stop_ids: Vec::new(),
            active_periods: Vec::new(),
        }
    }
}

// --- agency extensions ---

#[derive(Debug, Clone, Default, PartialEq)]
pub enum TripExtension {
    #[default]
    None,
    Nyct(NyctTrip),
}

impl TripExtension {
    pub fn train_id(&self) -> &str {
        match self {
            TripExtension::Nyct(t) => &t.train_id,
            TripExtension::None => "",
        }
    }

    pub fn is_assigned(&self) -> bool {
        match self {
            TripExtension::Nyct(t) => t.is_assigned,
            TripExtension::None => false,
        }
    }

    pub fn direction(&self) -> NyctDirection {
        match self {
            TripExtension::Nyct(t) => t.direction,
            TripExtension::None => NyctDirection::Unknown,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NyctTrip {
    pub train_id: String,
    pub is_assigned: bool,
    pub direction: NyctDirection,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum NyctDirection {
    North,
    East,
    South,
    West,
    #[default]
    Unknown,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum StopExtension {
    #[default]
    None,
    Nyct(NyctStop),
    Railroad(RailroadStop),
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NyctStop {
    pub scheduled_track: String,
    pub actual_track: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RailroadStop {
    pub track: String,
    pub train_status: String,
}

/// Track and status information carried by agency stop extensions.
pub trait TrackAssignment {
    /// The track the train actually uses, if the agency reports one.
    fn track(&self) -> &str;
    fn scheduled_track(&self) -> &str;
    fn train_status(&self) -> &str;
}

impl TrackAssignment for StopExtension {
    fn track(&self) -> &str {
        match self {
            StopExtension::Nyct(s) => &s.actual_track,
            StopExtension::Railroad(s) => &s.track,
            StopExtension::None => "",
        }
    }

    fn scheduled_track(&self) -> &str {
        match self {
            StopExtension::Nyct(s) => &s.scheduled_track,
            StopExtension::Railroad(_) | StopExtension::None => "",
        }
    }

    fn train_status(&self) -> &str {
        match self {
            StopExtension::Railroad(s) => &s.train_status,
            StopExtension::Nyct(_) | StopExtension::None => "",
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub enum VehicleExtension {
    #[default]
    None,
    Railroad(Vec<CarriageDetails>),
}

impl VehicleExtension {
    pub fn carriages(&self) -> &[CarriageDetails] {
        match self {
            VehicleExtension::Railroad(c) => c,
            VehicleExtension::None => &[],
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct CarriageDetails {
    pub id: String,
    pub label: String,
    pub carriage_sequence: Option<u32>,
    pub carriage_class: String,
    pub occupancy_percentage: Option<i32>,
    pub quiet_carriage: bool,
    pub toilet_facilities: bool,
    pub bicycles_allowed: Option<i32>,
}
