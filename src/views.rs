//! View records handed to the API layer.
//!
//! Every field is always present; missing data is rendered as an empty
//! string, `false` or `"Unknown"`.

use serde::Serialize;

use crate::model::CarriageDetails;
use crate::resolve::Direction;

pub const NO_UPCOMING_STOPS: &str = "No upcoming stops listed.";

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct StopView {
    pub stop_id: String,
    pub stop_name: String,
    pub arrival: String,
    pub departure: String,
    pub scheduled_arrival: String,
    pub track: String,
    pub scheduled_track: String,
    pub train_status: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct TripView {
    pub trip_id: String,
    pub route_id: String,
    pub route_name: String,
    pub route_color: String,
    pub route_text_color: String,
    pub headsign: String,
    pub train_id: String,
    pub direction: Direction,
    pub start_time: String,
    pub is_assigned: bool,
    pub next_stop_id: String,
    pub next_stop_name: String,
    pub arrival: String,
    pub departure: String,
    pub track: String,
    pub train_status: String,
    pub stops: Vec<StopView>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VehicleView {
    pub trip_id: String,
    pub route_id: String,
    pub train_id: String,
    pub current_status: String,
    pub stop_id: String,
    pub stop_name: String,
    pub timestamp: String,
    pub carriages: Vec<CarriageDetails>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct AlertView {
    pub header: String,
    pub description: String,
    pub cause: String,
    pub effect: String,
    pub route_ids: Vec<String>,
}

/// Output of one normalization cycle.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FeedView {
    pub trips: Vec<TripView>,
    pub vehicles: Vec<VehicleView>,
    pub alerts: Vec<AlertView>,
}

impl FeedView {
    pub fn is_empty(&self) -> bool {
        self.trips.is_empty() && self.vehicles.is_empty() && self.alerts.is_empty()
    }
}
