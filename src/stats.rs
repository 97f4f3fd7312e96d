use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::model::{
    Envelope, EntityKind, StopExtension, TrackAssignment, TripExtension, VehicleExtension,
};

/// Field coverage of one decoded envelope.
#[derive(Debug, Default, Serialize)]
pub struct EnvelopeStats {
    pub timestamp: DateTime<Utc>,
    pub group: Option<String>,
    pub agency: Option<String>,
    pub feed_timestamp: Option<u64>,
    pub total_entities: usize,

    // entity types
    pub trip_updates: usize,
    pub vehicles: usize,
    pub alerts: usize,

    // trip fields
    pub with_route_id: usize,
    pub with_direction_id: usize,
    pub with_start_time: usize,
    pub with_stop_time_updates: usize,
    pub with_nyct_trip: usize,

    // stop time update fields
    pub stop_time_updates: usize,
    pub with_arrival: usize,
    pub with_departure: usize,
    pub with_track: usize,
    pub with_train_status: usize,

    // vehicle fields
    pub with_vehicle_trip: usize,
    pub with_vehicle_stop: usize,
    pub with_carriage_details: usize,

    // error tracking
    pub error_type: Option<String>,
    pub error_message: Option<String>,
}

impl EnvelopeStats {
    pub fn from_envelope(envelope: &Envelope) -> Self {
        let mut s = EnvelopeStats {
            timestamp: Utc::now(),
            feed_timestamp: envelope.header.timestamp,
            total_entities: envelope.entities.len(),
            ..Default::default()
        };

        for e in &envelope.entities {
            match &e.kind {
                EntityKind::TripUpdate(tu) => {
                    s.trip_updates += 1;

                    if tu.trip.route_id.is_some() {
                        s.with_route_id += 1;
                    }
                    if tu.trip.direction_id.is_some() {
                        s.with_direction_id += 1;
                    }
                    if tu.trip.start_time.is_some() {
                        s.with_start_time += 1;
                    }
                    if !tu.stop_time_updates.is_empty() {
                        s.with_stop_time_updates += 1;
                    }
                    if matches!(tu.extension, TripExtension::Nyct(_)) {
                        s.with_nyct_trip += 1;
                    }

                    for stu in &tu.stop_time_updates {
                        s.stop_time_updates += 1;

                        if stu.arrival.is_some() {
                            s.with_arrival += 1;
                        }
                        if stu.departure.is_some() {
                            s.with_departure += 1;
                        }
                        if !matches!(stu.extension, StopExtension::None) {
                            if !stu.extension.track().is_empty() {
                                s.with_track += 1;
                            }
                            if !stu.extension.train_status().is_empty() {
                                s.with_train_status += 1;
                            }
                        }
                    }
                }
                EntityKind::Vehicle(v) => {
                    s.vehicles += 1;

                    if v.trip_id.is_some() {
                        s.with_vehicle_trip += 1;
                    }
                    if v.stop_id.is_some() {
                        s.with_vehicle_stop += 1;
                    }
                    if matches!(v.extension, VehicleExtension::Railroad(_)) {
                        s.with_carriage_details += 1;
                    }
                }
                EntityKind::Alert(_) => s.alerts += 1,
            }
        }

        s
    }

    pub fn pct(part: usize, total: usize) -> f64 {
        if total == 0 {
            0.0
        } else {
            (part as f64 / total as f64) * 100.0
        }
    }

    pub fn arrival_pct(&self) -> f64 {
        Self::pct(self.with_arrival, self.stop_time_updates)
    }

    /// Create an error record with timestamp and error information
    pub fn from_error(error_type: &str, error_message: &str) -> Self {
        EnvelopeStats {
            timestamp: Utc::now(),
            error_type: Some(error_type.to_string()),
            error_message: Some(error_message.to_string()),
            ..Default::default()
        }
    }

    /// Set feed metadata (group name and agency)
    pub fn with_feed_info(mut self, group: &str, agency: &str) -> Self {
        self.group = Some(group.to_string());
        self.agency = Some(agency.to_string());
        self
    }
}
