//! Agency extension decoding.
//!
//! The feed bytes are decoded a second time with the agency's overlay schema
//! (see `proto/nyct-subway.proto` and `proto/mta-railroad.proto`). The
//! overlay keeps the entity id and the extension payloads; the parser joins
//! them back onto the base entities by position.

use prost::Message;

use crate::error::DecodeError;
use crate::model::{
    Agency, CarriageDetails, HeaderExtension, NyctDirection, NyctStop, NyctTrip, RailroadStop,
    StopExtension, TripExtension, TripReplacementPeriod, VehicleExtension,
};
use crate::{mta_rr_rt, nyct_rt};

#[derive(Debug, Default)]
pub struct FeedExtensions {
    pub header: HeaderExtension,
    /// One entry per `FeedMessage.entity`, in wire order.
    pub entities: Vec<EntityExtensions>,
}

#[derive(Debug, Default)]
pub struct EntityExtensions {
    pub id: String,
    /// From the trip update's trip descriptor.
    pub trip: TripExtension,
    /// One entry per stop time update of the entity's trip update.
    pub stops: Vec<StopExtension>,
    pub vehicle: VehicleExtension,
    /// From the vehicle position's trip descriptor.
    pub vehicle_trip: TripExtension,
}

/// Extracts the extension payloads `agency` defines from `bytes`.
///
/// For [`Agency::Generic`] this is a no-op.
pub fn decode(bytes: &[u8], agency: Agency) -> Result<FeedExtensions, DecodeError> {
    match agency {
        Agency::Generic => Ok(FeedExtensions::default()),
        Agency::Nyct => Ok(from_nyct(nyct_rt::FeedMessage::decode(bytes)?)),
        Agency::Railroad => Ok(from_railroad(mta_rr_rt::FeedMessage::decode(bytes)?)),
    }
}

fn nyct_direction(raw: Option<i32>) -> NyctDirection {
    use nyct_rt::nyct_trip_descriptor::Direction;

    // The generated getter falls back to NORTH, so go through the raw value.
    match raw.and_then(|d| Direction::try_from(d).ok()) {
        Some(Direction::North) => NyctDirection::North,
        Some(Direction::East) => NyctDirection::East,
        Some(Direction::South) => NyctDirection::South,
        Some(Direction::West) => NyctDirection::West,
        None => NyctDirection::Unknown,
    }
}

fn nyct_trip(trip: &nyct_rt::TripDescriptor) -> TripExtension {
    match &trip.nyct_trip_descriptor {
        Some(ext) => TripExtension::Nyct(NyctTrip {
            train_id: ext.train_id().trim().to_string(),
            is_assigned: ext.is_assigned(),
            direction: nyct_direction(ext.direction),
        }),
        None => TripExtension::None,
    }
}

fn from_nyct(feed: nyct_rt::FeedMessage) -> FeedExtensions {
    let header = match feed.header.nyct_feed_header {
        Some(h) => HeaderExtension::Nyct {
            subway_version: h.nyct_subway_version,
            trip_replacement_periods: h
                .trip_replacement_period
                .into_iter()
                .map(|p| TripReplacementPeriod {
                    route_id: p.route_id.unwrap_or_default(),
                    end: p.replacement_period.and_then(|r| r.end),
                })
                .collect(),
        },
        None => HeaderExtension::None,
    };

    let entities = feed
        .entity
        .into_iter()
        .map(|e| {
            let mut out = EntityExtensions {
                id: e.id,
                ..Default::default()
            };
            if let Some(tu) = e.trip_update {
                out.trip = nyct_trip(&tu.trip);
                out.stops = tu
                    .stop_time_update
                    .iter()
                    .map(|stu| match &stu.nyct_stop_time_update {
                        Some(ext) => StopExtension::Nyct(NyctStop {
                            scheduled_track: ext.scheduled_track().trim().to_string(),
                            actual_track: ext.actual_track().trim().to_string(),
                        }),
                        None => StopExtension::None,
                    })
                    .collect();
            }
            if let Some(trip) = e.vehicle.as_ref().and_then(|v| v.trip.as_ref()) {
                out.vehicle_trip = nyct_trip(trip);
            }
            out
        })
        .collect();

    FeedExtensions { header, entities }
}

fn from_railroad(feed: mta_rr_rt::FeedMessage) -> FeedExtensions {
    let entities = feed
        .entity
        .into_iter()
        .map(|e| {
            let mut out = EntityExtensions {
                id: e.id,
                ..Default::default()
            };
            if let Some(tu) = e.trip_update {
                out.stops = tu
                    .stop_time_update
                    .iter()
                    .map(|stu| match &stu.mta_railroad_stop_time_update {
                        Some(ext) => StopExtension::Railroad(RailroadStop {
                            track: ext.track().trim().to_string(),
                            train_status: ext.train_status().trim().to_string(),
                        }),
                        None => StopExtension::None,
                    })
                    .collect();
            }
            if let Some(v) = e.vehicle {
                if !v.mta_railroad_carriage_details.is_empty() {
                    out.vehicle = VehicleExtension::Railroad(
                        v.mta_railroad_carriage_details
                            .into_iter()
                            .map(|c| CarriageDetails {
                                id: c.id().to_string(),
                                label: c.label().to_string(),
                                carriage_sequence: c.carriage_sequence,
                                carriage_class: c.carriage_class().to_string(),
                                occupancy_percentage: c.occupancy_percentage,
                                quiet_carriage: c.quiet_carriage(),
                                toilet_facilities: c.toilet_facilities(),
                                bicycles_allowed: c.bicycles_allowed,
                            })
                            .collect(),
                    );
                }
            }
            out
        })
        .collect();

    FeedExtensions {
        header: HeaderExtension::None,
        entities,
    }
}
