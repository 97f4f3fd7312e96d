//! Protobuf parser for GTFS Realtime feeds.
//!
//! [`parse_feed`] returns the raw prost message; [`decode`] additionally
//! attaches agency extensions and converts everything into the
//! [`Envelope`] model consumed by the normalizer.

use prost::Message;
use tracing::{debug, warn};

use crate::error::DecodeError;
use crate::extensions::{self, EntityExtensions, FeedExtensions};
use crate::gtfs_rt::{self, FeedMessage};
use crate::model::{
    Agency, Alert, Entity, EntityKind, Envelope, EnvelopeHeader, StopExtension, StopTimeUpdate,
    Translation, TripDescriptor, TripExtension, TripUpdate, VehicleExtension, VehiclePosition,
    VehicleStatus,
};

/// Rejects payloads that are obviously not protobuf.
///
/// Upstream proxies sometimes substitute a JSON or HTML error page for the
/// feed. Neither `{` nor `<` is a valid first tag byte for a `FeedMessage`
/// (they decode to group wire types), so the first byte is enough.
pub fn sniff(bytes: &[u8]) -> Result<(), DecodeError> {
    match bytes.first() {
        Some(b'{') => Err(DecodeError::malformed("payload starts with '{' (JSON?)")),
        Some(b'<') => Err(DecodeError::malformed("payload starts with '<' (HTML/XML?)")),
        _ => Ok(()),
    }
}

/// Decodes a protobuf-encoded GTFS-RT [`FeedMessage`] from raw bytes.
///
/// # Errors
///
/// Returns [`DecodeError::MalformedPayload`] if the payload fails the sniff
/// test or is not valid protobuf for a `FeedMessage`.
pub fn parse_feed(bytes: &[u8]) -> Result<FeedMessage, DecodeError> {
    sniff(bytes)?;
    Ok(FeedMessage::decode(bytes)?)
}

/// Decodes a feed into an [`Envelope`], attaching extensions for `agency`.
///
/// A payload whose base message decodes but whose extension overlay does not
/// is still returned, just without extension data.
pub fn decode(bytes: &[u8], agency: Agency) -> Result<Envelope, DecodeError> {
    let feed = parse_feed(bytes)?;

    let ext = match extensions::decode(bytes, agency) {
        Ok(ext) => ext,
        Err(e) => {
            warn!(%agency, error = %e, "Extension overlay failed to decode, ignoring extensions");
            FeedExtensions::default()
        }
    };

    Ok(build_envelope(feed, ext))
}

fn build_envelope(feed: FeedMessage, mut ext: FeedExtensions) -> Envelope {
    let header = EnvelopeHeader {
        version: feed.header.gtfs_realtime_version,
        timestamp: feed.header.timestamp,
        extension: std::mem::take(&mut ext.header),
    };

    let mut overlay = ext.entities.into_iter();
    let mut entities = Vec::with_capacity(feed.entity.len());

    for entity in feed.entity {
        let entity_ext = match overlay.next() {
            Some(x) if x.id == entity.id => x,
            Some(x) => {
                warn!(
                    entity_id = %entity.id,
                    overlay_id = %x.id,
                    "Extension overlay out of step with base entity, dropping extensions"
                );
                EntityExtensions::default()
            }
            None => EntityExtensions::default(),
        };

        if entity.is_deleted() {
            debug!(entity_id = %entity.id, "Skipping deleted entity");
            continue;
        }

        let converted = convert_entity(entity, entity_ext);
        if converted.is_empty() {
            debug!("Skipping entity without trip update, vehicle or alert");
        }
        entities.extend(converted);
    }

    Envelope { header, entities }
}

/// One [`Entity`] per payload present on `entity`, all sharing its id.
fn convert_entity(entity: gtfs_rt::FeedEntity, ext: EntityExtensions) -> Vec<Entity> {
    let EntityExtensions {
        trip,
        stops,
        vehicle,
        vehicle_trip,
        ..
    } = ext;
    let mut kinds = Vec::with_capacity(1);

    if let Some(tu) = entity.trip_update {
        kinds.push(EntityKind::TripUpdate(convert_trip_update(tu, trip, stops)));
    }
    if let Some(v) = entity.vehicle {
        kinds.push(EntityKind::Vehicle(convert_vehicle(v, vehicle_trip, vehicle)));
    }
    if let Some(a) = entity.alert {
        kinds.push(EntityKind::Alert(convert_alert(a)));
    }

    kinds
        .into_iter()
        .map(|kind| Entity {
            id: entity.id.clone(),
            kind,
        })
        .collect()
}

fn non_empty(value: Option<String>) -> Option<String> {
    value
        .map(|s| s.trim().to_string())
        .filter(|s| !s.is_empty())
}

fn convert_trip(trip: gtfs_rt::TripDescriptor) -> TripDescriptor {
    TripDescriptor {
        trip_id: trip.trip_id.unwrap_or_default(),
        route_id: non_empty(trip.route_id),
        start_time: non_empty(trip.start_time),
        start_date: non_empty(trip.start_date),
        direction_id: trip.direction_id,
    }
}

fn convert_trip_update(
    tu: gtfs_rt::TripUpdate,
    trip_ext: TripExtension,
    stop_exts: Vec<StopExtension>,
) -> TripUpdate {
    let mut stop_ext = stop_exts.into_iter();

    let stop_time_updates = tu
        .stop_time_update
        .into_iter()
        .map(|stu| StopTimeUpdate {
            stop_id: stu.stop_id.unwrap_or_default(),
            stop_sequence: stu.stop_sequence,
            arrival: stu.arrival.and_then(|e| e.time),
            departure: stu.departure.and_then(|e| e.time),
            extension: stop_ext.next().unwrap_or_default(),
        })
        .collect();

    TripUpdate {
        trip: convert_trip(tu.trip),
        stop_time_updates,
        extension: trip_ext,
    }
}

fn convert_vehicle(
    v: gtfs_rt::VehiclePosition,
    trip_ext: TripExtension,
    ext: VehicleExtension,
) -> VehiclePosition {
    use gtfs_rt::vehicle_position::VehicleStopStatus;

    let current_status = match v.current_status() {
        VehicleStopStatus::IncomingAt => VehicleStatus::IncomingAt,
        VehicleStopStatus::StoppedAt => VehicleStatus::StoppedAt,
        VehicleStopStatus::InTransitTo => VehicleStatus::InTransitTo,
    };

    VehiclePosition {
        trip_id: non_empty(v.trip.and_then(|t| t.trip_id)),
        current_status,
        stop_id: non_empty(v.stop_id),
        current_stop_sequence: v.current_stop_sequence,
        timestamp: v.timestamp,
        trip_extension: trip_ext,
        extension: ext,
    }
}

fn convert_translations(text: Option<gtfs_rt::TranslatedString>) -> Vec<Translation> {
    text.map(|t| t.translation)
        .unwrap_or_default()
        .into_iter()
        .map(|t| Translation {
            text: t.text,
            language: t.language,
        })
        .collect()
}

fn convert_alert(a: gtfs_rt::Alert) -> Alert {
    let cause = a.cause();
    let effect = a.effect();

    let mut route_ids = Vec::new();
    let mut stop_ids = Vec::new();
    for informed in a.informed_entity {
        if let Some(route_id) = non_empty(informed.route_id) {
            if !route_ids.contains(&route_id) {
                route_ids.push(route_id);
            }
        }
        if let Some(stop_id) = non_empty(informed.stop_id) {
            if !stop_ids.contains(&stop_id) {
                stop_ids.push(stop_id);
            }
        }
    }

    Alert {
        header_text: convert_translations(a.header_text),
        description_text: convert_translations(a.description_text),
        cause,
        effect,
        route_ids,
        stop_ids,
        active_periods: a
            .active_period
            .into_iter()
            .map(|p| (p.start, p.end))
            .collect(),
    }
}
