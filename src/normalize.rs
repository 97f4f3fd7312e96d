//! Joins a decoded [`Envelope`] against the static tables and produces view
//! records.

use chrono_tz::Tz;
use tracing::debug;

use crate::catalog::LineSelector;
use crate::config::DEFAULT_TIMEZONE;
use crate::model::{Alert, Envelope, StopTimeUpdate, TrackAssignment, TripUpdate, VehiclePosition};
use crate::reference::StaticStore;
use crate::resolve::{
    UNKNOWN, first_translation, format_time, format_timestamp, infer_direction,
    resolve_static_trip_key, resolve_station_name, route_display, route_id_for_key,
    static_route_id,
};
use crate::views::{AlertView, FeedView, NO_UPCOMING_STOPS, StopView, TripView, VehicleView};

#[derive(Debug, Clone)]
pub struct NormalizeOptions {
    /// Trips whose resolved route does not match are dropped.
    pub line: LineSelector,
    pub tz: Tz,
    /// Stable sort of the produced trips by route id.
    pub sort_by_route: bool,
}

impl Default for NormalizeOptions {
    fn default() -> Self {
        Self {
            line: LineSelector::All,
            tz: DEFAULT_TIMEZONE,
            sort_by_route: false,
        }
    }
}

impl NormalizeOptions {
    pub fn for_line(line: LineSelector) -> Self {
        Self {
            line,
            ..Default::default()
        }
    }
}

pub fn normalize(envelope: &Envelope, store: &StaticStore, opts: &NormalizeOptions) -> FeedView {
    let mut trips = Vec::new();
    let mut filtered = 0usize;

    for tu in envelope.trip_updates() {
        let static_trip = resolve_static_trip_key(&tu.trip.trip_id, store);
        let route_id = route_id_for_key(tu, static_trip, store);
        if !opts.line.matches(route_id.as_deref()) {
            filtered += 1;
            continue;
        }
        trips.push(trip_view(tu, static_trip, route_id, store, opts.tz));
    }

    if opts.sort_by_route {
        trips.sort_by(|a, b| a.route_id.cmp(&b.route_id));
    }

    let vehicles: Vec<_> = envelope
        .vehicles()
        .map(|v| vehicle_view(v, store, opts.tz))
        .collect();
    let alerts: Vec<_> = envelope.alerts().map(alert_view).collect();

    debug!(
        trips = trips.len(),
        filtered,
        vehicles = vehicles.len(),
        alerts = alerts.len(),
        "Envelope normalized"
    );

    FeedView {
        trips,
        vehicles,
        alerts,
    }
}

fn stop_view(
    stu: &StopTimeUpdate,
    static_trip: Option<&str>,
    store: &StaticStore,
    tz: Tz,
) -> StopView {
    let scheduled_arrival = match (static_trip, stu.stop_sequence) {
        (Some(trip), Some(seq)) => store.scheduled_arrival(trip, seq).unwrap_or_default(),
        _ => "",
    };

    StopView {
        stop_id: stu.stop_id.clone(),
        stop_name: resolve_station_name(&stu.stop_id, store),
        arrival: format_time(stu.arrival, tz),
        departure: format_time(stu.departure, tz),
        scheduled_arrival: scheduled_arrival.to_string(),
        track: stu.extension.track().to_string(),
        scheduled_track: stu.extension.scheduled_track().to_string(),
        train_status: stu.extension.train_status().to_string(),
    }
}

fn trip_view(
    tu: &TripUpdate,
    static_trip: Option<&str>,
    route_id: Option<String>,
    store: &StaticStore,
    tz: Tz,
) -> TripView {
    let display = route_display(route_id.as_deref(), store);
    let stops: Vec<StopView> = tu
        .stop_time_updates
        .iter()
        .map(|stu| stop_view(stu, static_trip, store, tz))
        .collect();

    let (next_stop_id, next_stop_name, arrival, departure, track, train_status) =
        match stops.first() {
            Some(next) => (
                next.stop_id.clone(),
                next.stop_name.clone(),
                next.arrival.clone(),
                next.departure.clone(),
                next.track.clone(),
                next.train_status.clone(),
            ),
            None => (
                String::new(),
                NO_UPCOMING_STOPS.to_string(),
                String::new(),
                String::new(),
                String::new(),
                String::new(),
            ),
        };

    TripView {
        trip_id: tu.trip.trip_id.clone(),
        route_id: route_id.unwrap_or_else(|| UNKNOWN.to_string()),
        route_name: display.name,
        route_color: display.color,
        route_text_color: display.text_color,
        headsign: static_trip
            .and_then(|key| store.trip(key))
            .map(|t| t.headsign.clone())
            .unwrap_or_default(),
        train_id: tu.extension.train_id().to_string(),
        direction: infer_direction(tu, tu.next_stop()),
        start_time: tu.trip.start_time.clone().unwrap_or_default(),
        is_assigned: tu.extension.is_assigned(),
        next_stop_id,
        next_stop_name,
        arrival,
        departure,
        track,
        train_status,
        stops,
    }
}

fn vehicle_view(v: &VehiclePosition, store: &StaticStore, tz: Tz) -> VehicleView {
    let trip_id = v.trip_id.clone().unwrap_or_default();
    let stop_id = v.stop_id.clone().unwrap_or_default();

    VehicleView {
        route_id: static_route_id(&trip_id, store).unwrap_or_else(|| UNKNOWN.to_string()),
        current_status: v.current_status.to_string(),
        stop_name: if stop_id.is_empty() {
            String::new()
        } else {
            resolve_station_name(&stop_id, store)
        },
        train_id: v.trip_extension.train_id().to_string(),
        timestamp: format_timestamp(v.timestamp, tz),
        carriages: v.extension.carriages().to_vec(),
        trip_id,
        stop_id,
    }
}

fn alert_view(a: &Alert) -> AlertView {
    AlertView {
        header: first_translation(&a.header_text),
        description: first_translation(&a.description_text),
        cause: a.cause.as_str_name().to_string(),
        effect: a.effect.as_str_name().to_string(),
        route_ids: a.route_ids.clone(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{
        AlertEffect, Entity, EntityKind, EnvelopeHeader, NyctStop, NyctTrip, StopExtension,
        Translation, TripDescriptor, TripExtension, VehicleStatus,
    };
    use crate::reference::{RouteInfo, TripRef};
    use crate::resolve::Direction;

    fn store() -> StaticStore {
        StaticStore::from_parts(
            [
                (
                    "A".to_string(),
                    RouteInfo {
                        long_name: "8 Avenue Express".to_string(),
                        color: "0039A6".to_string(),
                        text_color: "FFFFFF".to_string(),
                    },
                ),
                (
                    "1".to_string(),
                    RouteInfo {
                        long_name: "Broadway - 7 Avenue Local".to_string(),
                        color: "EE352E".to_string(),
                        text_color: "".to_string(),
                    },
                ),
            ],
            [("A27".to_string(), "23 St".to_string())],
            [(
                "AFA23GEN-A001_036000_A..S".to_string(),
                TripRef {
                    route_id: "A".to_string(),
                    headsign: "Far Rockaway".to_string(),
                },
            )],
            [(
                ("AFA23GEN-A001_036000_A..S".to_string(), 5),
                "06:10:00".to_string(),
            )],
        )
    }

    fn trip_entity(id: &str, trip_id: &str, route_id: Option<&str>, stops: &[&str]) -> Entity {
        Entity {
            id: id.to_string(),
            kind: EntityKind::TripUpdate(TripUpdate {
                trip: TripDescriptor {
                    trip_id: trip_id.to_string(),
                    route_id: route_id.map(str::to_string),
                    ..Default::default()
                },
                stop_time_updates: stops
                    .iter()
                    .map(|s| StopTimeUpdate {
                        stop_id: s.to_string(),
                        ..Default::default()
                    })
                    .collect(),
                extension: TripExtension::None,
            }),
        }
    }

    fn envelope(entities: Vec<Entity>) -> Envelope {
        Envelope {
            header: EnvelopeHeader::default(),
            entities,
        }
    }

    #[test]
    fn test_empty_envelope_gives_empty_views() {
        let view = normalize(&Envelope::default(), &store(), &NormalizeOptions::default());
        assert!(view.trips.is_empty());
        assert!(view.vehicles.is_empty());
        assert!(view.alerts.is_empty());
        assert!(view.is_empty());
    }

    #[test]
    fn test_trip_view_without_times_or_extensions() {
        let env = envelope(vec![trip_entity("1", "036000_A..S", None, &["A27S"])]);
        let view = normalize(&env, &store(), &NormalizeOptions::default());

        let trip = &view.trips[0];
        assert_eq!(trip.route_id, "A");
        assert_eq!(trip.route_name, "8 Avenue Express");
        assert_eq!(trip.route_color, "#0039A6");
        assert_eq!(trip.headsign, "Far Rockaway");
        assert_eq!(trip.next_stop_name, "23 St");
        assert_eq!(trip.arrival, "");
        assert_eq!(trip.departure, "");
        assert_eq!(trip.track, "");
        assert_eq!(trip.train_id, "");
        assert!(!trip.is_assigned);
        assert_eq!(trip.direction, Direction::Southbound);
    }

    #[test]
    fn test_trip_without_stops() {
        let env = envelope(vec![trip_entity("1", "X1", Some("1"), &[])]);
        let view = normalize(&env, &store(), &NormalizeOptions::default());
        assert_eq!(view.trips[0].next_stop_name, NO_UPCOMING_STOPS);
        assert_eq!(view.trips[0].next_stop_id, "");
        assert!(view.trips[0].stops.is_empty());
        assert_eq!(view.trips[0].route_text_color, "#000000");
    }

    #[test]
    fn test_unresolved_route_reports_unknown() {
        let env = envelope(vec![trip_entity("1", "mystery", None, &["Q99"])]);
        let view = normalize(&env, &store(), &NormalizeOptions::default());
        assert_eq!(view.trips[0].route_id, "Unknown");
        assert_eq!(view.trips[0].route_name, "Unknown");
        assert_eq!(view.trips[0].route_color, "#FFFFFF");
        assert_eq!(view.trips[0].route_text_color, "#000000");
        assert_eq!(view.trips[0].next_stop_name, "Q99");
    }

    #[test]
    fn test_line_filter_is_case_insensitive() {
        let env = envelope(vec![
            trip_entity("1", "036000_A..S", None, &[]),
            trip_entity("2", "040000_1..N", Some("1"), &[]),
            trip_entity("3", "mystery", None, &[]),
        ]);
        let upper = normalize(
            &env,
            &store(),
            &NormalizeOptions::for_line(LineSelector::parse("A")),
        );
        let lower = normalize(
            &env,
            &store(),
            &NormalizeOptions::for_line(LineSelector::parse("a")),
        );
        assert_eq!(upper, lower);
        assert_eq!(upper.trips.len(), 1);
        assert_eq!(upper.trips[0].trip_id, "036000_A..S");

        let all = normalize(
            &env,
            &store(),
            &NormalizeOptions::for_line(LineSelector::parse("ALL")),
        );
        assert_eq!(all.trips.len(), 3);
    }

    #[test]
    fn test_sort_by_route_is_stable() {
        let env = envelope(vec![
            trip_entity("1", "t1", Some("A"), &[]),
            trip_entity("2", "t2", Some("1"), &[]),
            trip_entity("3", "t3", Some("A"), &[]),
            trip_entity("4", "t4", Some("1"), &[]),
        ]);
        let opts = NormalizeOptions {
            sort_by_route: true,
            ..Default::default()
        };
        let view = normalize(&env, &store(), &opts);
        let ids: Vec<_> = view.trips.iter().map(|t| t.trip_id.as_str()).collect();
        assert_eq!(ids, ["t2", "t4", "t1", "t3"]);

        let unsorted = normalize(&env, &store(), &NormalizeOptions::default());
        let ids: Vec<_> = unsorted.trips.iter().map(|t| t.trip_id.as_str()).collect();
        assert_eq!(ids, ["t1", "t2", "t3", "t4"]);
    }

    #[test]
    fn test_nyct_extension_fields_and_schedule() {
        let tu = TripUpdate {
            trip: TripDescriptor {
                trip_id: "036000_A..N".to_string(),
                direction_id: Some(1),
                ..Default::default()
            },
            stop_time_updates: vec![StopTimeUpdate {
                stop_id: "A27S".to_string(),
                stop_sequence: Some(5),
                arrival: Some(1_700_000_000),
                departure: None,
                extension: StopExtension::Nyct(NyctStop {
                    scheduled_track: "A1".to_string(),
                    actual_track: "A3".to_string(),
                }),
            }],
            extension: TripExtension::Nyct(NyctTrip {
                train_id: "1A 0600 207/FAR".to_string(),
                is_assigned: true,
                ..Default::default()
            }),
        };
        let env = envelope(vec![Entity {
            id: "1".to_string(),
            kind: EntityKind::TripUpdate(tu),
        }]);
        let opts = NormalizeOptions {
            tz: chrono_tz::UTC,
            ..Default::default()
        };
        let view = normalize(&env, &store(), &opts);
        let trip = &view.trips[0];

        assert_eq!(trip.direction, Direction::Southbound);
        assert_eq!(trip.train_id, "1A 0600 207/FAR");
        assert!(trip.is_assigned);
        assert_eq!(trip.track, "A3");
        assert_eq!(trip.arrival, "22:13:20");
        assert_eq!(trip.departure, "");
        assert_eq!(trip.stops[0].scheduled_track, "A1");
        // no static trip for the northbound id
        assert_eq!(trip.stops[0].scheduled_arrival, "");
        assert_eq!(trip.route_id, "Unknown");
    }

    #[test]
    fn test_scheduled_arrival_via_static_trip() {
        let mut entity = trip_entity("1", "036000_A..S", None, &["A27S"]);
        if let EntityKind::TripUpdate(tu) = &mut entity.kind {
            tu.stop_time_updates[0].stop_sequence = Some(5);
        }
        let view = normalize(&envelope(vec![entity]), &store(), &NormalizeOptions::default());
        assert_eq!(view.trips[0].stops[0].scheduled_arrival, "06:10:00");
    }

    #[test]
    fn test_vehicle_and_alert_views() {
        let env = envelope(vec![
            Entity {
                id: "v".to_string(),
                kind: EntityKind::Vehicle(VehiclePosition {
                    trip_id: Some("036000_A..S".to_string()),
                    current_status: VehicleStatus::StoppedAt,
                    stop_id: Some("A27S".to_string()),
                    timestamp: None,
                    trip_extension: TripExtension::Nyct(NyctTrip {
                        train_id: "1A 0600 207/FAR".to_string(),
                        ..Default::default()
                    }),
                    ..Default::default()
                }),
            },
            Entity {
                id: "a".to_string(),
                kind: EntityKind::Alert(Alert {
                    header_text: vec![Translation {
                        text: "Delays".to_string(),
                        language: None,
                    }],
                    effect: AlertEffect::SignificantDelays,
                    ..Default::default()
                }),
            },
        ]);
        let view = normalize(&env, &store(), &NormalizeOptions::default());

        let v = &view.vehicles[0];
        assert_eq!(v.route_id, "A");
        assert_eq!(v.current_status, "STOPPED_AT");
        assert_eq!(v.stop_name, "23 St");
        assert_eq!(v.timestamp, "");
        assert_eq!(v.train_id, "1A 0600 207/FAR");

        let a = &view.alerts[0];
        assert_eq!(a.header, "Delays");
        assert_eq!(a.description, "");
        assert_eq!(a.effect, "SIGNIFICANT_DELAYS");
        assert_eq!(a.cause, "UNKNOWN_CAUSE");
    }

    #[test]
    fn test_vehicle_with_dangling_trip() {
        let env = envelope(vec![Entity {
            id: "v".to_string(),
            kind: EntityKind::Vehicle(VehiclePosition::default()),
        }]);
        let view = normalize(&env, &store(), &NormalizeOptions::default());
        assert_eq!(view.vehicles[0].trip_id, "");
        assert_eq!(view.vehicles[0].route_id, "Unknown");
        assert_eq!(view.vehicles[0].current_status, "IN_TRANSIT_TO");
        assert_eq!(view.vehicles[0].train_id, "");
    }

    #[test]
    fn test_vehicle_timestamp_beyond_i64_printed_raw() {
        let env = envelope(vec![Entity {
            id: "v".to_string(),
            kind: EntityKind::Vehicle(VehiclePosition {
                timestamp: Some(u64::MAX),
                ..Default::default()
            }),
        }]);
        let view = normalize(&env, &store(), &NormalizeOptions::default());
        assert_eq!(view.vehicles[0].timestamp, "18446744073709551615");
    }

    #[test]
    fn test_prefix_trip_id_without_separator_stays_unresolved() {
        // shares a prefix with the static id but ends mid-segment
        let env = envelope(vec![trip_entity("1", "AFA23GEN-A001_0360", None, &[])]);
        let view = normalize(&env, &store(), &NormalizeOptions::default());
        assert_eq!(view.trips[0].route_id, "Unknown");
        assert_eq!(view.trips[0].headsign, "");
    }
}
