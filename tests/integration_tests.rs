use std::collections::HashMap;
use std::fs;
use std::path::Path;

use async_trait::async_trait;
use bytes::Bytes;
use gtfs_rt_board::aggregator::Aggregator;
use gtfs_rt_board::board::TransitBoard;
use gtfs_rt_board::catalog::{Catalog, FeedGroup, LineSelector};
use gtfs_rt_board::fetch::FeedSource;
use gtfs_rt_board::model::Agency;
use gtfs_rt_board::normalize::{NormalizeOptions, normalize};
use gtfs_rt_board::nyct_rt;
use gtfs_rt_board::parser::decode;
use gtfs_rt_board::reference::{ReferenceHandle, StaticSources, StaticStore};
use gtfs_rt_board::resolve::Direction;
use gtfs_rt_board::stats::EnvelopeStats;
use prost::Message;

fn write_static_tables(dir: &Path) {
    fs::write(
        dir.join("stops.txt"),
        "stop_id,stop_name,stop_lat,stop_lon\n\
         A27,42 St-Port Authority Bus Terminal,40.757308,-73.989735\n\
         A28,34 St-Penn Station,40.752287,-73.993391\n\
         A31,14 St,40.740893,-74.00169\n",
    )
    .unwrap();
    fs::write(
        dir.join("routes.txt"),
        "route_id,route_short_name,route_long_name,route_color,route_text_color\n\
         A,A,8 Avenue Express,0039A6,FFFFFF\n\
         C,C,8 Avenue Local,0039A6,\n",
    )
    .unwrap();
    fs::write(
        dir.join("trips.txt"),
        "route_id,trip_id,service_id,trip_headsign\n\
         A,AFA23GEN-1037-Weekday-00_036000_A..S,Weekday,Far Rockaway-Mott Av\n\
         C,AFA23GEN-1038-Weekday-00_036150_C..N,Weekday,168 St\n",
    )
    .unwrap();
}

fn stop(stop_id: &str, time: i64, track: Option<&str>) -> nyct_rt::StopTimeUpdate {
    nyct_rt::StopTimeUpdate {
        stop_id: Some(stop_id.to_string()),
        arrival: Some(nyct_rt::StopTimeEvent {
            delay: None,
            time: Some(time),
        }),
        nyct_stop_time_update: track.map(|t| nyct_rt::NyctStopTimeUpdate {
            scheduled_track: Some(t.to_string()),
            actual_track: Some(t.to_string()),
        }),
        ..Default::default()
    }
}

fn subway_feed() -> Vec<u8> {
    use nyct_rt::nyct_trip_descriptor::Direction as NyctDirection;

    nyct_rt::FeedMessage {
        header: nyct_rt::FeedHeader {
            gtfs_realtime_version: "1.0".to_string(),
            timestamp: Some(1_700_000_000),
            nyct_feed_header: Some(nyct_rt::NyctFeedHeader {
                nyct_subway_version: "1.0".to_string(),
                trip_replacement_period: Vec::new(),
            }),
        },
        entity: vec![
            nyct_rt::FeedEntity {
                id: "000001A".to_string(),
                trip_update: Some(nyct_rt::TripUpdate {
                    trip: nyct_rt::TripDescriptor {
                        trip_id: Some("036000_A..S".to_string()),
                        route_id: Some("A".to_string()),
                        start_date: Some("20231114".to_string()),
                        nyct_trip_descriptor: Some(nyct_rt::NyctTripDescriptor {
                            train_id: Some("1A 0600 207/FAR".to_string()),
                            is_assigned: Some(true),
                            direction: Some(NyctDirection::South as i32),
                        }),
                        ..Default::default()
                    },
                    stop_time_update: vec![
                        stop("A27S", 1_700_000_000, Some("A1")),
                        stop("A28S", 1_700_000_120, None),
                    ],
                }),
                vehicle: None,
            },
            nyct_rt::FeedEntity {
                id: "000002C".to_string(),
                trip_update: Some(nyct_rt::TripUpdate {
                    trip: nyct_rt::TripDescriptor {
                        trip_id: Some("036150_C..N".to_string()),
                        route_id: Some("C".to_string()),
                        ..Default::default()
                    },
                    stop_time_update: vec![stop("A31N", 1_700_000_300, None)],
                }),
                vehicle: None,
            },
            nyct_rt::FeedEntity {
                id: "000003A".to_string(),
                trip_update: None,
                vehicle: Some(nyct_rt::VehiclePosition {
                    trip: Some(nyct_rt::TripDescriptor {
                        trip_id: Some("036000_A..S".to_string()),
                        ..Default::default()
                    }),
                    current_status: Some(1),
                    stop_id: Some("A27S".to_string()),
                    ..Default::default()
                }),
            },
        ],
    }
    .encode_to_vec()
}

#[test]
fn test_full_pipeline() {
    let dir = tempfile::tempdir().unwrap();
    write_static_tables(dir.path());
    let store = StaticStore::load(&StaticSources::from_dir(dir.path()));

    let envelope = decode(&subway_feed(), Agency::Nyct).expect("Failed to decode feed");
    let stats = EnvelopeStats::from_envelope(&envelope);
    assert_eq!(stats.total_entities, 3);
    assert_eq!(stats.with_nyct_trip, 1);
    assert_eq!(stats.with_track, 1);

    let view = normalize(
        &envelope,
        &store,
        &NormalizeOptions::for_line(LineSelector::parse("a")),
    );

    assert_eq!(view.trips.len(), 1);
    let trip = &view.trips[0];
    assert_eq!(trip.route_id, "A");
    assert_eq!(trip.route_name, "8 Avenue Express");
    assert_eq!(trip.route_color, "#0039A6");
    assert_eq!(trip.route_text_color, "#FFFFFF");
    assert_eq!(trip.headsign, "Far Rockaway-Mott Av");
    assert_eq!(trip.train_id, "1A 0600 207/FAR");
    assert!(trip.is_assigned);
    assert_eq!(trip.direction, Direction::Southbound);
    assert_eq!(trip.next_stop_id, "A27S");
    assert_eq!(trip.next_stop_name, "42 St-Port Authority Bus Terminal");
    assert_eq!(trip.arrival, "17:13:20");
    assert_eq!(trip.track, "A1");
    assert_eq!(trip.stops[1].stop_name, "34 St-Penn Station");
    assert_eq!(trip.stops[1].track, "");

    // vehicles are never line filtered
    assert_eq!(view.vehicles.len(), 1);
    assert_eq!(view.vehicles[0].route_id, "A");
    assert_eq!(view.vehicles[0].current_status, "STOPPED_AT");
    assert_eq!(view.vehicles[0].stop_name, "42 St-Port Authority Bus Terminal");
}

#[test]
fn test_generic_decode_ignores_extensions() {
    let dir = tempfile::tempdir().unwrap();
    write_static_tables(dir.path());
    let store = StaticStore::load(&StaticSources::from_dir(dir.path()));

    let envelope = decode(&subway_feed(), Agency::Generic).unwrap();
    let view = normalize(&envelope, &store, &NormalizeOptions::default());

    assert_eq!(view.trips.len(), 2);
    let c = &view.trips[1];
    assert_eq!(c.train_id, "");
    assert!(!c.is_assigned);
    assert_eq!(c.track, "");
    // trip id suffix decides without the agency direction
    assert_eq!(c.direction, Direction::Northbound);
    // empty text color falls back to the default
    assert_eq!(c.route_text_color, "#000000");
}

#[test]
fn test_missing_static_tables_fall_back_to_raw_ids() {
    let dir = tempfile::tempdir().unwrap();
    let store = StaticStore::load(&StaticSources::from_dir(dir.path()));
    assert!(store.is_empty());

    let envelope = decode(&subway_feed(), Agency::Nyct).unwrap();
    let view = normalize(&envelope, &store, &NormalizeOptions::default());

    assert_eq!(view.trips[0].next_stop_name, "A27S");
    assert_eq!(view.trips[0].route_name, "Unknown");
    assert_eq!(view.trips[0].route_color, "#FFFFFF");
    assert_eq!(view.vehicles[0].route_id, "Unknown");
}

#[test]
fn test_rejects_non_protobuf_payload() {
    assert!(decode(br#"{"error":"unauthorized"}"#, Agency::Nyct).is_err());
    assert!(decode(b"<?xml version=\"1.0\"?>", Agency::Generic).is_err());
}

struct Upstream(HashMap<String, Vec<u8>>);

#[async_trait]
impl FeedSource for Upstream {
    async fn fetch(&self, url: &str) -> anyhow::Result<Bytes> {
        self.0
            .get(url)
            .map(|b| Bytes::from(b.clone()))
            .ok_or_else(|| anyhow::anyhow!("503 Service Unavailable"))
    }
}

fn two_group_board(dir: &Path) -> TransitBoard<Upstream> {
    let catalog = Catalog::new(vec![
        FeedGroup {
            name: "ACE".to_string(),
            url: "http://upstream/ace".to_string(),
            agency: Agency::Nyct,
            lines: vec!["A".to_string(), "C".to_string(), "E".to_string()],
        },
        FeedGroup {
            name: "G".to_string(),
            url: "http://upstream/g".to_string(),
            agency: Agency::Nyct,
            lines: vec!["G".to_string()],
        },
    ])
    .unwrap();
    let upstream = Upstream(HashMap::from([(
        "http://upstream/ace".to_string(),
        subway_feed(),
    )]));

    TransitBoard::new(
        Aggregator::new(catalog, upstream),
        ReferenceHandle::load(StaticSources::from_dir(dir)),
        chrono_tz::America::New_York,
    )
}

#[tokio::test]
async fn test_board_all_lines_survives_failed_group() {
    let dir = tempfile::tempdir().unwrap();
    write_static_tables(dir.path());
    let board = two_group_board(dir.path());

    let view = board.trains("ALL", true).await.unwrap();
    let routes: Vec<_> = view.trips.iter().map(|t| t.route_id.as_str()).collect();
    assert_eq!(routes, ["A", "C"]);

    assert!(board.trains("G", false).await.is_err());
}

#[tokio::test]
async fn test_board_reload_picks_up_new_tables() {
    let dir = tempfile::tempdir().unwrap();
    let board = two_group_board(dir.path());

    let before = board.trains("A", false).await.unwrap();
    assert_eq!(before.trips[0].next_stop_name, "A27S");

    write_static_tables(dir.path());
    board.reload_reference();

    let after = board.trains("A", false).await.unwrap();
    assert_eq!(after.trips[0].next_stop_name, "42 St-Port Authority Bus Terminal");
    assert_eq!(board.stations().len(), 3);
}
