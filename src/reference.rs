//! Static GTFS reference tables.
//!
//! A [`StaticStore`] is an immutable snapshot of routes, stops, trips and
//! (optionally) scheduled stop times. Loading never fails: a missing or
//! unreadable table is logged and left empty so requests are still answered
//! with raw identifiers. [`ReferenceHandle`] swaps whole snapshots
//! atomically; readers keep whatever `Arc` they already hold.

use std::collections::{BTreeMap, HashMap};
use std::fs::File;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use arc_swap::ArcSwap;
use serde::{Deserialize, Serialize};
use serde::de::DeserializeOwned;
use tracing::{debug, info, warn};

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RouteInfo {
    pub long_name: String,
    /// Hex color without a leading `#`, possibly empty.
    pub color: String,
    pub text_color: String,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TripRef {
    pub route_id: String,
    pub headsign: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StopEntry {
    pub stop_id: String,
    pub stop_name: String,
}

/// Where each table is read from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StaticSources {
    pub stops: PathBuf,
    pub routes: PathBuf,
    pub trips: PathBuf,
    pub stop_times: Option<PathBuf>,
}

impl StaticSources {
    /// Standard GTFS file names inside `dir`. `stop_times.txt` is only used
    /// when it exists, since the subway bundle's copy is large and optional.
    pub fn from_dir(dir: impl AsRef<Path>) -> Self {
        let dir = dir.as_ref();
        let stop_times = dir.join("stop_times.txt");
        Self {
            stops: dir.join("stops.txt"),
            routes: dir.join("routes.txt"),
            trips: dir.join("trips.txt"),
            stop_times: stop_times.exists().then_some(stop_times),
        }
    }
}

#[derive(Debug, Deserialize)]
struct StopRow {
    stop_id: String,
    stop_name: String,
}

#[derive(Debug, Deserialize)]
struct RouteRow {
    route_id: String,
    #[serde(default)]
    route_long_name: String,
    #[serde(default)]
    route_color: String,
    #[serde(default)]
    route_text_color: String,
}

#[derive(Debug, Deserialize)]
struct TripRow {
    trip_id: String,
    route_id: String,
    #[serde(default)]
    trip_headsign: String,
}

#[derive(Debug, Deserialize)]
struct StopTimeRow {
    trip_id: String,
    stop_sequence: u32,
    #[serde(default)]
    arrival_time: String,
}

#[derive(Debug, Default)]
pub struct StaticStore {
    pub(crate) routes: HashMap<String, RouteInfo>,
    pub(crate) stops: BTreeMap<String, String>,
    /// Ordered so that fuzzy trip-id matching picks the same entry every time.
    pub(crate) trips: BTreeMap<String, TripRef>,
    pub(crate) schedule: HashMap<(String, u32), String>,
}

impl StaticStore {
    /// Loads every table in `sources`, tolerating missing files.
    #[tracing::instrument(skip_all)]
    pub fn load(sources: &StaticSources) -> Self {
        let stops: BTreeMap<String, String> = read_rows::<StopRow>(&sources.stops)
            .into_iter()
            .map(|r| (r.stop_id, r.stop_name))
            .collect();

        let routes: HashMap<String, RouteInfo> = read_rows::<RouteRow>(&sources.routes)
            .into_iter()
            .map(|r| {
                (
                    r.route_id,
                    RouteInfo {
                        long_name: r.route_long_name,
                        color: r.route_color.trim_start_matches('#').to_string(),
                        text_color: r.route_text_color.trim_start_matches('#').to_string(),
                    },
                )
            })
            .collect();

        let trips: BTreeMap<String, TripRef> = read_rows::<TripRow>(&sources.trips)
            .into_iter()
            .map(|r| {
                (
                    r.trip_id,
                    TripRef {
                        route_id: r.route_id,
                        headsign: r.trip_headsign,
                    },
                )
            })
            .collect();

        let schedule: HashMap<(String, u32), String> = match &sources.stop_times {
            Some(path) => read_rows::<StopTimeRow>(path)
                .into_iter()
                .map(|r| ((r.trip_id, r.stop_sequence), r.arrival_time))
                .collect(),
            None => HashMap::new(),
        };

        info!(
            stops = stops.len(),
            routes = routes.len(),
            trips = trips.len(),
            scheduled_stop_times = schedule.len(),
            "Static reference tables loaded"
        );

        Self {
            routes,
            stops,
            trips,
            schedule,
        }
    }

    /// Builds a store from in-memory rows, mainly for tests and tooling.
    pub fn from_parts(
        routes: impl IntoIterator<Item = (String, RouteInfo)>,
        stops: impl IntoIterator<Item = (String, String)>,
        trips: impl IntoIterator<Item = (String, TripRef)>,
        schedule: impl IntoIterator<Item = ((String, u32), String)>,
    ) -> Self {
        Self {
            routes: routes.into_iter().collect(),
            stops: stops.into_iter().collect(),
            trips: trips.into_iter().collect(),
            schedule: schedule.into_iter().collect(),
        }
    }

    pub fn route(&self, route_id: &str) -> Option<&RouteInfo> {
        self.routes.get(route_id)
    }

    pub fn stop_name(&self, stop_id: &str) -> Option<&str> {
        self.stops.get(stop_id).map(String::as_str)
    }

    pub fn trip(&self, trip_id: &str) -> Option<&TripRef> {
        self.trips.get(trip_id)
    }

    /// Trip table entries in key order.
    pub fn trips(&self) -> impl Iterator<Item = (&str, &TripRef)> {
        self.trips.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn scheduled_arrival(&self, trip_id: &str, stop_sequence: u32) -> Option<&str> {
        self.schedule
            .get(&(trip_id.to_string(), stop_sequence))
            .map(String::as_str)
    }

    /// Every stop in the static table, ordered by stop id.
    pub fn stop_entries(&self) -> Vec<StopEntry> {
        self.stops
            .iter()
            .map(|(id, name)| StopEntry {
                stop_id: id.clone(),
                stop_name: name.clone(),
            })
            .collect()
    }

    pub fn is_empty(&self) -> bool {
        self.routes.is_empty() && self.stops.is_empty() && self.trips.is_empty()
    }
}

/// Reads a CSV table into rows, trimming every field.
///
/// Missing files and unreadable rows are logged and skipped.
fn read_rows<T: DeserializeOwned>(path: &Path) -> Vec<T> {
    let file = match File::open(path) {
        Ok(f) => f,
        Err(e) => {
            warn!(path = %path.display(), error = %e, "Static table unavailable, using empty table");
            return Vec::new();
        }
    };

    let mut rdr = csv::ReaderBuilder::new()
        .trim(csv::Trim::All)
        .flexible(true)
        .from_reader(file);

    let mut rows = Vec::new();
    let mut skipped = 0usize;
    for result in rdr.deserialize() {
        match result {
            Ok(row) => rows.push(row),
            Err(e) => {
                skipped += 1;
                debug!(path = %path.display(), error = %e, "Skipping unreadable row");
            }
        }
    }

    if skipped > 0 {
        warn!(path = %path.display(), skipped, "Some static rows could not be read");
    }

    rows
}

/// Shared, atomically replaceable reference to the current [`StaticStore`].
#[derive(Debug, Clone)]
pub struct ReferenceHandle {
    current: Arc<ArcSwap<StaticStore>>,
    sources: Option<StaticSources>,
}

impl ReferenceHandle {
    /// Loads the initial snapshot from `sources` and remembers them for
    /// [`reload`](Self::reload).
    pub fn load(sources: StaticSources) -> Self {
        let store = StaticStore::load(&sources);
        Self {
            current: Arc::new(ArcSwap::from_pointee(store)),
            sources: Some(sources),
        }
    }

    /// Wraps an existing store; `reload` keeps it as is.
    pub fn from_store(store: StaticStore) -> Self {
        Self {
            current: Arc::new(ArcSwap::from_pointee(store)),
            sources: None,
        }
    }

    /// The snapshot to use for one normalization cycle.
    pub fn snapshot(&self) -> Arc<StaticStore> {
        self.current.load_full()
    }

    /// Re-reads the tables and swaps in the result, returning it.
    pub fn reload(&self) -> Arc<StaticStore> {
        match &self.sources {
            Some(sources) => {
                let fresh = Arc::new(StaticStore::load(sources));
                self.current.store(Arc::clone(&fresh));
                info!("Static reference snapshot replaced");
                fresh
            }
            None => {
                debug!("No static sources configured, keeping current snapshot");
                self.snapshot()
            }
        }
    }

    pub fn replace(&self, store: StaticStore) -> Arc<StaticStore> {
        let store = Arc::new(store);
        self.current.store(Arc::clone(&store));
        store
    }
}
