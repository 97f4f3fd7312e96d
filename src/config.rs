//! Process settings read from the environment (after `dotenvy` has loaded
//! `.env`). CLI flags override individual values in `main`.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, anyhow};
use chrono_tz::Tz;

use crate::aggregator::DEFAULT_FETCH_TIMEOUT;

pub const DEFAULT_TIMEZONE: Tz = chrono_tz::America::New_York;
pub const DEFAULT_STATIC_DIR: &str = "data/nyct";

#[derive(Debug, Clone)]
pub struct Settings {
    /// Directory holding `stops.txt`, `routes.txt`, `trips.txt`.
    pub static_dir: PathBuf,
    pub api_key: Option<String>,
    pub fetch_timeout: Duration,
    pub timezone: Tz,
    /// Optional JSON catalog replacing the built-in feed groups.
    pub catalog_path: Option<String>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from(DEFAULT_STATIC_DIR),
            api_key: None,
            fetch_timeout: DEFAULT_FETCH_TIMEOUT,
            timezone: DEFAULT_TIMEZONE,
            catalog_path: None,
        }
    }
}

impl Settings {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds settings from an arbitrary key lookup; empty values count as unset.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
        let mut settings = Settings::default();

        if let Some(dir) = get("GTFS_STATIC_DIR") {
            settings.static_dir = PathBuf::from(dir);
        }
        settings.api_key = get("MTA_API_KEY");
        if let Some(secs) = get("FEED_TIMEOUT_SECS") {
            let secs: u64 = secs
                .parse()
                .with_context(|| format!("FEED_TIMEOUT_SECS must be whole seconds, got {secs:?}"))?;
            settings.fetch_timeout = Duration::from_secs(secs);
        }
        if let Some(tz) = get("FEED_TIMEZONE") {
            settings.timezone = tz
                .parse()
                .map_err(|e| anyhow!("FEED_TIMEZONE {tz:?} is not a known timezone: {e}"))?;
        }
        settings.catalog_path = get("FEED_CATALOG_PATH");

        Ok(settings)
    }
}
