//! Request-level entry point: aggregate, decode, normalize.

use std::sync::Arc;

use chrono_tz::Tz;
use tracing::info;

use crate::aggregator::Aggregator;
use crate::catalog::LineSelector;
use crate::error::FeedResult;
use crate::fetch::FeedSource;
use crate::normalize::{NormalizeOptions, normalize};
use crate::reference::{ReferenceHandle, StaticStore, StopEntry};
use crate::views::FeedView;

pub struct TransitBoard<S> {
    aggregator: Aggregator<S>,
    reference: ReferenceHandle,
    tz: Tz,
}

impl<S: FeedSource> TransitBoard<S> {
    pub fn new(aggregator: Aggregator<S>, reference: ReferenceHandle, tz: Tz) -> Self {
        Self {
            aggregator,
            reference,
            tz,
        }
    }

    /// Trains for `line` (or `"ALL"`), normalized against the current
    /// static snapshot.
    #[tracing::instrument(skip(self))]
    pub async fn trains(&self, line: &str, sort_by_route: bool) -> FeedResult<FeedView> {
        let selector = LineSelector::parse(line);
        let envelope = self.aggregator.fetch_envelope(&selector).await?;
        let store = self.reference.snapshot();

        let view = normalize(
            &envelope,
            &store,
            &NormalizeOptions {
                line: selector,
                tz: self.tz,
                sort_by_route,
            },
        );
        info!(
            trips = view.trips.len(),
            vehicles = view.vehicles.len(),
            alerts = view.alerts.len(),
            "Board refreshed"
        );
        Ok(view)
    }

    pub fn stations(&self) -> Vec<StopEntry> {
        self.reference.snapshot().stop_entries()
    }

    pub fn reload_reference(&self) -> Arc<StaticStore> {
        self.reference.reload()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::Catalog;
    use crate::error::FeedError;
    use crate::reference::{RouteInfo, TripRef};
    use async_trait::async_trait;
    use bytes::Bytes;

    struct EmptyFeed;

    #[async_trait]
    impl FeedSource for EmptyFeed {
        async fn fetch(&self, _url: &str) -> anyhow::Result<Bytes> {
            Ok(Bytes::new())
        }
    }

    fn board() -> TransitBoard<EmptyFeed> {
        let store = StaticStore::from_parts(
            [("A".to_string(), RouteInfo::default())],
            [
                ("A27".to_string(), "23 St".to_string()),
                ("101".to_string(), "Van Cortlandt Park-242 St".to_string()),
            ],
            [("t".to_string(), TripRef::default())],
            [],
        );
        TransitBoard::new(
            Aggregator::new(Catalog::nyct_subway(), EmptyFeed),
            ReferenceHandle::from_store(store),
            chrono_tz::UTC,
        )
    }

    #[tokio::test]
    async fn test_empty_feed_gives_empty_view() {
        let view = board().trains("A", true).await.unwrap();
        assert!(view.is_empty());
        let view = board().trains("ALL", false).await.unwrap();
        assert!(view.is_empty());
    }

    #[tokio::test]
    async fn test_unknown_line_rejected() {
        let err = board().trains("X", false).await.unwrap_err();
        assert!(matches!(err, FeedError::UnknownLine(_)));

        let err = board().trains("  ", false).await.unwrap_err();
        assert!(matches!(err, FeedError::UnknownLine(ref l) if l.is_empty()));
    }

    #[test]
    fn test_stations_enumeration() {
        let stations = board().stations();
        assert_eq!(stations.len(), 2);
        assert_eq!(stations[0].stop_id, "101");
        assert_eq!(stations[1].stop_name, "23 St");
    }
}
