//! Retrieval and merging of feed group payloads.
//!
//! A single-line request maps to exactly one group and surfaces its errors.
//! An `ALL` request fetches every group concurrently; a group that fails,
//! times out or returns garbage is logged and left out of the result.

use std::time::Duration;

use bytes::Bytes;
use futures::future::join_all;
use tracing::{Instrument, debug, info_span, warn};

use crate::catalog::{Catalog, FeedGroup, LineSelector};
use crate::error::{FeedError, FeedResult};
use crate::fetch::FeedSource;
use crate::model::{Agency, Envelope};
use crate::parser::decode;

pub const DEFAULT_FETCH_TIMEOUT: Duration = Duration::from_secs(10);

/// Undecoded bytes from one feed group.
#[derive(Debug, Clone)]
pub struct RawPayload {
    pub group: String,
    pub agency: Agency,
    pub bytes: Bytes,
}

pub struct Aggregator<S> {
    catalog: Catalog,
    source: S,
    timeout: Duration,
}

impl<S: FeedSource> Aggregator<S> {
    pub fn new(catalog: Catalog, source: S) -> Self {
        Self {
            catalog,
            source,
            timeout: DEFAULT_FETCH_TIMEOUT,
        }
    }

    /// Per-group deadline; a group exceeding it counts as a transport failure.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    async fn fetch_group(&self, group: &FeedGroup) -> FeedResult<RawPayload> {
        let span = info_span!("fetch_group", group = %group.name);
        let fetched = tokio::time::timeout(self.timeout, self.source.fetch(&group.url))
            .instrument(span)
            .await;

        match fetched {
            Ok(Ok(bytes)) => {
                debug!(group = %group.name, bytes = bytes.len(), "Feed group fetched");
                Ok(RawPayload {
                    group: group.name.clone(),
                    agency: group.agency,
                    bytes,
                })
            }
            Ok(Err(source)) => Err(FeedError::TransportFailure {
                group: group.name.clone(),
                source,
            }),
            Err(_) => Err(FeedError::Timeout {
                group: group.name.clone(),
                after: self.timeout,
            }),
        }
    }

    /// Raw payloads for `selector`.
    ///
    /// # Errors
    ///
    /// `UnknownLine` when no group serves the line; for a single line, the
    /// transport failure or timeout of its group. `ALL` never fails on
    /// account of an individual group.
    #[tracing::instrument(skip(self), fields(selector = %selector))]
    pub async fn fetch(&self, selector: &LineSelector) -> FeedResult<Vec<RawPayload>> {
        match selector {
            LineSelector::Line(line) => {
                let group = self.catalog.resolve_endpoint(line)?;
                Ok(vec![self.fetch_group(group).await?])
            }
            LineSelector::All => {
                let groups = self.catalog.groups_for(selector)?;
                let results = join_all(groups.into_iter().map(|g| self.fetch_group(g))).await;

                let mut payloads = Vec::with_capacity(results.len());
                for result in results {
                    match result {
                        Ok(payload) => payloads.push(payload),
                        Err(e) => warn!(error = %e, "Feed group omitted from aggregate"),
                    }
                }
                Ok(payloads)
            }
        }
    }

    /// Fetches and decodes `selector`, concatenating entities in group order.
    pub async fn fetch_envelope(&self, selector: &LineSelector) -> FeedResult<Envelope> {
        let isolate = matches!(selector, LineSelector::All);
        let mut merged: Option<Envelope> = None;

        for payload in self.fetch(selector).await? {
            match decode(&payload.bytes, payload.agency) {
                Ok(envelope) => {
                    debug!(
                        group = %payload.group,
                        entities = envelope.entities.len(),
                        "Feed group decoded"
                    );
                    match merged.as_mut() {
                        Some(m) => m.merge(envelope),
                        None => merged = Some(envelope),
                    }
                }
                Err(e) if isolate => {
                    warn!(group = %payload.group, error = %e, "Feed group payload unusable, omitted");
                }
                Err(source) => {
                    return Err(FeedError::Malformed {
                        group: payload.group,
                        source,
                    });
                }
            }
        }

        Ok(merged.unwrap_or_default())
    }
}
