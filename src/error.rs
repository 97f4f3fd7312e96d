//! Error taxonomy for decoding and aggregation.
//!
//! There is no variant for missing static references: every lookup resolves
//! through a fallback chain to a best-effort label.

use std::time::Duration;

/// Failure to turn raw bytes into an [`Envelope`](crate::model::Envelope).
#[derive(thiserror::Error, Debug)]
pub enum DecodeError {
    #[error("malformed payload: {reason}")]
    MalformedPayload { reason: String },
}

impl DecodeError {
    pub(crate) fn malformed(reason: impl Into<String>) -> Self {
        DecodeError::MalformedPayload {
            reason: reason.into(),
        }
    }
}

impl From<prost::DecodeError> for DecodeError {
    fn from(e: prost::DecodeError) -> Self {
        DecodeError::malformed(e.to_string())
    }
}

/// Failure while resolving or retrieving one or more feed groups.
#[derive(thiserror::Error, Debug)]
pub enum FeedError {
    #[error("no feed group serves line {0:?}")]
    UnknownLine(String),

    #[error("transport failure for feed group {group}: {source}")]
    TransportFailure {
        group: String,
        #[source]
        source: anyhow::Error,
    },

    #[error("feed group {group} timed out after {after:?}")]
    Timeout { group: String, after: Duration },

    #[error("feed group {group} returned an unusable payload: {source}")]
    Malformed {
        group: String,
        #[source]
        source: DecodeError,
    },
}

pub type FeedResult<T> = Result<T, FeedError>;
