mod client;
mod basic;
pub mod auth;

pub use client::HttpClient;
pub use basic::BasicClient;

use anyhow::Result;
use async_trait::async_trait;
use bytes::Bytes;

/// GETs `url` and returns the body, failing on a non-success status.
pub async fn fetch_bytes<C: HttpClient>(
    client: &C,
    url: &str,
) -> Result<Bytes> {
    let req = reqwest::Request::new(
        reqwest::Method::GET,
        url.parse()?,
    );

    let resp = client.execute(req).await?.error_for_status()?;
    Ok(resp.bytes().await?)
}

/// Where raw feed payloads come from.
///
/// The aggregator only depends on this trait, so transports can be swapped
/// (HTTP, local files, canned payloads in tests).
#[async_trait]
pub trait FeedSource: Send + Sync {
    async fn fetch(&self, url: &str) -> Result<Bytes>;
}

/// [`FeedSource`] over any [`HttpClient`].
pub struct HttpFeedSource<C>(pub C);

#[async_trait]
impl<C: HttpClient> FeedSource for HttpFeedSource<C> {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        fetch_bytes(&self.0, url).await
    }
}

/// Reads payloads from disk, treating the URL as a path.
pub struct FileFeedSource;

#[async_trait]
impl FeedSource for FileFeedSource {
    async fn fetch(&self, url: &str) -> Result<Bytes> {
        let path = url.strip_prefix("file://").unwrap_or(url);
        Ok(Bytes::from(tokio::fs::read(path).await?))
    }
}
