//! Remote tile retrieval.

use async_trait::async_trait;
use bytes::Bytes;
use reqwest::{header, StatusCode};
use std::time::Duration;

use crate::error::{FetchError, FillError};
use crate::tile::Tile;
use crate::url::UrlFormat;

/// Something tiles can be fetched from.
///
/// A source only retrieves bytes; persisting them is the cache's job.
#[async_trait]
pub trait TileSource: Send + Sync {
    async fn fetch(&self, tile: Tile) -> Result<Bytes, FetchError>;
}

/// The default client identifier sent to tile servers.
pub fn default_user_agent() -> String {
    format!("osm-tile-cache_rs_{}", env!("CARGO_PKG_VERSION"))
}

/// Fetches tiles from a slippy-map HTTP tile server.
#[derive(Debug)]
pub struct HttpSource {
    client: reqwest::Client,
    url: UrlFormat,
}

impl HttpSource {
    /// Every request is bounded by `timeout`; expiry surfaces as a transport error.
    pub fn new(url: UrlFormat, user_agent: &str, timeout: Duration) -> Result<Self, FillError> {
        if timeout.is_zero() {
            return Err(FillError::Config("tile timeout must be non-zero".to_owned()));
        }

        let mut headers = header::HeaderMap::new();
        let value = header::HeaderValue::from_str(user_agent)
            .map_err(|_| FillError::Config(format!("invalid user agent `{}`", user_agent)))?;
        headers.insert(header::USER_AGENT, value);

        let client = reqwest::Client::builder()
            .timeout(timeout)
            .default_headers(headers)
            .build()
            .map_err(FillError::Client)?;

        Ok(Self { client, url })
    }
}

#[async_trait]
impl TileSource for HttpSource {
    async fn fetch(&self, tile: Tile) -> Result<Bytes, FetchError> {
        let url = self
            .url
            .tile_url(&tile)
            .map_err(|reason| FetchError::Url { tile, reason })?;

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(e) => {
                return Err(FetchError::Transport {
                    url,
                    source: Box::new(e),
                })
            }
        };

        let status = response.status();
        if status != StatusCode::OK {
            return Err(FetchError::Rejected {
                url,
                status: status.as_u16(),
            });
        }

        match response.bytes().await {
            Ok(body) if body.is_empty() => Err(FetchError::EmptyBody { url }),
            Ok(body) => Ok(body),
            Err(e) => Err(FetchError::Transport {
                url,
                source: Box::new(e),
            }),
        }
    }
}
