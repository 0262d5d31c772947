//! chess.com public API client.

use crate::chess::models::{ArchiveGamesResponse, ArchivesResponse, Profile, StatsResponse};
use crate::config::Config;
use crate::data::fetch_log;
use crate::error::{IngestError, Result};
use anyhow::Context;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use serde::de::DeserializeOwned;
use serde_json::Value;
use sqlx::PgPool;
use tracing::{error, warn};

/// Client for the chess.com public API.
///
/// One shared [`Client`] reuses TCP+TLS connections across requests. Every
/// call, success or failure, is journaled to `fetch_log`.
#[derive(Debug, Clone)]
pub struct ChessApi {
    client: Client,
    base_url: String,
    pool: PgPool,
}

impl ChessApi {
    pub fn new(config: &Config, pool: PgPool) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(config.chess_api_user_agent.clone())
            .default_headers(headers)
            .tcp_keepalive(Some(std::time::Duration::from_secs(60 * 5)))
            .timeout(config.chess_api_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config.chess_api_base_url.trim_end_matches('/').to_string(),
            pool,
        })
    }

    /// Performs a GET and returns `(status, body, headers)`.
    ///
    /// A non-200 response yields `body = None`; transport failures map to
    /// [`IngestError::Network`] and a 200 with an unparseable body to
    /// [`IngestError::Decode`]. `extra_headers` supports conditional
    /// requests against the ETag / Last-Modified values in the fetch log.
    pub async fn fetch_json(
        &self,
        url: &str,
        extra_headers: Option<HeaderMap>,
    ) -> Result<(StatusCode, Option<Value>, HeaderMap)> {
        let mut request = self.client.get(url);
        if let Some(extra) = extra_headers {
            request = request.headers(extra);
        }
        let response = match request.send().await {
            Ok(response) => response,
            Err(source) => {
                error!(url, error = %source, "Request failed");
                self.journal(url, None, &HeaderMap::new(), Some(source.to_string()))
                    .await;
                return Err(IngestError::Network {
                    url: url.to_string(),
                    source,
                });
            }
        };

        let status = response.status();
        let headers = response.headers().clone();

        if status != StatusCode::OK {
            self.journal(url, Some(status.as_u16() as i32), &headers, None)
                .await;
            return Ok((status, None, headers));
        }

        match response.json::<Value>().await {
            Ok(body) => {
                self.journal(url, Some(status.as_u16() as i32), &headers, None)
                    .await;
                Ok((status, Some(body), headers))
            }
            Err(source) => {
                error!(url, "Invalid JSON in response body");
                self.journal(
                    url,
                    Some(status.as_u16() as i32),
                    &headers,
                    Some(source.to_string()),
                )
                .await;
                Err(IngestError::Decode(format!("{url}: {source}")))
            }
        }
    }

    pub async fn fetch_profile(&self, username: &str) -> Result<Profile> {
        let url = format!("{}/player/{}", self.base_url, username);
        self.fetch_typed(&url).await
    }

    pub async fn fetch_stats(&self, username: &str) -> Result<StatsResponse> {
        let url = format!("{}/player/{}/stats", self.base_url, username);
        self.fetch_typed(&url).await
    }

    /// Monthly archive URLs for a player, oldest first.
    pub async fn fetch_archives(&self, username: &str) -> Result<Vec<String>> {
        let url = format!("{}/player/{}/games/archives", self.base_url, username);
        let response: ArchivesResponse = self.fetch_typed(&url).await?;
        Ok(response.archives)
    }

    pub async fn fetch_archive_games(&self, archive_url: &str) -> Result<ArchiveGamesResponse> {
        self.fetch_typed(archive_url).await
    }

    async fn fetch_typed<T: DeserializeOwned>(&self, url: &str) -> Result<T> {
        let (status, body, _headers) = self.fetch_json(url, None).await?;
        let Some(body) = body else {
            return Err(IngestError::Upstream {
                status: status.as_u16(),
                url: url.to_string(),
            });
        };
        serde_json::from_value(body).map_err(|e| IngestError::Decode(format!("{url}: {e}")))
    }

    /// Fetch-log writes are best-effort; a journaling failure never fails
    /// the fetch itself.
    async fn journal(
        &self,
        url: &str,
        status_code: Option<i32>,
        headers: &HeaderMap,
        error: Option<String>,
    ) {
        let etag = header_str(headers, "etag");
        let last_modified = header_str(headers, "last-modified");
        if let Err(e) = fetch_log::log_fetch(
            &self.pool,
            url,
            status_code,
            etag.as_deref(),
            last_modified.as_deref(),
            error.as_deref(),
        )
        .await
        {
            warn!(url, error = %e, "Failed to journal fetch");
        }
    }
}

pub(crate) fn header_str(headers: &HeaderMap, name: &str) -> Option<String> {
    headers
        .get(name)
        .and_then(|value| value.to_str().ok())
        .map(str::to_string)
}
