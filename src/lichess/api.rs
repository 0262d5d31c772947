//! lichess public API client.

use crate::chess::api::header_str;
use crate::config::Config;
use crate::data::fetch_log;
use crate::error::{IngestError, Result};
use crate::lichess::models::LichessUser;
use anyhow::Context;
use reqwest::header::{ACCEPT, HeaderMap, HeaderValue};
use reqwest::{Client, StatusCode};
use sqlx::PgPool;
use tracing::{error, warn};

/// Client for the lichess public API. Only the read surface is used.
#[derive(Debug, Clone)]
pub struct LichessApi {
    client: Client,
    base_url: String,
    pool: PgPool,
}

impl LichessApi {
    pub fn new(config: &Config, pool: PgPool) -> anyhow::Result<Self> {
        let mut headers = HeaderMap::new();
        headers.insert(ACCEPT, HeaderValue::from_static("application/json"));

        let client = Client::builder()
            .user_agent(config.lichess_api_user_agent.clone())
            .default_headers(headers)
            .timeout(config.lichess_api_timeout)
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            base_url: config
                .lichess_api_base_url
                .trim_end_matches('/')
                .to_string(),
            pool,
        })
    }

    /// Fetch profile + per-perf ratings in one call.
    pub async fn fetch_user(&self, username: &str) -> Result<LichessUser> {
        let url = format!("{}/user/{}", self.base_url, username);

        let response = match self.client.get(&url).send().await {
            Ok(response) => response,
            Err(source) => {
                error!(url = %url, error = %source, "Lichess request failed");
                self.journal(&url, None, &HeaderMap::new(), Some(source.to_string()))
                    .await;
                return Err(IngestError::Network { url, source });
            }
        };

        let status = response.status();
        let headers = response.headers().clone();

        if status != StatusCode::OK {
            self.journal(&url, Some(status.as_u16() as i32), &headers, None)
                .await;
            return Err(IngestError::Upstream {
                status: status.as_u16(),
                url,
            });
        }

        match response.json::<LichessUser>().await {
            Ok(user) => {
                self.journal(&url, Some(status.as_u16() as i32), &headers, None)
                    .await;
                Ok(user)
            }
            Err(source) => {
                self.journal(
                    &url,
                    Some(status.as_u16() as i32),
                    &headers,
                    Some(source.to_string()),
                )
                .await;
                Err(IngestError::Decode(format!("{url}: {source}")))
            }
        }
    }

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
