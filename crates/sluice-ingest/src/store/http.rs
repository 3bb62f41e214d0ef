//! JSON-over-HTTP store adapter.
//!
//! # Endpoints
//!
//! | Call            | Request                                   |
//! |-----------------|-------------------------------------------|
//! | `list_series`   | `GET  {base}/timeseries?limit=N&cursor=C` |
//! | `create_series` | `POST {base}/timeseries`                  |
//! | `write_batch`   | `POST {base}/timeseries/data`             |
//!
//! All bodies are `{"items": [...]}` envelopes. Listing is paged through
//! `nextCursor`. A `409 Conflict` on create means another extractor won the
//! race and is treated as success.

use super::{NewSeries, SeriesInfo, SeriesStore, StoreError};
use crate::batcher::Batch;
use async_trait::async_trait;
use reqwest::header::{HeaderMap, HeaderValue};
use reqwest::{Response, StatusCode};
use serde::{Deserialize, Serialize};
use sluice_core::{Point, SeriesId};
use std::time::Duration;
use tracing::{debug, info, warn};

/// Header carrying the API key.
const API_KEY_HEADER: &str = "api-key";

/// Configuration for the HTTP store.
#[derive(Debug, Clone)]
pub struct HttpStoreConfig {
    /// Base URL of the API (e.g., "https://api.example.com/api/v1/projects/plant").
    pub base_url: String,

    /// API key sent with every request.
    pub api_key: Option<String>,

    /// Per-request timeout.
    pub timeout: Duration,

    /// Page size for series listing.
    pub page_size: usize,
}

impl Default for HttpStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:8080/api/v1".to_string(),
            api_key: None,
            timeout: Duration::from_secs(30),
            page_size: 1000,
        }
    }
}

/// Store adapter speaking JSON over HTTP.
#[derive(Debug, Clone)]
pub struct HttpSeriesStore {
    client: reqwest::Client,
    base_url: String,
    page_size: usize,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListResponse {
    #[serde(default)]
    items: Vec<ListedSeries>,
    #[serde(default)]
    next_cursor: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct ListedSeries {
    #[serde(default)]
    external_id: Option<String>,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Serialize)]
struct Items<T> {
    items: T,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateItem<'a> {
    external_id: &'a SeriesId,
    name: &'a str,
    description: &'a str,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DataItem<'a> {
    external_id: &'a SeriesId,
    datapoints: &'a [Point],
}

impl HttpSeriesStore {
    /// Create a new HTTP store.
    pub fn new(config: HttpStoreConfig) -> Result<Self, StoreError> {
        let mut headers = HeaderMap::new();
        if let Some(key) = &config.api_key {
            let mut value = HeaderValue::from_str(key)
                .map_err(|e| StoreError::InvalidConfig(format!("api key: {e}")))?;
            value.set_sensitive(true);
            headers.insert(API_KEY_HEADER, value);
        }

        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .default_headers(headers)
            .build()?;

        let base_url = config.base_url.trim_end_matches('/').to_string();
        info!(
            "HTTP store initialized: base_url={}, timeout={:?}, authenticated={}",
            base_url,
            config.timeout,
            config.api_key.is_some()
        );

        Ok(Self {
            client,
            base_url,
            page_size: config.page_size.max(1),
        })
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{}", self.base_url, path)
    }

    /// Turn a non-success response into [`StoreError::Status`].
    async fn check(response: Response) -> Result<Response, StoreError> {
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }
        let message = response.text().await.unwrap_or_default();
        Err(StoreError::Status {
            status: status.as_u16(),
            message,
        })
    }
}

#[async_trait]
impl SeriesStore for HttpSeriesStore {
    fn name(&self) -> &'static str {
        "http"
    }

    async fn list_series(&self) -> Result<Vec<SeriesInfo>, StoreError> {
        let mut series = Vec::new();
        let mut cursor: Option<String> = None;
        let mut pages = 0usize;

        loop {
            let mut query = vec![("limit", self.page_size.to_string())];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let response = self
                .client
                .get(self.url("timeseries"))
                .query(&query)
                .send()
                .await?;
            let page: ListResponse = Self::check(response).await?.json().await?;
            pages += 1;

            for item in page.items {
                // Series without an identifier cannot be fed by any column.
                let Some(id) = item.external_id.as_deref().and_then(|id| SeriesId::new(id).ok())
                else {
                    continue;
                };
                series.push(SeriesInfo {
                    id,
                    name: item.name,
                });
            }

            match page.next_cursor {
                Some(next) if !next.is_empty() => cursor = Some(next),
                _ => break,
            }
        }

        debug!("Listed {} series in {} pages", series.len(), pages);
        Ok(series)
    }

    async fn create_series(&self, series: &NewSeries) -> Result<(), StoreError> {
        let body = Items {
            items: [CreateItem {
                external_id: &series.id,
                name: &series.name,
                description: &series.description,
            }],
        };

        let response = self
            .client
            .post(self.url("timeseries"))
            .json(&body)
            .send()
            .await?;

        if response.status() == StatusCode::CONFLICT {
            warn!("Series {} already exists, continuing", series.id);
            return Ok(());
        }
        Self::check(response).await?;
        Ok(())
    }

    async fn write_batch(&self, batch: &Batch) -> Result<(), StoreError> {
        let items: Vec<DataItem<'_>> = batch
            .entries()
            .iter()
            .map(|entry| DataItem {
                external_id: &entry.id,
                datapoints: &entry.points,
            })
            .collect();

        let response = self
            .client
            .post(self.url("timeseries/data"))
            .json(&Items { items })
            .send()
            .await?;
        Self::check(response).await?;
        Ok(())
    }
}
