use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use reqwest::Client;
use serde::Deserialize;

use super::{SignalQuery, SignalSource};
use crate::error::SourceError;
use crate::models::SignalItem;

pub const DEFAULT_ENDPOINT: &str = "https://hn.algolia.com/api/v1";

const SOURCE_NAME: &str = "Hacker News";

#[derive(Debug, Deserialize)]
struct SearchResponse {
    hits: Vec<Hit>,
}

#[derive(Debug, Deserialize)]
struct Hit {
    #[serde(default)]
    title: Option<String>,
    #[serde(default)]
    url: Option<String>,
    #[serde(default)]
    author: Option<String>,
    #[serde(default)]
    created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    created_at_i: Option<i64>,
    #[serde(default)]
    points: Option<i64>,
}

impl Hit {
    fn into_signal(self) -> Option<SignalItem> {
        let title = self.title.map(|t| t.trim().to_string()).filter(|t| !t.is_empty())?;
        let created_at = self
            .created_at
            .or_else(|| self.created_at_i.and_then(|ts| DateTime::<Utc>::from_timestamp(ts, 0)))?;

        Some(SignalItem {
            title,
            url: self.url.filter(|u| !u.trim().is_empty()),
            author: self.author.filter(|a| !a.trim().is_empty()),
            created_at,
            points: self.points,
        })
    }
}

/// Story search against the Algolia Hacker News API
pub struct HackerNewsSource {
    client: Client,
    endpoint: String,
}

impl HackerNewsSource {
    pub fn new(endpoint: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(10))
            .user_agent("Mozilla/5.0 (compatible; LatestPulse/1.0)")
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            client,
            endpoint: endpoint.into().trim_end_matches('/').to_string(),
        })
    }

    /// A single page of up to `limit` stories
    fn search_url(&self, query: &SignalQuery) -> String {
        let window = format!("created_at_i>{}", query.since.timestamp());
        format!(
            "{}/search?query={}&tags=story&numericFilters={}&hitsPerPage={}",
            self.endpoint,
            urlencoding::encode(&query.terms),
            urlencoding::encode(&window),
            query.limit.max(1)
        )
    }

    async fn search(&self, query: &SignalQuery) -> Result<SearchResponse, SourceError> {
        let response = self
            .client
            .get(self.search_url(query))
            .send()
            .await
            .map_err(|e| SourceError::Request {
                source_name: SOURCE_NAME.to_string(),
                message: e.to_string(),
            })?;

        let status = response.status();
        if !status.is_success() {
            return Err(SourceError::Status {
                source_name: SOURCE_NAME.to_string(),
                status: status.as_u16(),
            });
        }

        response
            .json::<SearchResponse>()
            .await
            .map_err(|e| SourceError::Decode {
                source_name: SOURCE_NAME.to_string(),
                message: e.to_string(),
            })
    }
}

fn parse_hits(hits: Vec<Hit>) -> Vec<SignalItem> {
    hits.into_iter().filter_map(Hit::into_signal).collect()
}

#[async_trait]
impl SignalSource for HackerNewsSource {
    fn name(&self) -> &str {
        SOURCE_NAME
    }

    async fn fetch(&self, query: &SignalQuery) -> Result<Vec<SignalItem>, SourceError> {
        let response = self.search(query).await?;
        let mut items = parse_hits(response.hits);
        items.truncate(query.limit);
        Ok(items)
    }
}
