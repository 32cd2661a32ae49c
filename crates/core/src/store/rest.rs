//! REST-backed event store
//!
//! Client for the hosted backend's PostgREST-style row API. Filters are
//! encoded as `column=op.value` query parameters and writes carry the
//! project's anon key plus a bearer token.

use super::{EventQuery, EventStore, SortOrder};
use crate::types::{PageViewEvent, VisitorSessionRecord};
use crate::{Result, SitepulseError};
use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use serde_json::json;
use std::time::Duration;

/// REST store configuration
#[derive(Debug, Clone)]
pub struct RestStoreConfig {
    /// Backend project base URL, e.g. `https://project.example.co`
    pub base_url: String,
    /// Anonymous API key sent with every request
    pub api_key: String,
    /// Request timeout
    pub timeout: Duration,
}

impl RestStoreConfig {
    pub fn new(base_url: String, api_key: String) -> Self {
        Self {
            base_url,
            api_key,
            ..Self::default()
        }
    }
}

impl Default for RestStoreConfig {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:54321".to_string(),
            api_key: String::new(),
            timeout: Duration::from_secs(30),
        }
    }
}

/// Remote event store client
#[derive(Debug, Clone)]
pub struct RestStore {
    config: RestStoreConfig,
    client: reqwest::Client,
}

impl RestStore {
    /// Create a new REST store client
    pub fn new(config: RestStoreConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| SitepulseError::network(format!("failed to build HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    fn collection_url(&self, collection: &str) -> String {
        format!(
            "{}/rest/v1/{}",
            self.config.base_url.trim_end_matches('/'),
            collection
        )
    }

    fn request(&self, req: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        req.header("apikey", &self.config.api_key)
            .bearer_auth(&self.config.api_key)
    }

    /// Check whether the backend row API answers at all
    pub async fn health_check(&self) -> Result<bool> {
        let url = format!("{}/rest/v1/", self.config.base_url.trim_end_matches('/'));
        match self.request(self.client.get(&url)).send().await {
            Ok(response) => Ok(response.status().is_success()),
            Err(e) => {
                tracing::warn!("event store health check failed: {}", e);
                Ok(false)
            }
        }
    }

    async fn insert_rows(&self, collection: &str, body: serde_json::Value) -> Result<()> {
        let response = self
            .request(self.client.post(self.collection_url(collection)))
            .header("Prefer", "return=minimal")
            .json(&body)
            .send()
            .await
            .map_err(|e| {
                SitepulseError::network(format!("failed to insert into {}: {}", collection, e))
            })?;

        if !response.status().is_success() {
            return Err(SitepulseError::store(format!(
                "insert into {} returned {}",
                collection,
                response.status()
            )));
        }
        Ok(())
    }
}

fn iso(ts: DateTime<Utc>) -> String {
    ts.to_rfc3339_opts(SecondsFormat::Millis, true)
}

#[async_trait]
impl EventStore for RestStore {
    async fn insert_page_view(&self, event: PageViewEvent) -> Result<()> {
        self.insert_rows("page_views", json!([event])).await
    }

    async fn query_page_views(&self, query: &EventQuery) -> Result<Vec<PageViewEvent>> {
        let mut params: Vec<(String, String)> = vec![("select".to_string(), "*".to_string())];
        if let Some(since) = query.since {
            params.push(("viewed_at".to_string(), format!("gte.{}", iso(since))));
        }
        if let Some(until) = query.until {
            params.push(("viewed_at".to_string(), format!("lte.{}", iso(until))));
        }
        let direction = match query.order {
            SortOrder::Ascending => "asc",
            SortOrder::Descending => "desc",
        };
        params.push(("order".to_string(), format!("viewed_at.{}", direction)));
        if let Some(limit) = query.limit {
            params.push(("limit".to_string(), limit.to_string()));
        }

        let response = self
            .request(self.client.get(self.collection_url("page_views")))
            .query(&params)
            .send()
            .await
            .map_err(|e| SitepulseError::network(format!("failed to query page views: {}", e)))?;

        if !response.status().is_success() {
            return Err(SitepulseError::store(format!(
                "page view query returned {}",
                response.status()
            )));
        }

        response
            .json::<Vec<PageViewEvent>>()
            .await
            .map_err(|e| SitepulseError::store(format!("failed to parse page views: {}", e)))
    }

    async fn find_visitor_session(
        &self,
        session_id: &str,
    ) -> Result<Option<VisitorSessionRecord>> {
        let filter = format!("eq.{}", session_id);
        let response = self
            .request(self.client.get(self.collection_url("visitor_sessions")))
            .query(&[
                ("select", "*"),
                ("session_id", filter.as_str()),
                ("limit", "1"),
            ])
            .send()
            .await
            .map_err(|e| {
                SitepulseError::network(format!("failed to query visitor session: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(SitepulseError::store(format!(
                "visitor session query returned {}",
                response.status()
            )));
        }

        let mut rows: Vec<VisitorSessionRecord> = response.json().await.map_err(|e| {
            SitepulseError::store(format!("failed to parse visitor sessions: {}", e))
        })?;
        Ok(if rows.is_empty() {
            None
        } else {
            Some(rows.remove(0))
        })
    }

    async fn insert_visitor_session(&self, record: VisitorSessionRecord) -> Result<()> {
        self.insert_rows("visitor_sessions", json!([record])).await
    }

    async fn touch_visitor_session(
        &self,
        session_id: &str,
        last_seen: DateTime<Utc>,
    ) -> Result<()> {
        let filter = format!("eq.{}", session_id);
        let response = self
            .request(self.client.patch(self.collection_url("visitor_sessions")))
            .query(&[("session_id", filter.as_str())])
            .header("Prefer", "return=minimal")
            .json(&json!({ "last_seen": iso(last_seen) }))
            .send()
            .await
            .map_err(|e| {
                SitepulseError::network(format!("failed to update visitor session: {}", e))
            })?;

        if !response.status().is_success() {
            return Err(SitepulseError::store(format!(
                "visitor session update returned {}",
                response.status()
            )));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_collection_url() {
        let store = RestStore::new(RestStoreConfig {
            base_url: "https://project.example.co/".to_string(),
            ..RestStoreConfig::default()
        })
        .unwrap();

        assert_eq!(
            store.collection_url("page_views"),
            "https://project.example.co/rest/v1/page_views"
        );
    }

    #[test]
    fn test_iso_formatting() {
        let ts = DateTime::parse_from_rfc3339("2026-08-01T12:30:45.120Z")
            .unwrap()
            .with_timezone(&Utc);
        assert_eq!(iso(ts), "2026-08-01T12:30:45.120Z");
    }

    #[test]
    fn test_default_config() {
        let config = RestStoreConfig::default();
        assert_eq!(config.timeout, Duration::from_secs(30));
        assert!(config.api_key.is_empty());
    }
}
