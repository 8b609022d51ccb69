//! Catalog search collaborator.
//!
//! The harvest loop and the synchronizer only ever talk to the
//! [`CatalogClient`] trait; `HttpCatalog` implements it against the remote
//! catalog's search and metadata endpoints, and tests substitute mocks.

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, SecondsFormat, Utc};
use reqwest::Client;
use serde::Deserialize;

use lodgraph::identifier::encode_id;

use crate::errors::{IngestError, Result};
use crate::sysmeta::SystemMetadata;
use crate::xml::Element;

/// One record descriptor from the catalog index.
#[derive(Debug, Clone)]
pub struct CatalogRecord {
    pub identifier: String,
    pub date_modified: DateTime<Utc>,
    pub format_id: Option<String>,
    pub size: Option<u64>,
}

/// Modification-time range query, ascending by modification time.
#[derive(Debug, Clone)]
pub struct SearchQuery {
    /// Exclusive lower bound.
    pub modified_after: DateTime<Utc>,
    /// Inclusive upper bound.
    pub modified_before: DateTime<Utc>,
    pub page_size: usize,
    /// Zero-based page index; pagination is the caller's responsibility.
    pub page: usize,
}

#[derive(Debug, Clone, Default)]
pub struct SearchPage {
    pub records: Vec<CatalogRecord>,
    pub has_more: bool,
}

#[async_trait]
pub trait CatalogClient: Send + Sync {
    /// Queries the catalog index for records modified inside the range.
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage>;

    /// Fetches the system-metadata descriptor for one identifier.
    async fn system_metadata(&self, pid: &str) -> Result<SystemMetadata>;

    /// Fetches the raw science-metadata document for one identifier.
    async fn science_metadata(&self, pid: &str) -> Result<String>;

    /// Fetches descriptors for the package members of a dataset.
    async fn package_members(&self, pid: &str) -> Result<Vec<SystemMetadata>>;
}

/// Catalog client over the remote HTTP API.
pub struct HttpCatalog {
    client: Client,
    base_url: String,
}

impl HttpCatalog {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .pool_max_idle_per_host(10)
            .pool_idle_timeout(Duration::from_secs(30))
            .connect_timeout(Duration::from_secs(10))
            .timeout(Duration::from_secs(60))
            .build()?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    async fn get_text(&self, url: &str) -> Result<String> {
        let response = self.client.get(url).send().await?;
        if !response.status().is_success() {
            return Err(IngestError::Internal(format!(
                "catalog returned HTTP {} for {url}",
                response.status()
            )));
        }
        Ok(response.text().await?)
    }
}

#[derive(Deserialize)]
struct SearchResponse {
    #[serde(rename = "numFound")]
    num_found: usize,
    start: usize,
    docs: Vec<SearchDoc>,
}

#[derive(Deserialize)]
struct SearchDoc {
    identifier: String,
    #[serde(rename = "dateModified")]
    date_modified: String,
    #[serde(rename = "formatId")]
    format_id: Option<String>,
    size: Option<u64>,
}

#[async_trait]
impl CatalogClient for HttpCatalog {
    async fn search(&self, query: &SearchQuery) -> Result<SearchPage> {
        let from = query
            .modified_after
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let to = query
            .modified_before
            .to_rfc3339_opts(SecondsFormat::Secs, true);
        let start = (query.page * query.page_size).to_string();
        let rows = query.page_size.to_string();

        let response = self
            .client
            .get(format!("{}/query", self.base_url))
            .query(&[
                ("fromDate", from.as_str()),
                ("toDate", to.as_str()),
                ("sort", "dateModified asc"),
                ("start", start.as_str()),
                ("rows", rows.as_str()),
            ])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(IngestError::Internal(format!(
                "catalog search returned HTTP {}",
                response.status()
            )));
        }

        let body: SearchResponse = response.json().await?;
        let mut records = Vec::with_capacity(body.docs.len());
        for doc in &body.docs {
            match DateTime::parse_from_rfc3339(&doc.date_modified) {
                Ok(modified) => records.push(CatalogRecord {
                    identifier: doc.identifier.clone(),
                    date_modified: modified.with_timezone(&Utc),
                    format_id: doc.format_id.clone(),
                    size: doc.size,
                }),
                Err(err) => {
                    log::warn!(
                        "skipping record {} with unparseable dateModified '{}': {err}",
                        doc.identifier,
                        doc.date_modified
                    );
                }
            }
        }

        Ok(SearchPage {
            has_more: body.start + body.docs.len() < body.num_found,
            records,
        })
    }

    async fn system_metadata(&self, pid: &str) -> Result<SystemMetadata> {
        let url = format!("{}/meta/{}", self.base_url, encode_id(pid));
        SystemMetadata::from_xml(&self.get_text(&url).await?)
    }

    async fn science_metadata(&self, pid: &str) -> Result<String> {
        let url = format!("{}/object/{}", self.base_url, encode_id(pid));
        self.get_text(&url).await
    }

    async fn package_members(&self, pid: &str) -> Result<Vec<SystemMetadata>> {
        let url = format!("{}/package/{}", self.base_url, encode_id(pid));
        let root = Element::parse(&self.get_text(&url).await?)?;
        root.children_named("systemMetadata")
            .map(SystemMetadata::from_element)
            .collect()
    }
}
