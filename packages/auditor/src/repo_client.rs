//! Read-only atproto repository client
//!
//! Lists a subject's verification records through the public
//! `com.atproto.repo.listRecords` XRPC endpoint. No session is needed for
//! reads. Record values are returned as raw JSON so one malformed record
//! cannot fail the whole listing.

use std::time::Duration;

use eyre::{eyre, Result, WrapErr};
use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, warn};

use claims_rs::records::rkey_from_uri;

/// Records requested per page (XRPC maximum)
const PAGE_LIMIT: u32 = 100;

/// Pages fetched before giving up on a listing
const MAX_PAGES: usize = 50;

/// One entry of a `listRecords` response
#[derive(Debug, Clone, Deserialize)]
pub struct RecordEntry {
    pub uri: String,
    #[serde(default)]
    pub cid: String,
    pub value: Value,
}

impl RecordEntry {
    pub fn rkey(&self) -> Option<&str> {
        rkey_from_uri(&self.uri)
    }
}

#[derive(Debug, Deserialize)]
struct ListRecordsPage {
    records: Vec<RecordEntry>,
    cursor: Option<String>,
}

pub struct RepoClient {
    client: Client,
    pds_url: String,
}

impl RepoClient {
    pub fn new(pds_url: &str, request_timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(request_timeout)
            .build()
            .wrap_err("Failed to build HTTP client")?;

        Ok(Self {
            client,
            pds_url: pds_url.trim_end_matches('/').to_string(),
        })
    }

    pub fn pds_url(&self) -> &str {
        &self.pds_url
    }

    /// List every record in `collection` of `repo`, following cursors.
    pub async fn list_records(&self, repo: &str, collection: &str) -> Result<Vec<RecordEntry>> {
        let url = format!("{}/xrpc/com.atproto.repo.listRecords", self.pds_url);
        let mut records = Vec::new();
        let mut cursor: Option<String> = None;

        for page_num in 0..MAX_PAGES {
            let mut query = vec![
                ("repo", repo.to_string()),
                ("collection", collection.to_string()),
                ("limit", PAGE_LIMIT.to_string()),
            ];
            if let Some(c) = &cursor {
                query.push(("cursor", c.clone()));
            }

            let response = self
                .client
                .get(&url)
                .query(&query)
                .send()
                .await
                .map_err(|e| eyre!("listRecords request failed: {}", e))?;

            if !response.status().is_success() {
                let status = response.status();
                let body = response.text().await.unwrap_or_default();
                return Err(eyre!("listRecords failed with status {}: {}", status, body));
            }

            let page: ListRecordsPage = response
                .json()
                .await
                .map_err(|e| eyre!("Failed to parse listRecords response: {}", e))?;

            debug!(
                repo = repo,
                page = page_num,
                count = page.records.len(),
                "Fetched record page"
            );

            let page_len = page.records.len();
            records.extend(page.records);

            match page.cursor {
                Some(next) if page_len > 0 => cursor = Some(next),
                _ => return Ok(records),
            }
        }

        warn!(
            repo = repo,
            collection = collection,
            fetched = records.len(),
            max_pages = MAX_PAGES,
            "Page cap reached, listing truncated"
        );
        Ok(records)
    }
}
