//! Listing ids of entities that already exist remotely
//!
//! Used when a run does not ingest an entity type itself but still needs its
//! ids, e.g. students seeded by an earlier run.

use reqwest::Client;
use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, info, warn};

use seed_common::{IdentifierSet, RemoteId};

use crate::dispatch::Dispatcher;

/// One page of a `GET <collection>?page=P&size=S` listing
#[derive(Debug, Deserialize)]
struct Page {
    #[serde(default)]
    content: Vec<Value>,
    /// Pages that omit the flag are treated as the last one
    #[serde(default = "default_last")]
    last: bool,
}

fn default_last() -> bool {
    true
}

/// Walks a paginated collection and gathers every entity id
#[derive(Debug, Clone)]
pub struct PaginatedFetcher {
    client: Client,
    page_size: usize,
}

impl PaginatedFetcher {
    /// Share the dispatcher's HTTP client (and its per-request timeout)
    pub fn new(dispatcher: &Dispatcher, page_size: usize) -> Self {
        Self {
            client: dispatcher.client().clone(),
            page_size: page_size.max(1),
        }
    }

    /// Fetch all ids of a collection, in page order.
    ///
    /// The walk starts at page 0 and ends at the page flagged `last`. A failed
    /// page is not retried: the ids gathered so far are returned as-is.
    pub async fn fetch_all_ids(&self, endpoint: &str) -> IdentifierSet {
        let mut ids = IdentifierSet::new();
        let mut page_number = 0usize;

        loop {
            let page = match self.fetch_page(endpoint, page_number).await {
                Ok(page) => page,
                Err(reason) => {
                    warn!(
                        endpoint,
                        page = page_number,
                        collected = ids.len(),
                        %reason,
                        "Page fetch failed, returning partial ids"
                    );
                    break;
                },
            };

            let before = ids.len();
            ids.extend(page.content.iter().filter_map(RemoteId::from_entity));
            debug!(endpoint, page = page_number, added = ids.len() - before, "Fetched page");

            if page.last {
                break;
            }
            if page.content.is_empty() {
                warn!(endpoint, page = page_number, "Empty page not flagged last, stopping");
                break;
            }
            page_number += 1;
        }

        info!(endpoint, pages = page_number + 1, ids = ids.len(), "Fetched remote ids");
        ids
    }

    async fn fetch_page(&self, endpoint: &str, page: usize) -> Result<Page, String> {
        let response = self
            .client
            .get(endpoint)
            .query(&[("page", page), ("size", self.page_size)])
            .send()
            .await
            .map_err(|e| e.to_string())?;

        let status = response.status();
        if !status.is_success() {
            return Err(format!("unexpected status {}", status));
        }

        response.json::<Page>().await.map_err(|e| e.to_string())
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_page_without_last_flag_is_final() {
        let page: Page = serde_json::from_value(json!({"content": [{"id": 1}]})).unwrap();
        assert!(page.last);
        assert_eq!(page.content.len(), 1);
    }

    #[test]
    fn test_page_without_content_is_empty() {
        let page: Page = serde_json::from_value(json!({"last": false})).unwrap();
        assert!(!page.last);
        assert!(page.content.is_empty());
    }
}
