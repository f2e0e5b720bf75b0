//! Cursor pagination over `{"results": [...], "next": <url|null>}` responses.

use super::client::ServiceClient;
use crate::config::NetworkConfig;
use crate::item::RemoteItem;
use crate::{LaunchkitError, Result};
use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashSet;
use tracing::debug;

/// One page of a paginated listing.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Page {
    #[serde(default)]
    pub results: Vec<RemoteItem>,
    /// Absolute URL of the following page; `None` on the last one.
    #[serde(default)]
    pub next: Option<String>,
}

/// Anything that can GET one page by absolute URL.
#[async_trait]
pub trait PageSource: Send + Sync {
    async fn fetch_page(&self, url: &str) -> Result<Page>;
}

#[async_trait]
impl PageSource for ServiceClient {
    async fn fetch_page(&self, url: &str) -> Result<Page> {
        self.get_json(url).await
    }
}

/// Follow `next` cursors from `first_url` and concatenate every page.
///
/// Any failing page aborts the whole listing; no partial result is returned.
pub async fn fetch_all<S>(source: &S, first_url: &str) -> Result<Vec<RemoteItem>>
where
    S: PageSource + ?Sized,
{
    let mut items = Vec::new();
    let mut seen = HashSet::new();
    let mut next = Some(first_url.to_string());
    let mut pages: u32 = 0;

    while let Some(url) = next.take() {
        if pages >= NetworkConfig::MAX_PAGES {
            return Err(LaunchkitError::PaginationLimit {
                url: first_url.to_string(),
                max_pages: NetworkConfig::MAX_PAGES,
            });
        }
        if !seen.insert(url.clone()) {
            return Err(LaunchkitError::Other(format!(
                "Pagination cursor repeated: {}",
                url
            )));
        }

        let page = source.fetch_page(&url).await?;
        pages += 1;
        debug!("Fetched page {} ({} items) from {}", pages, page.results.len(), url);

        items.extend(page.results);
        next = page.next.filter(|n| !n.is_empty());
    }

    Ok(items)
}

/// Append a page-size parameter to `url`, keeping any existing query.
pub fn with_page_size(url: &str, param: &str, page_size: u32) -> Result<String> {
    let mut parsed = url::Url::parse(url).map_err(|e| LaunchkitError::Config {
        message: format!("Invalid URL {}: {}", url, e),
    })?;
    parsed
        .query_pairs_mut()
        .append_pair(param, &page_size.to_string());
    Ok(parsed.into())
}

/// A "list all" request bound to one service endpoint.
#[derive(Debug, Clone)]
pub struct PaginatedFetcher {
    client: ServiceClient,
    path: String,
    page_param: &'static str,
    page_size: u32,
}

impl PaginatedFetcher {
    /// `page_param` is the service's page-size parameter (`limit`, `page_size`).
    pub fn new(client: ServiceClient, path: impl Into<String>, page_param: &'static str) -> Self {
        Self {
            client,
            path: path.into(),
            page_param,
            page_size: NetworkConfig::DEFAULT_PAGE_SIZE,
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size;
        self
    }

    pub fn first_url(&self) -> Result<String> {
        with_page_size(&self.client.url(&self.path), self.page_param, self.page_size)
    }

    pub async fn fetch_all(&self) -> Result<Vec<RemoteItem>> {
        let first = self.first_url()?;
        fetch_all(&self.client, &first).await
    }
}
