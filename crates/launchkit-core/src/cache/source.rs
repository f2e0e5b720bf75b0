//! Where a [`super::CacheSession`] gets its list from.

use crate::item::RemoteItem;
use crate::network::{PaginatedFetcher, ServiceClient};
use crate::Result;
use async_trait::async_trait;
use serde_json::Value;

/// One logical "list all X" against a remote service.
#[async_trait]
pub trait ListSource: Send + Sync {
    async fn fetch_all(&self) -> Result<Vec<RemoteItem>>;
}

#[async_trait]
impl ListSource for PaginatedFetcher {
    async fn fetch_all(&self) -> Result<Vec<RemoteItem>> {
        PaginatedFetcher::fetch_all(self).await
    }
}

/// An endpoint that returns the whole list as one bare JSON array.
#[derive(Debug, Clone)]
pub struct ArrayEndpoint {
    client: ServiceClient,
    path: String,
}

impl ArrayEndpoint {
    pub fn new(client: ServiceClient, path: impl Into<String>) -> Self {
        Self {
            client,
            path: path.into(),
        }
    }
}

#[async_trait]
impl ListSource for ArrayEndpoint {
    async fn fetch_all(&self) -> Result<Vec<RemoteItem>> {
        let values: Vec<Value> = self.client.get_json(&self.path).await?;
        Ok(values.into_iter().filter_map(RemoteItem::from_value).collect())
    }
}
