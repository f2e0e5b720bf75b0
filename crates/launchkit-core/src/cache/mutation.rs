//! Refresh-after-write for remote mutations.
//!
//! Archiving a bookmark or deleting a series changes the remote list, so a
//! successful mutation is followed by an unconditional refresh. A failed
//! mutation leaves the cache untouched.

use super::session::CacheSession;
use crate::Result;
use std::future::Future;
use tracing::{info, warn};

impl CacheSession {
    /// Run `operation`; on success repopulate the cache.
    ///
    /// The operation's own error is returned as-is. If only the follow-up
    /// refresh fails, the mutation still succeeds and the entry is expired so
    /// the next read refetches.
    pub async fn mutate<F, Fut, T>(&self, operation: F) -> Result<T>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<T>>,
    {
        let value = operation().await?;

        if !self.config().enabled {
            return Ok(value);
        }

        match self.refresh().await {
            Ok(items) => info!(
                "Refreshed {} after mutation ({} items)",
                self.name(),
                items.len()
            ),
            Err(e) => {
                warn!("Refresh of {} after mutation failed: {}", self.name(), e);
                self.expire();
            }
        }

        Ok(value)
    }
}
