//! Debounced, cancellation-aware execution of remote-backed queries.

use crate::config::DebounceConfig;
use crate::debounce::await_stable;
use crate::host::{DisplayItem, Query};
use crate::Result;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Runs query handlers behind the debounce gate.
#[derive(Debug, Clone, Copy)]
pub struct QueryRunner {
    delay: Duration,
}

impl Default for QueryRunner {
    fn default() -> Self {
        Self {
            delay: DebounceConfig::DELAY,
        }
    }
}

impl QueryRunner {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }

    pub fn delay(&self) -> Duration {
        self.delay
    }

    /// Wait out the debounce, then run `work`.
    ///
    /// Returns no items if the query is cancelled during the wait (and `work`
    /// never runs) or by the time `work` finishes. Errors become a single
    /// informational item.
    pub async fn run<F, Fut>(&self, query: &Query, work: F) -> Vec<DisplayItem>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = Result<Vec<DisplayItem>>>,
    {
        if !await_stable(query.token(), self.delay).await.should_proceed() {
            return Vec::new();
        }

        let result = work().await;

        if !query.is_valid() {
            debug!("Discarding results of superseded query {:?}", query.trimmed());
            return Vec::new();
        }

        match result {
            Ok(items) => items,
            Err(e) => {
                warn!("Query {:?} failed: {}", query.trimmed(), e);
                vec![DisplayItem::notice("error", e.user_message(), e.to_string())]
            }
        }
    }
}
