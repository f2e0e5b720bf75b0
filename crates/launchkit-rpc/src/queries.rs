//! In-flight query tracking.
//!
//! Each plugin has at most one live query per lane (triggered or global).
//! Starting a new one cancels its predecessor, which is how keystrokes
//! supersede each other.

use launchkit_core::CancellationToken;
use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
struct Lane {
    plugin_id: String,
    global: bool,
}

#[derive(Debug)]
struct Running {
    query_id: String,
    token: CancellationToken,
}

#[derive(Debug, Default)]
pub struct QueryRegistry {
    running: Mutex<HashMap<Lane, Running>>,
}

impl QueryRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register a query, cancelling whatever was running in the same lane.
    ///
    /// Returns the query id (generated when the caller did not supply one)
    /// and the token the plugin should observe.
    pub fn begin(
        &self,
        plugin_id: &str,
        global: bool,
        query_id: Option<&str>,
    ) -> (String, CancellationToken) {
        let query_id = query_id
            .map(String::from)
            .unwrap_or_else(|| uuid::Uuid::new_v4().to_string());
        let token = CancellationToken::new();
        let lane = Lane {
            plugin_id: plugin_id.to_string(),
            global,
        };

        let previous = self.lock().insert(
            lane,
            Running {
                query_id: query_id.clone(),
                token: token.clone(),
            },
        );
        if let Some(previous) = previous {
            debug!("Query {} superseded by {}", previous.query_id, query_id);
            previous.token.cancel();
        }

        (query_id, token)
    }

    /// Forget a finished query. A newer query in the same lane is left alone.
    pub fn finish(&self, plugin_id: &str, global: bool, query_id: &str) {
        let lane = Lane {
            plugin_id: plugin_id.to_string(),
            global,
        };
        let mut running = self.lock();
        if running.get(&lane).is_some_and(|r| r.query_id == query_id) {
            running.remove(&lane);
        }
    }

    /// Cancel a query by id. Returns `false` if it already finished.
    pub fn cancel(&self, query_id: &str) -> bool {
        let mut running = self.lock();
        let lane = running
            .iter()
            .find(|(_, r)| r.query_id == query_id)
            .map(|(lane, _)| lane.clone());

        match lane.and_then(|lane| running.remove(&lane)) {
            Some(r) => {
                r.token.cancel();
                true
            }
            None => false,
        }
    }

    /// Cancel everything, used on shutdown.
    pub fn cancel_all(&self) {
        for (_, r) in self.lock().drain() {
            r.token.cancel();
        }
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<Lane, Running>> {
        self.running.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
