//! Cache entry, validity state and per-plugin cache settings.

use crate::config::CacheDefaults;
use crate::item::RemoteItem;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The last successfully fetched list plus its validity window.
///
/// Always replaced wholesale; never patched in place.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry {
    pub items: Vec<RemoteItem>,
    pub fetched_at: DateTime<Utc>,
    pub valid_until: DateTime<Utc>,
}

impl CacheEntry {
    pub fn new(items: Vec<RemoteItem>, fetched_at: DateTime<Utc>, ttl: Duration) -> Self {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or(chrono::Duration::MAX);
        let valid_until = fetched_at
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);
        Self {
            items,
            fetched_at,
            valid_until,
        }
    }

    /// Stamp `items` as fetched now.
    pub fn fetched_now(items: Vec<RemoteItem>, ttl: Duration) -> Self {
        Self::new(items, Utc::now(), ttl)
    }

    pub fn is_fresh_at(&self, now: DateTime<Utc>) -> bool {
        now < self.valid_until
    }

    pub fn is_fresh(&self) -> bool {
        self.is_fresh_at(Utc::now())
    }

    /// Same items, already stale.
    pub fn expired(&self) -> Self {
        Self {
            items: self.items.clone(),
            fetched_at: self.fetched_at,
            valid_until: self.fetched_at.min(Utc::now()),
        }
    }

    pub fn age(&self) -> chrono::Duration {
        Utc::now().signed_duration_since(self.fetched_at)
    }
}

/// Where a cache stands relative to its TTL.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CacheState {
    /// Nothing stored.
    Cold,
    Fresh,
    Stale,
}

impl CacheState {
    pub fn of(entry: Option<&CacheEntry>) -> Self {
        match entry {
            None => CacheState::Cold,
            Some(entry) if entry.is_fresh() => CacheState::Fresh,
            Some(_) => CacheState::Stale,
        }
    }
}

/// Per-plugin cache settings.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheConfig {
    pub enabled: bool,
    pub ttl: Duration,
    pub auto_refresh: bool,
    pub refresh_interval: Duration,
    /// Serve a stale entry when a refresh fails instead of the error.
    pub serve_stale_on_error: bool,
    /// Total fetch attempts per refresh; 1 disables retry.
    pub fetch_attempts: u32,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            ttl: Duration::from_secs(CacheDefaults::TTL_MINUTES * 60),
            auto_refresh: false,
            refresh_interval: CacheDefaults::REFRESH_INTERVAL,
            serve_stale_on_error: false,
            fetch_attempts: CacheDefaults::FETCH_ATTEMPTS,
        }
    }
}

impl CacheConfig {
    pub fn enabled(ttl: Duration) -> Self {
        Self {
            enabled: true,
            ttl,
            ..Self::default()
        }
    }

    pub fn with_ttl_minutes(mut self, minutes: u64) -> Self {
        self.ttl = Duration::from_secs(minutes.saturating_mul(60));
        self
    }

    pub fn with_auto_refresh(mut self, auto_refresh: bool) -> Self {
        self.auto_refresh = auto_refresh;
        self
    }

    pub fn with_refresh_interval(mut self, interval: Duration) -> Self {
        self.refresh_interval = interval;
        self
    }

    pub fn with_serve_stale_on_error(mut self, serve_stale: bool) -> Self {
        self.serve_stale_on_error = serve_stale;
        self
    }

    pub fn with_fetch_attempts(mut self, attempts: u32) -> Self {
        self.fetch_attempts = attempts.max(1);
        self
    }
}
