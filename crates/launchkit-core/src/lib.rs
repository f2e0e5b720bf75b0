//! Launchkit Core - remote list cache and host interface for launcher plugins.
//!
//! This crate holds everything a launcher plugin needs to front a REST API:
//! an HTTP client with a uniform timeout, cursor pagination, a durable list
//! cache with TTL validity and background refresh, refresh-after-mutation,
//! a substring filter, a keystroke debounce gate, typed settings and the
//! desktop side effects (browser, clipboard, detached processes).
//!
//! The plugins themselves live in the `launchkit-plugins` crate.
//!
//! # Example
//!
//! ```rust,ignore
//! use launchkit_core::cache::{CacheConfig, CacheSession, JsonFileStore};
//! use launchkit_core::network::{Auth, HttpClient, PaginatedFetcher, ServiceClient};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> launchkit_core::Result<()> {
//!     let http = Arc::new(HttpClient::new("org.launchkit.linkding")?);
//!     let client = ServiceClient::new(http, "http://localhost:9090", Auth::token("..."));
//!     let bookmarks = PaginatedFetcher::new(client, "/api/bookmarks/", "limit");
//!
//!     let session = CacheSession::new(
//!         "linkding",
//!         Arc::new(bookmarks),
//!         Arc::new(JsonFileStore::new("/tmp/linkding.json")),
//!         CacheConfig::enabled(Duration::from_secs(3600)),
//!     );
//!
//!     let items = session.get_results().await?;
//!     println!("{} bookmarks", items.len());
//!     Ok(())
//! }
//! ```

pub mod cache;
pub mod cancel;
pub mod config;
pub mod debounce;
pub mod error;
pub mod host;
pub mod item;
pub mod network;
pub mod platform;
pub mod query;
pub mod search;
pub mod settings;

// Re-export commonly used types
pub use cache::{CacheConfig, CacheEntry, CacheSession, CacheState, CacheStore, ListSource};
pub use cancel::{CancellationToken, CancelledError};
pub use debounce::{await_stable, Gate};
pub use error::{LaunchkitError, Result};
pub use host::{
    ActionCommand, ConfigField, DisplayItem, FieldKind, ItemAction, Plugin, PluginMetadata, Query,
};
pub use item::{FieldSchema, ItemSchema, RemoteItem};
pub use platform::{Desktop, SystemDesktop};
pub use query::QueryRunner;
pub use settings::{ConfigStore, JsonConfigStore, MemoryConfigStore, Settings};
