//! Remote list cache.
//!
//! - [`CacheStore`]: durable single-writer storage of the last fetched list
//! - [`CacheSession`]: per-read serve-or-refetch decisions and the optional
//!   background refresh timer
//! - [`CacheSession::mutate`]: refresh after a successful remote mutation
//! - [`LookupCache`]: id → name lookups with no TTL

pub mod atomic;
mod entry;
mod lookup;
mod mutation;
mod session;
mod source;
mod store;

pub use entry::{CacheConfig, CacheEntry, CacheState};
pub use lookup::LookupCache;
pub use session::{CacheSession, Items};
pub use source::{ArrayEndpoint, ListSource};
pub use store::{CacheStore, JsonFileStore, MemoryStore};
