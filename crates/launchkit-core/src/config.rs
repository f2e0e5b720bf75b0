//! Centralized configuration constants for launchkit.
//!
//! Runtime, per-plugin settings live in [`crate::settings`]; this module only
//! holds the compile-time defaults they fall back to.

use std::time::Duration;

/// Application-level configuration.
pub struct AppConfig;

impl AppConfig {
    pub const APP_NAME: &'static str = "launchkit";
    pub const USER_AGENT_PREFIX: &'static str = "org.launchkit";
}

/// Network-related configuration.
pub struct NetworkConfig;

impl NetworkConfig {
    /// Applied to every remote call, without exception.
    pub const REQUEST_TIMEOUT: Duration = Duration::from_secs(5);
    pub const DEFAULT_PAGE_SIZE: u32 = 100;
    pub const MAX_PAGES: u32 = 1_000;
    pub const DOWNLOAD_TIMEOUT: Duration = Duration::from_secs(30);
}

/// Defaults for the remote list cache.
pub struct CacheDefaults;

impl CacheDefaults {
    pub const TTL_MINUTES: u64 = 60;
    pub const REFRESH_INTERVAL: Duration = Duration::from_secs(3600);
    pub const FETCH_ATTEMPTS: u32 = 1;
    pub const RETRY_BASE_DELAY: Duration = Duration::from_millis(500);
    pub const LOOKUP_MEMORY_CAPACITY: u64 = 10_000;
}

/// Keystroke debounce timing.
pub struct DebounceConfig;

impl DebounceConfig {
    pub const DELAY: Duration = Duration::from_millis(500);
}

/// Subprocess configuration.
pub struct ProcessConfig;

impl ProcessConfig {
    pub const COMMAND_TIMEOUT: Duration = Duration::from_secs(5);
}

/// Directory and file naming.
pub struct PathsConfig;

impl PathsConfig {
    pub const CACHE_DIR_NAME: &'static str = "cache";
    pub const DATA_DIR_NAME: &'static str = "data";
    pub const CONFIG_DIR_NAME: &'static str = "config";
    pub const CACHE_FILE_SUFFIX: &'static str = ".json";
}
