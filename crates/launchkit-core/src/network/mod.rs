//! HTTP plumbing shared by every remote-backed plugin.

pub mod client;
pub mod paginate;
pub mod retry;

pub use client::{extract_domain, Auth, Download, HttpClient, ServiceClient};
pub use paginate::{fetch_all, with_page_size, Page, PageSource, PaginatedFetcher};
pub use retry::{retry_async, retry_transient, RetryConfig, RetryStats};
