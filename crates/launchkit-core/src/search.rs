//! Substring query filter.
//!
//! Matching is case-insensitive containment of the query in each item's
//! searchable text. The filter keeps input order; ranking is the host's job.

use crate::item::{ItemSchema, RemoteItem};

/// Lazily yield the items whose searchable text contains `query`.
pub fn filter<'a, S>(
    items: &'a [RemoteItem],
    query: &str,
    schema: &'a S,
) -> impl Iterator<Item = &'a RemoteItem> + 'a
where
    S: ItemSchema + ?Sized,
{
    let needle = query.to_lowercase();
    items
        .iter()
        .filter(move |item| contains_ignore_case(&schema.searchable_text(item), &needle))
}

/// `true` if `haystack` contains the already-lowercased `needle`.
pub fn contains_ignore_case(haystack: &str, needle: &str) -> bool {
    needle.is_empty() || haystack.to_lowercase().contains(needle)
}

/// `true` if every whitespace-separated term of `query` occurs in `haystack`.
pub fn matches_all_terms(haystack: &str, query: &str) -> bool {
    let haystack = haystack.to_lowercase();
    query
        .to_lowercase()
        .split_whitespace()
        .all(|term| haystack.contains(term))
}
