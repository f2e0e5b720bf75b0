//! Read-through id → name lookups for auxiliary taxonomies.
//!
//! Paperless documents reference tags and document types by numeric id. The
//! names live in a small JSON file per taxonomy with no TTL, fronted by an
//! in-memory tier. A miss triggers one refetch of the whole taxonomy.

use super::atomic::{atomic_read_json, atomic_write_json, remove_if_exists};
use super::source::ListSource;
use crate::config::CacheDefaults;
use crate::Result;
use mini_moka::sync::Cache;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{debug, info, warn};

pub struct LookupCache {
    name: String,
    path: PathBuf,
    source: Arc<dyn ListSource>,
    /// Field of each fetched record holding the display name.
    name_field: &'static str,
    memory: Cache<i64, String>,
    /// Set only after the file has been copied into `memory`.
    loaded: AtomicBool,
    load_lock: Mutex<()>,
    fetch_lock: tokio::sync::Mutex<()>,
}

impl LookupCache {
    pub fn new(
        name: impl Into<String>,
        path: impl Into<PathBuf>,
        source: Arc<dyn ListSource>,
        name_field: &'static str,
    ) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            source,
            name_field,
            memory: Cache::builder()
                .max_capacity(CacheDefaults::LOOKUP_MEMORY_CAPACITY)
                .build(),
            loaded: AtomicBool::new(false),
            load_lock: Mutex::new(()),
            fetch_lock: tokio::sync::Mutex::new(()),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Name for a single id from the local tiers only.
    pub fn get(&self, id: i64) -> Option<String> {
        self.ensure_loaded();
        self.memory.get(&id)
    }

    /// Names for `ids`, in order. Unknown ids are skipped after one refetch.
    pub async fn resolve(&self, ids: &[i64]) -> Result<Vec<String>> {
        self.ensure_loaded();

        if ids.iter().any(|id| !self.memory.contains_key(id)) {
            let _guard = self.fetch_lock.lock().await;
            // Another caller may have refetched while we waited.
            if ids.iter().any(|id| !self.memory.contains_key(id)) {
                debug!("{} lookup miss, refetching", self.name);
                self.refetch().await?;
            }
        }

        Ok(ids
            .iter()
            .filter_map(|id| {
                let name = self.memory.get(id);
                if name.is_none() {
                    debug!("{} id {} not found", self.name, id);
                }
                name
            })
            .collect())
    }

    /// Refetch the taxonomy and rewrite the lookup file.
    pub async fn refresh(&self) -> Result<usize> {
        let _guard = self.fetch_lock.lock().await;
        self.refetch().await
    }

    /// Delete the lookup file and forget every name.
    pub fn clear(&self) -> Result<()> {
        self.memory.invalidate_all();
        self.loaded.store(false, Ordering::SeqCst);
        remove_if_exists(&self.path)
    }

    async fn refetch(&self) -> Result<usize> {
        let items = self.source.fetch_all().await?;
        let names: BTreeMap<String, String> = items
            .iter()
            .filter_map(|item| {
                let id = item.i64_field("id")?;
                let name = item.str_field(self.name_field)?;
                Some((id.to_string(), name.to_string()))
            })
            .collect();

        if let Err(e) = atomic_write_json(&self.path, &names) {
            warn!("Failed to write {} lookup: {}", self.name, e);
        }
        // Ids the server no longer reports must stop resolving.
        self.memory.invalidate_all();
        self.fill_memory(&names);
        self.loaded.store(true, Ordering::SeqCst);
        info!("Fetched {} {} names", names.len(), self.name);
        Ok(names.len())
    }

    fn ensure_loaded(&self) {
        if self.loaded.load(Ordering::SeqCst) {
            return;
        }
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);
        if self.loaded.load(Ordering::SeqCst) {
            return;
        }
        match atomic_read_json::<BTreeMap<String, String>>(&self.path) {
            Ok(Some(names)) => self.fill_memory(&names),
            Ok(None) => {}
            Err(e) => warn!("Ignoring {} lookup file: {}", self.name, e),
        }
        self.loaded.store(true, Ordering::SeqCst);
    }

    fn fill_memory(&self, names: &BTreeMap<String, String>) {
        for (id, name) in names {
            if let Ok(id) = id.parse::<i64>() {
                self.memory.insert(id, name.clone());
            }
        }
    }
}

impl std::fmt::Debug for LookupCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LookupCache")
            .field("name", &self.name)
            .field("path", &self.path)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::item::RemoteItem;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::atomic::AtomicUsize;
    use tempfile::TempDir;

    struct Tags {
        tags: Mutex<Vec<(i64, &'static str)>>,
        fetches: AtomicUsize,
    }

    impl Tags {
        fn new(tags: Vec<(i64, &'static str)>) -> Arc<Self> {
            Arc::new(Self {
                tags: Mutex::new(tags),
                fetches: AtomicUsize::new(0),
            })
        }
    }

    #[async_trait]
    impl ListSource for Tags {
        async fn fetch_all(&self) -> Result<Vec<RemoteItem>> {
            self.fetches.fetch_add(1, Ordering::SeqCst);
            Ok(self
                .tags
                .lock()
                .unwrap()
                .iter()
                .filter_map(|(id, name)| RemoteItem::from_value(json!({"id": id, "name": name})))
                .collect())
        }
    }

    #[tokio::test]
    async fn test_resolves_and_persists() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tags.json");
        let source = Tags::new(vec![(1, "inbox"), (2, "taxes")]);
        let lookup = LookupCache::new("tag", &path, source.clone(), "name");

        let names = lookup.resolve(&[2, 1]).await.unwrap();
        assert_eq!(names, vec!["taxes", "inbox"]);
        assert!(path.exists());

        // A second instance reads the file instead of the network.
        let reopened = LookupCache::new("tag", &path, source.clone(), "name");
        assert_eq!(reopened.resolve(&[1]).await.unwrap(), vec!["inbox"]);
        assert_eq!(source.fetches.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_miss_triggers_single_refetch() {
        let temp_dir = TempDir::new().unwrap();
        let source = Tags::new(vec![(1, "inbox")]);
        let lookup = LookupCache::new("tag", temp_dir.path().join("tags.json"), source.clone(), "name");

        lookup.resolve(&[1]).await.unwrap();
        source.tags.lock().unwrap().push((3, "receipts"));

        assert_eq!(
            lookup.resolve(&[1, 3, 99]).await.unwrap(),
            vec!["inbox", "receipts"]
        );
        assert_eq!(source.fetches.load(Ordering::SeqCst), 2);
        assert_eq!(lookup.get(3).as_deref(), Some("receipts"));
    }

    #[tokio::test]
    async fn test_removed_tag_stops_resolving_after_refetch() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tags.json");
        let source = Tags::new(vec![(1, "inbox"), (2, "taxes")]);
        let lookup = LookupCache::new("tag", &path, source.clone(), "name");
        lookup.refresh().await.unwrap();
        assert_eq!(lookup.get(2).as_deref(), Some("taxes"));

        source.tags.lock().unwrap().retain(|(id, _)| *id != 2);
        lookup.refresh().await.unwrap();

        assert_eq!(lookup.get(2), None);
        assert_eq!(lookup.get(1).as_deref(), Some("inbox"));
        assert_eq!(lookup.resolve(&[2, 1]).await.unwrap(), vec!["inbox"]);

        let reopened = LookupCache::new("tag", &path, source, "name");
        assert_eq!(reopened.get(2), None);
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_first_reads_use_the_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("tags.json");
        let names: BTreeMap<String, String> = (1..=200)
            .map(|id| (id.to_string(), format!("tag {}", id)))
            .collect();
        atomic_write_json(&path, &names).unwrap();

        let source = Tags::new(Vec::new());
        let lookup = Arc::new(LookupCache::new("tag", &path, source.clone(), "name"));

        let readers: Vec<_> = (0..8)
            .map(|n| {
                let lookup = lookup.clone();
                tokio::spawn(async move {
                    let id = 200 - n;
                    let single = lookup.get(id);
                    let resolved = lookup.resolve(&[id, 1]).await.unwrap();
                    (single, resolved)
                })
            })
            .collect();

        for (n, reader) in readers.into_iter().enumerate() {
            let id = 200 - n as i64;
            let (single, resolved) = reader.await.unwrap();
            assert_eq!(single, Some(format!("tag {}", id)));
            assert_eq!(resolved, vec![format!("tag {}", id), "tag 1".to_string()]);
        }
        assert_eq!(source.fetches.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_clear_removes_file() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("document_types.json");
        let source = Tags::new(vec![(5, "Invoice")]);
        let lookup = LookupCache::new("document type", &path, source, "name");
        lookup.refresh().await.unwrap();
        assert!(path.exists());

        lookup.clear().unwrap();
        lookup.clear().unwrap();

        assert!(!path.exists());
        assert_eq!(lookup.get(5), None);
    }
}
