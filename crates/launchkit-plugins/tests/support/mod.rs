//! Shared harness for plugin integration tests.

#![allow(dead_code)]

use axum::Router;
use launchkit_core::platform::RecordingDesktop;
use launchkit_core::{ConfigStore, MemoryConfigStore, QueryRunner};
use launchkit_plugins::PluginContext;
use serde_json::Value;
use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;

/// Serve `router` on an ephemeral port and return its base URL.
pub async fn serve(router: Router) -> String {
    let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    tokio::spawn(async move {
        axum::serve(listener, router).await.unwrap();
    });
    format!("http://{}", addr)
}

pub struct Harness {
    pub temp: TempDir,
    pub store: Arc<MemoryConfigStore>,
    pub desktop: Arc<RecordingDesktop>,
    pub ctx: PluginContext,
}

impl Harness {
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap();
        let store = Arc::new(MemoryConfigStore::new());
        let desktop = Arc::new(RecordingDesktop::new());
        let ctx = PluginContext::new(temp.path(), store.clone(), desktop.clone());
        Self {
            temp,
            store,
            desktop,
            ctx,
        }
    }

    /// Seed a setting before the plugin reads it.
    pub fn set(&self, plugin: &str, key: &str, value: Value) {
        self.store.write(plugin, key, value).unwrap();
    }
}

/// No debounce, so tests do not wait.
pub fn instant() -> QueryRunner {
    QueryRunner::new(Duration::ZERO)
}
