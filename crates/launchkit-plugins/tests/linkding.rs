//! Linkding plugin against an in-process Linkding stand-in.

mod support;

use axum::extract::{Path, Query as UrlQuery, State};
use axum::http::{HeaderMap, StatusCode};
use axum::routing::{delete, get, post};
use axum::{Json, Router};
use launchkit_core::cache::CacheState;
use launchkit_core::{ActionCommand, Plugin, Query};
use launchkit_plugins::linkding::LinkdingPlugin;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use support::{instant, serve, Harness};

#[derive(Clone, Default)]
struct Linkding {
    bookmarks: Arc<Mutex<Vec<Value>>>,
    list_requests: Arc<AtomicUsize>,
}

fn authorized(headers: &HeaderMap) -> bool {
    headers.get("authorization").and_then(|v| v.to_str().ok()) == Some("Token secret")
}

async fn list(
    State(state): State<Linkding>,
    headers: HeaderMap,
    UrlQuery(params): UrlQuery<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    if !authorized(&headers) {
        return Err(StatusCode::UNAUTHORIZED);
    }
    assert_eq!(params.get("limit").map(String::as_str), Some("100"));
    state.list_requests.fetch_add(1, Ordering::SeqCst);
    let results = state.bookmarks.lock().unwrap().clone();
    Ok(Json(json!({"count": results.len(), "next": null, "results": results})))
}

async fn archive(State(state): State<Linkding>, Path(id): Path<i64>) -> StatusCode {
    state
        .bookmarks
        .lock()
        .unwrap()
        .retain(|b| b["id"].as_i64() != Some(id));
    StatusCode::NO_CONTENT
}

async fn start() -> (Linkding, String) {
    let state = Linkding::default();
    *state.bookmarks.lock().unwrap() = vec![
        json!({"id": 1, "url": "https://doc.rust-lang.org/book/", "title": "The Rust Book", "tag_names": ["rust", "docs"]}),
        json!({"id": 2, "url": "https://tokio.rs", "title": "Tokio", "tag_names": ["rust", "async"]}),
        json!({"id": 3, "url": "https://example.org/untitled", "title": "", "tag_names": []}),
    ];
    let router = Router::new()
        .route("/api/bookmarks/", get(list))
        .route("/api/bookmarks/:id/archive/", post(archive))
        .route("/api/bookmarks/:id/", delete(archive))
        .with_state(state.clone());
    let base = serve(router).await;
    (state, base)
}

fn plugin(harness: &Harness, base: &str) -> LinkdingPlugin {
    harness.set("linkding", "instance_url", json!(base));
    harness.set("linkding", "api_key", json!("secret"));
    LinkdingPlugin::with_runner(&harness.ctx, instant()).unwrap()
}

#[tokio::test]
async fn test_search_matches_tags_and_is_cached() {
    let (state, base) = start().await;
    let harness = Harness::new();
    let plugin = plugin(&harness, &base);

    let items = plugin.handle_query(&Query::new("RUST")).await;
    let ids: Vec<_> = items.iter().map(|i| i.id.as_str()).collect();
    assert_eq!(ids, vec!["linkding-1", "linkding-2"]);
    assert_eq!(items[1].subtext, "rust,async: https://tokio.rs");
    assert_eq!(
        items[0].actions[1].command,
        ActionCommand::Copy {
            text: "https://doc.rust-lang.org/book/".into()
        }
    );

    let items = plugin.handle_query(&Query::new("untitled")).await;
    assert_eq!(items[0].text, "https://example.org/untitled");

    assert_eq!(state.list_requests.load(Ordering::SeqCst), 1);
    assert_eq!(plugin.session().state(), CacheState::Fresh);
    assert!(harness.ctx.cache_path("linkding").exists());
}

#[tokio::test]
async fn test_archive_refreshes_cache() {
    let (state, base) = start().await;
    let harness = Harness::new();
    let plugin = plugin(&harness, &base);

    assert_eq!(plugin.handle_query(&Query::new("tokio")).await.len(), 1);

    plugin.handle_action("archive", &json!({"id": 2})).await.unwrap();

    assert_eq!(state.list_requests.load(Ordering::SeqCst), 2);
    assert!(plugin.handle_query(&Query::new("tokio")).await.is_empty());
    assert_eq!(state.list_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_wrong_token_renders_error_item() {
    let (_state, base) = start().await;
    let harness = Harness::new();
    let plugin = plugin(&harness, &base);

    plugin.set_config("api_key", json!("wrong")).await.unwrap();
    let items = plugin.handle_query(&Query::new("rust")).await;

    assert_eq!(items.len(), 1);
    assert_eq!(items[0].id, "error");
    assert_eq!(items[0].text, "Got response 401");
}

#[tokio::test]
async fn test_disabling_cache_removes_file() {
    let (state, base) = start().await;
    let harness = Harness::new();
    let plugin = plugin(&harness, &base);

    plugin.handle_query(&Query::new("rust")).await;
    assert!(harness.ctx.cache_path("linkding").exists());

    plugin.set_config("cache_results", json!(false)).await.unwrap();
    assert!(!harness.ctx.cache_path("linkding").exists());

    plugin.handle_query(&Query::new("rust")).await;
    plugin.handle_query(&Query::new("rust")).await;
    assert_eq!(state.list_requests.load(Ordering::SeqCst), 3);
    assert!(!harness.ctx.cache_path("linkding").exists());
}

#[tokio::test]
async fn test_config_masks_api_key() {
    let harness = Harness::new();
    let plugin = plugin(&harness, "http://127.0.0.1:9");

    let config = plugin.get_config();
    assert_eq!(config["api_key"], json!("********"));
    assert_eq!(config["cache_results"], json!(true));
    assert_eq!(config["cache_length"], json!(60));

    assert!(plugin.set_config("nope", json!(1)).await.is_err());
}

#[tokio::test]
async fn test_empty_query_offers_refresh() {
    let harness = Harness::new();
    let plugin = plugin(&harness, "http://127.0.0.1:9");

    let items = plugin.handle_query(&Query::new("")).await;

    assert_eq!(items.len(), 2);
    assert_eq!(items[1].text, "Refresh cache");
}

#[tokio::test]
async fn test_empty_query_hides_refresh_when_uncached() {
    let harness = Harness::new();
    harness.set("linkding", "cache_results", json!(false));
    let plugin = plugin(&harness, "http://127.0.0.1:9");

    let items = plugin.handle_query(&Query::new("")).await;
    assert_eq!(items.len(), 1);
    assert!(items.iter().all(|item| item.text != "Refresh cache"));

    plugin.set_config("cache_results", json!(true)).await.unwrap();
    let items = plugin.handle_query(&Query::new("")).await;
    assert_eq!(items[1].text, "Refresh cache");
}
