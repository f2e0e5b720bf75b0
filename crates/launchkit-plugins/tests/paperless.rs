//! Paperless plugin against an in-process Paperless-ngx stand-in.

mod support;

use axum::extract::{Path, Query as UrlQuery, State};
use axum::http::{header, HeaderMap, StatusCode};
use axum::response::IntoResponse;
use axum::routing::{delete, get};
use axum::{Json, Router};
use launchkit_core::platform::DesktopEvent;
use launchkit_core::{Plugin, Query};
use launchkit_plugins::paperless::PaperlessPlugin;
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use url::Url;
use support::{instant, serve, Harness};

// "user:pass"
const BASIC: &str = "Basic dXNlcjpwYXNz";

#[derive(Clone, Default)]
struct Paperless {
    documents: Arc<Mutex<Vec<Value>>>,
    document_requests: Arc<AtomicUsize>,
    tag_requests: Arc<AtomicUsize>,
}

fn check_auth(headers: &HeaderMap) -> Result<(), StatusCode> {
    match headers.get(header::AUTHORIZATION).and_then(|v| v.to_str().ok()) {
        Some(BASIC) => Ok(()),
        _ => Err(StatusCode::UNAUTHORIZED),
    }
}

fn page(results: Vec<Value>) -> Json<Value> {
    Json(json!({"count": results.len(), "next": null, "previous": null, "results": results}))
}

async fn documents(
    State(state): State<Paperless>,
    headers: HeaderMap,
    UrlQuery(params): UrlQuery<HashMap<String, String>>,
) -> Result<Json<Value>, StatusCode> {
    check_auth(&headers)?;
    assert_eq!(params.get("page_size").map(String::as_str), Some("100"));
    state.document_requests.fetch_add(1, Ordering::SeqCst);
    Ok(page(state.documents.lock().unwrap().clone()))
}

async fn tags(State(state): State<Paperless>, headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    check_auth(&headers)?;
    state.tag_requests.fetch_add(1, Ordering::SeqCst);
    Ok(page(vec![
        json!({"id": 1, "name": "finance"}),
        json!({"id": 2, "name": "home"}),
    ]))
}

async fn document_types(headers: HeaderMap) -> Result<Json<Value>, StatusCode> {
    check_auth(&headers)?;
    Ok(page(vec![json!({"id": 7, "name": "Invoice"})]))
}

async fn download(headers: HeaderMap, Path(id): Path<i64>) -> Result<impl IntoResponse, StatusCode> {
    check_auth(&headers)?;
    Ok((
        [(
            header::CONTENT_DISPOSITION,
            match id {
                11 => "attachment; filename=\"Lease #2 (100%).pdf\"".to_string(),
                _ => format!("attachment; filename=\"doc {}.pdf\"", id),
            },
        )],
        b"%PDF-1.4 fake".to_vec(),
    ))
}

async fn remove(State(state): State<Paperless>, Path(id): Path<i64>) -> StatusCode {
    state
        .documents
        .lock()
        .unwrap()
        .retain(|d| d["id"].as_i64() != Some(id));
    StatusCode::NO_CONTENT
}

async fn start() -> (Paperless, String) {
    let state = Paperless::default();
    *state.documents.lock().unwrap() = vec![
        json!({"id": 10, "title": "Electricity bill", "tags": [1, 2], "document_type": 7, "content": "kilowatt"}),
        json!({"id": 11, "title": "Lease", "tags": [2], "document_type": null, "content": "landlord"}),
    ];
    let router = Router::new()
        .route("/api/documents/", get(documents))
        .route("/api/documents/:id/", delete(remove))
        .route("/api/documents/:id/download/", get(download))
        .route("/api/tags/", get(tags))
        .route("/api/document_types/", get(document_types))
        .with_state(state.clone());
    let base = serve(router).await;
    (state, base)
}

fn plugin(harness: &Harness, base: &str) -> PaperlessPlugin {
    harness.set("paperless", "instance_url", json!(base));
    harness.set("paperless", "username", json!("user"));
    harness.set("paperless", "password", json!("pass"));
    PaperlessPlugin::with_runner(&harness.ctx, instant()).unwrap()
}

#[tokio::test]
async fn test_names_resolved_at_ingress() {
    let (state, base) = start().await;
    let harness = Harness::new();
    let plugin = plugin(&harness, &base);

    let items = plugin.handle_query(&Query::new("finance")).await;
    assert_eq!(items.len(), 1);
    assert_eq!(items[0].text, "Electricity bill");
    assert_eq!(items[0].subtext, "Invoice - finance,home");

    let items = plugin.handle_query(&Query::new("lease")).await;
    assert_eq!(items[0].subtext, "No type - home");

    // Body search is off by default.
    assert!(plugin.handle_query(&Query::new("landlord")).await.is_empty());

    assert_eq!(state.document_requests.load(Ordering::SeqCst), 1);
    assert_eq!(state.tag_requests.load(Ordering::SeqCst), 1);
    assert!(harness.ctx.data_path("paperless-tags.json").exists());
    assert!(harness.ctx.data_path("paperless-document-types.json").exists());
}

#[tokio::test]
async fn test_global_query_reads_cache_only() {
    let (state, base) = start().await;
    let harness = Harness::new();
    let plugin = plugin(&harness, &base);

    assert!(plugin.handle_global_query(&Query::new("bill")).await.is_empty());
    assert_eq!(state.document_requests.load(Ordering::SeqCst), 0);

    plugin.handle_action("refresh", &json!({})).await.unwrap();

    let items = plugin.handle_global_query(&Query::new("bill")).await;
    assert_eq!(items.len(), 1);
    assert_eq!(state.document_requests.load(Ordering::SeqCst), 1);
}

#[tokio::test]
async fn test_download_saves_and_opens() {
    let (_state, base) = start().await;
    let harness = Harness::new();
    let downloads = harness.temp.path().join("downloads");
    harness.set("paperless", "download_path", json!(downloads.to_string_lossy()));
    let plugin = plugin(&harness, &base);

    plugin.handle_action("download", &json!({"id": 10})).await.unwrap();

    let saved = downloads.join("doc_10.pdf");
    assert_eq!(std::fs::read(&saved).unwrap(), b"%PDF-1.4 fake");
    assert_eq!(
        harness.desktop.events(),
        vec![DesktopEvent::OpenUrl(
            Url::from_file_path(&saved).unwrap().to_string()
        )]
    );
}

#[tokio::test]
async fn test_download_url_escapes_file_name() {
    let (_state, base) = start().await;
    let harness = Harness::new();
    let downloads = harness.temp.path().join("downloads");
    harness.set("paperless", "download_path", json!(downloads.to_string_lossy()));
    let plugin = plugin(&harness, &base);

    plugin.handle_action("download", &json!({"id": 11})).await.unwrap();

    let saved = downloads.join("Lease_#2_(100%).pdf");
    assert!(saved.exists());
    let events = harness.desktop.events();
    let opened = match events.as_slice() {
        [DesktopEvent::OpenUrl(url)] => Url::parse(url).unwrap(),
        other => panic!("unexpected desktop events: {:?}", other),
    };
    assert!(opened.as_str().ends_with("/Lease_%232_(100%25).pdf"));
    assert_eq!(opened.fragment(), None);
    assert_eq!(opened.to_file_path().unwrap(), saved);
}

#[tokio::test]
async fn test_delete_refreshes_documents() {
    let (state, base) = start().await;
    let harness = Harness::new();
    let plugin = plugin(&harness, &base);

    assert_eq!(plugin.handle_query(&Query::new("lease")).await.len(), 1);
    plugin.handle_action("delete", &json!({"id": 11})).await.unwrap();

    assert_eq!(state.document_requests.load(Ordering::SeqCst), 2);
    assert!(plugin.handle_query(&Query::new("lease")).await.is_empty());
}

#[tokio::test]
async fn test_tag_toggle_manages_lookup_file() {
    let (state, base) = start().await;
    let harness = Harness::new();
    let plugin = plugin(&harness, &base);
    let tag_file = harness.ctx.data_path("paperless-tags.json");

    plugin.handle_query(&Query::new("bill")).await;
    assert!(tag_file.exists());

    plugin.set_config("filter_by_tags", json!(false)).await.unwrap();
    assert!(!tag_file.exists());
    assert!(plugin.handle_query(&Query::new("finance")).await.is_empty());

    plugin.set_config("filter_by_tags", json!(true)).await.unwrap();
    assert!(tag_file.exists());
    assert_eq!(plugin.handle_query(&Query::new("finance")).await.len(), 1);
    assert_eq!(state.tag_requests.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_password_is_masked() {
    let harness = Harness::new();
    let plugin = plugin(&harness, "http://127.0.0.1:9");

    let config = plugin.get_config();
    assert_eq!(config["password"], json!("********"));
    assert_eq!(config["username"], json!("user"));
    assert_eq!(config["download_path"], json!("~/Downloads"));

    plugin.set_config("password", json!("********")).await.unwrap();
    assert_eq!(plugin.get_config()["password"], json!("********"));
}
