//! Lidarr, Radarr, Readarr and Sonarr.
//!
//! One plugin type drives all four services. A plain query searches the
//! library (cached per the cache settings); `add <term>` runs the service's
//! lookup and offers candidates to add.

mod render;
mod service;

pub use service::{AddOptions, ArrService};

use crate::common::{
    cache_config, cache_fields, context_id, is_cache_key, read_values, store_value,
    CacheSettingDefaults, Endpoint, LiveList,
};
use crate::context::PluginContext;
use async_trait::async_trait;
use launchkit_core::cache::{CacheSession, JsonFileStore};
use launchkit_core::network::{Auth, HttpClient, ServiceClient};
use launchkit_core::search::filter;
use launchkit_core::{
    ConfigField, DisplayItem, FieldSchema, LaunchkitError, Plugin, PluginMetadata, Query,
    QueryRunner, RemoteItem, Result, Settings,
};
use serde_json::{Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

const CACHE_DEFAULTS: CacheSettingDefaults = CacheSettingDefaults {
    enabled: false,
    minutes: 60,
    auto: false,
};

pub struct ArrPlugin {
    service: ArrService,
    metadata: PluginMetadata,
    settings: Settings,
    http: Arc<HttpClient>,
    endpoint: Endpoint,
    session: CacheSession,
    runner: QueryRunner,
}

impl ArrPlugin {
    pub fn new(service: ArrService, ctx: &PluginContext) -> Result<Self> {
        Self::with_runner(service, ctx, QueryRunner::default())
    }

    pub fn with_runner(service: ArrService, ctx: &PluginContext, runner: QueryRunner) -> Result<Self> {
        let settings = ctx.settings(service.id());
        let http = ctx.http_client(service.id())?;
        let endpoint = Endpoint::new(build_client(service, &settings, &http));

        let session = CacheSession::new(
            service.id(),
            Arc::new(LiveList::array(endpoint.clone(), service.library_path())),
            Arc::new(JsonFileStore::new(ctx.cache_path(service.id()))),
            cache_config(&settings, CACHE_DEFAULTS),
        );
        session.start();

        Ok(Self {
            service,
            metadata: PluginMetadata {
                id: service.id(),
                name: service.name(),
                description: service.description(),
                default_trigger: service.default_trigger(),
                synopsis: service.synopsis(),
                global: false,
            },
            settings,
            http,
            endpoint,
            session,
            runner,
        })
    }

    pub fn session(&self) -> &CacheSession {
        &self.session
    }

    fn add_options(&self, search: bool) -> AddOptions {
        AddOptions {
            profile_id: self.settings.int("profile_id", self.service.default_profile()),
            metadata_id: self.settings.int("metadata_id", 1),
            root_path: self.settings.string("root_path", self.service.default_root()),
            monitor: self.settings.bool("default_monitor", true),
            search,
        }
    }

    async fn search_library(&self, text: &str) -> Result<Vec<DisplayItem>> {
        let items = self.session.get_results().await?;
        let base_url = self.endpoint.client().base_url().to_string();
        let schema = FieldSchema::new(self.service.name_field());

        let rows: Vec<DisplayItem> = filter(&items, text, &schema)
            .filter_map(|item| render::library_item(self.service, &base_url, item))
            .collect();

        if rows.is_empty() {
            Ok(vec![render::not_found(self.service, text)])
        } else {
            Ok(rows)
        }
    }

    async fn lookup(&self, term: &str) -> Result<Vec<DisplayItem>> {
        let client = self.endpoint.client();
        let records: Vec<Value> = client.get_json(&self.service.lookup_path(term)).await?;

        let rows: Vec<DisplayItem> = records
            .into_iter()
            .filter_map(RemoteItem::from_value)
            .enumerate()
            .map(|(index, record)| render::lookup_item(self.service, client.base_url(), index, &record))
            .collect();

        if rows.is_empty() {
            Ok(vec![render::search_fallback(self.service, client.base_url(), term)])
        } else {
            Ok(rows)
        }
    }

    async fn add(&self, context: &Value) -> Result<()> {
        let record = context
            .get("record")
            .filter(|record| record.is_object())
            .ok_or_else(|| LaunchkitError::InvalidParams {
                message: "add needs the looked-up `record`".to_string(),
            })?;
        let search = context.get("search").and_then(Value::as_bool).unwrap_or(false);
        let payload = self.service.add_payload(record, &self.add_options(search));
        let client = self.endpoint.client();
        let path = self.service.library_path();

        self.session
            .mutate(|| async move { client.post_json(&path, &payload).await })
            .await?;
        info!(
            "Added {} to {}",
            record
                .get(self.service.name_field())
                .and_then(serde_json::Value::as_str)
                .unwrap_or("item"),
            self.service.name()
        );
        Ok(())
    }

    async fn rescan(&self, id: i64) -> Result<()> {
        let client = self.endpoint.client();
        let path = self.service.command_path();
        let command = self.service.rescan_command(id);
        self.session
            .mutate(|| async move { client.post_json(&path, &command).await })
            .await
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let client = self.endpoint.client();
        let path = format!(
            "{}?deleteFiles={}",
            self.service.item_path(id),
            self.settings.bool("delete_remove_files", false)
        );
        self.session
            .mutate(|| async move { client.delete(&path, None).await })
            .await
    }
}

/// `Some(term)` if the query asks to add something; the term may be empty.
fn add_term(text: &str) -> Option<&str> {
    if text == "add" {
        Some("")
    } else {
        text.strip_prefix("add ").map(str::trim)
    }
}

fn build_client(service: ArrService, settings: &Settings, http: &Arc<HttpClient>) -> ServiceClient {
    ServiceClient::new(
        http.clone(),
        settings.string("instance_url", service.default_url()),
        Auth::api_key(settings.string("api_key", "")),
    )
}

#[async_trait]
impl Plugin for ArrPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &self.metadata
    }

    fn config_fields(&self) -> Vec<ConfigField> {
        let service = self.service;
        let mut fields = vec![
            ConfigField::text("instance_url", "URL", service.default_url()),
            ConfigField::secret("api_key", "API key"),
            ConfigField::text("root_path", "Root Path", service.default_root()),
            ConfigField::number("profile_id", "Profile ID", service.default_profile()),
        ];
        if service.has_metadata_profile() {
            fields.push(ConfigField::number("metadata_id", "Metadata ID", 1));
        }
        fields.push(ConfigField::toggle("default_monitor", "Monitor by default", true));
        fields.push(ConfigField::toggle(
            "delete_remove_files",
            "Delete removes files",
            false,
        ));
        fields.extend(cache_fields(CACHE_DEFAULTS));
        fields
    }

    async fn handle_query(&self, query: &Query) -> Vec<DisplayItem> {
        let text = query.trimmed();
        let noun = self.service.noun().to_lowercase();

        if text.is_empty() {
            return vec![render::info(
                self.service,
                format!("Search for an existing {} on {}", noun, self.service.name()),
            )];
        }

        if let Some(term) = add_term(text) {
            if term.is_empty() {
                return vec![render::info(
                    self.service,
                    format!("Add a new {} on {}", noun, self.service.name()),
                )];
            }
            return self.runner.run(query, || self.lookup(term)).await;
        }

        self.runner.run(query, || self.search_library(text)).await
    }

    async fn handle_action(&self, action: &str, context: &Value) -> Result<()> {
        match action {
            "add" => self.add(context).await,
            "rescan" => self.rescan(context_id(context)?).await,
            "delete" => self.delete(context_id(context)?).await,
            "refresh" => self.session.refresh().await.map(|_| ()),
            other => Err(LaunchkitError::UnknownAction {
                plugin: self.service.id().to_string(),
                action: other.to_string(),
            }),
        }
    }

    fn get_config(&self) -> Map<String, Value> {
        read_values(&self.settings, &self.config_fields())
    }

    async fn set_config(&self, key: &str, value: Value) -> Result<()> {
        if !store_value(&self.settings, &self.config_fields(), key, value)? {
            return Ok(());
        }

        if matches!(key, "instance_url" | "api_key") {
            info!("{} connection settings changed", self.service.name());
            self.endpoint
                .replace(build_client(self.service, &self.settings, &self.http));
            if let Err(e) = self.session.clear() {
                warn!("Failed to clear {} cache: {}", self.service.name(), e);
            }
        } else if is_cache_key(key) {
            self.session
                .set_config(cache_config(&self.settings, CACHE_DEFAULTS));
        }
        Ok(())
    }

    async fn shutdown(&self) {
        self.session.stop();
    }
}
