//! Linkding bookmarks.

use crate::common::{
    cache_config, cache_fields, context_id, is_cache_key, plugin_icon, read_values,
    refresh_cache_item, store_value, CacheSettingDefaults, Endpoint, LiveList,
};
use crate::context::PluginContext;
use async_trait::async_trait;
use launchkit_core::cache::{CacheSession, JsonFileStore};
use launchkit_core::network::{Auth, HttpClient, ServiceClient};
use launchkit_core::search::filter;
use launchkit_core::{
    ConfigField, DisplayItem, ItemAction, ItemSchema, LaunchkitError, Plugin, PluginMetadata,
    Query, QueryRunner, RemoteItem, Result, Settings,
};
use serde_json::{json, Map, Value};
use std::sync::Arc;
use tracing::{info, warn};

const ID: &str = "linkding";
const DEFAULT_URL: &str = "http://localhost:9090";
const BOOKMARKS_PATH: &str = "/api/bookmarks/";

const CACHE_DEFAULTS: CacheSettingDefaults = CacheSettingDefaults {
    enabled: true,
    minutes: 60,
    auto: false,
};

static METADATA: PluginMetadata = PluginMetadata {
    id: ID,
    name: "Linkding",
    description: "Search saved articles via a Linkding instance",
    default_trigger: "ld ",
    synopsis: "<article>",
    global: false,
};

/// Searches url, title and tags.
pub struct BookmarkSchema;

impl ItemSchema for BookmarkSchema {
    fn searchable_text(&self, item: &RemoteItem) -> String {
        let tags = item.str_list("tag_names").join(",");
        [
            item.str_field("url").unwrap_or_default(),
            item.str_field("title").unwrap_or_default(),
            tags.as_str(),
        ]
        .join(",")
    }
}

pub struct LinkdingPlugin {
    settings: Settings,
    http: Arc<HttpClient>,
    endpoint: Endpoint,
    session: CacheSession,
    runner: QueryRunner,
}

impl LinkdingPlugin {
    pub fn new(ctx: &PluginContext) -> Result<Self> {
        Self::with_runner(ctx, QueryRunner::default())
    }

    pub fn with_runner(ctx: &PluginContext, runner: QueryRunner) -> Result<Self> {
        let settings = ctx.settings(ID);
        let http = ctx.http_client(ID)?;
        let endpoint = Endpoint::new(build_client(&settings, &http));

        let session = CacheSession::new(
            ID,
            Arc::new(LiveList::paginated(endpoint.clone(), BOOKMARKS_PATH, "limit")),
            Arc::new(JsonFileStore::new(ctx.cache_path(ID))),
            cache_config(&settings, CACHE_DEFAULTS),
        );
        session.start();

        Ok(Self {
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

    async fn search(&self, text: &str) -> Result<Vec<DisplayItem>> {
        let bookmarks = self.session.get_results().await?;
        Ok(filter(&bookmarks, text, &BookmarkSchema)
            .filter_map(render_bookmark)
            .collect())
    }

    async fn archive(&self, id: i64) -> Result<()> {
        let client = self.endpoint.client();
        let path = format!("{}{}/archive/", BOOKMARKS_PATH, id);
        self.session
            .mutate(|| async move { client.post_empty(&path).await })
            .await?;
        info!("Archived bookmark {}", id);
        Ok(())
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let client = self.endpoint.client();
        let path = format!("{}{}/", BOOKMARKS_PATH, id);
        self.session
            .mutate(|| async move { client.delete(&path, None).await })
            .await?;
        info!("Deleted bookmark {}", id);
        Ok(())
    }
}

fn build_client(settings: &Settings, http: &Arc<HttpClient>) -> ServiceClient {
    ServiceClient::new(
        http.clone(),
        settings.string("instance_url", DEFAULT_URL),
        Auth::token(settings.string("api_key", "")),
    )
}

fn render_bookmark(bookmark: &RemoteItem) -> Option<DisplayItem> {
    let id = bookmark.i64_field("id")?;
    let url = bookmark.str_field("url")?;
    let icon = plugin_icon(ID);

    Some(
        DisplayItem::new(
            format!("{}-{}", ID, id),
            bookmark.str_field("title").unwrap_or(url),
        )
        .with_subtext(format!("{}: {}", bookmark.str_list("tag_names").join(","), url))
        .with_icons(&[icon.as_str()])
        .with_actions([
            ItemAction::open_url("open", "Open article", url),
            ItemAction::copy("copy", "Copy URL to clipboard", url),
            ItemAction::plugin("archive", "Archive article", "archive", json!({"id": id})),
            ItemAction::plugin("delete", "Delete article", "delete", json!({"id": id})),
        ]),
    )
}

#[async_trait]
impl Plugin for LinkdingPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &METADATA
    }

    fn config_fields(&self) -> Vec<ConfigField> {
        let mut fields = vec![
            ConfigField::text("instance_url", "URL", DEFAULT_URL),
            ConfigField::secret("api_key", "API key"),
        ];
        fields.extend(cache_fields(CACHE_DEFAULTS));
        fields
    }

    async fn handle_query(&self, query: &Query) -> Vec<DisplayItem> {
        let text = query.trimmed();
        if text.is_empty() {
            let icon = plugin_icon(ID);
            let mut items = vec![DisplayItem::notice(
                ID,
                METADATA.name,
                "Search for an article saved via Linkding",
            )
            .with_icons(&[icon.as_str()])];
            if self.session.config().enabled {
                items.push(refresh_cache_item(ID, "articles"));
            }
            return items;
        }

        self.runner.run(query, || self.search(text)).await
    }

    async fn handle_action(&self, action: &str, context: &Value) -> Result<()> {
        match action {
            "archive" => self.archive(context_id(context)?).await,
            "delete" => self.delete(context_id(context)?).await,
            "refresh" => {
                let bookmarks = self.session.refresh().await?;
                info!("Cached {} bookmarks", bookmarks.len());
                Ok(())
            }
            other => Err(LaunchkitError::UnknownAction {
                plugin: ID.to_string(),
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
            self.endpoint.replace(build_client(&self.settings, &self.http));
            if let Err(e) = self.session.clear() {
                warn!("Failed to clear Linkding cache: {}", e);
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
