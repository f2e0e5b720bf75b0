//! Paperless-ngx documents.
//!
//! Documents reference tags and their document type by id. Names are
//! resolved once, when a listing is fetched, through two [`LookupCache`]s so
//! that cached documents can be searched and rendered without further
//! requests. The global query only ever reads what is already cached.

use crate::common::{
    cache_config, cache_fields, context_id, is_cache_key, plugin_icon, read_values,
    refresh_cache_item, store_value, CacheSettingDefaults, Endpoint, LiveList,
};
use crate::context::PluginContext;
use async_trait::async_trait;
use launchkit_core::cache::{CacheSession, JsonFileStore, ListSource, LookupCache};
use launchkit_core::network::{Auth, HttpClient, ServiceClient};
use launchkit_core::search::filter;
use launchkit_core::{
    ConfigField, Desktop, DisplayItem, ItemAction, ItemSchema, LaunchkitError, Plugin,
    PluginMetadata, Query, QueryRunner, RemoteItem, Result, Settings,
};
use serde_json::{json, Map, Value};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::{debug, info, warn};
use url::Url;

const ID: &str = "paperless";
const DEFAULT_URL: &str = "http://localhost:8000";
const DOCUMENTS_PATH: &str = "/api/documents/";
const DEFAULT_DOWNLOAD_PATH: &str = "~/Downloads";
const FALLBACK_FILE_NAME: &str = "launchkit_paperless_dl.pdf";

/// Resolved tag names, comma-joined.
const TAG_NAMES: &str = "tag_names";
/// Resolved document type name.
const TYPE_NAME: &str = "document_type_name";

const CACHE_DEFAULTS: CacheSettingDefaults = CacheSettingDefaults {
    enabled: true,
    minutes: 60,
    auto: false,
};

static METADATA: PluginMetadata = PluginMetadata {
    id: ID,
    name: "Paperless",
    description: "Search documents in a Paperless-ngx instance",
    default_trigger: "pl ",
    synopsis: "<document>",
    global: true,
};

/// Which parts of a document the query is matched against.
#[derive(Debug, Clone, Copy)]
pub struct DocumentSchema {
    pub tags: bool,
    pub document_type: bool,
    pub body: bool,
}

impl DocumentSchema {
    fn from_settings(settings: &Settings) -> Self {
        Self {
            tags: settings.bool("filter_by_tags", true),
            document_type: settings.bool("filter_by_type", true),
            body: settings.bool("filter_by_body", false),
        }
    }
}

impl ItemSchema for DocumentSchema {
    fn searchable_text(&self, item: &RemoteItem) -> String {
        let mut text = item.str_field("title").unwrap_or_default().to_string();
        if self.tags {
            text.push_str(item.str_field(TAG_NAMES).unwrap_or_default());
        }
        if self.document_type {
            text.push_str(item.str_field(TYPE_NAME).unwrap_or_default());
        }
        if self.body {
            text.push_str(item.str_field("content").unwrap_or_default());
        }
        text
    }
}

/// Document listing with tag and type names resolved at ingress.
struct DocumentSource {
    documents: LiveList,
    tags: Arc<LookupCache>,
    types: Arc<LookupCache>,
    settings: Settings,
}

#[async_trait]
impl ListSource for DocumentSource {
    async fn fetch_all(&self) -> Result<Vec<RemoteItem>> {
        let mut documents = self.documents.fetch_all().await?;
        let schema = DocumentSchema::from_settings(&self.settings);

        if schema.tags {
            let ids: BTreeSet<i64> = documents.iter().flat_map(tag_ids).collect();
            if !ids.is_empty() {
                let ids: Vec<i64> = ids.into_iter().collect();
                if let Err(e) = self.tags.resolve(&ids).await {
                    warn!("Could not resolve document tags: {}", e);
                }
            }
            for document in &mut documents {
                let names: Vec<String> = tag_ids(document)
                    .into_iter()
                    .filter_map(|id| self.tags.get(id))
                    .collect();
                if !names.is_empty() {
                    document.set(TAG_NAMES, Value::from(names.join(",")));
                }
            }
        }

        if schema.document_type {
            let ids: BTreeSet<i64> = documents
                .iter()
                .filter_map(|d| d.i64_field("document_type"))
                .collect();
            if !ids.is_empty() {
                let ids: Vec<i64> = ids.into_iter().collect();
                if let Err(e) = self.types.resolve(&ids).await {
                    warn!("Could not resolve document types: {}", e);
                }
            }
            for document in &mut documents {
                if let Some(name) = document
                    .i64_field("document_type")
                    .and_then(|id| self.types.get(id))
                {
                    document.set(TYPE_NAME, Value::from(name));
                }
            }
        }

        Ok(documents)
    }
}

fn tag_ids(document: &RemoteItem) -> Vec<i64> {
    document
        .get("tags")
        .and_then(Value::as_array)
        .map(|tags| tags.iter().filter_map(Value::as_i64).collect())
        .unwrap_or_default()
}

pub struct PaperlessPlugin {
    settings: Settings,
    http: Arc<HttpClient>,
    endpoint: Endpoint,
    session: CacheSession,
    tags: Arc<LookupCache>,
    types: Arc<LookupCache>,
    desktop: Arc<dyn Desktop>,
    runner: QueryRunner,
}

impl PaperlessPlugin {
    pub fn new(ctx: &PluginContext) -> Result<Self> {
        Self::with_runner(ctx, QueryRunner::default())
    }

    pub fn with_runner(ctx: &PluginContext, runner: QueryRunner) -> Result<Self> {
        let settings = ctx.settings(ID);
        let http = ctx.http_client(ID)?;
        let endpoint = Endpoint::new(build_client(&settings, &http));

        let tags = Arc::new(LookupCache::new(
            "tags",
            ctx.data_path("paperless-tags.json"),
            Arc::new(LiveList::paginated(endpoint.clone(), "/api/tags/", "page_size")),
            "name",
        ));
        let types = Arc::new(LookupCache::new(
            "document types",
            ctx.data_path("paperless-document-types.json"),
            Arc::new(LiveList::paginated(
                endpoint.clone(),
                "/api/document_types/",
                "page_size",
            )),
            "name",
        ));

        let source = DocumentSource {
            documents: LiveList::paginated(endpoint.clone(), DOCUMENTS_PATH, "page_size"),
            tags: tags.clone(),
            types: types.clone(),
            settings: settings.clone(),
        };
        let session = CacheSession::new(
            ID,
            Arc::new(source),
            Arc::new(JsonFileStore::new(ctx.cache_path(ID))),
            cache_config(&settings, CACHE_DEFAULTS),
        );
        session.start();

        Ok(Self {
            settings,
            http,
            endpoint,
            session,
            tags,
            types,
            desktop: ctx.desktop.clone(),
            runner,
        })
    }

    pub fn session(&self) -> &CacheSession {
        &self.session
    }

    fn render(&self, documents: &[RemoteItem], text: &str) -> Vec<DisplayItem> {
        let schema = DocumentSchema::from_settings(&self.settings);
        let client = self.endpoint.client();
        filter(documents, text, &schema)
            .filter_map(|document| render_document(&client, document))
            .collect()
    }

    async fn search(&self, text: &str) -> Result<Vec<DisplayItem>> {
        let documents = self.session.get_results().await?;
        Ok(self.render(&documents, text))
    }

    async fn download(&self, id: i64) -> Result<PathBuf> {
        let client = self.endpoint.client();
        let download = client
            .download(&format!("{}{}/download/", DOCUMENTS_PATH, id))
            .await?;

        let file_name = download
            .content_disposition
            .as_deref()
            .and_then(disposition_filename)
            .and_then(|name| safe_file_name(&name))
            .unwrap_or_else(|| FALLBACK_FILE_NAME.to_string());

        let dir = expand_home(&self.settings.string("download_path", DEFAULT_DOWNLOAD_PATH));
        tokio::fs::create_dir_all(&dir)
            .await
            .map_err(|e| LaunchkitError::io_with_path(e, &dir))?;
        let path = dir.join(file_name);
        tokio::fs::write(&path, &download.bytes)
            .await
            .map_err(|e| LaunchkitError::io_with_path(e, &path))?;
        info!("Saved document {} to {}", id, path.display());

        self.desktop.open_url(file_url(&path)?.as_str())?;
        Ok(path)
    }

    async fn delete(&self, id: i64) -> Result<()> {
        let client = self.endpoint.client();
        let path = format!("{}{}/", DOCUMENTS_PATH, id);
        self.session
            .mutate(|| async move { client.delete(&path, None).await })
            .await?;
        info!("Deleted document {}", id);
        Ok(())
    }

    /// Bring a lookup file in line with its filter toggle.
    async fn sync_lookup(&self, lookup: &LookupCache, enabled: bool) {
        let result = if enabled {
            lookup.refresh().await.map(|count| debug!("Fetched {} names", count))
        } else {
            lookup.clear()
        };
        if let Err(e) = result {
            warn!("Failed to update {}: {}", lookup.path().display(), e);
        }
        // Cached documents carry names resolved under the old toggle.
        self.session.expire();
    }
}

fn build_client(settings: &Settings, http: &Arc<HttpClient>) -> ServiceClient {
    ServiceClient::new(
        http.clone(),
        settings.string("instance_url", DEFAULT_URL),
        Auth::basic(settings.string("username", ""), settings.string("password", "")),
    )
}

fn render_document(client: &ServiceClient, document: &RemoteItem) -> Option<DisplayItem> {
    let id = document.i64_field("id")?;
    let preview_url = client.url(&format!("{}{}/preview/", DOCUMENTS_PATH, id));
    let download_url = client.url(&format!("{}{}/download/", DOCUMENTS_PATH, id));
    let icon = plugin_icon(ID);

    Some(
        DisplayItem::new(
            format!("{}-{}", ID, id),
            document.str_field("title").unwrap_or("Untitled"),
        )
        .with_subtext(format!(
            "{} - {}",
            document.str_field(TYPE_NAME).unwrap_or("No type"),
            document.str_field(TAG_NAMES).unwrap_or("No tags")
        ))
        .with_icons(&[icon.as_str()])
        .with_actions([
            ItemAction::plugin("download", "Download document", "download", json!({"id": id})),
            ItemAction::open_url("open", "Open document in browser", preview_url.clone()),
            ItemAction::copy("copy", "Copy preview URL to clipboard", preview_url),
            ItemAction::copy("copy-dl", "Copy download URL to clipboard", download_url),
            ItemAction::plugin("delete", "Delete document", "delete", json!({"id": id})),
        ]),
    )
}

/// File name from a `Content-Disposition` header.
///
/// Prefers the RFC 5987 `filename*=charset''name` form over plain `filename=`.
pub fn disposition_filename(header: &str) -> Option<String> {
    let mut plain = None;
    for part in header.split(';').map(str::trim) {
        if let Some(value) = strip_prefix_ignore_case(part, "filename*=") {
            let encoded = value.splitn(3, '\'').nth(2).unwrap_or(value);
            if let Ok(decoded) = urlencoding::decode(encoded.trim_matches('"')) {
                if !decoded.is_empty() {
                    return Some(decoded.into_owned());
                }
            }
        } else if let Some(value) = strip_prefix_ignore_case(part, "filename=") {
            let value = value.trim_matches('"');
            if !value.is_empty() {
                plain = Some(value.to_string());
            }
        }
    }
    plain
}

fn strip_prefix_ignore_case<'a>(text: &'a str, prefix: &str) -> Option<&'a str> {
    let head = text.get(..prefix.len())?;
    head.eq_ignore_ascii_case(prefix)
        .then(|| &text[prefix.len()..])
}

/// Final path component only, with spaces replaced.
fn safe_file_name(name: &str) -> Option<String> {
    let base = name.rsplit(['/', '\\']).next()?.trim();
    if base.is_empty() || base == "." || base == ".." {
        return None;
    }
    Some(base.replace(' ', "_"))
}

/// `file://` URL for a saved download, percent-encoded so names holding
/// `#`, `%` or `?` still point at the file.
fn file_url(path: &Path) -> Result<Url> {
    Url::from_file_path(path).map_err(|()| LaunchkitError::Validation {
        field: "download_path".to_string(),
        message: format!("{} is not an absolute path", path.display()),
    })
}

fn expand_home(path: &str) -> PathBuf {
    let rest = if path == "~" {
        Some("")
    } else {
        path.strip_prefix("~/")
    };
    match (rest, dirs::home_dir()) {
        (Some(rest), Some(home)) => home.join(rest),
        _ => Path::new(path).to_path_buf(),
    }
}

#[async_trait]
impl Plugin for PaperlessPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &METADATA
    }

    fn config_fields(&self) -> Vec<ConfigField> {
        let mut fields = vec![
            ConfigField::text("instance_url", "URL", DEFAULT_URL),
            ConfigField::text("username", "Username", ""),
            ConfigField::secret("password", "Password"),
            ConfigField::text("download_path", "Download Path", DEFAULT_DOWNLOAD_PATH),
            ConfigField::toggle("filter_by_tags", "Filter by document tags", true),
            ConfigField::toggle("filter_by_type", "Filter by document type", true),
            ConfigField::toggle("filter_by_body", "Filter by document body", false),
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
                "Search for a document in Paperless",
            )
            .with_icons(&[icon.as_str()])];
            if self.session.config().enabled {
                items.push(refresh_cache_item(ID, "documents"));
            }
            return items;
        }

        self.runner.run(query, || self.search(text)).await
    }

    async fn handle_global_query(&self, query: &Query) -> Vec<DisplayItem> {
        let text = query.trimmed();
        if text.is_empty() {
            return Vec::new();
        }
        match self.session.cached_items() {
            Some(documents) => self.render(&documents, text),
            None => Vec::new(),
        }
    }

    async fn handle_action(&self, action: &str, context: &Value) -> Result<()> {
        match action {
            "download" => self.download(context_id(context)?).await.map(|_| ()),
            "delete" => self.delete(context_id(context)?).await,
            "refresh" => {
                let documents = self.session.refresh().await?;
                info!("Cached {} documents", documents.len());
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

        match key {
            "instance_url" | "username" | "password" => {
                self.endpoint.replace(build_client(&self.settings, &self.http));
                for lookup in [&self.tags, &self.types] {
                    if let Err(e) = lookup.clear() {
                        warn!("Failed to clear {}: {}", lookup.path().display(), e);
                    }
                }
                if let Err(e) = self.session.clear() {
                    warn!("Failed to clear Paperless cache: {}", e);
                }
            }
            "filter_by_tags" => {
                self.sync_lookup(&self.tags, self.settings.bool(key, true))
                    .await
            }
            "filter_by_type" => {
                self.sync_lookup(&self.types, self.settings.bool(key, true))
                    .await
            }
            key if is_cache_key(key) => {
                self.session
                    .set_config(cache_config(&self.settings, CACHE_DEFAULTS));
            }
            _ => {}
        }
        Ok(())
    }

    async fn shutdown(&self) {
        self.session.stop();
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disposition_filename() {
        assert_eq!(
            disposition_filename("attachment; filename=\"invoice 2024.pdf\"").as_deref(),
            Some("invoice 2024.pdf")
        );
        assert_eq!(
            disposition_filename(
                "attachment; filename=\"fallback.pdf\"; filename*=utf-8''Rechnung%20M%C3%A4rz.pdf"
            )
            .as_deref(),
            Some("Rechnung März.pdf")
        );
        assert_eq!(disposition_filename("inline"), None);
        assert_eq!(disposition_filename("attachment; filename=\"\""), None);
    }

    #[test]
    fn test_safe_file_name() {
        assert_eq!(safe_file_name("my scan.pdf").as_deref(), Some("my_scan.pdf"));
        assert_eq!(safe_file_name("../../etc/passwd").as_deref(), Some("passwd"));
        assert_eq!(safe_file_name(".."), None);
        assert_eq!(safe_file_name("dir/"), None);
    }

    #[test]
    fn test_file_url_escapes_reserved_characters() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("Invoice_#4_(100%).pdf");

        let url = file_url(&path).unwrap();

        assert!(url.as_str().ends_with("/Invoice_%234_(100%25).pdf"));
        assert_eq!(url.fragment(), None);
        assert_eq!(url.to_file_path().unwrap(), path);
        assert!(file_url(Path::new("relative/doc.pdf")).is_err());
    }

    #[test]
    fn test_expand_home() {
        assert_eq!(expand_home("/tmp/docs"), PathBuf::from("/tmp/docs"));
        if let Some(home) = dirs::home_dir() {
            assert_eq!(expand_home("~/Downloads"), home.join("Downloads"));
        }
    }

    #[test]
    fn test_schema_respects_toggles() {
        let document = RemoteItem::from_value(json!({
            "id": 1,
            "title": "Lease",
            TAG_NAMES: "home,contracts",
            TYPE_NAME: "Contract",
            "content": "landlord"
        }))
        .unwrap();

        let all = DocumentSchema {
            tags: true,
            document_type: true,
            body: true,
        };
        assert_eq!(all.searchable_text(&document), "Leasehome,contractsContractlandlord");

        let title_only = DocumentSchema {
            tags: false,
            document_type: false,
            body: false,
        };
        assert_eq!(title_only.searchable_text(&document), "Lease");
    }

    #[test]
    fn test_render_document_subtext_defaults() {
        let http = Arc::new(HttpClient::new("org.launchkit.test").unwrap());
        let client = ServiceClient::new(http, "http://paperless", Auth::None);
        let document = RemoteItem::from_value(json!({"id": 3, "title": "Receipt"})).unwrap();

        let row = render_document(&client, &document).unwrap();

        assert_eq!(row.subtext, "No type - No tags");
        assert_eq!(
            row.actions[2].command,
            launchkit_core::ActionCommand::Copy {
                text: "http://paperless/api/documents/3/preview/".into()
            }
        );
    }
}
