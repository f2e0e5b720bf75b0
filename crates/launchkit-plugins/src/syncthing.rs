//! Syncthing devices and folders.

use crate::common::{plugin_icon, read_values, store_value, Endpoint};
use crate::context::PluginContext;
use async_trait::async_trait;
use launchkit_core::network::{Auth, HttpClient, ServiceClient};
use launchkit_core::search::contains_ignore_case;
use launchkit_core::{
    ConfigField, DisplayItem, ItemAction, LaunchkitError, Plugin, PluginMetadata, Query,
    QueryRunner, Result, Settings,
};
use serde::Deserialize;
use serde_json::{json, Map, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::info;

const ID: &str = "syncthing";
const DEFAULT_URL: &str = "http://localhost:8384";

static METADATA: PluginMetadata = PluginMetadata {
    id: ID,
    name: "Syncthing",
    description: "Trigger basic Syncthing actions",
    default_trigger: "st ",
    synopsis: "<device|folder>",
    global: true,
};

/// The parts of `GET /rest/config` this plugin reads.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct SyncthingConfig {
    #[serde(default)]
    pub devices: Vec<Device>,
    #[serde(default)]
    pub folders: Vec<Folder>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct Device {
    #[serde(rename = "deviceID")]
    pub device_id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub paused: bool,
}

impl Device {
    fn display_name(&self) -> &str {
        if self.name.is_empty() {
            &self.device_id
        } else {
            &self.name
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct Folder {
    pub id: String,
    #[serde(default)]
    pub label: String,
    #[serde(default)]
    pub path: String,
    #[serde(default)]
    pub devices: Vec<FolderDevice>,
}

impl Folder {
    fn display_name(&self) -> &str {
        if self.label.is_empty() {
            &self.id
        } else {
            &self.label
        }
    }
}

#[derive(Debug, Clone, Deserialize)]
pub struct FolderDevice {
    #[serde(rename = "deviceID")]
    pub device_id: String,
}

/// Devices then folders whose name contains `text`.
pub fn render(config: &SyncthingConfig, text: &str) -> Vec<DisplayItem> {
    let needle = text.to_lowercase();
    let icon = plugin_icon(ID);
    let names: HashMap<&str, &str> = config
        .devices
        .iter()
        .map(|d| (d.device_id.as_str(), d.display_name()))
        .collect();

    let devices = config
        .devices
        .iter()
        .filter(|d| contains_ignore_case(d.display_name(), &needle))
        .map(|device| {
            let shared: Vec<&str> = config
                .folders
                .iter()
                .filter(|f| f.devices.iter().any(|fd| fd.device_id == device.device_id))
                .map(Folder::display_name)
                .collect();
            let context = json!({"device": device.device_id});
            let action = if device.paused {
                ItemAction::plugin("resume", "Resume synchronization", "resume", context)
            } else {
                ItemAction::plugin("pause", "Pause synchronization", "pause", context)
            };

            DisplayItem::new(device.device_id.clone(), device.display_name())
                .with_subtext(format!(
                    "{}Syncthing device. Shared: {}.",
                    if device.paused { "Paused " } else { "" },
                    if shared.is_empty() {
                        "Nothing".to_string()
                    } else {
                        shared.join(", ")
                    }
                ))
                .with_icons(&[icon.as_str()])
                .with_action(action)
        });

    let folders = config
        .folders
        .iter()
        .filter(|f| contains_ignore_case(f.display_name(), &needle))
        .map(|folder| {
            let with: Vec<&str> = folder
                .devices
                .iter()
                .map(|fd| names.get(fd.device_id.as_str()).copied().unwrap_or(&fd.device_id))
                .collect();

            DisplayItem::new(folder.id.clone(), folder.display_name())
                .with_subtext(format!(
                    "Syncthing folder {}. Shared with {}.",
                    folder.path,
                    if with.is_empty() {
                        "nobody".to_string()
                    } else {
                        with.join(", ")
                    }
                ))
                .with_icons(&[icon.as_str()])
                .with_actions([
                    ItemAction::plugin("scan", "Scan the folder", "scan", json!({"folder": folder.id})),
                    ItemAction::open_url(
                        "open",
                        "Open this folder in file browser",
                        format!("file://{}", folder.path),
                    ),
                ])
        });

    devices.chain(folders).collect()
}

pub struct SyncthingPlugin {
    settings: Settings,
    http: Arc<HttpClient>,
    endpoint: Endpoint,
    runner: QueryRunner,
}

impl SyncthingPlugin {
    pub fn new(ctx: &PluginContext) -> Result<Self> {
        Self::with_runner(ctx, QueryRunner::default())
    }

    pub fn with_runner(ctx: &PluginContext, runner: QueryRunner) -> Result<Self> {
        let settings = ctx.settings(ID);
        let http = ctx.http_client(ID)?;
        let endpoint = Endpoint::new(build_client(&settings, &http));
        Ok(Self {
            settings,
            http,
            endpoint,
            runner,
        })
    }

    async fn search(&self, text: &str) -> Result<Vec<DisplayItem>> {
        let config: SyncthingConfig = self.endpoint.client().get_json("/rest/config").await?;
        Ok(render(&config, text))
    }

    async fn post(&self, path: &str, param: &str, context: &Value) -> Result<()> {
        let value = context
            .get(param)
            .and_then(Value::as_str)
            .ok_or_else(|| LaunchkitError::InvalidParams {
                message: format!("action context needs a `{}`", param),
            })?;
        let url = format!("{}?{}={}", path, param, urlencoding::encode(value));
        self.endpoint.client().post_empty(&url).await?;
        info!("POST {} for {}", path, value);
        Ok(())
    }
}

fn build_client(settings: &Settings, http: &Arc<HttpClient>) -> ServiceClient {
    ServiceClient::new(
        http.clone(),
        settings.string("instance_url", DEFAULT_URL),
        Auth::api_key(settings.string("api_key", "")),
    )
}

#[async_trait]
impl Plugin for SyncthingPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &METADATA
    }

    fn config_fields(&self) -> Vec<ConfigField> {
        vec![
            ConfigField::text("instance_url", "URL", DEFAULT_URL),
            ConfigField::secret("api_key", "API key"),
        ]
    }

    async fn handle_query(&self, query: &Query) -> Vec<DisplayItem> {
        let text = query.trimmed();
        self.runner.run(query, || self.search(text)).await
    }

    async fn handle_global_query(&self, query: &Query) -> Vec<DisplayItem> {
        if query.trimmed().is_empty() {
            return Vec::new();
        }
        self.handle_query(query).await
    }

    async fn handle_action(&self, action: &str, context: &Value) -> Result<()> {
        match action {
            "pause" => self.post("/rest/system/pause", "device", context).await,
            "resume" => self.post("/rest/system/resume", "device", context).await,
            "scan" => self.post("/rest/db/scan", "folder", context).await,
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
        if store_value(&self.settings, &self.config_fields(), key, value)? {
            self.endpoint.replace(build_client(&self.settings, &self.http));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config() -> SyncthingConfig {
        serde_json::from_value(json!({
            "devices": [
                {"deviceID": "AAAA-1111", "name": "laptop", "paused": false},
                {"deviceID": "BBBB-2222", "name": "", "paused": true}
            ],
            "folders": [
                {"id": "docs", "label": "Documents", "path": "/home/me/Documents",
                 "devices": [{"deviceID": "AAAA-1111"}, {"deviceID": "BBBB-2222"}]},
                {"id": "photos-x1", "label": "", "path": "/home/me/Photos", "devices": []}
            ],
            "gui": {"enabled": true}
        }))
        .unwrap()
    }

    #[test]
    fn test_empty_text_lists_everything() {
        let items = render(&config(), "");
        let texts: Vec<_> = items.iter().map(|i| i.text.as_str()).collect();
        assert_eq!(texts, vec!["laptop", "BBBB-2222", "Documents", "photos-x1"]);
    }

    #[test]
    fn test_device_rendering() {
        let items = render(&config(), "bbbb");
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].subtext, "Paused Syncthing device. Shared: Documents.");
        assert_eq!(items[0].actions[0].id, "resume");

        let laptop = &render(&config(), "LAP")[0];
        assert_eq!(laptop.subtext, "Syncthing device. Shared: Documents.");
        assert_eq!(laptop.actions[0].id, "pause");
    }

    #[test]
    fn test_folder_rendering() {
        let docs = &render(&config(), "documents")[0];
        assert_eq!(
            docs.subtext,
            "Syncthing folder /home/me/Documents. Shared with laptop, BBBB-2222."
        );

        let photos = &render(&config(), "photos")[0];
        assert_eq!(photos.subtext, "Syncthing folder /home/me/Photos. Shared with nobody.");
        assert_eq!(photos.actions.len(), 2);
    }
}
