//! Mullvad VPN, driven through the `mullvad` CLI.

use async_trait::async_trait;
use launchkit_core::platform::run_command_output;
use launchkit_core::search::matches_all_terms;
use launchkit_core::{
    ConfigField, DisplayItem, ItemAction, LaunchkitError, Plugin, PluginMetadata, Query, Result,
};
use regex::Regex;
use serde_json::{Map, Value};
use std::sync::{Arc, LazyLock};
use tracing::warn;

const ID: &str = "mullvad";
const DEFAULT_ICON: &str = "xdg:network-wired";
const BLOCKED_ICON: &str = "xdg:network-vpn-acquiring";
const CONNECTED_ICON: &str = "xdg:network-vpn";
const DISCONNECTED_ICON: &str = "xdg:network-vpn-disconnected";

static METADATA: PluginMetadata = PluginMetadata {
    id: ID,
    name: "Mullvad",
    description: "Manage Mullvad VPN connections",
    default_trigger: "mullvad ",
    synopsis: "<relay|action>",
    global: true,
};

/// Relay hostnames such as `se-got-wg-001`.
static RELAY_NAME: LazyLock<Option<Regex>> = LazyLock::new(|| {
    Regex::new(r"^[a-z]{2}-[a-z]*-[a-z]{2,4}-[\d]{2,3}")
        .map_err(|e| warn!("Invalid relay pattern: {}", e))
        .ok()
});

/// Runs `mullvad` subcommands.
#[async_trait]
pub trait MullvadCli: Send + Sync {
    async fn output(&self, args: &[&str]) -> Result<String>;
}

/// The installed `mullvad` binary.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemCli;

#[async_trait]
impl MullvadCli for SystemCli {
    async fn output(&self, args: &[&str]) -> Result<String> {
        run_command_output("mullvad", args).await
    }
}

/// `(relay name, full line)` for every relay line of `mullvad relay list`.
pub fn parse_relays(listing: &str) -> Vec<(String, String)> {
    let Some(pattern) = RELAY_NAME.as_ref() else {
        return Vec::new();
    };
    listing
        .lines()
        .filter_map(|line| {
            let name = line.split_whitespace().next()?;
            pattern
                .is_match(name)
                .then(|| (name.to_string(), line.trim().to_string()))
        })
        .collect()
}

fn status_icon(status: &str) -> &'static str {
    if status.starts_with("Blocked") {
        BLOCKED_ICON
    } else if status.starts_with("Disconnected") {
        DISCONNECTED_ICON
    } else if status.starts_with("Connected") {
        CONNECTED_ICON
    } else {
        DEFAULT_ICON
    }
}

fn cli_action(id: &str, label: &str) -> ItemAction {
    ItemAction::run_detached(id, label, ["mullvad", id])
}

fn status_item(status: &str) -> DisplayItem {
    DisplayItem::new("status", "Status")
        .with_subtext(status)
        .with_icons(&[status_icon(status)])
        .with_actions([
            cli_action("reconnect", "Reconnect"),
            cli_action("connect", "Connect"),
            cli_action("disconnect", "Disconnect"),
        ])
}

fn quick_actions() -> [DisplayItem; 3] {
    [
        DisplayItem::new("connect", "Connect")
            .with_subtext("Connect to default server")
            .with_icons(&[CONNECTED_ICON])
            .with_action(cli_action("connect", "Connect")),
        DisplayItem::new("disconnect", "Disconnect")
            .with_subtext("Disconnect from VPN")
            .with_icons(&[DISCONNECTED_ICON])
            .with_action(cli_action("disconnect", "Disconnect")),
        DisplayItem::new("reconnect", "Reconnect")
            .with_subtext("Reconnect to current server")
            .with_icons(&[BLOCKED_ICON])
            .with_action(cli_action("reconnect", "Reconnect")),
    ]
}

fn matching_quick_actions(text: &str) -> impl Iterator<Item = DisplayItem> {
    let needle = text.to_lowercase();
    quick_actions()
        .into_iter()
        .filter(move |item| item.text.to_lowercase().contains(&needle))
}

fn relay_item(name: &str, line: &str) -> DisplayItem {
    DisplayItem::new(format!("vpn-{}", name), name)
        .with_subtext(line)
        .with_icons(&[DEFAULT_ICON])
        .with_actions([
            ItemAction::run_detached(
                "connect",
                "Connect",
                ["mullvad", "relay", "set", "location", name],
            ),
            ItemAction::copy("copy", "Copy to Clipboard", name),
        ])
}

pub struct MullvadPlugin {
    cli: Arc<dyn MullvadCli>,
}

impl MullvadPlugin {
    pub fn new() -> Self {
        Self::with_cli(Arc::new(SystemCli))
    }

    pub fn with_cli(cli: Arc<dyn MullvadCli>) -> Self {
        Self { cli }
    }

    async fn search(&self, text: &str) -> Result<Vec<DisplayItem>> {
        let listing = self.cli.output(&["relay", "list"]).await?;
        let relays = parse_relays(&listing);

        Ok(matching_quick_actions(text)
            .chain(
                relays
                    .iter()
                    .filter(|(name, _)| matches_all_terms(name, text))
                    .map(|(name, line)| relay_item(name, line)),
            )
            .collect())
    }
}

impl Default for MullvadPlugin {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Plugin for MullvadPlugin {
    fn metadata(&self) -> &PluginMetadata {
        &METADATA
    }

    fn config_fields(&self) -> Vec<ConfigField> {
        Vec::new()
    }

    async fn handle_query(&self, query: &Query) -> Vec<DisplayItem> {
        if !query.is_valid() {
            return Vec::new();
        }

        let text = query.trimmed();
        let result = if text.is_empty() {
            self.cli
                .output(&["status"])
                .await
                .map(|status| vec![status_item(status.trim())])
        } else {
            self.search(text).await
        };

        match result {
            Ok(items) => items,
            Err(e) => {
                warn!("mullvad query failed: {}", e);
                vec![DisplayItem::notice("error", e.user_message(), e.to_string())
                    .with_icons(&[DEFAULT_ICON])]
            }
        }
    }

    async fn handle_global_query(&self, query: &Query) -> Vec<DisplayItem> {
        let text = query.trimmed();
        if text.is_empty() {
            return Vec::new();
        }
        matching_quick_actions(text).collect()
    }

    async fn handle_action(&self, action: &str, _context: &Value) -> Result<()> {
        Err(LaunchkitError::UnknownAction {
            plugin: ID.to_string(),
            action: action.to_string(),
        })
    }

    fn get_config(&self) -> Map<String, Value> {
        Map::new()
    }

    async fn set_config(&self, key: &str, _value: Value) -> Result<()> {
        Err(LaunchkitError::Validation {
            field: key.to_string(),
            message: "unknown setting".to_string(),
        })
    }
}
