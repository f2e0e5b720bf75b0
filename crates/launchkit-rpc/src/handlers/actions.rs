//! Action execution.
//!
//! The front end sends back either a whole `ItemAction` (as it received it
//! from `query`) or just its `command`. Desktop commands are executed here;
//! plugin commands are routed to the owning plugin.

use super::{get_str_param, require_param};
use crate::server::AppState;
use launchkit_core::{ActionCommand, ItemAction, LaunchkitError, Result};
use serde_json::{json, Value};
use tracing::info;

fn parse_command(params: &Value) -> Result<ActionCommand> {
    let invalid = |e: serde_json::Error| LaunchkitError::InvalidParams {
        message: format!("Invalid action: {}", e),
    };

    if let Some(action) = params.get("action").filter(|v| v.is_object()) {
        let action: ItemAction = serde_json::from_value(action.clone()).map_err(invalid)?;
        return Ok(action.command);
    }
    let command = require_param(params, "command", "command")?;
    serde_json::from_value(command.clone()).map_err(invalid)
}

pub async fn run_action(state: &AppState, params: &Value) -> Result<Value> {
    match parse_command(params)? {
        ActionCommand::OpenUrl { url } => state.desktop.open_url(&url)?,
        ActionCommand::Copy { text } => state.desktop.set_clipboard_text(&text).await?,
        ActionCommand::RunDetached { argv } => state.desktop.run_detached(&argv)?,
        ActionCommand::Plugin { action, context } => {
            let plugin_id = get_str_param(params, "plugin_id", "pluginId").ok_or_else(|| {
                LaunchkitError::InvalidParams {
                    message: "Missing required parameter: plugin_id".to_string(),
                }
            })?;
            let plugin = state.plugin(plugin_id)?;
            info!("Running {} action {}", plugin_id, action);
            plugin.handle_action(&action, &context).await?;
        }
    }

    Ok(json!({"success": true}))
}
