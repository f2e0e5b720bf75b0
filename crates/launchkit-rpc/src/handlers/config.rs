//! Settings handlers.

use super::{require_param, require_str_param};
use crate::server::AppState;
use launchkit_core::Result;
use serde_json::{json, Value};
use tracing::info;

pub async fn get_config(state: &AppState, params: &Value) -> Result<Value> {
    let plugin_id = require_str_param(params, "plugin_id", "pluginId")?;
    let plugin = state.plugin(&plugin_id)?;
    Ok(json!({
        "success": true,
        "fields": serde_json::to_value(plugin.config_fields())?,
        "values": Value::Object(plugin.get_config())
    }))
}

pub async fn set_config(state: &AppState, params: &Value) -> Result<Value> {
    let plugin_id = require_str_param(params, "plugin_id", "pluginId")?;
    let key = require_str_param(params, "key", "key")?;
    let value = require_param(params, "value", "value")?.clone();
    let plugin = state.plugin(&plugin_id)?;

    plugin.set_config(&key, value).await?;
    info!("Updated {} setting {}", plugin_id, key);

    Ok(json!({"success": true}))
}
