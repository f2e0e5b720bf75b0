//! Query handlers.

use super::{get_bool_param, get_str_param, require_str_param};
use crate::server::AppState;
use launchkit_core::{Query, Result};
use serde_json::{json, Value};
use tracing::debug;

/// Run one keystroke against a plugin.
///
/// A newer query for the same plugin (and lane) cancels this one; a cancelled
/// query answers with `cancelled: true` and no items.
pub async fn query(state: &AppState, params: &Value) -> Result<Value> {
    let plugin_id = require_str_param(params, "plugin_id", "pluginId")?;
    let text = get_str_param(params, "text", "text").unwrap_or_default();
    let global = get_bool_param(params, "global", "global").unwrap_or(false);
    let plugin = state.plugin(&plugin_id)?;

    let (query_id, token) =
        state
            .queries
            .begin(&plugin_id, global, get_str_param(params, "query_id", "queryId"));
    let query = Query::with_token(text, token);

    let items = if global {
        plugin.handle_global_query(&query).await
    } else {
        plugin.handle_query(&query).await
    };
    state.queries.finish(&plugin_id, global, &query_id);

    let cancelled = !query.is_valid();
    if cancelled {
        debug!("Query {} for {} was cancelled", query_id, plugin_id);
    }
    let items = if cancelled { Vec::new() } else { items };

    Ok(json!({
        "success": true,
        "query_id": query_id,
        "cancelled": cancelled,
        "items": serde_json::to_value(items)?
    }))
}

pub async fn cancel_query(state: &AppState, params: &Value) -> Result<Value> {
    let query_id = require_str_param(params, "query_id", "queryId")?;
    let cancelled = state.queries.cancel(&query_id);
    Ok(json!({
        "success": true,
        "cancelled": cancelled
    }))
}
