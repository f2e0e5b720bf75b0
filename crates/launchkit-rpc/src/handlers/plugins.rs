//! Plugin discovery handlers.

use crate::server::AppState;
use launchkit_core::Result;
use serde_json::{json, Value};

pub async fn list_plugins(state: &AppState, _params: &Value) -> Result<Value> {
    let plugins = state
        .plugins
        .iter()
        .map(|p| serde_json::to_value(p.metadata()))
        .collect::<std::result::Result<Vec<_>, _>>()?;
    Ok(json!({
        "success": true,
        "plugins": plugins
    }))
}
