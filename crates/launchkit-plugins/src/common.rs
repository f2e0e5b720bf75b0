//! Pieces shared by the remote-backed plugins.

use async_trait::async_trait;
use launchkit_core::cache::{ArrayEndpoint, CacheConfig, ListSource};
use launchkit_core::host::find_field;
use launchkit_core::network::{PaginatedFetcher, ServiceClient};
use launchkit_core::{
    ConfigField, DisplayItem, FieldKind, ItemAction, RemoteItem, Result, Settings,
};
use serde_json::{json, Map, Value};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::debug;

/// Placeholder returned for secrets that are set.
pub const SECRET_MASK: &str = "********";

pub const CACHE_RESULTS: &str = "cache_results";
pub const CACHE_LENGTH: &str = "cache_length";
pub const AUTO_CACHE: &str = "auto_cache";

/// The service connection a plugin currently talks to.
///
/// Swapped wholesale when the URL or credentials change, so in-flight
/// requests finish against the connection they started with.
#[derive(Clone)]
pub struct Endpoint(Arc<RwLock<ServiceClient>>);

impl Endpoint {
    pub fn new(client: ServiceClient) -> Self {
        Self(Arc::new(RwLock::new(client)))
    }

    pub fn client(&self) -> ServiceClient {
        self.0.read().unwrap_or_else(PoisonError::into_inner).clone()
    }

    pub fn replace(&self, client: ServiceClient) {
        *self.0.write().unwrap_or_else(PoisonError::into_inner) = client;
    }

    pub fn url(&self, path: &str) -> String {
        self.0
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .url(path)
    }
}

/// A list endpoint resolved against the current [`Endpoint`] on every fetch.
pub struct LiveList {
    endpoint: Endpoint,
    path: String,
    /// Page-size parameter for cursor-paginated endpoints; `None` for bare arrays.
    page_param: Option<&'static str>,
}

impl LiveList {
    pub fn array(endpoint: Endpoint, path: impl Into<String>) -> Self {
        Self {
            endpoint,
            path: path.into(),
            page_param: None,
        }
    }

    pub fn paginated(endpoint: Endpoint, path: impl Into<String>, page_param: &'static str) -> Self {
        Self {
            endpoint,
            path: path.into(),
            page_param: Some(page_param),
        }
    }
}

#[async_trait]
impl ListSource for LiveList {
    async fn fetch_all(&self) -> Result<Vec<RemoteItem>> {
        let client = self.endpoint.client();
        match self.page_param {
            Some(param) => {
                PaginatedFetcher::new(client, self.path.clone(), param)
                    .fetch_all()
                    .await
            }
            None => ArrayEndpoint::new(client, self.path.clone()).fetch_all().await,
        }
    }
}

/// Per-plugin defaults for the three cache settings.
#[derive(Debug, Clone, Copy)]
pub struct CacheSettingDefaults {
    pub enabled: bool,
    pub minutes: i64,
    pub auto: bool,
}

pub fn cache_fields(defaults: CacheSettingDefaults) -> Vec<ConfigField> {
    vec![
        ConfigField::toggle(CACHE_RESULTS, "Cache results locally", defaults.enabled),
        ConfigField::number(CACHE_LENGTH, "Cache length (minutes)", defaults.minutes),
        ConfigField::toggle(AUTO_CACHE, "Periodically cache results", defaults.auto),
    ]
}

pub fn is_cache_key(key: &str) -> bool {
    matches!(key, CACHE_RESULTS | CACHE_LENGTH | AUTO_CACHE)
}

pub fn cache_config(settings: &Settings, defaults: CacheSettingDefaults) -> CacheConfig {
    let minutes = settings.int(CACHE_LENGTH, defaults.minutes).max(0) as u64;
    CacheConfig {
        enabled: settings.bool(CACHE_RESULTS, defaults.enabled),
        ..CacheConfig::default()
    }
    .with_ttl_minutes(minutes)
    .with_auto_refresh(settings.bool(AUTO_CACHE, defaults.auto))
}

/// Current value of every field, secrets masked.
pub fn read_values(settings: &Settings, fields: &[ConfigField]) -> Map<String, Value> {
    fields
        .iter()
        .map(|field| {
            let value = match field.kind {
                FieldKind::Secret => {
                    let secret = settings.string(field.key, "");
                    Value::from(if secret.is_empty() { "" } else { SECRET_MASK })
                }
                FieldKind::Text => {
                    Value::from(settings.string(field.key, field.default.as_str().unwrap_or("")))
                }
                FieldKind::Number => {
                    Value::from(settings.int(field.key, field.default.as_i64().unwrap_or(0)))
                }
                FieldKind::Toggle => {
                    Value::from(settings.bool(field.key, field.default.as_bool().unwrap_or(false)))
                }
            };
            (field.key.to_string(), value)
        })
        .collect()
}

/// Validate and persist one setting.
///
/// Returns `false` without writing when a secret field is sent back masked.
pub fn store_value(
    settings: &Settings,
    fields: &[ConfigField],
    key: &str,
    value: Value,
) -> Result<bool> {
    let field = find_field(fields, key)?;
    field.validate(&value)?;

    if field.kind == FieldKind::Secret && value.as_str() == Some(SECRET_MASK) {
        debug!("Ignoring masked value for {}.{}", settings.plugin(), key);
        return Ok(false);
    }

    settings.set(key, value)?;
    Ok(true)
}

/// Item offering a manual cache refresh.
pub fn refresh_cache_item(plugin_id: &str, noun: &str) -> DisplayItem {
    DisplayItem::new(format!("{}-refresh", plugin_id), "Refresh cache")
        .with_subtext(format!("Refresh cached {}", noun))
        .with_icons(&["xdg:view-refresh"])
        .with_action(ItemAction::plugin(
            "refresh",
            &format!("Refresh {} cache", noun),
            "refresh",
            json!({}),
        ))
}

/// Icon reference for a plugin's items.
pub fn plugin_icon(plugin_id: &str) -> String {
    format!("xdg:{}", plugin_id)
}

/// Required integer field of a plugin action's context.
pub fn context_id(context: &Value) -> Result<i64> {
    context
        .get("id")
        .and_then(Value::as_i64)
        .ok_or_else(|| launchkit_core::LaunchkitError::InvalidParams {
            message: "action context needs an integer `id`".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use launchkit_core::MemoryConfigStore;
    use std::time::Duration;

    const DEFAULTS: CacheSettingDefaults = CacheSettingDefaults {
        enabled: true,
        minutes: 60,
        auto: false,
    };

    fn settings() -> Settings {
        Settings::new("linkding", Arc::new(MemoryConfigStore::new()))
    }

    #[test]
    fn test_cache_config_from_settings() {
        let settings = settings();
        let config = cache_config(&settings, DEFAULTS);
        assert!(config.enabled);
        assert_eq!(config.ttl, Duration::from_secs(3600));
        assert!(!config.auto_refresh);

        settings.set(CACHE_LENGTH, json!(5)).unwrap();
        settings.set(CACHE_RESULTS, json!(false)).unwrap();
        let config = cache_config(&settings, DEFAULTS);
        assert!(!config.enabled);
        assert_eq!(config.ttl, Duration::from_secs(300));
    }

    #[test]
    fn test_secrets_are_masked_and_round_trip_safely() {
        let settings = settings();
        let fields = vec![
            ConfigField::text("instance_url", "URL", "http://localhost:9090"),
            ConfigField::secret("api_key", "API key"),
        ];

        assert_eq!(read_values(&settings, &fields)["api_key"], json!(""));

        assert!(store_value(&settings, &fields, "api_key", json!("token")).unwrap());
        let values = read_values(&settings, &fields);
        assert_eq!(values["api_key"], json!(SECRET_MASK));
        assert_eq!(values["instance_url"], json!("http://localhost:9090"));

        assert!(!store_value(&settings, &fields, "api_key", json!(SECRET_MASK)).unwrap());
        assert_eq!(settings.string("api_key", ""), "token");
    }

    #[test]
    fn test_store_value_rejects_unknown_and_mistyped() {
        let settings = settings();
        let fields = cache_fields(DEFAULTS);
        assert!(store_value(&settings, &fields, "nope", json!(1)).is_err());
        assert!(store_value(&settings, &fields, CACHE_LENGTH, json!("ten")).is_err());
        assert!(store_value(&settings, &fields, CACHE_LENGTH, json!(10)).unwrap());
    }

    #[test]
    fn test_context_id() {
        assert_eq!(context_id(&json!({"id": 7})).unwrap(), 7);
        assert!(context_id(&json!({"id": "7"})).is_err());
    }
}
