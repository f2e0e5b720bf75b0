//! Interface between plugins and the launcher host.
//!
//! The host owns query dispatch, ranking and rendering. A plugin only sees a
//! [`Query`] (text plus a cancellation token that the host trips when the user
//! keeps typing) and answers with [`DisplayItem`]s whose [`ItemAction`]s the
//! host executes later.

use crate::cancel::CancellationToken;
use crate::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

/// One keystroke-driven query.
#[derive(Debug, Clone)]
pub struct Query {
    text: String,
    token: CancellationToken,
}

impl Query {
    pub fn new(text: impl Into<String>) -> Self {
        Self::with_token(text, CancellationToken::new())
    }

    pub fn with_token(text: impl Into<String>, token: CancellationToken) -> Self {
        Self {
            text: text.into(),
            token,
        }
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn trimmed(&self) -> &str {
        self.text.trim()
    }

    /// `false` once the host has superseded or cancelled this query.
    pub fn is_valid(&self) -> bool {
        !self.token.is_cancelled()
    }

    pub fn token(&self) -> &CancellationToken {
        &self.token
    }
}

/// What the host does when the user picks an action.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ActionCommand {
    OpenUrl { url: String },
    Copy { text: String },
    RunDetached { argv: Vec<String> },
    /// Handed back to the plugin's [`Plugin::handle_action`].
    Plugin { action: String, context: Value },
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemAction {
    pub id: String,
    pub label: String,
    pub command: ActionCommand,
}

impl ItemAction {
    pub fn open_url(id: &str, label: &str, url: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            command: ActionCommand::OpenUrl { url: url.into() },
        }
    }

    pub fn copy(id: &str, label: &str, text: impl Into<String>) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            command: ActionCommand::Copy { text: text.into() },
        }
    }

    pub fn run_detached<I, S>(id: &str, label: &str, argv: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            command: ActionCommand::RunDetached {
                argv: argv.into_iter().map(Into::into).collect(),
            },
        }
    }

    pub fn plugin(id: &str, label: &str, action: &str, context: Value) -> Self {
        Self {
            id: id.to_string(),
            label: label.to_string(),
            command: ActionCommand::Plugin {
                action: action.to_string(),
                context,
            },
        }
    }
}

/// A result row.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DisplayItem {
    pub id: String,
    pub text: String,
    #[serde(default)]
    pub subtext: String,
    #[serde(default)]
    pub icon_urls: Vec<String>,
    #[serde(default)]
    pub actions: Vec<ItemAction>,
}

impl DisplayItem {
    pub fn new(id: impl Into<String>, text: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            text: text.into(),
            subtext: String::new(),
            icon_urls: Vec::new(),
            actions: Vec::new(),
        }
    }

    /// Informational row with no actions (empty queries, errors, "not found").
    pub fn notice(id: impl Into<String>, text: impl Into<String>, subtext: impl Into<String>) -> Self {
        Self::new(id, text).with_subtext(subtext)
    }

    pub fn with_subtext(mut self, subtext: impl Into<String>) -> Self {
        self.subtext = subtext.into();
        self
    }

    pub fn with_icons(mut self, icons: &[&str]) -> Self {
        self.icon_urls = icons.iter().map(|s| s.to_string()).collect();
        self
    }

    pub fn with_action(mut self, action: ItemAction) -> Self {
        self.actions.push(action);
        self
    }

    pub fn with_actions(mut self, actions: impl IntoIterator<Item = ItemAction>) -> Self {
        self.actions.extend(actions);
        self
    }
}

/// Static description of a plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PluginMetadata {
    pub id: &'static str,
    pub name: &'static str,
    pub description: &'static str,
    pub default_trigger: &'static str,
    pub synopsis: &'static str,
    /// Whether the plugin answers global (untriggered) queries.
    pub global: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FieldKind {
    Text,
    /// Rendered masked; never echoed back by `get_config`.
    Secret,
    Number,
    Toggle,
}

/// One user-editable setting.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConfigField {
    pub key: &'static str,
    pub label: &'static str,
    pub kind: FieldKind,
    pub default: Value,
}

impl ConfigField {
    pub fn text(key: &'static str, label: &'static str, default: &str) -> Self {
        Self {
            key,
            label,
            kind: FieldKind::Text,
            default: Value::from(default),
        }
    }

    pub fn secret(key: &'static str, label: &'static str) -> Self {
        Self {
            key,
            label,
            kind: FieldKind::Secret,
            default: Value::from(""),
        }
    }

    pub fn number(key: &'static str, label: &'static str, default: i64) -> Self {
        Self {
            key,
            label,
            kind: FieldKind::Number,
            default: Value::from(default),
        }
    }

    pub fn toggle(key: &'static str, label: &'static str, default: bool) -> Self {
        Self {
            key,
            label,
            kind: FieldKind::Toggle,
            default: Value::from(default),
        }
    }

    /// Check that `value` has the JSON type this field expects.
    pub fn validate(&self, value: &Value) -> Result<()> {
        let ok = match self.kind {
            FieldKind::Text | FieldKind::Secret => value.is_string(),
            FieldKind::Number => value.is_i64() || value.is_u64(),
            FieldKind::Toggle => value.is_boolean(),
        };
        if ok {
            Ok(())
        } else {
            Err(crate::LaunchkitError::Validation {
                field: self.key.to_string(),
                message: format!("expected a {:?} value, got {}", self.kind, value),
            })
        }
    }
}

/// A launcher plugin.
#[async_trait]
pub trait Plugin: Send + Sync {
    fn metadata(&self) -> &PluginMetadata;

    fn config_fields(&self) -> Vec<ConfigField>;

    /// Answer a triggered query. Errors are rendered as items, never returned.
    async fn handle_query(&self, query: &Query) -> Vec<DisplayItem>;

    /// Answer an untriggered query. Defaults to no results.
    async fn handle_global_query(&self, _query: &Query) -> Vec<DisplayItem> {
        Vec::new()
    }

    /// Run a [`ActionCommand::Plugin`] action.
    async fn handle_action(&self, action: &str, context: &Value) -> Result<()>;

    /// Current settings, with secrets masked.
    fn get_config(&self) -> Map<String, Value>;

    /// Persist one setting and apply its side effects.
    async fn set_config(&self, key: &str, value: Value) -> Result<()>;

    /// Stop background work. Called once before the plugin is dropped.
    async fn shutdown(&self) {}
}

/// Look up a config field by key, or fail with a validation error.
pub fn find_field<'a>(fields: &'a [ConfigField], key: &str) -> Result<&'a ConfigField> {
    fields
        .iter()
        .find(|f| f.key == key)
        .ok_or_else(|| crate::LaunchkitError::Validation {
            field: key.to_string(),
            message: "unknown setting".to_string(),
        })
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_query_validity_follows_token() {
        let query = Query::new("  dune ");
        assert_eq!(query.trimmed(), "dune");
        assert!(query.is_valid());

        query.token().cancel();
        assert!(!query.is_valid());
    }

    #[test]
    fn test_action_serialization() {
        let action = ItemAction::plugin("archive", "Archive bookmark", "archive", json!({"id": 4}));
        let value = serde_json::to_value(&action).unwrap();

        assert_eq!(
            value,
            json!({
                "id": "archive",
                "label": "Archive bookmark",
                "command": {"type": "plugin", "action": "archive", "context": {"id": 4}}
            })
        );

        let open: ActionCommand =
            serde_json::from_value(json!({"type": "open_url", "url": "http://x"})).unwrap();
        assert_eq!(open, ActionCommand::OpenUrl { url: "http://x".into() });
    }

    #[test]
    fn test_field_validation() {
        let port = ConfigField::number("profile_id", "Profile ID", 1);
        assert!(port.validate(&json!(3)).is_ok());
        assert!(port.validate(&json!("3")).is_err());

        let toggle = ConfigField::toggle("auto_cache", "Auto cache", false);
        assert!(toggle.validate(&json!(true)).is_ok());
        assert!(toggle.validate(&json!(1)).is_err());
    }

    #[test]
    fn test_find_field() {
        let fields = vec![ConfigField::secret("api_key", "API key")];
        assert!(find_field(&fields, "api_key").is_ok());
        assert!(matches!(
            find_field(&fields, "nope"),
            Err(crate::LaunchkitError::Validation { .. })
        ));
    }
}
