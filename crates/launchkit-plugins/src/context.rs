//! Process-wide resources handed to every plugin.

use launchkit_core::config::{AppConfig, PathsConfig};
use launchkit_core::network::HttpClient;
use launchkit_core::{ConfigStore, Desktop, Result, Settings};
use std::path::{Path, PathBuf};
use std::sync::Arc;

#[derive(Clone)]
pub struct PluginContext {
    pub config: Arc<dyn ConfigStore>,
    pub desktop: Arc<dyn Desktop>,
    pub cache_dir: PathBuf,
    pub data_dir: PathBuf,
}

impl PluginContext {
    /// Lay out cache and data directories under `root`.
    pub fn new(root: &Path, config: Arc<dyn ConfigStore>, desktop: Arc<dyn Desktop>) -> Self {
        Self {
            config,
            desktop,
            cache_dir: root.join(PathsConfig::CACHE_DIR_NAME),
            data_dir: root.join(PathsConfig::DATA_DIR_NAME),
        }
    }

    pub fn settings(&self, plugin_id: &str) -> Settings {
        Settings::new(plugin_id, self.config.clone())
    }

    /// HTTP client identifying itself as `org.launchkit.<plugin>`.
    pub fn http_client(&self, plugin_id: &str) -> Result<Arc<HttpClient>> {
        let user_agent = format!("{}.{}", AppConfig::USER_AGENT_PREFIX, plugin_id);
        Ok(Arc::new(HttpClient::new(&user_agent)?))
    }

    pub fn cache_path(&self, plugin_id: &str) -> PathBuf {
        self.cache_dir
            .join(format!("{}{}", plugin_id, PathsConfig::CACHE_FILE_SUFFIX))
    }

    pub fn data_path(&self, file_name: &str) -> PathBuf {
        self.data_dir.join(file_name)
    }
}

impl std::fmt::Debug for PluginContext {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PluginContext")
            .field("cache_dir", &self.cache_dir)
            .field("data_dir", &self.data_dir)
            .finish_non_exhaustive()
    }
}
