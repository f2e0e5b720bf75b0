//! Launcher plugins backed by self-hosted services and local tools.
//!
//! Every plugin implements [`launchkit_core::Plugin`]. [`build_plugins`]
//! constructs the full set from one [`PluginContext`]; remote-backed plugins
//! start their background cache refresh (when configured) on construction,
//! so it must be called from within a Tokio runtime.

pub mod arr;
pub mod common;
pub mod context;
pub mod linkding;
pub mod mullvad;
pub mod paperless;
pub mod syncthing;

pub use arr::{ArrPlugin, ArrService};
pub use context::PluginContext;
pub use linkding::LinkdingPlugin;
pub use mullvad::MullvadPlugin;
pub use paperless::PaperlessPlugin;
pub use syncthing::SyncthingPlugin;

use launchkit_core::{Plugin, Result};
use std::sync::Arc;
use tracing::info;

/// Instantiate every plugin, in display order.
pub fn build_plugins(ctx: &PluginContext) -> Result<Vec<Arc<dyn Plugin>>> {
    let mut plugins: Vec<Arc<dyn Plugin>> = Vec::new();
    for service in ArrService::ALL {
        plugins.push(Arc::new(ArrPlugin::new(service, ctx)?));
    }
    plugins.push(Arc::new(LinkdingPlugin::new(ctx)?));
    plugins.push(Arc::new(PaperlessPlugin::new(ctx)?));
    plugins.push(Arc::new(SyncthingPlugin::new(ctx)?));
    plugins.push(Arc::new(MullvadPlugin::new()));

    info!("Loaded {} plugins", plugins.len());
    Ok(plugins)
}
