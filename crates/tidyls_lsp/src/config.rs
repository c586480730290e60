//! Configuration management for LSP server.

use serde_json::Value;
use tracing::{error, info};

use tidyls_core::TidyConfig;

use crate::state::BackendState;

/// Rebuilds the effective configuration from the workspace config file and
/// the client settings.
///
/// On failure the previous configuration stays in effect. Returns true if
/// the configuration was replaced.
pub fn reload_config(state: &BackendState) -> bool {
    let root = match state.workspace_root.read() {
        Ok(g) => g.clone(),
        Err(e) => {
            error!("Workspace root lock poisoned: {}", e);
            return false;
        }
    };

    let mut layers: Vec<Value> = Vec::new();

    if let Some(config_path) = root.as_deref().and_then(|root| TidyConfig::discover(root)) {
        info!("Found config file: {}", config_path.display());
        match TidyConfig::read_file_value(&config_path) {
            Ok(value) => layers.push(value),
            Err(e) => {
                error!("Failed to load config: {}", e);
                return false;
            }
        }
    }

    match state.client_settings.read() {
        Ok(settings) => layers.extend(settings.clone()),
        Err(e) => error!("Client settings lock poisoned: {}", e),
    }

    let config = match TidyConfig::from_layers(layers) {
        Ok(config) => config,
        Err(e) => {
            error!("Failed to load config: {}", e);
            return false;
        }
    };

    match state.config.write() {
        Ok(mut guard) => {
            *guard = config;
            info!("Configuration reloaded");
            true
        }
        Err(e) => {
            error!("Config lock poisoned: {}", e);
            false
        }
    }
}

/// Stores client-pushed settings (bare or nested under `"clang-tidy"`).
pub fn set_client_settings(state: &BackendState, settings: &Value) {
    let section = TidyConfig::settings_section(settings);
    match state.client_settings.write() {
        Ok(mut guard) => *guard = section,
        Err(e) => error!("Client settings lock poisoned: {}", e),
    }
}

/// Returns true if a changed file affects the configuration.
pub fn is_config_file(path: &str) -> bool {
    TidyConfig::CONFIG_FILES
        .iter()
        .any(|name| path.ends_with(name))
}

/// Returns true if a changed file is a clang-tidy check configuration.
pub fn is_clang_tidy_file(path: &str) -> bool {
    path.ends_with(".clang-tidy")
}
