//! Configuration and watched files handlers.

use tower_lsp::lsp_types::*;
use tracing::{debug, info};

use crate::Backend;
use crate::config::{is_clang_tidy_file, is_config_file, reload_config, set_client_settings};

/// Handles the `workspace/didChangeConfiguration` notification.
pub async fn handle_did_change_configuration(
    backend: &Backend,
    params: DidChangeConfigurationParams,
) {
    debug!("Client settings changed");
    set_client_settings(&backend.state, &params.settings);
    reload_and_relint(backend).await;
}

/// Handles the `workspace/didChangeWatchedFiles` notification.
pub async fn handle_did_change_watched_files(
    backend: &Backend,
    params: DidChangeWatchedFilesParams,
) {
    debug!("Watched files changed: {:?}", params.changes);

    let config_changed = params
        .changes
        .iter()
        .any(|change| is_config_file(change.uri.path()));
    let checks_changed = params
        .changes
        .iter()
        .any(|change| is_clang_tidy_file(change.uri.path()));

    if config_changed {
        info!("Configuration file changed, reloading...");
        reload_and_relint(backend).await;
    } else if checks_changed {
        info!("Check configuration changed, re-linting...");
        backend.clear_all().await;
        backend.spawn_lint_active();
    }
}

/// Reloads the configuration; on success every shown diagnostic is dropped
/// and the active document is linted again.
pub(crate) async fn reload_and_relint(backend: &Backend) {
    if !reload_config(&backend.state) {
        return;
    }
    backend.clear_all().await;
    backend.spawn_lint_active();
}
