//! Initialize and shutdown handlers.

use std::sync::atomic::Ordering;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tracing::{error, info, warn};

use tidyls_core::TidyConfig;

use crate::Backend;
use crate::config::{reload_config, set_client_settings};
use crate::handler::commands::{LAND_FIXES_COMMAND, LINT_FILE_COMMAND};
use crate::state::BackendState;

const WATCH_REGISTRATION_ID: &str = "tidyls-watch-config";

/// Handles the `initialize` LSP request.
pub async fn handle_initialize(
    state: &BackendState,
    params: InitializeParams,
) -> Result<InitializeResult> {
    info!("tidyls LSP server initializing...");

    let root = params
        .root_uri
        .as_ref()
        .and_then(|u| u.to_file_path().ok())
        .or_else(|| {
            params
                .workspace_folders
                .as_ref()
                .and_then(|folders| folders.first())
                .and_then(|folder| folder.uri.to_file_path().ok())
        });

    if let Some(path) = root {
        match state.workspace_root.write() {
            Ok(mut root) => {
                *root = Some(path);
            }
            Err(e) => {
                error!("Workspace root lock poisoned: {}", e);
                return Ok(InitializeResult::default());
            }
        }
    }

    if let Some(options) = &params.initialization_options {
        set_client_settings(state, options);
    }

    let progress = params
        .capabilities
        .window
        .as_ref()
        .and_then(|w| w.work_done_progress)
        .unwrap_or(false);
    state.progress_supported.store(progress, Ordering::Relaxed);

    let dynamic_watch = params
        .capabilities
        .workspace
        .as_ref()
        .and_then(|w| w.did_change_watched_files.as_ref())
        .and_then(|c| c.dynamic_registration)
        .unwrap_or(false);
    state
        .watch_registration_supported
        .store(dynamic_watch, Ordering::Relaxed);

    reload_config(state);

    Ok(InitializeResult {
        capabilities: server_capabilities(),
        server_info: Some(ServerInfo {
            name: "tidyls".to_string(),
            version: Some(env!("CARGO_PKG_VERSION").to_string()),
        }),
    })
}

fn server_capabilities() -> ServerCapabilities {
    ServerCapabilities {
        text_document_sync: Some(TextDocumentSyncCapability::Options(
            TextDocumentSyncOptions {
                open_close: Some(true),
                change: Some(TextDocumentSyncKind::INCREMENTAL),
                will_save: Some(true),
                save: Some(TextDocumentSyncSaveOptions::SaveOptions(SaveOptions {
                    include_text: Some(false),
                })),
                ..Default::default()
            },
        )),
        code_action_provider: Some(CodeActionProviderCapability::Options(CodeActionOptions {
            code_action_kinds: Some(vec![CodeActionKind::QUICKFIX]),
            resolve_provider: Some(false),
            work_done_progress_options: Default::default(),
        })),
        execute_command_provider: Some(ExecuteCommandOptions {
            commands: vec![
                LINT_FILE_COMMAND.to_string(),
                LAND_FIXES_COMMAND.to_string(),
            ],
            work_done_progress_options: Default::default(),
        }),
        ..Default::default()
    }
}

/// Handles the `initialized` LSP notification.
pub async fn handle_initialized(backend: &Backend) {
    backend
        .client
        .log_message(MessageType::INFO, "tidyls LSP server initialized!")
        .await;

    if !backend
        .state
        .watch_registration_supported
        .load(Ordering::Relaxed)
    {
        return;
    }

    let watchers = TidyConfig::CONFIG_FILES
        .iter()
        .chain([".clang-tidy"].iter())
        .map(|name| FileSystemWatcher {
            glob_pattern: GlobPattern::String(format!("**/{}", name)),
            kind: None,
        })
        .collect();

    let registration = Registration {
        id: WATCH_REGISTRATION_ID.to_string(),
        method: "workspace/didChangeWatchedFiles".to_string(),
        register_options: serde_json::to_value(DidChangeWatchedFilesRegistrationOptions {
            watchers,
        })
        .ok(),
    };

    if let Err(e) = backend.client.register_capability(vec![registration]).await {
        warn!("Failed to register file watchers: {}", e);
    }
}

/// Handles the `shutdown` LSP request.
pub async fn handle_shutdown(state: &BackendState) -> Result<()> {
    info!("tidyls LSP server shutting down...");
    state.runner.supersede();
    Ok(())
}
