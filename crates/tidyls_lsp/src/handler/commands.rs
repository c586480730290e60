//! `workspace/executeCommand` handlers.

use serde_json::Value;
use tower_lsp::jsonrpc::{Error, Result};
use tower_lsp::lsp_types::*;
use tracing::{debug, error, info};

use tidyls_core::same_file;

use crate::Backend;
use crate::conversion::to_core_range;
use crate::handler::documents::handle_saved;
use crate::relint::spawn_delayed_relint;

/// Lints a document (the active one when no URI is given).
pub const LINT_FILE_COMMAND: &str = "tidyls.lintFile";

/// Persists an applied quick fix and refreshes diagnostics.
///
/// Arguments: the URI the fix was applied to, the URI the diagnostic was
/// shown in and the diagnostic's range.
pub const LAND_FIXES_COMMAND: &str = "tidyls.landFixes";

/// Handles the `workspace/executeCommand` request.
pub async fn handle_execute_command(
    backend: &Backend,
    params: ExecuteCommandParams,
) -> Result<Option<Value>> {
    debug!("Execute command: {}", params.command);

    match params.command.as_str() {
        LINT_FILE_COMMAND => {
            let uri = match params.arguments.into_iter().next() {
                Some(arg) => Some(serde_json::from_value::<Url>(arg).map_err(|e| {
                    Error::invalid_params(format!("Invalid lintFile argument: {}", e))
                })?),
                None => backend.state.active_document(),
            };
            match uri {
                Some(uri) => backend.lint_document(&uri, false).await,
                None => debug!("No document to lint"),
            }
            Ok(None)
        }
        LAND_FIXES_COMMAND => {
            let (target, origin, range): (Url, Url, Range) =
                serde_json::from_value(Value::Array(params.arguments)).map_err(|e| {
                    Error::invalid_params(format!("Invalid landFixes arguments: {}", e))
                })?;
            land_fixes(backend, target, origin, range).await;
            Ok(None)
        }
        other => Err(Error::invalid_params(format!("Unknown command: {}", other))),
    }
}

/// Writes the fixed `target` to disk and refreshes `origin`.
///
/// When the fix landed in the document it was shown in, this behaves like a
/// save. Otherwise the diagnostics of `origin` invalidated by `range` are
/// dropped and `origin` is re-linted shortly after.
async fn land_fixes(backend: &Backend, target: Url, origin: Url, range: Range) {
    let Ok(target_path) = target.to_file_path() else {
        debug!("Ignoring fix for non-file URI: {}", target);
        return;
    };

    let text = backend
        .state
        .documents
        .read()
        .ok()
        .and_then(|docs| docs.get(&target_path).map(|doc| doc.text().to_string()));

    match text {
        Some(text) => {
            backend.state.runner.supersede();
            if let Err(e) = tokio::fs::write(&target_path, text).await {
                error!("Failed to write {}: {}", target_path.display(), e);
                return;
            }
            info!("Saved fixed file: {}", target_path.display());
        }
        None => debug!("{} is not open, nothing to save", target),
    }

    let origin_path = match origin.to_file_path() {
        Ok(path) => path,
        Err(_) => {
            debug!("Ignoring fix origin with non-file URI: {}", origin);
            return;
        }
    };

    if same_file(&origin_path, &target_path) {
        handle_saved(backend, &target).await;
        return;
    }

    let remaining = match backend.state.diagnostics.write() {
        Ok(mut store) => store.prune_stale(&origin_path, &[to_core_range(range)]),
        Err(e) => {
            error!("Diagnostics lock poisoned: {}", e);
            None
        }
    };
    if let Some(remaining) = remaining {
        backend.publish(&origin, &remaining).await;
    }

    spawn_delayed_relint(backend.clone(), origin);
}
