//! Document lifecycle handlers (open, change, save, close).

use tower_lsp::lsp_types::*;
use tracing::{debug, error, info};

use tidyls_core::{TextDocument, TextRange, normalize_path};

use crate::Backend;
use crate::config::{is_clang_tidy_file, is_config_file};
use crate::conversion::to_core_range;
use crate::handler::files::reload_and_relint;
use crate::state::BackendState;

/// Handles the `textDocument/didOpen` notification.
///
/// A document without published diagnostics is linted right away.
pub async fn handle_did_open(backend: &Backend, params: DidOpenTextDocumentParams) {
    let uri = params.text_document.uri;
    debug!("Document opened: {}", uri);

    let Ok(path) = uri.to_file_path() else {
        debug!("Ignoring non-file document: {}", uri);
        return;
    };

    match backend.state.documents.write() {
        Ok(mut docs) => docs.insert(TextDocument::new(&path, params.text_document.text)),
        Err(e) => {
            error!("Documents lock poisoned: {}", e);
            return;
        }
    }
    if let Ok(mut uris) = backend.state.uris.write() {
        uris.insert(normalize_path(&path), uri.clone());
    }
    backend.state.set_active(&uri);

    let published = backend
        .state
        .diagnostics
        .read()
        .map(|store| store.has(&path))
        .unwrap_or(false);
    if !published {
        backend.spawn_lint(uri, false);
    }
}

/// Handles the `textDocument/didChange` notification.
///
/// Edits drop the diagnostics they invalidate and move the rest along;
/// nothing is re-linted.
pub async fn handle_did_change(backend: &Backend, params: DidChangeTextDocumentParams) {
    let uri = params.text_document.uri;
    debug!("Document changed: {}", uri);

    let Ok(path) = uri.to_file_path() else {
        return;
    };

    let Some(scope) = apply_changes(&backend.state, &path, params.content_changes) else {
        return;
    };
    backend.state.set_active(&uri);

    let remaining = match backend.state.diagnostics.write() {
        Ok(mut store) => match scope {
            ChangeScope::Edits(edits) => store.track_edits(&path, &edits),
            ChangeScope::Whole => store.remove(&path).map(|_| Vec::new()),
        },
        Err(e) => {
            error!("Diagnostics lock poisoned: {}", e);
            return;
        }
    };

    if let Some(remaining) = remaining {
        backend.publish(&uri, &remaining).await;
    }
}

/// What an incoming change set touched.
#[derive(Debug, PartialEq)]
enum ChangeScope {
    /// Ranged edits in arrival order, each against the text left by the last.
    Edits(Vec<(TextRange, String)>),
    Whole,
}

/// Applies `changes` to the mirrored document.
///
/// Returns `None` if the document is not open.
fn apply_changes(
    state: &BackendState,
    path: &std::path::Path,
    changes: Vec<TextDocumentContentChangeEvent>,
) -> Option<ChangeScope> {
    let mut docs = match state.documents.write() {
        Ok(guard) => guard,
        Err(e) => {
            error!("Documents lock poisoned: {}", e);
            return None;
        }
    };
    let doc = docs.get_mut(path)?;

    let mut edits = Vec::new();
    let mut whole = false;
    for change in changes {
        match change.range {
            Some(range) => {
                let range = to_core_range(range);
                doc.apply_edit(range, &change.text);
                edits.push((range, change.text));
            }
            None => {
                doc.set_text(change.text);
                whole = true;
            }
        }
    }

    Some(if whole {
        ChangeScope::Whole
    } else {
        ChangeScope::Edits(edits)
    })
}

/// Handles the `textDocument/willSave` notification.
///
/// A save rewrites the file under any running clang-tidy, so the run is cut short.
pub async fn handle_will_save(state: &BackendState, params: WillSaveTextDocumentParams) {
    debug!("Document about to be saved: {}", params.text_document.uri);
    state.runner.supersede();
}

/// Handles the `textDocument/didSave` notification.
pub async fn handle_did_save(backend: &Backend, params: DidSaveTextDocumentParams) {
    debug!("Document saved: {}", params.text_document.uri);
    handle_saved(backend, &params.text_document.uri).await;
}

/// Reacts to `uri` having been written to disk.
pub(crate) async fn handle_saved(backend: &Backend, uri: &Url) {
    let file = uri.path();

    if is_config_file(file) {
        info!("Configuration file saved, reloading...");
        reload_and_relint(backend).await;
        return;
    }

    let config = backend.state.config();
    if !config.lint_on_save {
        debug!("Lint on save disabled, skipping {}", uri);
        return;
    }

    if is_clang_tidy_file(file) {
        info!("Check configuration saved, re-linting...");
        backend.clear_all().await;
        backend.spawn_lint_active();
        return;
    }

    backend.state.set_active(uri);
    backend.spawn_lint(uri.clone(), config.fix_on_save);
}

/// Handles the `textDocument/didClose` notification.
pub async fn handle_did_close(backend: &Backend, params: DidCloseTextDocumentParams) {
    let uri = params.text_document.uri;
    debug!("Document closed: {}", uri);

    let Ok(path) = uri.to_file_path() else {
        return;
    };

    if let Ok(mut docs) = backend.state.documents.write() {
        docs.remove(&path);
    }
    if let Ok(mut uris) = backend.state.uris.write() {
        uris.remove(&normalize_path(&path));
    }
    if let Ok(mut store) = backend.state.diagnostics.write() {
        store.remove(&path);
    }
    backend.state.clear_active_if(&uri);

    backend.publish(&uri, &[]).await;
}
