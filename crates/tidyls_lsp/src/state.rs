//! LSP Backend state management.

use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, RwLock};

use serde_json::Value;
use tower_lsp::lsp_types::Url;
use tracing::error;

use tidyls_core::{DiagnosticStore, DocumentSet, TidyConfig, TidyRunner, normalize_path};

/// Shared backend state.
pub(crate) struct BackendState {
    /// Mirror of open documents.
    pub documents: RwLock<DocumentSet>,
    /// URIs of open documents, keyed by normalized path.
    pub uris: RwLock<HashMap<String, Url>>,
    /// Diagnostics currently shown in the client.
    pub diagnostics: RwLock<DiagnosticStore>,
    /// Effective configuration.
    pub config: RwLock<TidyConfig>,
    /// Settings pushed by the client, highest precedence.
    pub client_settings: RwLock<Option<Value>>,
    /// Workspace root path.
    pub workspace_root: RwLock<Option<PathBuf>>,
    /// Most recently opened, edited or saved document.
    pub active_document: RwLock<Option<Url>>,
    /// Client accepts `window/workDoneProgress/create`.
    pub progress_supported: AtomicBool,
    /// Client accepts dynamic `didChangeWatchedFiles` registration.
    pub watch_registration_supported: AtomicBool,
    progress_tokens: AtomicU64,
    /// The single clang-tidy launcher.
    pub runner: TidyRunner,
}

impl fmt::Debug for BackendState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BackendState")
            .field("documents", &"<DocumentSet>")
            .field("diagnostics", &"<DiagnosticStore>")
            .field("workspace_root", &self.workspace_root)
            .field("active_document", &self.active_document)
            .finish()
    }
}

impl BackendState {
    /// Creates a new empty state.
    pub fn new() -> Self {
        Self {
            documents: RwLock::new(DocumentSet::new()),
            uris: RwLock::new(HashMap::new()),
            diagnostics: RwLock::new(DiagnosticStore::new()),
            config: RwLock::new(TidyConfig::new()),
            client_settings: RwLock::new(None),
            workspace_root: RwLock::new(None),
            active_document: RwLock::new(None),
            progress_supported: AtomicBool::new(false),
            watch_registration_supported: AtomicBool::new(false),
            progress_tokens: AtomicU64::new(0),
            runner: TidyRunner::new(),
        }
    }

    /// Returns a snapshot of the effective configuration.
    pub fn config(&self) -> TidyConfig {
        match self.config.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                error!("Config lock poisoned: {}", e);
                TidyConfig::new()
            }
        }
    }

    /// Directory clang-tidy runs in: the workspace root, else the file's directory.
    pub fn working_directory(&self, file: &Path) -> PathBuf {
        let root = match self.workspace_root.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                error!("Workspace root lock poisoned: {}", e);
                None
            }
        };
        root.or_else(|| file.parent().map(Path::to_path_buf))
            .unwrap_or_else(|| PathBuf::from("."))
    }

    pub fn set_active(&self, uri: &Url) {
        match self.active_document.write() {
            Ok(mut active) => *active = Some(uri.clone()),
            Err(e) => error!("Active document lock poisoned: {}", e),
        }
    }

    pub fn active_document(&self) -> Option<Url> {
        match self.active_document.read() {
            Ok(guard) => guard.clone(),
            Err(e) => {
                error!("Active document lock poisoned: {}", e);
                None
            }
        }
    }

    /// Forgets the active document if it is `uri`.
    pub fn clear_active_if(&self, uri: &Url) {
        if let Ok(mut active) = self.active_document.write()
            && active.as_ref() == Some(uri)
        {
            *active = None;
        }
    }

    /// Returns true if `path` is open in the client.
    pub fn is_open(&self, path: &Path) -> bool {
        match self.documents.read() {
            Ok(docs) => docs.contains(path),
            Err(e) => {
                error!("Documents lock poisoned: {}", e);
                false
            }
        }
    }

    /// The URI the client used for `path`, or a `file://` URI built from it.
    pub fn uri_for(&self, path: &Path) -> Option<Url> {
        if let Ok(uris) = self.uris.read()
            && let Some(uri) = uris.get(&normalize_path(path))
        {
            return Some(uri.clone());
        }
        Url::from_file_path(path).ok()
    }

    pub fn next_progress_token(&self) -> String {
        let id = self.progress_tokens.fetch_add(1, Ordering::Relaxed);
        format!("tidyls/lint/{}", id)
    }
}

impl Default for BackendState {
    fn default() -> Self {
        Self::new()
    }
}

/// Type alias for shared state.
pub type SharedState = Arc<BackendState>;
