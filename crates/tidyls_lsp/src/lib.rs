//! tidyls LSP Server
//!
//! Language Server Protocol binding for tidyls.
//! Runs clang-tidy on C and C++ documents and publishes its findings with
//! quick fixes.

mod config;
mod conversion;
mod handler;
mod progress;
mod relint;
mod state;

use std::path::Path;
use std::sync::Arc;

use tower_lsp::jsonrpc::Result;
use tower_lsp::lsp_types::*;
use tower_lsp::{Client, LanguageServer, LspService, Server};
use tracing::{debug, error, info};

use tidyls_core::{Diagnostic as TidyDiagnostic, RunOutput, TidyConfig, collect_diagnostics};

use crate::conversion::to_lsp_diagnostic;
use crate::progress::LintProgress;
use crate::state::{BackendState, SharedState};

pub use handler::{LAND_FIXES_COMMAND, LINT_FILE_COMMAND};
pub use progress::{FIX_MESSAGE, LINT_MESSAGE};
pub use relint::RELINT_DELAY_MS;

/// The LSP backend for tidyls.
#[derive(Clone)]
pub struct Backend {
    /// LSP client for sending notifications.
    client: Client,
    /// Shared state
    state: SharedState,
}

impl Backend {
    /// Creates a new backend with the given client.
    pub fn new(client: Client) -> Self {
        Self {
            client,
            state: Arc::new(BackendState::new()),
        }
    }

    /// Runs clang-tidy on `uri` and publishes the resulting diagnostics.
    ///
    /// A run superseded by a newer one publishes nothing.
    pub(crate) async fn lint_document(&self, uri: &Url, fix: bool) {
        debug!("Linting document: {}", uri);

        let path = match uri.to_file_path() {
            Ok(p) => p,
            Err(_) => {
                debug!("Skipping lint for non-file URI: {}", uri);
                return;
            }
        };

        let config = self.state.config();
        let cwd = self.state.working_directory(&path);

        let progress =
            LintProgress::begin(&self.client, &self.state, config.progress_bar_location, fix).await;
        let output = self
            .state
            .runner
            .run(&config, std::slice::from_ref(&path), &cwd, fix)
            .await;
        self.forward_run_log(&output).await;

        let diagnostics = if output.superseded() {
            debug!("Discarding superseded run for {}", uri);
            None
        } else {
            // A document closed during the run must not get markers back.
            self.collect(&output.stdout, &path, &config)
        };
        let Some(diagnostics) = diagnostics else {
            if let Some(progress) = progress {
                progress.end(&self.client, 0).await;
            }
            return;
        };
        if let Some(progress) = progress {
            progress.end(&self.client, diagnostics.len()).await;
        }

        match self.state.diagnostics.write() {
            Ok(mut store) => store.update(&path, diagnostics.clone()),
            Err(e) => error!("Diagnostics lock poisoned: {}", e),
        }
        self.publish(uri, &diagnostics).await;
    }

    /// Lints `uri` in the background.
    pub(crate) fn spawn_lint(&self, uri: Url, fix: bool) {
        let backend = self.clone();
        tokio::spawn(async move {
            backend.lint_document(&uri, fix).await;
        });
    }

    /// Lints the most recently touched document, if any.
    pub(crate) fn spawn_lint_active(&self) {
        match self.state.active_document() {
            Some(uri) => self.spawn_lint(uri, false),
            None => debug!("No active document to lint"),
        }
    }

    /// Projects raw output onto the open document at `path`.
    ///
    /// Returns `None` if the document is not open.
    fn collect(&self, raw: &str, path: &Path, config: &TidyConfig) -> Option<Vec<TidyDiagnostic>> {
        let docs = match self.state.documents.read() {
            Ok(guard) => guard,
            Err(e) => {
                error!("Documents lock poisoned: {}", e);
                return None;
            }
        };

        match docs.get(path) {
            Some(doc) => Some(collect_diagnostics(
                raw,
                doc,
                &*docs,
                &config.severity_overrides,
            )),
            None => {
                debug!("Dropping results for closed document: {}", path.display());
                None
            }
        }
    }

    /// Publishes `diagnostics` for `uri`; an empty list clears the document.
    pub(crate) async fn publish(&self, uri: &Url, diagnostics: &[TidyDiagnostic]) {
        let lsp_diagnostics: Vec<Diagnostic> = diagnostics.iter().map(to_lsp_diagnostic).collect();
        self.client
            .publish_diagnostics(uri.clone(), lsp_diagnostics, None)
            .await;
    }

    /// Clears every published diagnostic set.
    pub(crate) async fn clear_all(&self) {
        let paths = match self.state.diagnostics.write() {
            Ok(mut store) => store.clear(),
            Err(e) => {
                error!("Diagnostics lock poisoned: {}", e);
                return;
            }
        };

        for path in paths {
            if let Some(uri) = self.state.uri_for(&path) {
                self.client.publish_diagnostics(uri, vec![], None).await;
            }
        }
    }

    /// Mirrors the run log into the client's output channel.
    async fn forward_run_log(&self, output: &RunOutput) {
        let mut log = format!(
            "{}\nWorking Directory: {}",
            output.command_line,
            output.working_dir.display()
        );
        for stream in [&output.stdout, &output.stderr] {
            if !stream.is_empty() {
                log.push('\n');
                log.push_str(stream.trim_end());
            }
        }
        self.client.log_message(MessageType::LOG, log).await;
    }
}

#[tower_lsp::async_trait]
impl LanguageServer for Backend {
    async fn initialize(&self, params: InitializeParams) -> Result<InitializeResult> {
        handler::handle_initialize(&self.state, params).await
    }

    async fn initialized(&self, _: InitializedParams) {
        handler::handle_initialized(self).await;
    }

    async fn shutdown(&self) -> Result<()> {
        handler::handle_shutdown(&self.state).await
    }

    async fn did_open(&self, params: DidOpenTextDocumentParams) {
        handler::handle_did_open(self, params).await;
    }

    async fn did_change(&self, params: DidChangeTextDocumentParams) {
        handler::handle_did_change(self, params).await;
    }

    async fn will_save(&self, params: WillSaveTextDocumentParams) {
        handler::handle_will_save(&self.state, params).await;
    }

    async fn did_save(&self, params: DidSaveTextDocumentParams) {
        handler::handle_did_save(self, params).await;
    }

    async fn did_close(&self, params: DidCloseTextDocumentParams) {
        handler::handle_did_close(self, params).await;
    }

    async fn did_change_configuration(&self, params: DidChangeConfigurationParams) {
        handler::handle_did_change_configuration(self, params).await;
    }

    async fn did_change_watched_files(&self, params: DidChangeWatchedFilesParams) {
        handler::handle_did_change_watched_files(self, params).await;
    }

    async fn code_action(&self, params: CodeActionParams) -> Result<Option<CodeActionResponse>> {
        Ok(handler::handle_code_action(&params))
    }

    async fn execute_command(
        &self,
        params: ExecuteCommandParams,
    ) -> Result<Option<serde_json::Value>> {
        handler::handle_execute_command(self, params).await
    }
}

/// Starts the LSP server.
///
/// This function does not return unless an error occurs or the server shuts down.
pub async fn run() {
    info!("tidyls LSP server starting...");

    let stdin = tokio::io::stdin();
    let stdout = tokio::io::stdout();

    let (service, socket) = LspService::new(Backend::new);
    Server::new(stdin, stdout, socket).serve(service).await;
}
