//! Delayed re-lint after a fix lands.

use std::time::Duration;

use tower_lsp::lsp_types::Url;
use tracing::debug;

use crate::Backend;

/// Delay before re-linting, so the written file is in place.
pub const RELINT_DELAY_MS: u64 = 250;

/// Spawns a re-lint of `uri` after [`RELINT_DELAY_MS`].
///
/// The lint is skipped if the document was closed in the meantime.
pub fn spawn_delayed_relint(backend: Backend, uri: Url) {
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_millis(RELINT_DELAY_MS)).await;

        let still_open = uri
            .to_file_path()
            .map(|path| backend.state.is_open(&path))
            .unwrap_or(false);

        if still_open {
            backend.lint_document(&uri, false).await;
        } else {
            debug!("Skipping re-lint of closed document: {}", uri);
        }
    });
}
