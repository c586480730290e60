//! Work-done progress around clang-tidy runs.

use tower_lsp::Client;
use tower_lsp::lsp_types::notification::Progress;
use tower_lsp::lsp_types::request::WorkDoneProgressCreate;
use tower_lsp::lsp_types::{
    NumberOrString, ProgressParams, ProgressParamsValue, WorkDoneProgress, WorkDoneProgressBegin,
    WorkDoneProgressCreateParams, WorkDoneProgressEnd,
};
use tracing::debug;

use tidyls_core::ProgressLocation;

use crate::state::BackendState;

pub const LINT_MESSAGE: &str = "Linting current file...";
pub const FIX_MESSAGE: &str =
    "Linting and fixing current file (do not modify it in the meanwhile)...";

/// Message shown while a run is in flight.
pub fn progress_message(fix: bool) -> &'static str {
    if fix { FIX_MESSAGE } else { LINT_MESSAGE }
}

/// Build a `WorkDoneProgressBegin` value for lint start.
pub fn progress_begin(fix: bool) -> WorkDoneProgressBegin {
    WorkDoneProgressBegin {
        title: "Clang-Tidy".to_string(),
        cancellable: Some(false),
        message: Some(progress_message(fix).to_string()),
        percentage: None,
    }
}

/// Build a `WorkDoneProgressEnd` value for lint completion.
pub fn progress_end(count: usize) -> WorkDoneProgressEnd {
    WorkDoneProgressEnd {
        message: Some(match count {
            0 => "No issues found".to_string(),
            1 => "1 issue found".to_string(),
            n => format!("{} issues found", n),
        }),
    }
}

/// An open progress report.
pub(crate) struct LintProgress {
    token: NumberOrString,
}

impl LintProgress {
    /// Starts a progress report, unless disabled or unsupported by the client.
    pub async fn begin(
        client: &Client,
        state: &BackendState,
        location: ProgressLocation,
        fix: bool,
    ) -> Option<Self> {
        // Both visible locations map to the client's work-done progress UI.
        if location == ProgressLocation::Disabled
            || !state
                .progress_supported
                .load(std::sync::atomic::Ordering::Relaxed)
        {
            return None;
        }

        let token = NumberOrString::String(state.next_progress_token());
        if let Err(e) = client
            .send_request::<WorkDoneProgressCreate>(WorkDoneProgressCreateParams {
                token: token.clone(),
            })
            .await
        {
            debug!("Client rejected progress token: {}", e);
            return None;
        }

        client
            .send_notification::<Progress>(ProgressParams {
                token: token.clone(),
                value: ProgressParamsValue::WorkDone(WorkDoneProgress::Begin(progress_begin(fix))),
            })
            .await;

        Some(Self { token })
    }

    pub async fn end(self, client: &Client, count: usize) {
        client
            .send_notification::<Progress>(ProgressParams {
                token: self.token,
                value: ProgressParamsValue::WorkDone(WorkDoneProgress::End(progress_end(count))),
            })
            .await;
    }
}
