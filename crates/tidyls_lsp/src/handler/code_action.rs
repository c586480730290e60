//! Quick fixes for clang-tidy diagnostics.

use std::collections::HashMap;

use serde_json::json;
use tower_lsp::lsp_types::*;
use tracing::debug;

use tidyls_core::SOURCE;

use crate::handler::commands::LAND_FIXES_COMMAND;

/// Handles the `textDocument/codeAction` request.
///
/// Offers one quick fix per diagnostic in the context that carries a fix.
pub fn handle_code_action(params: &CodeActionParams) -> Option<CodeActionResponse> {
    debug!("Code action request: {}", params.text_document.uri);

    if let Some(only) = &params.context.only
        && !only.contains(&CodeActionKind::QUICKFIX)
    {
        return Some(Vec::new());
    }

    let actions = params
        .context
        .diagnostics
        .iter()
        .filter_map(|diag| quick_fix(diag, &params.text_document.uri))
        .map(CodeActionOrCommand::CodeAction)
        .collect();

    Some(actions)
}

/// Builds the quick fix for `diag`, shown in the document `origin`.
fn quick_fix(diag: &Diagnostic, origin: &Url) -> Option<CodeAction> {
    if diag.source.as_deref() != Some(SOURCE) {
        return None;
    }
    let [related] = diag.related_information.as_deref()? else {
        return None;
    };

    let target = &related.location;
    let text = &related.message;

    let edit = WorkspaceEdit {
        changes: Some(HashMap::from([(
            target.uri.clone(),
            vec![TextEdit {
                range: target.range,
                new_text: text.clone(),
            }],
        )])),
        ..Default::default()
    };

    Some(CodeAction {
        title: format!("[Clang-Tidy] Change to {}", text),
        kind: Some(CodeActionKind::QUICKFIX),
        diagnostics: Some(vec![diag.clone()]),
        edit: Some(edit),
        command: Some(Command {
            title: "Save and re-lint".to_string(),
            command: LAND_FIXES_COMMAND.to_string(),
            arguments: Some(vec![json!(target.uri), json!(origin), json!(diag.range)]),
        }),
        ..Default::default()
    })
}
