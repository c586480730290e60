#![cfg(unix)]

mod common;

use std::path::{Path, PathBuf};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{Value, json};
use tempfile::TempDir;
use tower_lsp::lsp_types::Url;

use common::{TestClient, fake_clang_tidy};

const SOURCE: &str = "int *p = 0;\n";

/// Reports `modernize-use-nullptr` on the `0` of [`SOURCE`].
const NULLPTR_REPORT: &str = r#"cat <<YAML
$1:1:10: warning: use nullptr [modernize-use-nullptr]
---
MainSourceFile: '$1'
Diagnostics:
  - DiagnosticName: modernize-use-nullptr
    DiagnosticMessage:
      Message: use nullptr
      FilePath: '$1'
      FileOffset: 9
      Replacements:
        - FilePath: '$1'
          Offset: 9
          Length: 1
          ReplacementText: nullptr
...
YAML"#;

/// Appends the arguments of each run to `runs.log` next to the tool.
const LOG_ARGS: &str = r#"echo "$@" >> "$(dirname "$0")/runs.log""#;

/// Marks the run as started, then stalls before reporting.
const SLOW_START: &str = r#"touch "$(dirname "$0")/started"
sleep 2"#;

/// How long tests watch for publications that must not happen.
const QUIET: Duration = Duration::from_secs(4);

struct Workspace {
    dir: TempDir,
    source: PathBuf,
    uri: Url,
}

impl Workspace {
    fn new() -> Self {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("main.cpp");
        std::fs::write(&source, SOURCE).unwrap();
        let uri = Url::from_file_path(&source).unwrap();
        Self { dir, source, uri }
    }

    fn root(&self) -> &Path {
        self.dir.path()
    }

    fn uri_of(&self, name: &str) -> Url {
        Url::from_file_path(self.root().join(name)).unwrap()
    }

    /// Argument lines recorded by [`LOG_ARGS`].
    fn runs(&self) -> Vec<String> {
        std::fs::read_to_string(self.root().join("runs.log"))
            .unwrap_or_default()
            .lines()
            .map(str::to_string)
            .collect()
    }

    /// Waits until a [`SLOW_START`] run is under way.
    async fn run_started(&self) {
        let marker = self.root().join("started");
        for _ in 0..500 {
            if marker.exists() {
                return;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
        panic!("clang-tidy was never started");
    }
}

async fn start(workspace: &Workspace, script: &str) -> TestClient {
    start_with(workspace, script, json!({})).await
}

/// Starts a server whose settings add `extra` to the executable.
async fn start_with(workspace: &Workspace, script: &str, extra: Value) -> TestClient {
    let tool = fake_clang_tidy(workspace.root(), script);
    let mut settings = json!({ "executable": tool });
    if let (Some(settings), Value::Object(extra)) = (settings.as_object_mut(), extra) {
        settings.extend(extra);
    }

    let mut client = TestClient::start();
    client
        .initialize(workspace.root(), json!({ "clang-tidy": settings }))
        .await;
    client
}

async fn open(client: &mut TestClient, uri: &Url, text: &str) -> Vec<Value> {
    client
        .notify(
            "textDocument/didOpen",
            json!({
                "textDocument": { "uri": uri, "languageId": "cpp", "version": 1, "text": text }
            }),
        )
        .await;
    client.diagnostics_for(uri.as_str()).await
}

fn range(l1: u32, c1: u32, l2: u32, c2: u32) -> Value {
    json!({
        "start": { "line": l1, "character": c1 },
        "end": { "line": l2, "character": c2 }
    })
}

#[tokio::test]
async fn test_initialize_advertises_capabilities() {
    let workspace = Workspace::new();
    let mut client = TestClient::start();
    let result = client.initialize(workspace.root(), json!({})).await;

    let caps = &result["capabilities"];
    assert_eq!(caps["textDocumentSync"]["change"], json!(2));
    assert_eq!(caps["textDocumentSync"]["willSave"], json!(true));
    assert_eq!(caps["codeActionProvider"]["codeActionKinds"], json!(["quickfix"]));
    assert_eq!(
        caps["executeCommandProvider"]["commands"],
        json!(["tidyls.lintFile", "tidyls.landFixes"])
    );
    assert_eq!(result["serverInfo"]["name"], "tidyls");
}

#[tokio::test]
async fn test_open_publishes_diagnostics_with_fix() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, NULLPTR_REPORT).await;

    let diagnostics = open(&mut client, &workspace.uri, SOURCE).await;

    assert_eq!(diagnostics.len(), 1);
    let diag = &diagnostics[0];
    assert_eq!(diag["severity"], json!(2));
    assert_eq!(diag["source"], "clang-tidy");
    assert_eq!(diag["code"], "modernize-use-nullptr");
    assert_eq!(diag["message"], "use nullptr");
    assert_eq!(diag["range"], range(0, 9, 0, 10));

    let related = &diag["relatedInformation"][0];
    assert_eq!(related["message"], "nullptr");
    assert_eq!(related["location"]["uri"], json!(workspace.uri));
    assert_eq!(related["location"]["range"], range(0, 9, 0, 10));
}

#[tokio::test]
async fn test_run_log_is_forwarded() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, "echo 'hello from tidy'").await;

    client
        .notify(
            "textDocument/didOpen",
            json!({
                "textDocument": { "uri": workspace.uri, "languageId": "cpp", "version": 1, "text": SOURCE }
            }),
        )
        .await;

    loop {
        let params = client.notification("window/logMessage").await;
        let message = params["message"].as_str().unwrap_or_default();
        if message.starts_with("> ") {
            assert!(message.contains("--export-fixes=-"));
            assert!(message.contains("Working Directory: "));
            assert!(message.contains("hello from tidy"));
            break;
        }
    }
    assert!(client.diagnostics_for(workspace.uri.as_str()).await.is_empty());
}

#[tokio::test]
async fn test_edit_on_diagnostic_line_drops_it() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, NULLPTR_REPORT).await;
    assert_eq!(open(&mut client, &workspace.uri, SOURCE).await.len(), 1);

    client
        .notify(
            "textDocument/didChange",
            json!({
                "textDocument": { "uri": workspace.uri, "version": 2 },
                "contentChanges": [{ "range": range(0, 0, 0, 0), "text": " " }]
            }),
        )
        .await;

    assert!(client.diagnostics_for(workspace.uri.as_str()).await.is_empty());
}

#[tokio::test]
async fn test_close_clears_diagnostics() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, NULLPTR_REPORT).await;
    assert_eq!(open(&mut client, &workspace.uri, SOURCE).await.len(), 1);

    client
        .notify(
            "textDocument/didClose",
            json!({ "textDocument": { "uri": workspace.uri } }),
        )
        .await;

    assert!(client.diagnostics_for(workspace.uri.as_str()).await.is_empty());
}

#[tokio::test]
async fn test_quick_fix_lands_on_disk() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, NULLPTR_REPORT).await;
    let diagnostics = open(&mut client, &workspace.uri, SOURCE).await;

    let actions = client
        .request(
            "textDocument/codeAction",
            json!({
                "textDocument": { "uri": workspace.uri },
                "range": range(0, 9, 0, 10),
                "context": { "diagnostics": diagnostics }
            }),
        )
        .await;
    let action = &actions[0];
    assert_eq!(action["title"], "[Clang-Tidy] Change to nullptr");
    assert_eq!(action["kind"], "quickfix");

    // The client applies the edit to its buffer before running the command.
    let edit = &action["edit"]["changes"][workspace.uri.as_str()][0];
    client
        .notify(
            "textDocument/didChange",
            json!({
                "textDocument": { "uri": workspace.uri, "version": 2 },
                "contentChanges": [{ "range": edit["range"], "text": edit["newText"] }]
            }),
        )
        .await;
    assert!(client.diagnostics_for(workspace.uri.as_str()).await.is_empty());

    let command = &action["command"];
    let result = client
        .request(
            "workspace/executeCommand",
            json!({ "command": command["command"], "arguments": command["arguments"] }),
        )
        .await;
    assert_eq!(result, Value::Null);

    assert_eq!(
        std::fs::read_to_string(&workspace.source).unwrap(),
        "int *p = nullptr;\n"
    );
}

#[tokio::test]
async fn test_lint_file_command_lints_active_document() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, NULLPTR_REPORT).await;
    assert_eq!(open(&mut client, &workspace.uri, SOURCE).await.len(), 1);

    let result = client
        .request(
            "workspace/executeCommand",
            json!({ "command": "tidyls.lintFile", "arguments": [] }),
        )
        .await;
    assert_eq!(result, Value::Null);
    assert_eq!(client.diagnostics_for(workspace.uri.as_str()).await.len(), 1);
}

#[tokio::test]
async fn test_unknown_command_is_rejected() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, NULLPTR_REPORT).await;

    let response = client
        .request_raw(
            "workspace/executeCommand",
            json!({ "command": "tidyls.nope", "arguments": [] }),
        )
        .await;
    assert_eq!(response["error"]["code"], json!(-32602));
}

#[tokio::test]
async fn test_result_for_closed_document_is_dropped() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, &format!("{}\n{}", SLOW_START, NULLPTR_REPORT)).await;

    client
        .notify(
            "textDocument/didOpen",
            json!({
                "textDocument": { "uri": workspace.uri, "languageId": "cpp", "version": 1, "text": SOURCE }
            }),
        )
        .await;
    workspace.run_started().await;
    client
        .notify(
            "textDocument/didClose",
            json!({ "textDocument": { "uri": workspace.uri } }),
        )
        .await;
    assert!(client.diagnostics_for(workspace.uri.as_str()).await.is_empty());

    let late = client.diagnostics_within(workspace.uri.as_str(), QUIET).await;
    assert!(late.iter().all(Vec::is_empty), "published after close: {:?}", late);
}

#[tokio::test]
async fn test_will_save_supersedes_running_lint() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, &format!("{}\n{}", SLOW_START, NULLPTR_REPORT)).await;

    client
        .notify(
            "textDocument/didOpen",
            json!({
                "textDocument": { "uri": workspace.uri, "languageId": "cpp", "version": 1, "text": SOURCE }
            }),
        )
        .await;
    workspace.run_started().await;
    client
        .notify(
            "textDocument/willSave",
            json!({ "textDocument": { "uri": workspace.uri }, "reason": 1 }),
        )
        .await;

    let published = client.diagnostics_within(workspace.uri.as_str(), QUIET).await;
    assert!(published.is_empty(), "superseded run published: {:?}", published);
}

#[tokio::test]
async fn test_save_runs_fix_when_fix_on_save_is_set() {
    let workspace = Workspace::new();
    let mut client = start_with(
        &workspace,
        &format!("{}\n{}", LOG_ARGS, NULLPTR_REPORT),
        json!({ "fixOnSave": true }),
    )
    .await;
    assert_eq!(open(&mut client, &workspace.uri, SOURCE).await.len(), 1);

    client
        .notify(
            "textDocument/didSave",
            json!({ "textDocument": { "uri": workspace.uri } }),
        )
        .await;
    assert_eq!(client.diagnostics_for(workspace.uri.as_str()).await.len(), 1);

    let runs = workspace.runs();
    assert_eq!(runs.len(), 2);
    assert!(!runs[0].split_whitespace().any(|arg| arg == "--fix"));
    assert!(runs[1].split_whitespace().any(|arg| arg == "--fix"));
}

#[tokio::test]
async fn test_clang_tidy_file_save_clears_and_relints() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, NULLPTR_REPORT).await;
    assert_eq!(open(&mut client, &workspace.uri, SOURCE).await.len(), 1);

    client
        .notify(
            "textDocument/didSave",
            json!({ "textDocument": { "uri": workspace.uri_of(".clang-tidy") } }),
        )
        .await;

    assert!(client.diagnostics_for(workspace.uri.as_str()).await.is_empty());
    assert_eq!(client.diagnostics_for(workspace.uri.as_str()).await.len(), 1);
}

#[tokio::test]
async fn test_configuration_change_clears_and_relints() {
    let workspace = Workspace::new();
    let mut client = start(&workspace, &format!("{}\n{}", LOG_ARGS, NULLPTR_REPORT)).await;
    assert_eq!(open(&mut client, &workspace.uri, SOURCE).await.len(), 1);

    // Pushed settings replace the previous ones wholesale.
    let tool = workspace.root().join("fake-clang-tidy");
    client
        .notify(
            "workspace/didChangeConfiguration",
            json!({
                "settings": { "clang-tidy": { "executable": tool, "checks": ["modernize-*"] } }
            }),
        )
        .await;

    assert!(client.diagnostics_for(workspace.uri.as_str()).await.is_empty());
    assert_eq!(client.diagnostics_for(workspace.uri.as_str()).await.len(), 1);

    let runs = workspace.runs();
    assert_eq!(runs.len(), 2);
    assert!(!runs[0].contains("--checks="));
    assert!(runs[1].split_whitespace().any(|arg| arg == "--checks=modernize-*"));
}

const HEADER: &str = "int f(int x);\n";
const IMPL: &str = "#include \"main.h\"\nint f(int x) { return x; }\n";

/// Reports on `main.cpp` a finding whose fix rewrites the return type in `main.h`.
const HEADER_FIX_REPORT: &str = r#"case "$1" in *main.h) exit 0 ;; esac
HEADER="$(dirname "$1")/main.h"
cat <<YAML
$1:2:1: warning: return type differs [readability-return-type]
---
MainSourceFile: '$1'
Diagnostics:
  - DiagnosticName: readability-return-type
    DiagnosticMessage:
      Message: return type differs
      FilePath: '$1'
      FileOffset: 18
      Replacements:
        - FilePath: '$HEADER'
          Offset: 0
          Length: 3
          ReplacementText: long
...
YAML"#;

#[tokio::test]
async fn test_fix_in_other_document_prunes_and_relints_origin() {
    let workspace = Workspace::new();
    std::fs::write(workspace.root().join("main.h"), HEADER).unwrap();
    std::fs::write(&workspace.source, IMPL).unwrap();
    let header = workspace.uri_of("main.h");
    let mut client = start(&workspace, &format!("{}\n{}", LOG_ARGS, HEADER_FIX_REPORT)).await;

    // The editor buffer of the header already carries the applied fix.
    assert!(open(&mut client, &header, "long f(int x);\n").await.is_empty());
    let diagnostics = open(&mut client, &workspace.uri, IMPL).await;
    assert_eq!(diagnostics.len(), 1);
    let diag = &diagnostics[0];
    assert_eq!(diag["range"], range(1, 0, 1, 26));
    let related = &diag["relatedInformation"][0];
    assert_eq!(related["location"]["uri"], json!(header));
    assert_eq!(related["location"]["range"], range(0, 0, 0, 3));

    let result = client
        .request(
            "workspace/executeCommand",
            json!({
                "command": "tidyls.landFixes",
                "arguments": [header, workspace.uri, diag["range"]]
            }),
        )
        .await;
    assert_eq!(result, Value::Null);
    assert_eq!(
        std::fs::read_to_string(workspace.root().join("main.h")).unwrap(),
        "long f(int x);\n"
    );

    assert!(client.diagnostics_for(workspace.uri.as_str()).await.is_empty());
    assert_eq!(client.diagnostics_for(workspace.uri.as_str()).await.len(), 1);
    assert_eq!(workspace.runs().len(), 3);
}
