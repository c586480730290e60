#![allow(dead_code)]

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde_json::{Value, json};
use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};
use tokio::sync::mpsc;
use tower_lsp::{LspService, Server};

use tidyls_lsp::Backend;

const TIMEOUT: Duration = Duration::from_secs(10);

pub async fn send_msg<W: AsyncWriteExt + Unpin>(writer: &mut W, msg: &str) {
    let content = format!("Content-Length: {}\r\n\r\n{}", msg.len(), msg);
    writer.write_all(content.as_bytes()).await.unwrap();
    writer.flush().await.unwrap();
}

pub async fn recv_msg<R: AsyncReadExt + Unpin>(reader: &mut R) -> Option<String> {
    let mut buffer = Vec::new();
    let mut content_length = 0;

    loop {
        let byte = reader.read_u8().await.ok()?;
        buffer.push(byte);
        if buffer.ends_with(b"\r\n\r\n") {
            let headers = String::from_utf8_lossy(&buffer);
            for line in headers.lines() {
                if line.to_lowercase().starts_with("content-length:") {
                    let parts: Vec<&str> = line.split(':').collect();
                    if parts.len() == 2 {
                        content_length = parts[1].trim().parse().unwrap_or_else(|e| {
                            panic!("Failed to parse Content-Length: {e}, header: {line}")
                        });
                    }
                }
            }
            break;
        }
    }

    if content_length == 0 {
        return None;
    }

    let mut body = vec![0u8; content_length];
    reader.read_exact(&mut body).await.ok()?;

    Some(String::from_utf8(body).unwrap())
}

/// Writes an executable shell script standing in for clang-tidy.
///
/// The script sees the linted file as `$1`.
#[cfg(unix)]
pub fn fake_clang_tidy(dir: &Path, body: &str) -> PathBuf {
    use std::os::unix::fs::PermissionsExt;

    let path = dir.join("fake-clang-tidy");
    std::fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
    std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
    path
}

/// An in-process server driven over in-memory pipes.
pub struct TestClient {
    writer: DuplexStream,
    incoming: mpsc::UnboundedReceiver<Value>,
    pending: VecDeque<Value>,
    next_id: i64,
}

impl TestClient {
    pub fn start() -> Self {
        let (writer, server_in) = tokio::io::duplex(1 << 16);
        let (server_out, reader) = tokio::io::duplex(1 << 16);

        let (service, socket) = LspService::new(Backend::new);
        tokio::spawn(Server::new(server_in, server_out, socket).serve(service));

        // Pumps server output so waiting on it can time out without losing bytes.
        let (tx, incoming) = mpsc::unbounded_channel();
        tokio::spawn(async move {
            let mut reader = reader;
            while let Some(raw) = recv_msg(&mut reader).await {
                let msg: Value = serde_json::from_str(&raw).unwrap();
                if tx.send(msg).is_err() {
                    break;
                }
            }
        });

        Self {
            writer,
            incoming,
            pending: VecDeque::new(),
            next_id: 1,
        }
    }

    /// Runs the initialize handshake.
    pub async fn initialize(&mut self, root: &Path, options: Value) -> Value {
        let root_uri = tower_lsp::lsp_types::Url::from_file_path(root).unwrap();
        let result = self
            .request(
                "initialize",
                json!({
                    "processId": null,
                    "rootUri": root_uri,
                    "capabilities": {},
                    "initializationOptions": options,
                }),
            )
            .await;
        self.notify("initialized", json!({})).await;
        result
    }

    pub async fn notify(&mut self, method: &str, params: Value) {
        let msg = json!({ "jsonrpc": "2.0", "method": method, "params": params });
        send_msg(&mut self.writer, &msg.to_string()).await;
    }

    /// Sends a request and returns the whole response object.
    pub async fn request_raw(&mut self, method: &str, params: Value) -> Value {
        let id = self.next_id;
        self.next_id += 1;

        let msg = json!({ "jsonrpc": "2.0", "id": id, "method": method, "params": params });
        send_msg(&mut self.writer, &msg.to_string()).await;

        loop {
            let msg = self.read().await;
            if msg.get("method").is_none() && msg["id"] == json!(id) {
                return msg;
            }
            self.pending.push_back(msg);
        }
    }

    /// Sends a request and returns its result.
    pub async fn request(&mut self, method: &str, params: Value) -> Value {
        let response = self.request_raw(method, params).await;
        assert!(
            response.get("error").is_none(),
            "{} failed: {}",
            method,
            response
        );
        response["result"].clone()
    }

    /// Waits for the next notification named `method` and returns its params.
    pub async fn notification(&mut self, method: &str) -> Value {
        if let Some(index) = self.pending.iter().position(|m| m["method"] == method) {
            if let Some(msg) = self.pending.remove(index) {
                return msg["params"].clone();
            }
        }

        loop {
            let msg = self.read().await;
            if msg["method"] == method {
                return msg["params"].clone();
            }
            self.pending.push_back(msg);
        }
    }

    /// Waits for diagnostics published for `uri`.
    pub async fn diagnostics_for(&mut self, uri: &str) -> Vec<Value> {
        loop {
            let params = self.notification("textDocument/publishDiagnostics").await;
            if params["uri"] == uri {
                return params["diagnostics"].as_array().cloned().unwrap_or_default();
            }
        }
    }

    /// Collects every diagnostics set published for `uri` within `wait`.
    pub async fn diagnostics_within(&mut self, uri: &str, wait: Duration) -> Vec<Vec<Value>> {
        let is_match = |m: &Value| {
            m["method"] == "textDocument/publishDiagnostics" && m["params"]["uri"] == uri
        };
        let diagnostics = |m: Value| {
            m["params"]["diagnostics"]
                .as_array()
                .cloned()
                .unwrap_or_default()
        };

        let (mut sets, rest): (Vec<Value>, Vec<Value>) =
            self.pending.drain(..).partition(|m| is_match(m));
        self.pending.extend(rest);

        let deadline = tokio::time::Instant::now() + wait;
        while let Some(msg) = self.read_until(deadline).await {
            if is_match(&msg) {
                sets.push(msg);
            } else {
                self.pending.push_back(msg);
            }
        }
        sets.into_iter().map(diagnostics).collect()
    }

    async fn read(&mut self) -> Value {
        let deadline = tokio::time::Instant::now() + TIMEOUT;
        self.read_until(deadline)
            .await
            .expect("timed out waiting for the server")
    }

    async fn read_until(&mut self, deadline: tokio::time::Instant) -> Option<Value> {
        loop {
            let msg = tokio::time::timeout_at(deadline, self.incoming.recv())
                .await
                .ok()?
                .expect("server closed the connection");

            // Server-to-client requests get an empty success.
            if msg.get("method").is_some() && msg.get("id").is_some() {
                let reply = json!({ "jsonrpc": "2.0", "id": msg["id"], "result": null });
                send_msg(&mut self.writer, &reply.to_string()).await;
                continue;
            }
            return Some(msg);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_recv_msg_success() {
        let payload = r#"{"jsonrpc":"2.0","method":"abc","params":{}}"#;
        let data = format!("Content-Length: {}\r\n\r\n{}", payload.len(), payload);
        let mut cursor = std::io::Cursor::new(data.as_bytes().to_vec());

        let result = recv_msg(&mut cursor).await;
        assert_eq!(result.unwrap(), payload);
    }

    #[tokio::test]
    #[should_panic(expected = "Failed to parse Content-Length")]
    async fn test_recv_msg_parse_error() {
        let data = "Content-Length: invalid\r\n\r\n{}";
        let mut cursor = std::io::Cursor::new(data.as_bytes().to_vec());
        let _ = recv_msg(&mut cursor).await;
    }
}
