use std::collections::HashMap;
use std::process::Stdio;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader, BufWriter};
use tokio::process::{Child, ChildStdin, ChildStdout, Command};
use tokio::sync::{oneshot, Mutex as AsyncMutex};
use tracing::{debug, info, warn};

use super::{rpc_error, ToolTransport, TransportError};

const PROTOCOL_VERSION: &str = "2025-06-18";

/// Command line of a stdio tool server process.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StdioServerConfig {
    pub command: String,
    pub args: Vec<String>,
    pub workdir: Option<String>,
    pub env: HashMap<String, String>,
}

impl StdioServerConfig {
    pub fn new(command: impl Into<String>) -> Self {
        Self {
            command: command.into(),
            args: Vec::new(),
            workdir: None,
            env: HashMap::new(),
        }
    }
}

/// Line-delimited JSON-RPC 2.0 over a child process's stdin/stdout. The
/// process is spawned lazily on first use and re-spawned after it exits.
/// Unlike the HTTP transport this one unwraps the JSON-RPC `result`, so
/// catalog listings arrive in the `{ "tools": [...] }` shape.
pub struct StdioToolServer {
    inner: Arc<StdioInner>,
}

struct StdioInner {
    config: StdioServerConfig,
    state: AsyncMutex<Option<Child>>,
    writer: AsyncMutex<Option<BufWriter<ChildStdin>>>,
    pending: AsyncMutex<HashMap<String, oneshot::Sender<Result<Value, TransportError>>>>,
    id_counter: AtomicU64,
}

impl StdioToolServer {
    pub fn new(config: StdioServerConfig) -> Self {
        Self {
            inner: Arc::new(StdioInner {
                config,
                state: AsyncMutex::new(None),
                writer: AsyncMutex::new(None),
                pending: AsyncMutex::new(HashMap::new()),
                id_counter: AtomicU64::new(1),
            }),
        }
    }
}

#[async_trait]
impl ToolTransport for StdioToolServer {
    fn id(&self) -> &str {
        "stdio"
    }

    async fn list_tools(&self) -> Result<Value, TransportError> {
        self.inner.ensure_running().await?;
        self.inner.send_request("tools/list", json!({})).await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, TransportError> {
        self.inner.ensure_running().await?;
        info!(tool = name, "Dispatching tool call over stdio");
        let params = json!({
            "name": name,
            "arguments": match arguments {
                Value::Null => Value::Object(Default::default()),
                other => other,
            }
        });
        self.inner.send_request("tools/call", params).await
    }
}

impl StdioInner {
    async fn ensure_running(self: &Arc<Self>) -> Result<(), TransportError> {
        {
            let state = self.state.lock().await;
            if state.is_some() {
                return Ok(());
            }
        }

        let mut command = Command::new(&self.config.command);
        command
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit());
        if let Some(dir) = &self.config.workdir {
            command.current_dir(dir);
        }
        if !self.config.args.is_empty() {
            command.args(&self.config.args);
        }
        for (key, value) in &self.config.env {
            command.env(key, value);
        }

        let mut child = command.spawn().map_err(|source| TransportError::Spawn {
            server: "stdio".to_string(),
            source,
        })?;

        let stdin = child
            .stdin
            .take()
            .ok_or_else(|| TransportError::transport("stdio", "failed to capture server stdin"))?;
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| TransportError::transport("stdio", "failed to capture server stdout"))?;

        {
            let mut writer = self.writer.lock().await;
            *writer = Some(BufWriter::new(stdin));
        }
        {
            let mut state = self.state.lock().await;
            *state = Some(child);
        }

        let reader_self = Arc::clone(self);
        tokio::spawn(async move {
            reader_self.reader_loop(stdout).await;
        });

        match self.initialize_sequence().await {
            Ok(()) => Ok(()),
            Err(err) => {
                self.reset().await;
                Err(err)
            }
        }
    }

    async fn initialize_sequence(&self) -> Result<(), TransportError> {
        let params = json!({
            "protocolVersion": PROTOCOL_VERSION,
            "clientInfo": {
                "name": env!("CARGO_PKG_NAME"),
                "version": env!("CARGO_PKG_VERSION"),
            },
            "capabilities": {}
        });
        self.send_request("initialize", params).await?;
        self.send_notification("notifications/initialized", json!({}))
            .await
    }

    async fn reader_loop(self: Arc<Self>, stdout: ChildStdout) {
        let mut lines = BufReader::new(stdout).lines();
        while let Ok(item) = lines.next_line().await {
            match item {
                Some(raw) => {
                    if raw.trim().is_empty() {
                        continue;
                    }
                    match serde_json::from_str::<Value>(&raw) {
                        Ok(value) => self.process_inbound_message(value).await,
                        Err(source) => {
                            warn!(line = raw, %source, "Received invalid JSON from tool server");
                        }
                    }
                }
                None => break,
            }
        }

        self.reset().await;
    }

    async fn process_inbound_message(&self, value: Value) {
        if let Some(id) = value.get("id").cloned() {
            if value.get("method").is_some() {
                self.handle_server_request(id, value).await;
            } else {
                self.handle_response(id, value).await;
            }
        } else if let Some(method) = value.get("method").and_then(Value::as_str) {
            // Notifications are logged only; a fresh tools/list runs every
            // turn anyway, so list_changed needs no cache refresh.
            debug!(method, "Received notification from tool server");
        }
    }

    async fn handle_response(&self, id: Value, value: Value) {
        let Some(key) = response_key(&id) else { return };
        let responder = {
            let mut pending = self.pending.lock().await;
            pending.remove(&key)
        };
        let Some(sender) = responder else {
            debug!(response_id = key, "Received response for unknown request");
            return;
        };

        let outcome = match value.get("error") {
            Some(error) => Err(rpc_error("stdio", error)),
            None => Ok(value.get("result").cloned().unwrap_or(Value::Null)),
        };
        let _ = sender.send(outcome);
    }

    async fn handle_server_request(&self, id: Value, value: Value) {
        let method = value
            .get("method")
            .and_then(Value::as_str)
            .unwrap_or_default();
        let result = match method {
            "ping" => self.send_response(id, json!({})).await,
            other => {
                warn!(method = other, "Tool server sent unsupported request");
                self.send_error(
                    id,
                    json!({
                        "code": -32601,
                        "message": format!("client does not implement method '{other}'"),
                    }),
                )
                .await
            }
        };
        if let Err(err) = result {
            warn!(%err, "Failed to answer server request");
        }
    }

    async fn send_request(&self, method: &str, params: Value) -> Result<Value, TransportError> {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let key = id.to_string();
        let (tx, rx) = oneshot::channel();
        {
            let mut pending = self.pending.lock().await;
            pending.insert(key, tx);
        }

        let payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params
        });
        self.write_message(&payload).await?;

        match rx.await {
            Ok(outcome) => outcome,
            Err(_) => Err(TransportError::Cancelled {
                server: "stdio".to_string(),
            }),
        }
    }

    async fn send_notification(&self, method: &str, params: Value) -> Result<(), TransportError> {
        let payload = json!({
            "jsonrpc": "2.0",
            "method": method,
            "params": params
        });
        self.write_message(&payload).await
    }

    async fn send_response(&self, id: Value, result: Value) -> Result<(), TransportError> {
        self.write_message(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "result": result
        }))
        .await
    }

    async fn send_error(&self, id: Value, error: Value) -> Result<(), TransportError> {
        self.write_message(&json!({
            "jsonrpc": "2.0",
            "id": id,
            "error": error
        }))
        .await
    }

    async fn write_message(&self, message: &Value) -> Result<(), TransportError> {
        let encoded =
            serde_json::to_string(message).map_err(|source| TransportError::InvalidJson {
                server: "stdio".to_string(),
                source,
            })?;

        let mut writer = self.writer.lock().await;
        let stream = writer
            .as_mut()
            .ok_or_else(|| TransportError::transport("stdio", "writer not initialised"))?;
        for chunk in [encoded.as_bytes(), b"\n"] {
            stream
                .write_all(chunk)
                .await
                .map_err(|source| TransportError::transport("stdio", source.to_string()))?;
        }
        stream
            .flush()
            .await
            .map_err(|source| TransportError::transport("stdio", source.to_string()))
    }

    async fn reset(&self) {
        {
            let mut writer = self.writer.lock().await;
            *writer = None;
        }

        {
            let mut state = self.state.lock().await;
            if let Some(mut child) = state.take() {
                if let Err(err) = child.kill().await {
                    debug!(%err, "Failed to kill tool server process (may have already exited)");
                }
                let _ = child.wait().await;
            }
        }

        let mut pending = self.pending.lock().await;
        for (_, sender) in pending.drain() {
            let _ = sender.send(Err(TransportError::Terminated {
                server: "stdio".to_string(),
            }));
        }
    }
}

fn response_key(id: &Value) -> Option<String> {
    match id {
        Value::String(value) => Some(value.clone()),
        Value::Number(num) => Some(num.to_string()),
        _ => None,
    }
}
