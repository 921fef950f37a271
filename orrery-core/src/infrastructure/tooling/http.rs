use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use reqwest::Client;
use serde_json::{json, Value};
use tracing::{debug, info};

use super::{rpc_error, ToolTransport, TransportError};

/// JSON-RPC 2.0 over a single HTTP endpoint. Responses are returned as the
/// whole envelope, so catalog listings arrive in the
/// `{ "result": { "tools": [...] } }` shape and tool results keep their
/// `result` wrapper for the normalizer to unwrap.
pub struct HttpToolServer {
    endpoint: String,
    http: Client,
    id_counter: AtomicU64,
}

impl HttpToolServer {
    pub fn new(endpoint: impl Into<String>) -> Self {
        Self {
            endpoint: endpoint.into(),
            http: Client::new(),
            id_counter: AtomicU64::new(1),
        }
    }

    async fn send_request(&self, method: &str, params: Option<Value>) -> Result<Value, TransportError> {
        let id = self.id_counter.fetch_add(1, Ordering::SeqCst);
        let mut payload = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
        });
        if let Some(params) = params {
            payload["params"] = params;
        }

        debug!(method, request_id = id, "Sending JSON-RPC request");
        let envelope: Value = self
            .http
            .post(&self.endpoint)
            .json(&payload)
            .send()
            .await
            .map_err(|source| TransportError::Network {
                server: self.id().to_string(),
                source,
            })?
            .error_for_status()
            .map_err(|source| TransportError::Network {
                server: self.id().to_string(),
                source,
            })?
            .json()
            .await
            .map_err(|source| TransportError::Network {
                server: self.id().to_string(),
                source,
            })?;

        if let Some(error) = envelope.get("error") {
            return Err(rpc_error(self.id(), error));
        }
        Ok(envelope)
    }
}

#[async_trait]
impl ToolTransport for HttpToolServer {
    fn id(&self) -> &str {
        "http"
    }

    async fn list_tools(&self) -> Result<Value, TransportError> {
        self.send_request("tools/list", None).await
    }

    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, TransportError> {
        info!(tool = name, "Dispatching tool call over HTTP");
        self.send_request(
            "tools/call",
            Some(json!({
                "name": name,
                "arguments": arguments,
            })),
        )
        .await
    }
}
