//! Tool transports
//!
//! A transport exposes the two operations the engine needs: `tools/list` and
//! `tools/call`. The raw listing value is left unshaped here; the catalog
//! accessor flattens it.

mod http;
mod stdio;

pub use http::HttpToolServer;
pub use stdio::{StdioServerConfig, StdioToolServer};

use async_trait::async_trait;
use serde_json::{json, Value};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("tool server '{server}' is not configured")]
    NotConfigured { server: String },
    #[error("failed to spawn tool server '{server}': {source}")]
    Spawn {
        server: String,
        #[source]
        source: std::io::Error,
    },
    #[error("tool server '{server}' transport error: {message}")]
    Transport { server: String, message: String },
    #[error("network error calling tool server '{server}': {source}")]
    Network {
        server: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("tool server '{server}' returned invalid JSON: {source}")]
    InvalidJson {
        server: String,
        #[source]
        source: serde_json::Error,
    },
    #[error("tool server '{server}' returned JSON-RPC error {code}: {message}")]
    Rpc {
        server: String,
        code: i64,
        message: String,
    },
    #[error("tool server '{server}' terminated unexpectedly")]
    Terminated { server: String },
    #[error("request to tool server '{server}' was cancelled")]
    Cancelled { server: String },
}

impl TransportError {
    pub fn transport(server: impl Into<String>, message: impl Into<String>) -> Self {
        Self::Transport {
            server: server.into(),
            message: message.into(),
        }
    }
}

/// A tool server the engine can list and dispatch against.
#[async_trait]
pub trait ToolTransport: Send + Sync {
    /// Stable identifier used in logs and error messages.
    fn id(&self) -> &str;

    /// Raw `tools/list` reply in whatever shape the server answers with.
    async fn list_tools(&self) -> Result<Value, TransportError>;

    /// Invoke one tool by name with a JSON argument object.
    async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, TransportError>;
}

/// Placeholder transport for configurations without a tool server: lists an
/// empty catalog, refuses dispatch.
pub struct DisabledToolServer;

#[async_trait]
impl ToolTransport for DisabledToolServer {
    fn id(&self) -> &str {
        "disabled"
    }

    async fn list_tools(&self) -> Result<Value, TransportError> {
        Ok(json!({ "tools": [] }))
    }

    async fn call_tool(&self, _name: &str, _arguments: Value) -> Result<Value, TransportError> {
        Err(TransportError::NotConfigured {
            server: self.id().to_string(),
        })
    }
}

/// Maps a JSON-RPC `error` member to a structured error. Missing fields get
/// the generic server-error code and message.
pub(crate) fn rpc_error(server: &str, error: &Value) -> TransportError {
    TransportError::Rpc {
        server: server.to_string(),
        code: error.get("code").and_then(Value::as_i64).unwrap_or(-32000),
        message: error
            .get("message")
            .and_then(Value::as_str)
            .unwrap_or("unknown error")
            .to_string(),
    }
}
