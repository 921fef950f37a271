//! Base HTTP client with shared logic

use reqwest::{Client, Response};
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::infrastructure::generation::types::GenerationError;

/// Shared HTTP plumbing for generation backends: URL joining, JSON calls
/// with and without Bearer auth, uniform network-error mapping.
#[derive(Clone)]
pub struct HttpClientBase {
    pub id: String,
    pub endpoint: String,
    pub api_key: Option<String>,
    pub http: Client,
}

impl HttpClientBase {
    pub fn new(id: String, endpoint: String, api_key: Option<String>) -> Self {
        Self {
            id,
            endpoint,
            api_key,
            http: Client::new(),
        }
    }

    pub fn build_url(&self, path: &str) -> String {
        let base = self.endpoint.trim_end_matches('/');
        let path = path.trim_start_matches('/');
        format!("{base}/{path}")
    }

    pub async fn get_no_auth<Res>(&self, url: &str) -> Result<Res, GenerationError>
    where
        Res: DeserializeOwned,
    {
        self.http
            .get(url)
            .send()
            .await
            .map_err(|e| GenerationError::network(&self.id, e))?
            .error_for_status()
            .map_err(|e| GenerationError::network(&self.id, e))?
            .json()
            .await
            .map_err(|e| GenerationError::network(&self.id, e))
    }

    pub async fn post_with_bearer<Req, Res>(&self, url: &str, body: &Req) -> Result<Res, GenerationError>
    where
        Req: Serialize,
        Res: DeserializeOwned,
    {
        let api_key = self.require_api_key()?;

        self.http
            .post(url)
            .header("Authorization", format!("Bearer {}", api_key))
            .header("Content-Type", "application/json")
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::network(&self.id, e))?
            .error_for_status()
            .map_err(|e| GenerationError::network(&self.id, e))?
            .json()
            .await
            .map_err(|e| GenerationError::network(&self.id, e))
    }

    /// Post without auth, returning the raw response so the caller can stream
    /// the body.
    pub async fn post_streaming_no_auth<Req>(
        &self,
        url: &str,
        body: &Req,
    ) -> Result<Response, GenerationError>
    where
        Req: Serialize,
    {
        self.http
            .post(url)
            .json(body)
            .send()
            .await
            .map_err(|e| GenerationError::network(&self.id, e))?
            .error_for_status()
            .map_err(|e| GenerationError::network(&self.id, e))
    }

    fn require_api_key(&self) -> Result<&str, GenerationError> {
        self.api_key
            .as_deref()
            .filter(|k| !k.trim().is_empty())
            .ok_or_else(|| GenerationError::missing_api_key(&self.id))
    }
}
