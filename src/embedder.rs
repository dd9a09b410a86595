//! Text embedding through an Ollama-compatible HTTP service

use std::num::NonZeroUsize;
use std::time::Duration;

use async_trait::async_trait;
use lru::LruCache;
use serde_json::Value;
use tokio::sync::Mutex;

use crate::config::EmbeddingConfig;
use crate::{Error, Result};

/// Longest error body kept in `Error::EmbeddingStatus`
const MAX_ERROR_BODY: usize = 500;

/// Turns text into a fixed-length vector
#[async_trait]
pub trait Embedder: Send + Sync {
    /// Embed a single text
    ///
    /// # Errors
    ///
    /// Returns an embedding error when the service fails, times out or
    /// answers with an unexpected payload
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Model identifier, used for diagnostics
    fn model(&self) -> &str;
}

/// Embedder backed by `POST {base_url}/api/embeddings`
pub struct OllamaEmbedder {
    client: reqwest::Client,
    endpoint: String,
    model: String,
    timeout: Duration,
    cache: Option<Mutex<LruCache<String, Vec<f32>>>>,
}

impl std::fmt::Debug for OllamaEmbedder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OllamaEmbedder")
            .field("endpoint", &self.endpoint)
            .field("model", &self.model)
            .field("timeout", &self.timeout)
            .finish_non_exhaustive()
    }
}

impl OllamaEmbedder {
    /// Create an embedder from configuration
    ///
    /// # Errors
    ///
    /// Returns error if the model is empty or the HTTP client cannot be built
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        if config.model.trim().is_empty() {
            return Err(Error::Config("embedding model required".to_string()));
        }

        let client = reqwest::Client::builder().timeout(config.timeout).build()?;

        Ok(Self {
            client,
            endpoint: format!("{}/api/embeddings", config.base_url.trim_end_matches('/')),
            model: config.model.clone(),
            timeout: config.timeout,
            cache: NonZeroUsize::new(config.cache_size).map(|size| Mutex::new(LruCache::new(size))),
        })
    }

    async fn request(&self, text: &str) -> Result<Vec<f32>> {
        #[derive(serde::Serialize)]
        struct EmbeddingRequest<'a> {
            model: &'a str,
            prompt: &'a str,
        }

        let response = self
            .client
            .post(&self.endpoint)
            .json(&EmbeddingRequest {
                model: &self.model,
                prompt: text,
            })
            .send()
            .await
            .map_err(|e| self.map_transport(e))?;

        if !response.status().is_success() {
            let status = response.status().as_u16();
            let mut body = response.text().await.unwrap_or_default();
            if body.len() > MAX_ERROR_BODY {
                let cut = floor_char_boundary(&body, MAX_ERROR_BODY);
                body.truncate(cut);
            }
            return Err(Error::EmbeddingStatus { status, body });
        }

        let payload: Value = response.json().await.map_err(|e| self.map_transport(e))?;
        parse_embedding(&payload)
    }

    fn map_transport(&self, error: reqwest::Error) -> Error {
        if error.is_timeout() {
            Error::EmbeddingTimeout(self.timeout)
        } else if error.is_decode() {
            Error::EmbeddingResponse(error.to_string())
        } else {
            Error::Http(error)
        }
    }
}

#[async_trait]
impl Embedder for OllamaEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        if let Some(cache) = &self.cache
            && let Some(hit) = cache.lock().await.get(text)
        {
            return Ok(hit.clone());
        }

        let vector = tokio::time::timeout(self.timeout, self.request(text))
            .await
            .map_err(|_| Error::EmbeddingTimeout(self.timeout))??;

        tracing::debug!(model = %self.model, dim = vector.len(), "embedded text");

        if let Some(cache) = &self.cache {
            cache.lock().await.put(text.to_string(), vector.clone());
        }
        Ok(vector)
    }

    fn model(&self) -> &str {
        &self.model
    }
}

/// Extract the vector from `{embedding: [...]}` or `{data: [{embedding: [...]}]}`
///
/// # Errors
///
/// Returns `Error::EmbeddingResponse` for any other shape, an empty vector or
/// non-numeric components
pub fn parse_embedding(payload: &Value) -> Result<Vec<f32>> {
    let raw = payload
        .get("embedding")
        .or_else(|| payload.pointer("/data/0/embedding"))
        .and_then(Value::as_array)
        .ok_or_else(|| Error::EmbeddingResponse("no embedding field in response".to_string()))?;

    if raw.is_empty() {
        return Err(Error::EmbeddingResponse("empty embedding".to_string()));
    }

    raw.iter()
        .map(|v| {
            #[allow(clippy::cast_possible_truncation)]
            v.as_f64()
                .map(|f| f as f32)
                .ok_or_else(|| Error::EmbeddingResponse("non-numeric embedding component".to_string()))
        })
        .collect()
}

/// Largest char boundary not after `index`
pub(crate) fn floor_char_boundary(s: &str, index: usize) -> usize {
    if index >= s.len() {
        return s.len();
    }
    (0..=index).rev().find(|&i| s.is_char_boundary(i)).unwrap_or(0)
}
