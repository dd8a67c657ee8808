//! On-disk LLM response cache.
//!
//! Responses are keyed by a sha256 of the full request payload (model,
//! messages, sampling params), so a re-run for an already-processed date
//! costs no tokens. Cache I/O is best-effort: a failed read or write is
//! logged and the call proceeds against the backend.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use async_trait::async_trait;
use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::backend::{LlmBackend, LlmError, LlmRequest, LlmResponse};

#[derive(Debug, Clone)]
pub struct ResponseCache {
    dir: PathBuf,
}

impl ResponseCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn cache_key(model: &str, req: &LlmRequest) -> String {
        // Field order is fixed by construction, so the serialization is
        // deterministic for identical requests.
        let payload = serde_json::json!({
            "model":       model,
            "messages":    req.messages,
            "max_tokens":  req.max_tokens,
            "temperature": req.temperature,
        });
        let mut hasher = Sha256::new();
        hasher.update(payload.to_string().as_bytes());
        format!("{:x}", hasher.finalize())
    }

    fn path_for(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{key}.json"))
    }

    pub fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        let text = std::fs::read_to_string(&path).ok()?;
        let value: serde_json::Value = serde_json::from_str(&text).ok()?;
        value["content"].as_str().map(String::from)
    }

    pub fn put(&self, key: &str, content: &str) {
        if let Err(e) = self.try_put(key, content) {
            warn!(error = %e, "failed to write LLM cache entry");
        }
    }

    fn try_put(&self, key: &str, content: &str) -> std::io::Result<()> {
        std::fs::create_dir_all(&self.dir)?;
        let body = serde_json::json!({ "content": content }).to_string();
        std::fs::write(self.path_for(key), body)
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }
}

/// Backend decorator that consults the cache before going to the network.
pub struct CachedBackend {
    inner: Arc<dyn LlmBackend>,
    cache: ResponseCache,
}

impl CachedBackend {
    pub fn new(inner: Arc<dyn LlmBackend>, cache: ResponseCache) -> Self {
        Self { inner, cache }
    }
}

#[async_trait]
impl LlmBackend for CachedBackend {
    async fn complete(&self, req: LlmRequest) -> Result<LlmResponse, LlmError> {
        let key = ResponseCache::cache_key(self.inner.model_id(), &req);
        if let Some(content) = self.cache.get(&key) {
            debug!(%key, "LLM cache hit");
            return Ok(LlmResponse {
                content,
                model: self.inner.model_id().to_string(),
                prompt_tokens: 0,
                completion_tokens: 0,
            });
        }

        let resp = self.inner.complete(req).await?;
        self.cache.put(&key, &resp.content);
        Ok(resp)
    }

    fn model_id(&self) -> &str {
        self.inner.model_id()
    }
}
