//! The HTTP boundary every provider goes through
//!
//! Providers only build an [`HttpRequest`] and read an [`HttpResponse`]. The [`Transport`] doing
//! the actual call is injected, so retry and caching can be layered on top and tests can script
//! replies without a network.

use anyhow::{anyhow, Result};
use async_trait::async_trait;
use reqwest::{Client, Method};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Mutex;
use std::time::Duration;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpRequest {
    pub method: String,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpRequest {
    pub fn post_json(url: impl Into<String>, body: &Value) -> Self {
        Self {
            method: "POST".to_string(),
            url: url.into(),
            headers: vec![("content-type".to_string(), "application/json".to_string())],
            body: body.to_string(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HttpResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl HttpResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            headers: Vec::new(),
            body: body.into(),
        }
    }

    pub fn with_header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }

    /// Header lookup, ignoring case
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    pub fn json(&self) -> Result<Value> {
        Ok(serde_json::from_str(&self.body)?)
    }
}

#[async_trait]
pub trait Transport: Send + Sync {
    /// Deliver a request. Any HTTP status is a successful delivery; only failing to get a
    /// response at all is an error.
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse>;
}

#[async_trait]
impl<T: Transport + ?Sized> Transport for std::sync::Arc<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        (**self).send(request).await
    }
}

pub struct ReqwestTransport {
    client: Client,
}

impl ReqwestTransport {
    pub fn new() -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(600)) // 10 minutes timeout
            .build()?;

        Ok(Self { client })
    }
}

#[async_trait]
impl Transport for ReqwestTransport {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let method = Method::from_bytes(request.method.as_bytes())?;
        let mut builder = self.client.request(method, &request.url);
        for (name, value) in &request.headers {
            builder = builder.header(name, value);
        }

        let response = builder.body(request.body).send().await?;
        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|value| (name.to_string(), value.to_string()))
            })
            .collect();
        let body = response.text().await?;

        Ok(HttpResponse {
            status,
            headers,
            body,
        })
    }
}

/// Retries requests rejected with 429, honoring `Retry-After` and otherwise backing off
/// exponentially
pub struct RetryTransport<T> {
    inner: T,
    max_retries: u32,
    base_delay: Duration,
}

impl<T: Transport> RetryTransport<T> {
    pub fn new(inner: T) -> Self {
        Self {
            inner,
            max_retries: 5,
            base_delay: Duration::from_secs(1),
        }
    }

    pub fn with_max_retries(mut self, max_retries: u32) -> Self {
        self.max_retries = max_retries;
        self
    }

    pub fn with_base_delay(mut self, base_delay: Duration) -> Self {
        self.base_delay = base_delay;
        self
    }

    fn delay(&self, response: &HttpResponse, attempt: u32) -> Duration {
        response
            .header("retry-after")
            .and_then(|value| value.trim().parse::<u64>().ok())
            .map(Duration::from_secs)
            .unwrap_or_else(|| {
                self.base_delay
                    .checked_mul(2u32.saturating_pow(attempt))
                    .unwrap_or(Duration::MAX)
            })
    }
}

#[async_trait]
impl<T: Transport> Transport for RetryTransport<T> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let mut attempt = 0;
        loop {
            let response = self.inner.send(request.clone()).await?;
            if response.status != 429 || attempt >= self.max_retries {
                return Ok(response);
            }

            let delay = self.delay(&response, attempt);
            tracing::warn!(
                url = %request.url,
                attempt = attempt + 1,
                delay_ms = delay.as_millis() as u64,
                "rate limited, retrying"
            );
            tokio::time::sleep(delay).await;
            attempt += 1;
        }
    }
}

/// Storage for cached responses
#[async_trait]
pub trait ResponseCache: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<HttpResponse>>;
    async fn put(&self, key: &str, response: &HttpResponse) -> Result<()>;
    async fn invalidate(&self, key: &str) -> Result<()>;
}

#[derive(Default)]
pub struct MemoryCache {
    entries: Mutex<HashMap<String, HttpResponse>>,
}

impl MemoryCache {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> Result<std::sync::MutexGuard<'_, HashMap<String, HttpResponse>>> {
        self.entries
            .lock()
            .map_err(|_| anyhow!("response cache lock poisoned"))
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, key: &str) -> Result<Option<HttpResponse>> {
        Ok(self.entries()?.get(key).cloned())
    }

    async fn put(&self, key: &str, response: &HttpResponse) -> Result<()> {
        self.entries()?.insert(key.to_string(), response.clone());
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        self.entries()?.remove(key);
        Ok(())
    }
}

/// One JSON file per entry in a directory
pub struct FileCache {
    dir: PathBuf,
}

impl FileCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    fn path(&self, key: &str) -> PathBuf {
        self.dir.join(format!("{}.json", key))
    }
}

#[async_trait]
impl ResponseCache for FileCache {
    async fn get(&self, key: &str) -> Result<Option<HttpResponse>> {
        match tokio::fs::read_to_string(self.path(key)).await {
            Ok(contents) => Ok(Some(serde_json::from_str(&contents)?)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e.into()),
        }
    }

    async fn put(&self, key: &str, response: &HttpResponse) -> Result<()> {
        tokio::fs::create_dir_all(&self.dir).await?;
        tokio::fs::write(self.path(key), serde_json::to_string(response)?).await?;
        Ok(())
    }

    async fn invalidate(&self, key: &str) -> Result<()> {
        match tokio::fs::remove_file(self.path(key)).await {
            Err(e) if e.kind() != std::io::ErrorKind::NotFound => Err(e.into()),
            _ => Ok(()),
        }
    }
}

/// Cache key for a request: sha256 over method, url and body
pub fn cache_key(request: &HttpRequest) -> String {
    let mut hasher = Sha256::new();
    hasher.update(request.method.as_bytes());
    hasher.update(b"\n");
    hasher.update(request.url.as_bytes());
    hasher.update(b"\n");
    hasher.update(request.body.as_bytes());
    format!("{:x}", hasher.finalize())
}

/// Serves repeated requests from a cache. Only successful responses are stored.
pub struct CachingTransport<T, C> {
    inner: T,
    cache: C,
}

impl<T: Transport, C: ResponseCache> CachingTransport<T, C> {
    pub fn new(inner: T, cache: C) -> Self {
        Self { inner, cache }
    }

    pub fn cache(&self) -> &C {
        &self.cache
    }
}

#[async_trait]
impl<T: Transport, C: ResponseCache> Transport for CachingTransport<T, C> {
    async fn send(&self, request: HttpRequest) -> Result<HttpResponse> {
        let key = cache_key(&request);
        if let Some(cached) = self.cache.get(&key).await? {
            tracing::debug!(url = %request.url, key = %key, "serving response from cache");
            return Ok(cached);
        }

        let response = self.inner.send(request).await?;
        if response.is_success() {
            self.cache.put(&key, &response).await?;
        }
        Ok(response)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_cache_key_depends_on_body() {
        let a = HttpRequest::post_json("https://example.com", &json!({"a": 1}));
        let b = HttpRequest::post_json("https://example.com", &json!({"a": 2}));
        assert_eq!(cache_key(&a), cache_key(&a.clone()));
        assert_ne!(cache_key(&a), cache_key(&b));
        assert_eq!(cache_key(&a).len(), 64);
    }

    #[test]
    fn test_retry_delay() {
        let retry = RetryTransport::new(ReqwestTransport::new().unwrap())
            .with_base_delay(Duration::from_millis(100));
        let limited = HttpResponse::new(429, "");
        assert_eq!(retry.delay(&limited, 0), Duration::from_millis(100));
        assert_eq!(retry.delay(&limited, 3), Duration::from_millis(800));
        let told = limited.with_header("Retry-After", "7");
        assert_eq!(retry.delay(&told, 3), Duration::from_secs(7));
    }

    #[tokio::test]
    async fn test_memory_cache() -> Result<()> {
        let cache = MemoryCache::new();
        assert!(cache.get("k").await?.is_none());
        cache.put("k", &HttpResponse::new(200, "{}")).await?;
        assert_eq!(cache.get("k").await?.map(|r| r.status), Some(200));
        cache.invalidate("k").await?;
        assert!(cache.get("k").await?.is_none());
        Ok(())
    }

    #[tokio::test]
    async fn test_file_cache() -> Result<()> {
        let dir = tempfile::tempdir()?;
        let cache = FileCache::new(dir.path().join("cache"));
        cache.put("k", &HttpResponse::new(200, "body")).await?;
        assert_eq!(cache.get("k").await?.map(|r| r.body), Some("body".to_string()));
        cache.invalidate("k").await?;
        cache.invalidate("k").await?;
        assert!(cache.get("k").await?.is_none());
        Ok(())
    }
}
