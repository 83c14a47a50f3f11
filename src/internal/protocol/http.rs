//! Process-wide HTTP client. `reqwest` supplies per-host connection reuse,
//! keep-alive, and transparent gzip/deflate; this layer adds the bounded
//! handle pool (with an emergency slot so acquisition cannot deadlock),
//! transient-error retries, a global rate limit, a TTL response cache for
//! GETs, and the size-prioritized parallel batch used by blob uploads.

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;
use std::time::{Duration, Instant};

use bytes::Bytes;
use futures_util::StreamExt;
use lru_mem::{HeapSize, LruCache};
use once_cell::sync::Lazy;
use reqwest::{Client, Method, StatusCode};
use serde::de::DeserializeOwned;
use sha1::{Digest, Sha1};
use tokio::sync::{Semaphore, SemaphorePermit};

use crate::internal::errors::GyattError;

pub const USER_AGENT: &str = concat!("gyatt/", env!("CARGO_PKG_VERSION"));

/// Fixed handle capacity per process.
pub const POOL_SIZE: usize = 8;
/// Extra handles allowed when the pooled wait times out.
const EMERGENCY_CEILING: usize = 4;
const ACQUIRE_TIMEOUT: Duration = Duration::from_secs(2);
const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(60);
/// Idle handles are retired by the underlying pool after this long.
const POOL_IDLE_TIMEOUT: Duration = Duration::from_secs(90);
const MAX_RETRIES: u32 = 3;
const RETRY_BACKOFF: Duration = Duration::from_millis(400);
const MIN_REQUEST_INTERVAL: Duration = Duration::from_millis(50);
const CACHE_TTL: Duration = Duration::from_secs(60);
const CACHE_CAPACITY: usize = 8 * 1024 * 1024;
/// Burst damping once the in-flight set passes half the parallel bound.
const BATCH_DAMPING: Duration = Duration::from_millis(5);

#[derive(Clone, Debug)]
pub struct HttpRequest {
    pub method: Method,
    pub url: String,
    pub headers: Vec<(String, String)>,
    pub body: Option<Bytes>,
    /// Overrides the client-wide request timeout when set.
    pub timeout: Option<Duration>,
}

impl HttpRequest {
    pub fn new(method: Method, url: impl Into<String>) -> HttpRequest {
        HttpRequest {
            method,
            url: url.into(),
            headers: Vec::new(),
            body: None,
            timeout: None,
        }
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> HttpRequest {
        self.headers.push((name.into(), value.into()));
        self
    }

    pub fn body(mut self, body: impl Into<Bytes>) -> HttpRequest {
        self.body = Some(body.into());
        self
    }

    pub fn timeout(mut self, timeout: Duration) -> HttpRequest {
        self.timeout = Some(timeout);
        self
    }

    fn cache_key(&self) -> String {
        let body_hash = match &self.body {
            Some(body) => hex::encode(Sha1::digest(body)),
            None => "-".to_string(),
        };
        format!("{} {} {}", self.method, self.url, body_hash)
    }
}

#[derive(Clone, Debug)]
pub struct HttpResponse {
    pub status: StatusCode,
    pub body: Bytes,
    pub from_cache: bool,
}

impl HttpResponse {
    pub fn is_success(&self) -> bool {
        self.status.is_success()
    }

    pub fn json<T: DeserializeOwned>(&self) -> Result<T, GyattError> {
        serde_json::from_slice(&self.body)
            .map_err(|e| GyattError::BadFormat(format!("response body: {e}")))
    }

    pub fn body_string(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

struct CachedResponse {
    status: StatusCode,
    body: Bytes,
    stored_at: Instant,
}

impl HeapSize for CachedResponse {
    fn heap_size(&self) -> usize {
        self.body.len()
    }
}

/// Pooled or emergency handle; releasing happens on drop.
struct HandleGuard<'a> {
    _permit: Option<SemaphorePermit<'a>>,
    emergency: Option<&'a AtomicUsize>,
}

impl Drop for HandleGuard<'_> {
    fn drop(&mut self) {
        if let Some(counter) = self.emergency {
            counter.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

pub struct HttpPool {
    client: Client,
    permits: Semaphore,
    emergency: AtomicUsize,
    last_request: Mutex<Option<Instant>>,
    cache: Mutex<LruCache<String, CachedResponse>>,
}

static GLOBAL_POOL: Lazy<HttpPool> = Lazy::new(HttpPool::new);

impl HttpPool {
    fn new() -> HttpPool {
        let client = Client::builder()
            .user_agent(USER_AGENT)
            .pool_max_idle_per_host(POOL_SIZE)
            .pool_idle_timeout(POOL_IDLE_TIMEOUT)
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .gzip(true)
            .deflate(true)
            .build()
            .unwrap_or_else(|_| Client::new());
        HttpPool {
            client,
            permits: Semaphore::new(POOL_SIZE),
            emergency: AtomicUsize::new(0),
            last_request: Mutex::new(None),
            cache: Mutex::new(LruCache::new(CACHE_CAPACITY)),
        }
    }

    pub fn global() -> &'static HttpPool {
        &GLOBAL_POOL
    }

    /// Bounded handle acquisition. Waits up to [`ACQUIRE_TIMEOUT`] for a
    /// pooled slot, then allocates an emergency handle subject to a hard
    /// ceiling; past the ceiling it blocks for a real slot.
    async fn acquire(&self) -> Result<HandleGuard<'_>, GyattError> {
        if let Ok(Ok(permit)) =
            tokio::time::timeout(ACQUIRE_TIMEOUT, self.permits.acquire()).await
        {
            return Ok(HandleGuard {
                _permit: Some(permit),
                emergency: None,
            });
        }
        if self.emergency.fetch_add(1, Ordering::SeqCst) < EMERGENCY_CEILING {
            return Ok(HandleGuard {
                _permit: None,
                emergency: Some(&self.emergency),
            });
        }
        self.emergency.fetch_sub(1, Ordering::SeqCst);
        let permit = self
            .permits
            .acquire()
            .await
            .map_err(|_| GyattError::NetworkError("connection pool closed".to_string()))?;
        Ok(HandleGuard {
            _permit: Some(permit),
            emergency: None,
        })
    }

    /// Global minimum spacing between outbound requests.
    async fn rate_limit(&self) {
        loop {
            let wait = {
                let mut last = match self.last_request.lock() {
                    Ok(guard) => guard,
                    Err(poisoned) => poisoned.into_inner(),
                };
                let now = Instant::now();
                match *last {
                    Some(prev) if now.duration_since(prev) < MIN_REQUEST_INTERVAL => {
                        MIN_REQUEST_INTERVAL - now.duration_since(prev)
                    }
                    _ => {
                        *last = Some(now);
                        Duration::ZERO
                    }
                }
            };
            if wait.is_zero() {
                return;
            }
            tokio::time::sleep(wait).await;
        }
    }

    fn cache_lookup(&self, key: &str) -> Option<HttpResponse> {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let key = key.to_string();
        let entry = cache.get(&key)?;
        if entry.stored_at.elapsed() > CACHE_TTL {
            cache.remove(&key);
            return None;
        }
        Some(HttpResponse {
            status: entry.status,
            body: entry.body.clone(),
            from_cache: true,
        })
    }

    fn cache_store(&self, key: String, response: &HttpResponse) {
        let mut cache = match self.cache.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        };
        let _ = cache.insert(
            key,
            CachedResponse {
                status: response.status,
                body: response.body.clone(),
                stored_at: Instant::now(),
            },
        );
    }

    /// Send one request through the pool. Transient network failures
    /// (connect, resolve, timeout, send/recv reset) retry with linear
    /// backoff; HTTP error statuses are returned to the caller untouched.
    pub async fn request(&self, req: HttpRequest) -> Result<HttpResponse, GyattError> {
        let cacheable = req.method == Method::GET;
        let cache_key = req.cache_key();
        if cacheable {
            if let Some(hit) = self.cache_lookup(&cache_key) {
                tracing::trace!(url = %req.url, "served from response cache");
                return Ok(hit);
            }
        }

        self.rate_limit().await;
        let _handle = self.acquire().await?;

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            let mut builder = self
                .client
                .request(req.method.clone(), &req.url)
                .header(reqwest::header::CONNECTION, "keep-alive");
            for (name, value) in &req.headers {
                builder = builder.header(name.as_str(), value.as_str());
            }
            if let Some(body) = &req.body {
                builder = builder.body(body.clone());
            }
            if let Some(timeout) = req.timeout {
                builder = builder.timeout(timeout);
            }

            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| GyattError::NetworkError(e.to_string()))?;
                    let out = HttpResponse {
                        status,
                        body,
                        from_cache: false,
                    };
                    if cacheable && status == StatusCode::OK {
                        self.cache_store(cache_key, &out);
                    }
                    tracing::debug!(method = %req.method, url = %req.url, status = %status, attempt, "http request");
                    return Ok(out);
                }
                Err(err) if is_transient(&err) && attempt < MAX_RETRIES => {
                    tracing::warn!(url = %req.url, attempt, "transient http error: {err}");
                    last_error = Some(err);
                }
                Err(err) => return Err(GyattError::NetworkError(err.to_string())),
            }
        }
        Err(GyattError::NetworkError(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "request failed".to_string()),
        ))
    }

    /// Multipart file upload (the P2P `add` endpoint). The form cannot be
    /// cloned, so it is rebuilt from the raw bytes on every retry attempt.
    pub async fn post_multipart(
        &self,
        url: &str,
        field_name: &str,
        file_name: &str,
        content: Vec<u8>,
        timeout: Option<Duration>,
    ) -> Result<HttpResponse, GyattError> {
        self.rate_limit().await;
        let _handle = self.acquire().await?;

        let mut last_error = None;
        for attempt in 0..=MAX_RETRIES {
            if attempt > 0 {
                tokio::time::sleep(RETRY_BACKOFF * attempt).await;
            }
            let part = reqwest::multipart::Part::bytes(content.clone())
                .file_name(file_name.to_string());
            let form = reqwest::multipart::Form::new().part(field_name.to_string(), part);
            let mut builder = self.client.post(url).multipart(form);
            if let Some(timeout) = timeout {
                builder = builder.timeout(timeout);
            }
            match builder.send().await {
                Ok(response) => {
                    let status = response.status();
                    let body = response
                        .bytes()
                        .await
                        .map_err(|e| GyattError::NetworkError(e.to_string()))?;
                    return Ok(HttpResponse {
                        status,
                        body,
                        from_cache: false,
                    });
                }
                Err(err) if is_transient(&err) && attempt < MAX_RETRIES => {
                    tracing::warn!(url, attempt, "transient http error: {err}");
                    last_error = Some(err);
                }
                Err(err) => return Err(GyattError::NetworkError(err.to_string())),
            }
        }
        Err(GyattError::NetworkError(
            last_error
                .map(|e| e.to_string())
                .unwrap_or_else(|| "request failed".to_string()),
        ))
    }

    /// Bounded-parallel POST batch. Requests are prioritized largest-first,
    /// each carries its input index, and outcomes come back in input order.
    pub async fn batch_post(
        &self,
        url: &str,
        headers: &[(String, String)],
        bodies: Vec<Bytes>,
    ) -> Vec<Result<HttpResponse, GyattError>> {
        let count = bodies.len();
        if count == 0 {
            return Vec::new();
        }
        let bound = optimal_parallel_bound(count);

        let mut jobs: Vec<(usize, Bytes)> = bodies.into_iter().enumerate().collect();
        jobs.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        let launched = AtomicUsize::new(0);
        let outcomes: Vec<(usize, Result<HttpResponse, GyattError>)> =
            futures::stream::iter(jobs.into_iter().map(|(index, body)| {
                let launched = &launched;
                let mut req = HttpRequest::new(Method::POST, url);
                req.headers = headers.to_vec();
                req.body = Some(body);
                async move {
                    if launched.fetch_add(1, Ordering::SeqCst) >= bound / 2 {
                        tokio::time::sleep(BATCH_DAMPING).await;
                    }
                    (index, self.request(req).await)
                }
            }))
            .buffer_unordered(bound)
            .collect()
            .await;

        let mut results: Vec<Result<HttpResponse, GyattError>> = (0..count)
            .map(|_| Err(GyattError::NetworkError("request not scheduled".to_string())))
            .collect();
        for (index, outcome) in outcomes {
            results[index] = outcome;
        }
        results
    }
}

/// min(pool size, hardware concurrency doubled, file count)
pub fn optimal_parallel_bound(file_count: usize) -> usize {
    let hw = std::thread::available_parallelism()
        .map(|n| n.get())
        .unwrap_or(4);
    POOL_SIZE.min(hw * 2).min(file_count).max(1)
}

fn is_transient(err: &reqwest::Error) -> bool {
    err.is_connect() || err.is_timeout() || err.is_body() || err.is_decode()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parallel_bound_is_clamped() {
        assert_eq!(optimal_parallel_bound(1), 1);
        assert_eq!(optimal_parallel_bound(0), 1);
        assert!(optimal_parallel_bound(10_000) <= POOL_SIZE);
    }

    #[test]
    fn cache_key_varies_with_body() {
        let a = HttpRequest::new(Method::GET, "https://example.com/x").body(&b"one"[..]);
        let b = HttpRequest::new(Method::GET, "https://example.com/x").body(&b"two"[..]);
        let c = HttpRequest::new(Method::GET, "https://example.com/x");
        assert_ne!(a.cache_key(), b.cache_key());
        assert_ne!(a.cache_key(), c.cache_key());
    }

    #[test]
    fn cache_hits_are_marked() {
        let pool = HttpPool::new();
        let response = HttpResponse {
            status: StatusCode::OK,
            body: Bytes::from_static(b"payload"),
            from_cache: false,
        };
        pool.cache_store("GET https://example.com -".to_string(), &response);
        let hit = pool.cache_lookup("GET https://example.com -").unwrap();
        assert!(hit.from_cache);
        assert_eq!(hit.body, response.body);
        assert!(pool.cache_lookup("GET https://example.com/other -").is_none());
    }

    #[tokio::test]
    async fn emergency_handles_respect_ceiling() {
        let pool = HttpPool::new();
        // Drain the pooled permits.
        let mut held = Vec::new();
        for _ in 0..POOL_SIZE {
            held.push(pool.permits.acquire().await.unwrap());
        }
        // The next acquisitions time out into emergency handles.
        let guard = pool.acquire().await.unwrap();
        assert!(guard.emergency.is_some());
        assert_eq!(pool.emergency.load(Ordering::SeqCst), 1);
        drop(guard);
        assert_eq!(pool.emergency.load(Ordering::SeqCst), 0);
    }
}
