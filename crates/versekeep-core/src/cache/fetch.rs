//! Requests, responses and the network seam

use std::time::Duration;

use async_trait::async_trait;
use reqwest::{Method, Url};
use serde::{Deserialize, Serialize};

use super::error::{CacheError, CacheResult};

/// Fetch timeout in seconds
const FETCH_TIMEOUT: u64 = 30;

/// Whether a request is a top-level page navigation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RequestMode {
    Navigate,
    Subresource,
}

/// A request seen by the cache manager
#[derive(Debug, Clone)]
pub struct ProxyRequest {
    pub method: Method,
    pub url: Url,
    pub mode: RequestMode,
}

impl ProxyRequest {
    pub fn new(method: Method, url: &str, mode: RequestMode) -> CacheResult<Self> {
        let url = Url::parse(url).map_err(|e| CacheError::InvalidUrl {
            url: url.to_string(),
            reason: e.to_string(),
        })?;
        Ok(Self { method, url, mode })
    }

    /// GET for a subresource (script, stylesheet, data file)
    pub fn get(url: &str) -> CacheResult<Self> {
        Self::new(Method::GET, url, RequestMode::Subresource)
    }

    /// GET for a page navigation
    pub fn navigate(url: &str) -> CacheResult<Self> {
        Self::new(Method::GET, url, RequestMode::Navigate)
    }

    /// Only GET over http(s) is intercepted
    pub fn is_interceptable(&self) -> bool {
        self.method == Method::GET && matches!(self.url.scheme(), "http" | "https")
    }

    pub fn is_navigation(&self) -> bool {
        self.mode == RequestMode::Navigate
    }
}

/// A response body with its status and headers
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CachedResponse {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    #[serde(skip)]
    pub body: Vec<u8>,
}

impl CachedResponse {
    /// 200 response with a content type
    pub fn ok(content_type: &str, body: Vec<u8>) -> Self {
        Self {
            status: 200,
            headers: vec![("content-type".to_string(), content_type.to_string())],
            body,
        }
    }

    /// The explicit response for an uncached subresource while offline
    pub fn not_found() -> Self {
        Self {
            status: 404,
            headers: vec![("content-type".to_string(), "text/plain".to_string())],
            body: b"Not Found".to_vec(),
        }
    }

    /// 2xx
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }

    /// First header with this name, case-insensitive
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }
}

/// Performs live network requests
#[async_trait]
pub trait Fetcher: Send + Sync {
    /// Fetch a request from the network
    ///
    /// Non-success statuses are returned as responses; only transport
    /// failures are errors.
    async fn fetch(&self, request: &ProxyRequest) -> CacheResult<CachedResponse>;
}

/// Fetcher backed by a shared reqwest client
#[derive(Debug, Clone)]
pub struct HttpFetcher {
    client: reqwest::Client,
}

impl HttpFetcher {
    pub fn new() -> CacheResult<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(FETCH_TIMEOUT))
            .user_agent(concat!("versekeep/", env!("CARGO_PKG_VERSION")))
            .build()
            .map_err(|e| CacheError::fetch("client", e))?;
        Ok(Self { client })
    }
}

#[async_trait]
impl Fetcher for HttpFetcher {
    async fn fetch(&self, request: &ProxyRequest) -> CacheResult<CachedResponse> {
        let url = request.url.as_str();
        let response = self
            .client
            .request(request.method.clone(), request.url.clone())
            .send()
            .await
            .map_err(|e| CacheError::fetch(url, e))?;

        let status = response.status().as_u16();
        let headers = response
            .headers()
            .iter()
            .filter_map(|(name, value)| {
                value
                    .to_str()
                    .ok()
                    .map(|v| (name.as_str().to_string(), v.to_string()))
            })
            .collect();
        let body = response
            .bytes()
            .await
            .map_err(|e| CacheError::fetch(url, e))?
            .to_vec();

        Ok(CachedResponse {
            status,
            headers,
            body,
        })
    }
}
