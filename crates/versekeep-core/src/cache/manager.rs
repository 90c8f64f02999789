//! Cache manager
//!
//! Drives one cache generation through install, activate and per-request
//! interception. Lifecycle transitions are serialized; fetches run
//! concurrently and only share the bucket storage.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use futures_util::future::join_all;
use regex::Regex;
use reqwest::Url;
use serde::Serialize;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};

use super::error::{CacheError, CacheResult};
use super::fetch::{CachedResponse, Fetcher, ProxyRequest, RequestMode};
use super::storage::CacheStorage;
use super::{version, Phase};
use crate::config::CacheConfig;

/// Everything that identifies one deployed version of the cache
#[derive(Debug, Clone)]
pub struct CacheGeneration {
    prefix: String,
    version: String,
    legacy_names: Vec<String>,
    origin: Url,
    manifest: Vec<String>,
    progressive: Vec<Regex>,
    root_document: String,
}

impl CacheGeneration {
    pub fn from_config(config: &CacheConfig) -> CacheResult<Self> {
        let origin = Url::parse(&config.origin).map_err(|e| CacheError::InvalidUrl {
            url: config.origin.clone(),
            reason: e.to_string(),
        })?;
        let progressive = config
            .progressive_patterns
            .iter()
            .map(|pattern| {
                Regex::new(pattern).map_err(|source| CacheError::Pattern {
                    pattern: pattern.clone(),
                    source,
                })
            })
            .collect::<CacheResult<Vec<_>>>()?;

        Ok(Self {
            prefix: config.prefix.clone(),
            version: config.version.clone(),
            legacy_names: config.legacy_names.clone(),
            origin,
            manifest: config.manifest.clone(),
            progressive,
            root_document: config.root_document.clone(),
        })
    }

    /// Same settings under a different version tag
    pub fn with_version(mut self, version: impl Into<String>) -> Self {
        self.version = version.into();
        self
    }

    /// Replace the manifest, e.g. after asset discovery
    pub fn with_manifest(mut self, manifest: Vec<String>) -> Self {
        self.manifest = manifest;
        self
    }

    pub fn version(&self) -> &str {
        &self.version
    }

    pub fn manifest(&self) -> &[String] {
        &self.manifest
    }

    pub fn bucket_name(&self) -> String {
        version::bucket_name(&self.prefix, &self.version)
    }

    /// Bucket belongs to this app but not to this version
    fn is_stale(&self, bucket: &str) -> bool {
        if bucket == self.bucket_name() {
            return false;
        }
        bucket.starts_with(&format!("{}-", self.prefix))
            || self.legacy_names.iter().any(|name| name == bucket)
    }

    /// Manifest paths and progressive patterns both match on the URL path
    fn should_cache(&self, url: &Url) -> bool {
        let path = url.path();
        self.manifest.iter().any(|p| p == path) || self.progressive.iter().any(|re| re.is_match(path))
    }

    /// Absolute URL for a manifest path
    pub fn resolve(&self, path: &str) -> CacheResult<Url> {
        self.origin.join(path).map_err(|e| CacheError::InvalidUrl {
            url: path.to_string(),
            reason: e.to_string(),
        })
    }
}

/// Outcome of `install`
#[derive(Debug, Clone, Default, Serialize)]
pub struct InstallReport {
    pub bucket: String,
    pub cached: Vec<String>,
    pub failed: Vec<String>,
}

/// Outcome of `activate`
#[derive(Debug, Clone, Default, Serialize)]
pub struct ActivateReport {
    pub bucket: String,
    pub deleted: Vec<String>,
}

/// Where a served response came from
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ResponseSource {
    Cache,
    Network,
    /// Navigation served from the cached root document
    Fallback,
    /// Synthetic 404 for an uncached subresource while offline
    NotFound,
}

/// Result of intercepting one request
#[derive(Debug, Clone, PartialEq)]
pub enum FetchOutcome {
    /// Not intercepted; the caller sends it upstream unchanged
    Passthrough,
    Served {
        response: CachedResponse,
        source: ResponseSource,
    },
}

/// Installable offline proxy for one cache generation
pub struct CacheManager {
    generation: CacheGeneration,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetcher>,
    lifecycle: Mutex<Phase>,
    active: AtomicBool,
}

impl CacheManager {
    pub fn new(
        generation: CacheGeneration,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> Self {
        Self {
            generation,
            storage,
            fetcher,
            lifecycle: Mutex::new(Phase::Idle),
            active: AtomicBool::new(false),
        }
    }

    /// Manager over existing storage
    ///
    /// A generation whose bucket is already present was installed by an
    /// earlier session and starts out `Installed`.
    pub fn open(
        generation: CacheGeneration,
        storage: Arc<dyn CacheStorage>,
        fetcher: Arc<dyn Fetcher>,
    ) -> CacheResult<Self> {
        let installed = storage.buckets()?.contains(&generation.bucket_name());
        let mut manager = Self::new(generation, storage, fetcher);
        if installed {
            debug!("Resuming installed bucket {}", manager.generation.bucket_name());
            manager.lifecycle = Mutex::new(Phase::Installed);
        }
        Ok(manager)
    }

    pub fn generation(&self) -> &CacheGeneration {
        &self.generation
    }

    pub async fn phase(&self) -> Phase {
        *self.lifecycle.lock().await
    }

    /// Every bucket in storage, current or not
    pub fn buckets(&self) -> CacheResult<Vec<String>> {
        self.storage.buckets()
    }

    // ==================== Lifecycle ====================

    /// Fetch every manifest URL concurrently into this version's bucket
    ///
    /// Failures are logged and reported; they never abort the install.
    pub async fn install(&self) -> CacheResult<InstallReport> {
        let mut phase = self.lifecycle.lock().await;
        let bucket = self.generation.bucket_name();
        self.storage.open_bucket(&bucket)?;
        info!("Installing cache bucket {}", bucket);

        let mut report = InstallReport {
            bucket: bucket.clone(),
            ..Default::default()
        };

        let mut requests = Vec::new();
        for path in &self.generation.manifest {
            match self.generation.resolve(path) {
                Ok(url) => requests.push(ProxyRequest {
                    method: reqwest::Method::GET,
                    url,
                    mode: RequestMode::Subresource,
                }),
                Err(e) => {
                    warn!("Skipping manifest entry: {}", e);
                    report.failed.push(path.clone());
                }
            }
        }

        let results = join_all(requests.iter().map(|request| self.fetcher.fetch(request))).await;

        for (request, result) in requests.iter().zip(results) {
            let url = request.url.as_str();
            match result {
                Ok(response) if response.is_success() => {
                    match self.storage.store(&bucket, url, &response) {
                        Ok(()) => report.cached.push(url.to_string()),
                        Err(e) => {
                            warn!("Failed to store {}: {}", url, e);
                            report.failed.push(url.to_string());
                        }
                    }
                }
                Ok(response) => {
                    warn!("Failed to cache {}: status {}", url, response.status);
                    report.failed.push(url.to_string());
                }
                Err(e) => {
                    warn!("Failed to cache {}: {}", url, e);
                    report.failed.push(url.to_string());
                }
            }
        }

        if *phase == Phase::Idle {
            *phase = Phase::Installed;
        }
        info!(
            "Installed {}: {} cached, {} failed",
            bucket,
            report.cached.len(),
            report.failed.len()
        );
        Ok(report)
    }

    /// Purge every other bucket of this app and start intercepting
    pub async fn activate(&self) -> CacheResult<ActivateReport> {
        let mut phase = self.lifecycle.lock().await;
        if *phase == Phase::Idle {
            return Err(CacheError::Lifecycle {
                action: "activate",
                phase: *phase,
            });
        }

        let bucket = self.generation.bucket_name();
        let mut report = ActivateReport {
            bucket,
            ..Default::default()
        };

        for name in self.storage.buckets()? {
            if self.generation.is_stale(&name) {
                self.storage.delete_bucket(&name)?;
                info!("Deleted old cache bucket {}", name);
                report.deleted.push(name);
            }
        }

        *phase = Phase::Active;
        self.active.store(true, Ordering::Release);
        Ok(report)
    }

    // ==================== Interception ====================

    /// Serve a request cache-first
    ///
    /// Never fails: a request that can't be served from cache or network
    /// resolves to the root document (navigations) or a 404.
    pub async fn fetch(&self, request: &ProxyRequest) -> FetchOutcome {
        if !self.active.load(Ordering::Acquire) || !request.is_interceptable() {
            return FetchOutcome::Passthrough;
        }

        let bucket = self.generation.bucket_name();
        let url = request.url.as_str();

        match self.storage.lookup(&bucket, url) {
            Ok(Some(response)) => {
                debug!("Cache hit {}", url);
                return FetchOutcome::Served {
                    response,
                    source: ResponseSource::Cache,
                };
            }
            Ok(None) => {}
            Err(e) => warn!("Cache lookup failed for {}: {}", url, e),
        }

        match self.fetcher.fetch(request).await {
            Ok(response) if response.is_success() => {
                if self.generation.should_cache(&request.url) {
                    if let Err(e) = self.storage.store(&bucket, url, &response) {
                        warn!("Failed to cache {}: {}", url, e);
                    }
                }
                FetchOutcome::Served {
                    response,
                    source: ResponseSource::Network,
                }
            }
            Ok(response) => {
                debug!("Network returned {} for {}", response.status, url);
                self.offline_fallback(request, &bucket)
            }
            Err(e) => {
                debug!("Network failed for {}: {}", url, e);
                self.offline_fallback(request, &bucket)
            }
        }
    }

    fn offline_fallback(&self, request: &ProxyRequest, bucket: &str) -> FetchOutcome {
        if request.is_navigation() {
            let root = self
                .generation
                .resolve(&self.generation.root_document)
                .ok()
                .and_then(|root| self.storage.lookup(bucket, root.as_str()).ok().flatten());
            if let Some(response) = root {
                return FetchOutcome::Served {
                    response,
                    source: ResponseSource::Fallback,
                };
            }
        }

        FetchOutcome::Served {
            response: CachedResponse::not_found(),
            source: ResponseSource::NotFound,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cache::storage::MemoryCacheStorage;
    use async_trait::async_trait;
    use std::collections::HashMap;
    use std::sync::atomic::AtomicUsize;
    use std::sync::Mutex as StdMutex;

    const ORIGIN: &str = "http://localhost:8080";

    /// Serves canned bodies by path; everything else is a network error
    #[derive(Default)]
    struct FakeFetcher {
        routes: StdMutex<HashMap<String, CachedResponse>>,
        calls: AtomicUsize,
    }

    impl FakeFetcher {
        fn with(routes: &[(&str, &str)]) -> Arc<Self> {
            let fetcher = Self::default();
            for (path, body) in routes {
                fetcher.serve(path, CachedResponse::ok("text/plain", body.as_bytes().to_vec()));
            }
            Arc::new(fetcher)
        }

        fn serve(&self, path: &str, response: CachedResponse) {
            self.routes.lock().unwrap().insert(path.to_string(), response);
        }

        fn go_offline(&self) {
            self.routes.lock().unwrap().clear();
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Fetcher for FakeFetcher {
        async fn fetch(&self, request: &ProxyRequest) -> CacheResult<CachedResponse> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            self.routes
                .lock()
                .unwrap()
                .get(request.url.path())
                .cloned()
                .ok_or_else(|| CacheError::fetch(request.url.as_str(), "offline"))
        }
    }

    fn generation(version: &str, manifest: &[&str]) -> CacheGeneration {
        let config = CacheConfig {
            version: version.to_string(),
            origin: ORIGIN.to_string(),
            manifest: manifest.iter().map(|s| s.to_string()).collect(),
            ..Default::default()
        };
        CacheGeneration::from_config(&config).unwrap()
    }

    fn url(path: &str) -> String {
        format!("{}{}", ORIGIN, path)
    }

    fn served(outcome: FetchOutcome) -> (CachedResponse, ResponseSource) {
        match outcome {
            FetchOutcome::Served { response, source } => (response, source),
            FetchOutcome::Passthrough => panic!("expected a served response"),
        }
    }

    #[tokio::test]
    async fn test_install_skips_failures() {
        let fetcher = FakeFetcher::with(&[("/", "<root>"), ("/index.html", "<index>")]);
        fetcher.serve(
            "/manifest.json",
            CachedResponse {
                status: 500,
                headers: Vec::new(),
                body: Vec::new(),
            },
        );
        let storage = Arc::new(MemoryCacheStorage::new());
        let manager = CacheManager::new(
            generation("v1", &["/", "/index.html", "/manifest.json", "/missing.png"]),
            storage.clone(),
            fetcher,
        );

        let report = manager.install().await.unwrap();
        assert_eq!(report.bucket, "bible-app-v1");
        assert_eq!(report.cached, vec![url("/"), url("/index.html")]);
        assert_eq!(report.failed, vec![url("/manifest.json"), url("/missing.png")]);
        assert_eq!(manager.phase().await, Phase::Installed);
        assert_eq!(storage.keys("bible-app-v1").unwrap().len(), 2);
    }

    #[tokio::test]
    async fn test_activate_before_install() {
        let manager = CacheManager::new(
            generation("v1", &["/"]),
            Arc::new(MemoryCacheStorage::new()),
            FakeFetcher::with(&[]),
        );
        let err = manager.activate().await.unwrap_err();
        assert!(matches!(err, CacheError::Lifecycle { phase: Phase::Idle, .. }));
    }

    #[tokio::test]
    async fn test_passthrough() {
        let fetcher = FakeFetcher::with(&[("/", "<root>"), ("/api", "{}")]);
        let manager = CacheManager::new(
            generation("v1", &["/"]),
            Arc::new(MemoryCacheStorage::new()),
            fetcher.clone(),
        );

        // Not active yet
        let request = ProxyRequest::get(&url("/api")).unwrap();
        assert_eq!(manager.fetch(&request).await, FetchOutcome::Passthrough);

        manager.install().await.unwrap();
        manager.activate().await.unwrap();
        let calls = fetcher.calls();

        let post =
            ProxyRequest::new(reqwest::Method::POST, &url("/api"), RequestMode::Subresource).unwrap();
        assert_eq!(manager.fetch(&post).await, FetchOutcome::Passthrough);
        let ext = ProxyRequest::get("chrome-extension://abc/x.js").unwrap();
        assert_eq!(manager.fetch(&ext).await, FetchOutcome::Passthrough);
        assert_eq!(fetcher.calls(), calls);
    }

    #[tokio::test]
    async fn test_cache_first_and_progressive() {
        let fetcher = FakeFetcher::with(&[
            ("/", "<root>"),
            ("/assets/index-abc.js", "js"),
            ("/api/verse", "{}"),
        ]);
        let storage = Arc::new(MemoryCacheStorage::new());
        let manager = CacheManager::new(generation("v1", &["/"]), storage.clone(), fetcher.clone());
        manager.install().await.unwrap();
        manager.activate().await.unwrap();

        // Manifest entry comes from the bucket without touching the network
        let calls = fetcher.calls();
        let (response, source) = served(manager.fetch(&ProxyRequest::navigate(&url("/")).unwrap()).await);
        assert_eq!(source, ResponseSource::Cache);
        assert_eq!(response.text(), "<root>");
        assert_eq!(fetcher.calls(), calls);

        // Scripts are cached the first time they are seen
        let js = ProxyRequest::get(&url("/assets/index-abc.js")).unwrap();
        assert_eq!(served(manager.fetch(&js).await).1, ResponseSource::Network);
        assert_eq!(served(manager.fetch(&js).await).1, ResponseSource::Cache);

        // Other responses pass through the network every time
        let api = ProxyRequest::get(&url("/api/verse")).unwrap();
        assert_eq!(served(manager.fetch(&api).await).1, ResponseSource::Network);
        assert!(storage.lookup("bible-app-v1", &url("/api/verse")).unwrap().is_none());
    }

    #[tokio::test]
    async fn test_offline_fallbacks() {
        let fetcher = FakeFetcher::with(&[("/", "<root>")]);
        let manager = CacheManager::new(
            generation("v1", &["/"]),
            Arc::new(MemoryCacheStorage::new()),
            fetcher.clone(),
        );
        manager.install().await.unwrap();
        manager.activate().await.unwrap();
        fetcher.go_offline();

        let (response, source) =
            served(manager.fetch(&ProxyRequest::navigate(&url("/psalms/23")).unwrap()).await);
        assert_eq!(source, ResponseSource::Fallback);
        assert_eq!(response.text(), "<root>");

        let (response, source) =
            served(manager.fetch(&ProxyRequest::get(&url("/assets/gone.js")).unwrap()).await);
        assert_eq!(source, ResponseSource::NotFound);
        assert_eq!(response.status, 404);
        assert_eq!(response.text(), "Not Found");
    }

    #[tokio::test]
    async fn test_non_success_is_treated_as_failure() {
        let fetcher = FakeFetcher::with(&[("/", "<root>")]);
        fetcher.serve(
            "/psalms/23",
            CachedResponse {
                status: 503,
                headers: Vec::new(),
                body: b"down".to_vec(),
            },
        );
        let manager = CacheManager::new(
            generation("v1", &["/"]),
            Arc::new(MemoryCacheStorage::new()),
            fetcher,
        );
        manager.install().await.unwrap();
        manager.activate().await.unwrap();

        let (response, source) =
            served(manager.fetch(&ProxyRequest::navigate(&url("/psalms/23")).unwrap()).await);
        assert_eq!(source, ResponseSource::Fallback);
        assert_eq!(response.text(), "<root>");
    }

    #[tokio::test]
    async fn test_generation_isolation() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
        storage.open_bucket("cache").unwrap();
        storage.open_bucket("someone-elses-bucket").unwrap();

        let fetcher = FakeFetcher::with(&[("/", "<root v1>"), ("/assets/app-v1.js", "v1")]);
        let v1 = CacheManager::new(generation("V1", &["/"]), storage.clone(), fetcher.clone());
        v1.install().await.unwrap();
        let report = v1.activate().await.unwrap();
        assert_eq!(report.deleted, vec!["cache"]);

        let asset = ProxyRequest::get(&url("/assets/app-v1.js")).unwrap();
        served(v1.fetch(&asset).await);
        assert!(storage.lookup("bible-app-V1", asset.url.as_str()).unwrap().is_some());

        fetcher.go_offline();
        fetcher.serve("/", CachedResponse::ok("text/html", b"<root v2>".to_vec()));
        let v2 = CacheManager::new(generation("V2", &["/"]), storage.clone(), fetcher.clone());
        v2.install().await.unwrap();
        let report = v2.activate().await.unwrap();
        assert_eq!(report.deleted, vec!["bible-app-V1"]);

        assert_eq!(
            storage.buckets().unwrap(),
            vec!["bible-app-V2", "someone-elses-bucket"]
        );

        // V1's asset is gone and the network no longer has it
        let (_, source) = served(v2.fetch(&asset).await);
        assert_eq!(source, ResponseSource::NotFound);
    }

    #[tokio::test]
    async fn test_open_resumes_installed_bucket() {
        let storage: Arc<dyn CacheStorage> = Arc::new(MemoryCacheStorage::new());
        let fetcher = FakeFetcher::with(&[("/", "<root>")]);

        let fresh = CacheManager::open(generation("v1", &["/"]), storage.clone(), fetcher.clone())
            .unwrap();
        assert_eq!(fresh.phase().await, Phase::Idle);
        fresh.install().await.unwrap();

        let resumed = CacheManager::open(generation("v1", &["/"]), storage.clone(), fetcher.clone())
            .unwrap();
        assert_eq!(resumed.phase().await, Phase::Installed);
        resumed.activate().await.unwrap();
        assert_eq!(resumed.phase().await, Phase::Active);

        let other = CacheManager::open(generation("v2", &["/"]), storage, fetcher).unwrap();
        assert_eq!(other.phase().await, Phase::Idle);
    }

    #[tokio::test]
    async fn test_concurrent_fetches() {
        let fetcher = FakeFetcher::with(&[("/", "<root>"), ("/assets/a.css", "a"), ("/assets/b.css", "b")]);
        let manager = Arc::new(CacheManager::new(
            generation("v1", &["/"]),
            Arc::new(MemoryCacheStorage::new()),
            fetcher,
        ));
        manager.install().await.unwrap();
        manager.activate().await.unwrap();

        let handles: Vec<_> = ["/assets/a.css", "/assets/b.css", "/assets/a.css"]
            .into_iter()
            .map(|path| {
                let manager = Arc::clone(&manager);
                let request = ProxyRequest::get(&url(path)).unwrap();
                tokio::spawn(async move { served(manager.fetch(&request).await).0.text() })
            })
            .collect();

        let mut bodies = Vec::new();
        for handle in handles {
            bodies.push(handle.await.unwrap());
        }
        assert_eq!(bodies, vec!["a", "b", "a"]);
    }
}
