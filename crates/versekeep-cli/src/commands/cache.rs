//! Offline cache command handlers
//!
//! Buckets persist in `cache.db` under the data directory, so install and
//! activate can run as separate invocations.

use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use versekeep_core::cache::{
    manifest, CacheGeneration, CacheManager, CacheStorage, HttpFetcher, Phase, ProxyRequest,
    SqliteCacheStorage,
};
use versekeep_core::Config;

use crate::output::Output;

/// Manager for the configured generation over the on-disk buckets
fn open_manager(config: &Config, html: Option<&Path>) -> Result<CacheManager> {
    let mut generation =
        CacheGeneration::from_config(&config.cache).context("Invalid cache configuration")?;

    if let Some(path) = html {
        let html = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read {:?}", path))?;
        let assets = manifest::discover_assets(&html);
        let merged = manifest::merge(generation.manifest(), &assets);
        generation = generation.with_manifest(merged);
    }

    let storage = SqliteCacheStorage::open(&config.cache_path())
        .with_context(|| format!("Failed to open cache at {:?}", config.cache_path()))?;
    let fetcher = HttpFetcher::new().context("Failed to create HTTP client")?;

    CacheManager::open(generation, Arc::new(storage), Arc::new(fetcher))
        .context("Failed to read cache buckets")
}

pub async fn install(config: &Config, html: Option<&Path>, output: &Output) -> Result<()> {
    let manager = open_manager(config, html)?;
    let report = manager.install().await.context("Install failed")?;
    output.print_install_report(&report);
    Ok(())
}

pub async fn activate(config: &Config, output: &Output) -> Result<()> {
    let manager = open_manager(config, None)?;
    let report = manager.activate().await.with_context(|| {
        format!(
            "Run `versekeep cache install` for version {} first",
            manager.generation().version()
        )
    })?;
    output.print_activate_report(&report);
    Ok(())
}

/// Request one URL the way the running app would
///
/// An installed bucket is activated first, since only an active cache
/// intercepts requests.
pub async fn fetch(config: &Config, url: &str, navigate: bool, output: &Output) -> Result<()> {
    let manager = open_manager(config, None)?;
    if manager.phase().await == Phase::Installed {
        manager.activate().await?;
    }

    let request = if navigate {
        ProxyRequest::navigate(url)?
    } else {
        ProxyRequest::get(url)?
    };
    let outcome = manager.fetch(&request).await;
    output.print_fetch(url, &outcome);
    Ok(())
}

pub fn buckets(config: &Config, output: &Output) -> Result<()> {
    let storage = SqliteCacheStorage::open(&config.cache_path())
        .with_context(|| format!("Failed to open cache at {:?}", config.cache_path()))?;
    let names = storage.buckets()?;
    output.print_list(&names);
    Ok(())
}
