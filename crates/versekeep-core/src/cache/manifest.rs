//! Build-time manifest injection
//!
//! Bundled scripts and stylesheets carry content hashes in their file
//! names, so the install manifest can't list them statically. After a
//! build, the generated entry HTML is scanned for `/assets/...js` script
//! sources and `/assets/...css` stylesheet links and those paths are
//! spliced into the manifest.

use scraper::{Html, Selector};

/// Prefix of bundler output paths
const ASSET_PREFIX: &str = "/assets/";

/// Manifest entry the discovered assets are inserted after
const ENTRY_DOCUMENT: &str = "/index.html";

/// Hashed asset paths referenced by an entry HTML document, in document order
pub fn discover_assets(html: &str) -> Vec<String> {
    let document = Html::parse_document(html);
    let mut assets = Vec::new();

    let mut collect = |selector: &str, attr: &str, extension: &str| {
        let Ok(selector) = Selector::parse(selector) else {
            return;
        };
        for el in document.select(&selector) {
            if let Some(path) = el.value().attr(attr) {
                let path = path.trim();
                if path.starts_with(ASSET_PREFIX)
                    && path.ends_with(extension)
                    && !assets.iter().any(|a| a == path)
                {
                    assets.push(path.to_string());
                }
            }
        }
    };

    collect("script[src]", "src", ".js");
    collect("link[href]", "href", ".css");
    assets
}

/// Splice assets into a manifest right after `/index.html`
///
/// Paths already present are skipped. Without an `/index.html` entry
/// the assets are appended.
pub fn merge(manifest: &[String], assets: &[String]) -> Vec<String> {
    let new: Vec<String> = assets
        .iter()
        .filter(|a| !manifest.contains(a))
        .fold(Vec::new(), |mut acc, a| {
            if !acc.contains(a) {
                acc.push(a.clone());
            }
            acc
        });

    let at = manifest
        .iter()
        .position(|p| p == ENTRY_DOCUMENT)
        .map(|i| i + 1)
        .unwrap_or(manifest.len());

    let mut merged = manifest[..at].to_vec();
    merged.extend(new);
    merged.extend_from_slice(&manifest[at..]);
    merged
}
