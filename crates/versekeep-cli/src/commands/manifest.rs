//! Build-time helpers: asset discovery and version tags

use std::path::Path;

use anyhow::{Context, Result};

use versekeep_core::cache::{manifest, version};
use versekeep_core::Config;

use crate::output::{Output, OutputFormat};

/// Show hashed assets found in an entry HTML file and the merged manifest
pub fn discover(config: &Config, html: &Path, output: &Output) -> Result<()> {
    let content =
        std::fs::read_to_string(html).with_context(|| format!("Failed to read {:?}", html))?;
    let assets = manifest::discover_assets(&content);
    let merged = manifest::merge(&config.cache.manifest, &assets);

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "assets": assets,
                    "manifest": merged,
                })
            );
        }
        OutputFormat::Quiet => output.print_list(&merged),
        OutputFormat::Human => {
            println!("Discovered {} asset(s):", assets.len());
            for asset in &assets {
                println!("  {}", asset);
            }
            println!();
            println!("Manifest ({} entries):", merged.len());
            for path in &merged {
                println!("  {}", path);
            }
        }
    }
    Ok(())
}

/// Print a fresh version tag for the next deployment
pub fn version(output: &Output) -> Result<()> {
    let tag = version::generate();
    match output.format {
        OutputFormat::Json => println!("{}", serde_json::json!({ "version": tag })),
        _ => println!("{}", tag),
    }
    Ok(())
}
