//! Config command handlers

use std::path::PathBuf;

use anyhow::{bail, Context, Result};

use versekeep_core::Config;

use crate::output::{Output, OutputFormat};

/// Show current configuration
pub fn show(output: &Output) -> Result<()> {
    let config = Config::load().context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::to_string_pretty(&config).context("Failed to serialize config")?
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            let none = || "(not set)".to_string();
            println!("Configuration:");
            println!("  data_dir:       {}", config.data_dir.display());
            println!("  history_limit:  {}", config.history_limit);
            println!("  log_level:      {}", config.log_level);
            println!("  cache.prefix:   {}", config.cache.prefix);
            println!("  cache.version:  {}", config.cache.version);
            println!("  cache.origin:   {}", config.cache.origin);
            println!("  cache.manifest: {} entries", config.cache.manifest.len());
            println!(
                "  references.abbreviations: {}",
                config
                    .references
                    .abbreviations
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(none)
            );
            println!(
                "  references.corpus:        {}",
                config
                    .references
                    .corpus
                    .as_ref()
                    .map(|p| p.display().to_string())
                    .unwrap_or_else(none)
            );
            println!();
            println!("Config file: {}", Config::config_file_path().display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: String, value: String, output: &Output) -> Result<()> {
    let mut config = Config::load().context("Failed to load configuration")?;
    apply(&mut config, &key, &value)?;
    config.save().context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    let optional_path = |value: &str| -> Option<PathBuf> {
        if value.is_empty() || value == "none" {
            None
        } else {
            Some(value.into())
        }
    };

    match key {
        "data_dir" => config.data_dir = value.into(),
        "history_limit" => {
            config.history_limit = value
                .parse()
                .context("Invalid value for history_limit. Use a positive number.")?;
        }
        "log_level" => config.log_level = value.to_string(),
        "cache.prefix" => config.cache.prefix = value.to_string(),
        "cache.version" => config.cache.version = value.to_string(),
        "cache.origin" => config.cache.origin = value.to_string(),
        "cache.root_document" => config.cache.root_document = value.to_string(),
        "references.abbreviations" => config.references.abbreviations = optional_path(value),
        "references.corpus" => config.references.corpus = optional_path(value),
        _ => {
            bail!(
                "Unknown configuration key: '{}'\n\
                 Valid keys: data_dir, history_limit, log_level, cache.prefix, cache.version,\n\
                 cache.origin, cache.root_document, references.abbreviations, references.corpus",
                key
            );
        }
    }
    Ok(())
}
