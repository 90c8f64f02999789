//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/versekeep/config.toml)
//! 3. Environment variables (VERSEKEEP_* prefix)
//!
//! Environment variables take precedence over config file values.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::history::DEFAULT_HISTORY_LIMIT;

/// Environment variable prefix
const ENV_PREFIX: &str = "VERSEKEEP";

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for data storage (annotation db, cache db)
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Maximum number of history entries kept
    #[serde(default = "default_history_limit")]
    pub history_limit: u64,

    /// Log level for the versekeep crates (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// Offline cache settings
    #[serde(default)]
    pub cache: CacheConfig,

    /// Cross-reference data files
    #[serde(default)]
    pub references: ReferencesConfig,
}

/// Offline cache settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CacheConfig {
    /// Bucket name prefix; buckets are named `<prefix>-<version>`
    #[serde(default = "default_cache_prefix")]
    pub prefix: String,

    /// Unversioned bucket names from older deployments, purged on activate
    #[serde(default = "default_legacy_names")]
    pub legacy_names: Vec<String>,

    /// Current version tag (changes with every deployment)
    #[serde(default = "default_cache_version")]
    pub version: String,

    /// Origin that manifest paths are resolved against
    #[serde(default = "default_origin")]
    pub origin: String,

    /// Must-have paths fetched at install time
    #[serde(default = "default_manifest")]
    pub manifest: Vec<String>,

    /// Regexes over the URL path; matching responses are cached when first seen
    #[serde(default = "default_progressive_patterns")]
    pub progressive_patterns: Vec<String>,

    /// Document served for navigation requests when offline
    #[serde(default = "default_root_document")]
    pub root_document: String,
}

/// Cross-reference data files
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ReferencesConfig {
    /// JSON object mapping book abbreviation to book number
    #[serde(default)]
    pub abbreviations: Option<PathBuf>,

    /// Tab-separated reference corpus
    #[serde(default)]
    pub corpus: Option<PathBuf>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            history_limit: default_history_limit(),
            log_level: default_log_level(),
            cache: CacheConfig::default(),
            references: ReferencesConfig::default(),
        }
    }
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            prefix: default_cache_prefix(),
            legacy_names: default_legacy_names(),
            version: default_cache_version(),
            origin: default_origin(),
            manifest: default_manifest(),
            progressive_patterns: default_progressive_patterns(),
            root_document: default_root_document(),
        }
    }
}

impl CacheConfig {
    /// Name of the bucket for the current version
    pub fn bucket_name(&self) -> String {
        crate::cache::version::bucket_name(&self.prefix, &self.version)
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (VERSEKEEP_DATA_DIR, VERSEKEEP_HISTORY_LIMIT, ...)
    /// 2. Config file (~/.config/versekeep/config.toml or VERSEKEEP_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &PathBuf) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string (useful for testing)
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Apply environment variable overrides
    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        // Unparseable values are ignored
        if let Ok(val) = std::env::var(format!("{}_HISTORY_LIMIT", ENV_PREFIX)) {
            if let Ok(limit) = val.trim().parse() {
                self.history_limit = limit;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_LOG_LEVEL", ENV_PREFIX)) {
            if !val.is_empty() {
                self.log_level = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_CACHE_VERSION", ENV_PREFIX)) {
            if !val.is_empty() {
                self.cache.version = val;
            }
        }

        if let Ok(val) = std::env::var(format!("{}_ORIGIN", ENV_PREFIX)) {
            if !val.is_empty() {
                self.cache.origin = val;
            }
        }
    }

    /// Ensure data directory exists
    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to file
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_file_path();

        if let Some(parent) = config_path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(&config_path, content)
            .with_context(|| format!("Failed to write config file: {:?}", config_path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with VERSEKEEP_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("versekeep")
            .join("config.toml")
    }

    /// Get the path to the annotation database
    pub fn database_path(&self) -> PathBuf {
        self.data_dir.join("versekeep.db")
    }

    /// Get the path to the offline cache database
    pub fn cache_path(&self) -> PathBuf {
        self.data_dir.join("cache.db")
    }
}

/// Get the default data directory
fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("versekeep")
}

fn default_history_limit() -> u64 {
    DEFAULT_HISTORY_LIMIT
}

fn default_log_level() -> String {
    "warn".to_string()
}

fn default_cache_prefix() -> String {
    "bible-app".to_string()
}

fn default_legacy_names() -> Vec<String> {
    vec!["cache".to_string()]
}

fn default_cache_version() -> String {
    "v1".to_string()
}

fn default_origin() -> String {
    "http://localhost:8080".to_string()
}

fn default_root_document() -> String {
    "/".to_string()
}

fn default_progressive_patterns() -> Vec<String> {
    vec![r"\.(js|css)$".to_string()]
}

fn default_manifest() -> Vec<String> {
    [
        "/",
        "/index.html",
        "/manifest.json",
        "/favicon.ico",
        "/assets/json/intro.json",
        "/assets/json/title.json",
        "/assets/json/bible.json",
        "/assets/json/eng-bible.json",
        "/assets/json/headings/bibleheadings.json",
        "/assets/json/abbrevs.json",
        "/assets/txt/cross_references.txt",
        "/assets/fonts/fonts.css",
        "/logo192.png",
        "/logo512.png",
    ]
    .iter()
    .map(|s| s.to_string())
    .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;

    // Mutex to serialize tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Guard that locks env access and saves/restores env vars
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "VERSEKEEP_DATA_DIR",
        "VERSEKEEP_HISTORY_LIMIT",
        "VERSEKEEP_LOG_LEVEL",
        "VERSEKEEP_CACHE_VERSION",
        "VERSEKEEP_ORIGIN",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert_eq!(config.history_limit, 10_000);
        assert!(config.data_dir.ends_with("versekeep"));
        assert_eq!(config.cache.prefix, "bible-app");
        assert_eq!(config.cache.legacy_names, vec!["cache"]);
        assert!(config.cache.manifest.contains(&"/index.html".to_string()));
        assert!(config.references.corpus.is_none());
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.database_path().ends_with("versekeep.db"));
        assert!(config.cache_path().ends_with("cache.db"));
    }

    #[test]
    fn test_bucket_name() {
        let mut cache = CacheConfig::default();
        cache.version = "v1769879359900".to_string();
        assert_eq!(cache.bucket_name(), "bible-app-v1769879359900");
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("VERSEKEEP_DATA_DIR", "/tmp/versekeep-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/versekeep-test"));
    }

    #[test]
    fn test_env_override_history_limit() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("VERSEKEEP_HISTORY_LIMIT", "250");
        config.apply_env_overrides();
        assert_eq!(config.history_limit, 250);

        env::set_var("VERSEKEEP_HISTORY_LIMIT", "lots");
        config.apply_env_overrides();
        assert_eq!(config.history_limit, 250);
    }

    #[test]
    fn test_env_override_cache() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        env::set_var("VERSEKEEP_CACHE_VERSION", "v42");
        env::set_var("VERSEKEEP_ORIGIN", "https://bible.example.org");
        config.apply_env_overrides();

        assert_eq!(config.cache.version, "v42");
        assert_eq!(config.cache.origin, "https://bible.example.org");

        // Empty string leaves the value alone
        env::set_var("VERSEKEEP_CACHE_VERSION", "");
        config.apply_env_overrides();
        assert_eq!(config.cache.version, "v42");
    }

    #[test]
    fn test_serialization() {
        let _guard = EnvGuard::new(ENV_VARS);

        let mut config = Config::default();
        config.data_dir = PathBuf::from("/data/versekeep");
        config.references.corpus = Some(PathBuf::from("/data/cross_references.txt"));

        let toml_str = toml::to_string_pretty(&config).unwrap();
        assert!(toml_str.contains("data_dir"));
        assert!(toml_str.contains("[cache]"));

        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.data_dir, config.data_dir);
        assert_eq!(parsed.references.corpus, config.references.corpus);
        assert_eq!(parsed.cache.manifest, config.cache.manifest);
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            history_limit = 500

            [cache]
            version = "v7"
            manifest = ["/", "/index.html"]

            [references]
            abbreviations = "/custom/abbrevs.json"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.history_limit, 500);
        assert_eq!(config.cache.version, "v7");
        assert_eq!(config.cache.prefix, "bible-app");
        assert_eq!(config.cache.manifest.len(), 2);
        assert_eq!(
            config.references.abbreviations,
            Some(PathBuf::from("/custom/abbrevs.json"))
        );
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = tempfile::TempDir::new().unwrap();
        env::set_var("VERSEKEEP_DATA_DIR", temp_dir.path().join("data"));

        let path = PathBuf::from("/nonexistent/config.toml");
        let config = Config::load_from_path(&path).unwrap();
        assert_eq!(config.history_limit, 10_000);
        assert!(config.data_dir.exists());
    }
}
