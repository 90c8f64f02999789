//! Where the abbreviation table and corpus come from

use std::path::PathBuf;

use async_trait::async_trait;
use thiserror::Error;

use super::parse::Abbreviations;

/// Errors loading cross-reference data
#[derive(Error, Debug)]
pub enum ReferenceError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid abbreviation table: {0}")]
    Abbreviations(#[from] serde_json::Error),

    #[error("No {0} configured")]
    NotConfigured(&'static str),
}

/// Result type for cross-reference loading
pub type ReferenceResult<T> = Result<T, ReferenceError>;

/// Provider of the two input documents
#[async_trait]
pub trait ReferenceSource: Send + Sync {
    /// Abbreviation table JSON: `{"Gen": 1, "Exod": 2, ...}`
    async fn abbreviations(&self) -> ReferenceResult<Abbreviations>;

    /// Tab-separated corpus text, header line included
    async fn corpus(&self) -> ReferenceResult<String>;
}

/// Data files on disk
#[derive(Debug, Clone)]
pub struct FileSource {
    abbreviations: Option<PathBuf>,
    corpus: Option<PathBuf>,
}

impl FileSource {
    pub fn new(abbreviations: impl Into<PathBuf>, corpus: impl Into<PathBuf>) -> Self {
        Self {
            abbreviations: Some(abbreviations.into()),
            corpus: Some(corpus.into()),
        }
    }

    /// Paths from the `[references]` config section
    pub fn from_config(config: &crate::config::ReferencesConfig) -> Self {
        Self {
            abbreviations: config.abbreviations.clone(),
            corpus: config.corpus.clone(),
        }
    }

    async fn read(path: &Option<PathBuf>, what: &'static str) -> ReferenceResult<String> {
        let path = path.as_ref().ok_or(ReferenceError::NotConfigured(what))?;
        tokio::fs::read_to_string(path)
            .await
            .map_err(|source| ReferenceError::Read {
                path: path.clone(),
                source,
            })
    }
}

#[async_trait]
impl ReferenceSource for FileSource {
    async fn abbreviations(&self) -> ReferenceResult<Abbreviations> {
        let text = Self::read(&self.abbreviations, "abbreviation table").await?;
        Ok(serde_json::from_str(&text)?)
    }

    async fn corpus(&self) -> ReferenceResult<String> {
        Self::read(&self.corpus, "reference corpus").await
    }
}

/// In-memory data, for tests and embedded corpora
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    abbreviations: Abbreviations,
    corpus: String,
}

impl StaticSource {
    pub fn new(abbreviations: Abbreviations, corpus: impl Into<String>) -> Self {
        Self {
            abbreviations,
            corpus: corpus.into(),
        }
    }
}

#[async_trait]
impl ReferenceSource for StaticSource {
    async fn abbreviations(&self) -> ReferenceResult<Abbreviations> {
        Ok(self.abbreviations.clone())
    }

    async fn corpus(&self) -> ReferenceResult<String> {
        Ok(self.corpus.clone())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[tokio::test]
    async fn test_file_source() {
        let temp_dir = TempDir::new().unwrap();
        let abbrevs = temp_dir.path().join("abbrevs.json");
        let corpus = temp_dir.path().join("cross_references.txt");
        std::fs::write(&abbrevs, r#"{"Gen": 1, "Exod": 2}"#).unwrap();
        std::fs::write(&corpus, "From\tTo\tVotes\nGen.1.1\tExod.1.1\t3\n").unwrap();

        let source = FileSource::new(&abbrevs, &corpus);
        let map = source.abbreviations().await.unwrap();
        assert_eq!(map.get("Exod"), Some(&2));
        assert!(source.corpus().await.unwrap().contains("Gen.1.1"));
    }

    #[tokio::test]
    async fn test_file_source_errors() {
        let temp_dir = TempDir::new().unwrap();
        let bad = temp_dir.path().join("abbrevs.json");
        std::fs::write(&bad, "not json").unwrap();

        let source = FileSource::new(&bad, temp_dir.path().join("missing.txt"));
        assert!(matches!(
            source.abbreviations().await,
            Err(ReferenceError::Abbreviations(_))
        ));
        assert!(matches!(source.corpus().await, Err(ReferenceError::Read { .. })));

        let unconfigured = FileSource::from_config(&Default::default());
        assert!(matches!(
            unconfigured.corpus().await,
            Err(ReferenceError::NotConfigured(_))
        ));
    }
}
