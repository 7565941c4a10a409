use crate::sources::traits::SheetSource;
use anyhow::{Context, Result};
use async_trait::async_trait;
use std::path::PathBuf;
use tracing::debug;

/// Reads an uploaded CSV export from disk
pub struct CsvFileSource {
    path: PathBuf,
}

impl CsvFileSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl SheetSource for CsvFileSource {
    async fn fetch(&self) -> Result<String> {
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read {}", self.path.display()))?;
        debug!("Read {} bytes from {}", text.len(), self.path.display());
        Ok(text)
    }

    fn source_name(&self) -> String {
        self.path.display().to_string()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn reads_file_contents() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("objects.csv");
        std::fs::write(&path, "Название,Цена\nОфис,100\n").unwrap();

        let source = CsvFileSource::new(&path);
        let text = source.fetch().await.unwrap();
        assert!(text.starts_with("Название"));
        assert!(source.source_name().ends_with("objects.csv"));
    }

    #[tokio::test]
    async fn missing_file_is_an_error() {
        let source = CsvFileSource::new("/definitely/not/here.csv");
        assert!(source.fetch().await.is_err());
    }
}
