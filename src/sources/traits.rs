use anyhow::Result;
use async_trait::async_trait;

/// Common trait for everything that yields raw sheet text
/// (published Google Sheets, named broker tabs, uploaded CSV files)
#[async_trait]
pub trait SheetSource: Send + Sync {
    /// Fetch the raw CSV text
    async fn fetch(&self) -> Result<String>;

    /// Human readable description of the source, used in logs and reports
    fn source_name(&self) -> String;
}
