use crate::error::SyncError;
use crate::sources::traits::SheetSource;
use crate::sources::types::SheetRef;
use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use std::time::Duration;
use tracing::{debug, info, warn};

/// Fetches a Google Sheet (or any CSV URL) over HTTP
pub struct GoogleSheetSource {
    client: Client,
    sheet: SheetRef,
}

impl GoogleSheetSource {
    pub fn new(sheet: SheetRef) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("estate-sync/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self::with_client(client, sheet))
    }

    pub fn with_client(client: Client, sheet: SheetRef) -> Self {
        Self { client, sheet }
    }

    pub fn sheet(&self) -> &SheetRef {
        &self.sheet
    }
}

#[async_trait]
impl SheetSource for GoogleSheetSource {
    async fn fetch(&self) -> Result<String> {
        let url = self.sheet.csv_url();
        info!("Syncing with Google Sheet...");
        debug!("Fetching URL: {}", url);

        let response = self
            .client
            .get(&url)
            .send()
            .await
            .with_context(|| format!("Failed to fetch sheet {url}"))?;

        let status = response.status();
        if !status.is_success() {
            warn!("Sheet returned status: {}", status);
            return Err(SyncError::SheetStatus {
                status: status.as_u16(),
                url,
            }
            .into());
        }

        let text = response.text().await.context("Failed to read response body")?;
        debug!("Downloaded {} bytes of CSV", text.len());

        Ok(text)
    }

    fn source_name(&self) -> String {
        match &self.sheet {
            SheetRef::Published { .. } => "published Google Sheet".to_string(),
            SheetRef::Named { sheet_name, .. } => format!("Google Sheet tab '{sheet_name}'"),
            SheetRef::Url(url) => url.clone(),
        }
    }
}
