use reqwest::Url;
use serde::{Deserialize, Serialize};

const SHEETS_BASE: &str = "https://docs.google.com/spreadsheets/d";

/// Where a Google Sheet lives
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub enum SheetRef {
    /// Sheet published to the web (`File → Publish to web`), addressed by its key
    Published { key: String },
    /// One tab of a shared workbook, exported through the visualization endpoint
    Named { sheet_id: String, sheet_name: String },
    /// Any URL that already returns CSV
    Url(String),
}

impl SheetRef {
    pub fn csv_url(&self) -> String {
        match self {
            Self::Published { key } => format!("{SHEETS_BASE}/e/{key}/pub?output=csv"),
            Self::Named {
                sheet_id,
                sheet_name,
            } => {
                let base = format!("{SHEETS_BASE}/{sheet_id}/gviz/tq");
                match Url::parse_with_params(&base, &[("tqx", "out:csv"), ("sheet", sheet_name.as_str())]) {
                    Ok(url) => url.to_string(),
                    Err(_) => format!("{base}?tqx=out:csv&sheet={sheet_name}"),
                }
            }
            Self::Url(url) => url.clone(),
        }
    }
}
