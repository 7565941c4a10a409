use std::env;
use std::path::PathBuf;

use tracing::{debug, warn};

use crate::error::SyncError;

pub const DEFAULT_API_URL: &str = "https://functions.poehali.dev/fc00dc4e-18bf-4893-bb9d-331e8abda973";
pub const DEFAULT_CITY: &str = "Москва";
pub const DEFAULT_IMAGE: &str =
    "https://images.unsplash.com/photo-1560448204-e02f11c3d0e2?w=800&h=600&fit=crop";

#[derive(Debug, Clone)]
pub struct Settings {
    pub api_url: String,
    pub store_path: PathBuf,
    /// Workbook holding one tab per broker
    pub sheet_id: Option<String>,
    /// Key of the published-to-web catalogue sheet
    pub published_key: Option<String>,
    pub default_city: String,
    pub default_image: String,
    pub default_broker_id: Option<i64>,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            store_path: PathBuf::from("investment-store.json"),
            sheet_id: None,
            published_key: None,
            default_city: DEFAULT_CITY.to_string(),
            default_image: DEFAULT_IMAGE.to_string(),
            default_broker_id: None,
        }
    }
}

impl Settings {
    /// Loads `.env` if present, then reads `ESTATE_*` variables.
    pub fn load() -> Result<Self, SyncError> {
        dotenvy::dotenv().ok();
        Self::from_lookup(|key| env::var(key).ok())
    }

    pub fn from_lookup<F>(lookup: F) -> Result<Self, SyncError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| {
            let value = lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());
            if value.is_none() {
                debug!("{key} not set, using default");
            }
            value
        };

        let defaults = Self::default();

        let default_broker_id = match var("ESTATE_DEFAULT_BROKER_ID") {
            Some(raw) => Some(raw.parse::<i64>().map_err(|e| {
                warn!("Invalid ESTATE_DEFAULT_BROKER_ID value: {e}");
                SyncError::Config(format!("ESTATE_DEFAULT_BROKER_ID must be an integer, got '{raw}'"))
            })?),
            None => None,
        };

        Ok(Self {
            api_url: var("ESTATE_API_URL").unwrap_or(defaults.api_url),
            store_path: var("ESTATE_STORE_PATH")
                .map(PathBuf::from)
                .unwrap_or(defaults.store_path),
            sheet_id: var("ESTATE_SHEET_ID"),
            published_key: var("ESTATE_PUBLISHED_KEY"),
            default_city: var("ESTATE_DEFAULT_CITY").unwrap_or(defaults.default_city),
            default_image: var("ESTATE_DEFAULT_IMAGE").unwrap_or(defaults.default_image),
            default_broker_id,
        })
    }
}
