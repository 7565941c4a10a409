use thiserror::Error;

use crate::models::ObjectStatus;

#[derive(Debug, Error)]
pub enum SyncError {
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("Sheet returned {status}: {url}")]
    SheetStatus { status: u16, url: String },

    #[error("API error ({status}): {message}")]
    Api { status: u16, message: String },

    #[error("Sheet has no header row")]
    EmptySheet,

    #[error("Object not found: {0}")]
    ObjectNotFound(i64),

    #[error("User not found: {0}")]
    UserNotFound(i64),

    #[error("Favorite not found: user {user_id}, object {object_id}")]
    FavoriteNotFound { user_id: i64, object_id: i64 },

    #[error("Notification not found: {0}")]
    NotificationNotFound(i64),

    #[error("Cannot move listing from {from} to {to}")]
    InvalidTransition { from: ObjectStatus, to: ObjectStatus },

    #[error("Access denied: only the owning broker or an admin can modify object {0}")]
    AccessDenied(i64),

    #[error("Configuration error: {0}")]
    Config(String),
}
