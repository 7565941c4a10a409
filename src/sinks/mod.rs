pub mod api;
pub mod store;

use anyhow::Result;
use async_trait::async_trait;
use serde::Serialize;

use crate::ingest::ImportBatch;

pub use api::ApiSink;
pub use store::JsonStore;

/// What happens to listings already in the target
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum WriteMode {
    /// Drop every stored listing, then insert the batch
    Replace,
    /// Drop only the listings of brokers present in the batch
    ReplaceBroker,
    /// Update listings with the same broker, title and address; insert the rest
    Merge,
}

/// Outcome of writing one batch
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct SinkReport {
    pub inserted: usize,
    pub updated: usize,
    pub deleted: usize,
    pub failed: usize,
    pub brokers_created: usize,
    pub notified: usize,
    pub inserted_ids: Vec<i64>,
    pub updated_ids: Vec<i64>,
}

/// Common trait for everywhere an import can be persisted
#[async_trait]
pub trait Sink: Send + Sync {
    /// Persist the batch; `notify` sends new-listing notifications to subscribed users
    async fn write(&self, batch: &ImportBatch, mode: WriteMode, notify: bool) -> Result<SinkReport>;

    fn sink_name(&self) -> &'static str;
}
