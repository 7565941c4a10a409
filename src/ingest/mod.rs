pub mod classify;
pub mod merge;
pub mod normalize;
pub mod table;

use std::collections::HashSet;

use serde::Serialize;
use tracing::{debug, info};

use crate::error::SyncError;
use crate::models::NewObject;

pub use normalize::Normalizer;

/// How listings are laid out in the sheet
#[derive(Debug, Clone, Copy, PartialEq, Eq, clap::ValueEnum)]
pub enum Layout {
    /// One listing per row under a named header
    Flat,
    /// One broker per row, listings embedded as numbered column groups
    BrokerColumns,
    /// A broker's own tab with fixed column positions
    BrokerSheet,
}

/// A row that could not be imported
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct RowIssue {
    pub line: usize,
    pub message: String,
}

impl RowIssue {
    pub fn new(line: usize, message: impl Into<String>) -> Self {
        Self {
            line,
            message: message.into(),
        }
    }
}

/// Broker contact details read from a sheet, not yet matched to a stored broker
#[derive(Debug, Clone, Default, Serialize, PartialEq)]
pub struct BrokerDraft {
    pub name: String,
    pub company: String,
    pub phone: String,
    pub email: String,
    pub city: Option<String>,
}

impl BrokerDraft {
    /// Matching key against stored brokers: email when present, otherwise name.
    pub fn key(&self) -> String {
        if self.email.trim().is_empty() {
            self.name.trim().to_lowercase()
        } else {
            self.email.trim().to_lowercase()
        }
    }
}

/// Who an imported listing belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Owner {
    /// Known broker id (or none at all)
    Id(Option<i64>),
    /// Index into [`ImportBatch::brokers`]
    Draft(usize),
}

#[derive(Debug, Clone, PartialEq)]
pub struct ImportedObject {
    pub object: NewObject,
    pub owner: Owner,
}

/// Result of one ingestion pass, ready for a sink
#[derive(Debug, Clone, Default)]
pub struct ImportBatch {
    pub objects: Vec<ImportedObject>,
    pub brokers: Vec<BrokerDraft>,
    pub issues: Vec<RowIssue>,
    pub rows_read: usize,
    pub skipped: usize,
    pub duplicates: usize,
    /// Broker whose listings the batch replaces as a whole, set by
    /// broker tabs even when no row yields a listing
    pub owner: Option<i64>,
    seen: HashSet<(Owner, String, String)>,
}

impl ImportBatch {
    /// Adds a listing unless an equal one (same owner, title and address) is already in the batch.
    pub fn push(&mut self, object: NewObject, owner: Owner) -> bool {
        let (_, title, address) = object.dedupe_key();
        if !self.seen.insert((owner, title, address)) {
            debug!("Dropping duplicate listing '{}'", object.title);
            self.duplicates += 1;
            return false;
        }
        self.objects.push(ImportedObject { object, owner });
        true
    }

    pub fn add_broker(&mut self, broker: BrokerDraft) -> usize {
        let key = broker.key();
        if let Some(idx) = self.brokers.iter().position(|b| b.key() == key) {
            return idx;
        }
        self.brokers.push(broker);
        self.brokers.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.objects.is_empty() && self.brokers.is_empty() && self.owner.is_none()
    }
}

/// Parse sheet text in the given layout into a batch of listings.
pub fn ingest(text: &str, layout: Layout, normalizer: &Normalizer) -> Result<ImportBatch, SyncError> {
    let mut batch = ImportBatch::default();

    match layout {
        Layout::Flat => {
            let table = table::parse_table(text)?;
            batch.issues.extend(table.issues.iter().cloned());
            merge::flat(&table, normalizer, &mut batch);
        }
        Layout::BrokerColumns => {
            let table = table::parse_table(text)?;
            batch.issues.extend(table.issues.iter().cloned());
            merge::broker_columns(&table, normalizer, &mut batch);
        }
        Layout::BrokerSheet => {
            let records = table::parse_records(text)?;
            merge::broker_sheet(&records, normalizer, &mut batch);
        }
    }

    info!(
        "Read {} rows: {} listings, {} brokers, {} skipped, {} duplicates, {} issues",
        batch.rows_read,
        batch.objects.len(),
        batch.brokers.len(),
        batch.skipped,
        batch.duplicates,
        batch.issues.len()
    );
    Ok(batch)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flat_sheet_end_to_end() {
        let text = "Название,Тип,Город,Цена,Доходность\n\
                    Офис на Тверской,Офис,,\"25 000 000\",11\n\
                    ,,,,\n\
                    Квартира у парка,Квартира,Казань,9000000,8\n\
                    Офис на Тверской,Офис,,\"25 000 000\",11\n";
        let batch = ingest(text, Layout::Flat, &Normalizer::default()).unwrap();
        assert_eq!(batch.objects.len(), 2);
        assert_eq!(batch.duplicates, 1);
        assert_eq!(batch.objects[0].object.city, "Москва");
        assert_eq!(batch.objects[1].object.city, "Казань");
        assert_eq!(batch.objects[0].owner, Owner::Id(None));
    }

    #[test]
    fn same_title_for_different_owners_is_kept() {
        let mut batch = ImportBatch::default();
        let obj = NewObject {
            title: "Студия".into(),
            ..Default::default()
        };
        assert!(batch.push(obj.clone(), Owner::Draft(0)));
        assert!(batch.push(obj.clone(), Owner::Draft(1)));
        assert!(!batch.push(obj, Owner::Draft(0)));
        assert_eq!(batch.duplicates, 1);
    }

    #[test]
    fn broker_drafts_are_merged_by_key() {
        let mut batch = ImportBatch::default();
        let a = batch.add_broker(BrokerDraft {
            name: "Мария".into(),
            email: "Maria@Invest.ru".into(),
            ..Default::default()
        });
        let b = batch.add_broker(BrokerDraft {
            name: "Мария Волкова".into(),
            email: "maria@invest.ru ".into(),
            ..Default::default()
        });
        assert_eq!(a, b);
        assert_eq!(batch.brokers.len(), 1);
    }
}
