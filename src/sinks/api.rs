use anyhow::Result;
use async_trait::async_trait;
use tracing::{info, warn};

use crate::api::{ApiClient, NewNotification, NewUser, ObjectQuery, ObjectUpdate};
use crate::ingest::{BrokerDraft, ImportBatch, Owner};
use crate::models::{InvestmentObject, NewObject, Role};
use crate::sinks::store::new_object_message;
use crate::sinks::{Sink, SinkReport, WriteMode};

/// Pushes imported listings to the marketplace API
pub struct ApiSink {
    client: ApiClient,
}

impl ApiSink {
    pub fn new(client: ApiClient) -> Self {
        Self { client }
    }

    /// Broker accounts are users with the broker role, keyed by email.
    async fn resolve_broker(&self, draft: &BrokerDraft, report: &mut SinkReport) -> Option<i64> {
        let email = draft.email.trim();
        if email.is_empty() {
            warn!("Broker '{}' has no email, listings stay unassigned", draft.name);
            return None;
        }

        match self.client.get_user_by_email(email).await {
            Ok(Some(user)) => return Some(user.id),
            Ok(None) => {}
            Err(e) => {
                warn!("Failed to look up broker {}: {:#}", email, e);
                return None;
            }
        }

        let user = NewUser {
            email: email.to_string(),
            name: draft.name.clone(),
            role: Role::Broker,
        };
        match self.client.create_user(&user).await {
            Ok(id) => {
                info!("Registered broker '{}' as user #{}", draft.name, id);
                report.brokers_created += 1;
                Some(id)
            }
            Err(e) => {
                warn!("Failed to register broker {}: {:#}", email, e);
                None
            }
        }
    }

    async fn notify(&self, created: &[(i64, NewObject)]) -> usize {
        let users = match self.client.get_users().await {
            Ok(users) => users,
            Err(e) => {
                warn!("Could not load users for notifications: {:#}", e);
                return 0;
            }
        };

        let mut sent = 0;
        for (object_id, object) in created {
            let message = new_object_message(object);
            for user in users.iter().filter(|u| u.notify_new_objects) {
                let notification = NewNotification {
                    user_id: user.id,
                    kind: "new_object".into(),
                    title: "Новый объект".into(),
                    message: message.clone(),
                    object_id: Some(*object_id),
                };
                match self.client.create_notification(&notification).await {
                    Ok(_) => sent += 1,
                    Err(e) => warn!("Failed to notify user #{}: {:#}", user.id, e),
                }
            }
        }
        sent
    }
}

/// The objects endpoint returns at most this many rows.
const API_LIST_LIMIT: usize = 100;

fn find_existing(existing: &[InvestmentObject], object: &NewObject) -> Option<i64> {
    let key = object.dedupe_key();
    existing
        .iter()
        .find(|o| o.fields.dedupe_key() == key)
        .map(|o| o.id)
}

/// Pairs every listing, with its owner resolved, with the id of the stored
/// listing it updates. `None` means it is created.
fn plan_writes(
    batch: &ImportBatch,
    draft_ids: &[Option<i64>],
    existing: &[InvestmentObject],
) -> Vec<(NewObject, Option<i64>)> {
    batch
        .objects
        .iter()
        .map(|imported| {
            let mut object = imported.object.clone();
            object.broker_id = match imported.owner {
                Owner::Draft(idx) => draft_ids.get(idx).copied().flatten(),
                Owner::Id(id) => id,
            };
            let target = find_existing(existing, &object);
            (object, target)
        })
        .collect()
}

#[async_trait]
impl Sink for ApiSink {
    async fn write(&self, batch: &ImportBatch, mode: WriteMode, notify: bool) -> Result<SinkReport> {
        let mut report = SinkReport::default();

        if mode != WriteMode::Merge {
            warn!(
                "The API cannot delete listings; {:?} mode updates matching listings and adds the rest",
                mode
            );
        }

        let mut draft_ids = Vec::with_capacity(batch.brokers.len());
        for draft in &batch.brokers {
            draft_ids.push(self.resolve_broker(draft, &mut report).await);
        }

        let existing: Vec<InvestmentObject> = self
            .client
            .get_objects(&ObjectQuery::default())
            .await?
            .into_iter()
            .map(|o| o.into_object())
            .collect();
        if existing.len() >= API_LIST_LIMIT {
            warn!(
                "The API returned {} listings, its list limit; older listings cannot be matched and will be added again",
                existing.len()
            );
        }

        let mut created = Vec::new();
        for (object, target) in plan_writes(batch, &draft_ids, &existing) {
            if let Some(id) = target {
                match self.client.update_object(id, &ObjectUpdate::from_object(&object)).await {
                    Ok(_) => {
                        report.updated += 1;
                        report.updated_ids.push(id);
                    }
                    Err(e) => {
                        warn!("Failed to update listing #{} '{}': {:#}", id, object.title, e);
                        report.failed += 1;
                    }
                }
                continue;
            }

            match self.client.create_object(&object).await {
                Ok(saved) => {
                    report.inserted += 1;
                    report.inserted_ids.push(saved.id);
                    created.push((saved.id, object));
                }
                Err(e) => {
                    warn!("Failed to create listing '{}': {:#}", object.title, e);
                    report.failed += 1;
                }
            }
        }

        if notify && !created.is_empty() {
            report.notified = self.notify(&created).await;
        }

        info!(
            "🌐 Sent {} new and {} updated listings to {} ({} failed)",
            report.inserted,
            report.updated,
            self.client.base_url(),
            report.failed
        );
        Ok(report)
    }

    fn sink_name(&self) -> &'static str {
        "marketplace API"
    }
}
