use std::collections::HashSet;
use std::path::PathBuf;

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::SyncError;
use crate::ingest::{BrokerDraft, ImportBatch, Owner};
use crate::models::{
    Broker, Favorite, InvestmentObject, NewObject, Notification, ObjectStatus, Role, User,
};
use crate::sinks::{Sink, SinkReport, WriteMode};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
struct Counters {
    object: i64,
    broker: i64,
    user: i64,
    notification: i64,
}

fn next_id(counter: &mut i64, existing: impl Iterator<Item = i64>) -> i64 {
    let max = existing.max().unwrap_or(0);
    *counter = (*counter).max(max) + 1;
    *counter
}

/// Client-side copy of the marketplace data
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Store {
    #[serde(default)]
    pub objects: Vec<InvestmentObject>,
    #[serde(default)]
    pub brokers: Vec<Broker>,
    #[serde(default)]
    pub users: Vec<User>,
    #[serde(default)]
    pub favorites: Vec<Favorite>,
    #[serde(default)]
    pub notifications: Vec<Notification>,
    #[serde(default)]
    counters: Counters,
}

impl Store {
    pub fn object(&self, id: i64) -> Option<&InvestmentObject> {
        self.objects.iter().find(|o| o.id == id)
    }

    pub fn broker(&self, id: i64) -> Option<&Broker> {
        self.brokers.iter().find(|b| b.id == id)
    }

    pub fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn user_by_email(&self, email: &str) -> Option<&User> {
        let email = email.trim();
        if email.is_empty() {
            return None;
        }
        self.users
            .iter()
            .find(|u| u.email.eq_ignore_ascii_case(email))
    }

    /// Find the broker a sheet refers to, creating it if unknown. A draft
    /// with an email matches on email only; names are used when it has none.
    pub fn resolve_broker(&mut self, draft: &BrokerDraft, report: &mut SinkReport) -> i64 {
        let email = draft.email.trim().to_lowercase();
        let name = draft.name.trim().to_lowercase();
        let found = if email.is_empty() {
            self.brokers
                .iter_mut()
                .find(|b| !name.is_empty() && b.name.trim().to_lowercase() == name)
        } else {
            self.brokers
                .iter_mut()
                .find(|b| b.email.trim().to_lowercase() == email)
        };

        if let Some(broker) = found {
            let fill = |slot: &mut String, value: &str| {
                if slot.is_empty() && !value.is_empty() {
                    *slot = value.to_string();
                }
            };
            fill(&mut broker.company, &draft.company);
            fill(&mut broker.phone, &draft.phone);
            fill(&mut broker.email, &draft.email);
            if broker.city.is_none() {
                broker.city = draft.city.clone();
            }
            return broker.id;
        }

        let id = next_id(&mut self.counters.broker, self.brokers.iter().map(|b| b.id));
        info!("Adding broker '{}' as #{}", draft.name, id);
        self.brokers.push(Broker {
            id,
            name: draft.name.clone(),
            company: draft.company.clone(),
            phone: draft.phone.clone(),
            email: draft.email.clone(),
            city: draft.city.clone(),
            ..Default::default()
        });
        report.brokers_created += 1;
        id
    }

    pub fn insert_object(&mut self, fields: NewObject, now: DateTime<Utc>) -> i64 {
        let id = next_id(&mut self.counters.object, self.objects.iter().map(|o| o.id));
        self.objects.push(InvestmentObject {
            id,
            fields,
            created_at: now,
        });
        id
    }

    fn remove_objects_where(&mut self, pred: impl Fn(&InvestmentObject) -> bool) -> usize {
        let before = self.objects.len();
        self.objects.retain(|o| !pred(o));
        let kept: HashSet<i64> = self.objects.iter().map(|o| o.id).collect();
        self.favorites.retain(|f| kept.contains(&f.object_id));
        before - self.objects.len()
    }

    /// Resolve owners, apply the write mode and store every listing in the batch.
    pub fn apply(&mut self, batch: &ImportBatch, mode: WriteMode, now: DateTime<Utc>) -> SinkReport {
        let mut report = SinkReport::default();

        let draft_ids: Vec<i64> = batch
            .brokers
            .iter()
            .map(|draft| self.resolve_broker(draft, &mut report))
            .collect();

        let resolved: Vec<NewObject> = batch
            .objects
            .iter()
            .map(|imported| {
                let mut object = imported.object.clone();
                object.broker_id = match imported.owner {
                    Owner::Draft(idx) => draft_ids.get(idx).copied(),
                    Owner::Id(id) => id,
                };
                object
            })
            .collect();

        for broker_id in resolved.iter().filter_map(|o| o.broker_id).collect::<HashSet<_>>() {
            if self.broker(broker_id).is_none() {
                warn!("Listings reference unknown broker #{}", broker_id);
            }
        }

        report.deleted = match mode {
            WriteMode::Replace => self.remove_objects_where(|_| true),
            WriteMode::ReplaceBroker => {
                let mut owners: HashSet<Option<i64>> = resolved.iter().map(|o| o.broker_id).collect();
                if let Some(owner) = batch.owner {
                    owners.insert(Some(owner));
                }
                self.remove_objects_where(|o| owners.contains(&o.fields.broker_id))
            }
            WriteMode::Merge => 0,
        };

        for object in resolved {
            if mode == WriteMode::Merge {
                let key = object.dedupe_key();
                if let Some(existing) = self
                    .objects
                    .iter_mut()
                    .find(|o| o.fields.dedupe_key() == key)
                {
                    debug!("Updating listing #{} '{}'", existing.id, object.title);
                    existing.fields = object;
                    report.updated += 1;
                    report.updated_ids.push(existing.id);
                    continue;
                }
            }
            let id = self.insert_object(object, now);
            report.inserted += 1;
            report.inserted_ids.push(id);
        }

        report
    }

    fn push_notification(
        &mut self,
        user_id: i64,
        kind: &str,
        title: &str,
        message: String,
        object_id: Option<i64>,
        now: DateTime<Utc>,
    ) -> i64 {
        let id = next_id(
            &mut self.counters.notification,
            self.notifications.iter().map(|n| n.id),
        );
        self.notifications.push(Notification {
            id,
            user_id,
            kind: kind.to_string(),
            title: title.to_string(),
            message,
            object_id,
            is_read: false,
            created_at: Some(now),
        });
        id
    }

    /// Tell every subscribed user about each new listing. Returns notifications created.
    pub fn notify_new_objects(&mut self, object_ids: &[i64], now: DateTime<Utc>) -> usize {
        let subscribers: Vec<i64> = self
            .users
            .iter()
            .filter(|u| u.notify_new_objects)
            .map(|u| u.id)
            .collect();

        let mut sent = 0;
        for &object_id in object_ids {
            let Some(object) = self.object(object_id) else {
                continue;
            };
            let message = new_object_message(&object.fields);
            for &user_id in &subscribers {
                self.push_notification(user_id, "new_object", "Новый объект", message.clone(), Some(object_id), now);
                sent += 1;
            }
        }
        sent
    }

    /// Add a user; an existing email keeps its record and id.
    pub fn add_user(&mut self, email: &str, name: &str, role: Role, notify: bool, now: DateTime<Utc>) -> i64 {
        if let Some(existing) = self.user_by_email(email) {
            info!("User {} already exists as #{}", email, existing.id);
            return existing.id;
        }
        let id = next_id(&mut self.counters.user, self.users.iter().map(|u| u.id));
        self.users.push(User {
            id,
            email: email.trim().to_string(),
            name: name.trim().to_string(),
            role,
            is_admin: role == Role::Admin,
            notify_new_objects: notify,
            created_at: Some(now),
        });
        id
    }

    pub fn set_notify(&mut self, user_id: i64, notify: bool) -> Result<(), SyncError> {
        let user = self
            .users
            .iter_mut()
            .find(|u| u.id == user_id)
            .ok_or(SyncError::UserNotFound(user_id))?;
        user.notify_new_objects = notify;
        Ok(())
    }

    /// Returns `false` when the listing was already a favorite. The owning
    /// broker, if they have a user account, is notified of new favorites.
    pub fn add_favorite(&mut self, user_id: i64, object_id: i64, now: DateTime<Utc>) -> Result<bool, SyncError> {
        let investor = self.user(user_id).ok_or(SyncError::UserNotFound(user_id))?.name.clone();
        let object = self.object(object_id).ok_or(SyncError::ObjectNotFound(object_id))?;
        let title = object.fields.title.clone();
        let broker_id = object.fields.broker_id;

        if self
            .favorites
            .iter()
            .any(|f| f.user_id == user_id && f.object_id == object_id)
        {
            return Ok(false);
        }
        self.favorites.push(Favorite {
            user_id,
            object_id,
            created_at: Some(now),
        });

        let broker_user = broker_id
            .and_then(|id| self.broker(id))
            .and_then(|b| self.user_by_email(&b.email))
            .map(|u| u.id);
        if let Some(broker_user) = broker_user {
            let message = format!("{investor} добавил объект \"{title}\" в избранное");
            self.push_notification(broker_user, "favorite_added", "Новое избранное", message, Some(object_id), now);
        }
        Ok(true)
    }

    pub fn remove_favorite(&mut self, user_id: i64, object_id: i64) -> Result<(), SyncError> {
        let idx = self
            .favorites
            .iter()
            .position(|f| f.user_id == user_id && f.object_id == object_id)
            .ok_or(SyncError::FavoriteNotFound { user_id, object_id })?;
        self.favorites.remove(idx);
        Ok(())
    }

    pub fn favorites_of(&self, user_id: i64) -> Vec<&InvestmentObject> {
        self.favorites
            .iter()
            .filter(|f| f.user_id == user_id)
            .filter_map(|f| self.object(f.object_id))
            .collect()
    }

    /// Newest first.
    pub fn notifications_for(&self, user_id: i64) -> Vec<&Notification> {
        let mut list: Vec<&Notification> = self
            .notifications
            .iter()
            .filter(|n| n.user_id == user_id)
            .collect();
        list.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        list
    }

    pub fn mark_read(&mut self, notification_id: i64) -> Result<(), SyncError> {
        let notification = self
            .notifications
            .iter_mut()
            .find(|n| n.id == notification_id)
            .ok_or(SyncError::NotificationNotFound(notification_id))?;
        notification.is_read = true;
        Ok(())
    }

    /// Returns the previous status.
    pub fn set_status(&mut self, object_id: i64, to: ObjectStatus) -> Result<ObjectStatus, SyncError> {
        let object = self
            .objects
            .iter_mut()
            .find(|o| o.id == object_id)
            .ok_or(SyncError::ObjectNotFound(object_id))?;
        let from = object.fields.status;
        object.fields.status = from.transition(to)?;
        Ok(from)
    }

    fn may_modify(&self, actor: &User, object: &InvestmentObject) -> bool {
        if actor.is_admin() {
            return true;
        }
        object
            .fields
            .broker_id
            .and_then(|id| self.broker(id))
            .map_or(false, |b| {
                !b.email.trim().is_empty() && b.email.trim().eq_ignore_ascii_case(actor.email.trim())
            })
    }

    /// Only the owning broker or an admin may delete a listing.
    pub fn delete_object(&mut self, object_id: i64, actor_id: i64) -> Result<InvestmentObject, SyncError> {
        let actor = self.user(actor_id).ok_or(SyncError::UserNotFound(actor_id))?;
        let object = self.object(object_id).ok_or(SyncError::ObjectNotFound(object_id))?;
        if !self.may_modify(actor, object) {
            return Err(SyncError::AccessDenied(object_id));
        }

        let idx = self
            .objects
            .iter()
            .position(|o| o.id == object_id)
            .ok_or(SyncError::ObjectNotFound(object_id))?;
        let removed = self.objects.remove(idx);
        self.favorites.retain(|f| f.object_id != object_id);
        Ok(removed)
    }
}

pub fn new_object_message(object: &NewObject) -> String {
    format!(
        "\"{}\", {}: {:.0} ₽, доходность {}%",
        object.title, object.city, object.price, object.yield_percent
    )
}

/// [`Store`] persisted as one pretty-printed JSON file
pub struct JsonStore {
    path: PathBuf,
}

impl JsonStore {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// A missing file is an empty store.
    pub async fn load(&self) -> Result<Store> {
        if !tokio::fs::try_exists(&self.path).await.unwrap_or(false) {
            debug!("No store at {}, starting empty", self.path.display());
            return Ok(Store::default());
        }
        let text = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("Failed to read store {}", self.path.display()))?;
        serde_json::from_str(&text)
            .with_context(|| format!("Store {} is not valid JSON", self.path.display()))
    }

    pub async fn save(&self, store: &Store) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent).await?;
        }
        let json = serde_json::to_string_pretty(store)?;
        tokio::fs::write(&self.path, json)
            .await
            .with_context(|| format!("Failed to write store {}", self.path.display()))?;
        debug!("Saved store to {}", self.path.display());
        Ok(())
    }
}

#[async_trait]
impl Sink for JsonStore {
    async fn write(&self, batch: &ImportBatch, mode: WriteMode, notify: bool) -> Result<SinkReport> {
        let mut store = self.load().await?;
        let now = Utc::now();
        let mut report = store.apply(batch, mode, now);
        if notify {
            report.notified = store.notify_new_objects(&report.inserted_ids, now);
        }
        self.save(&store).await?;
        info!(
            "💾 Saved {} new and {} updated listings to {}",
            report.inserted,
            report.updated,
            self.path.display()
        );
        Ok(report)
    }

    fn sink_name(&self) -> &'static str {
        "local store"
    }
}
