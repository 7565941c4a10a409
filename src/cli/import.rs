use anyhow::{bail, Context, Result};
use tracing::{info, warn};

use crate::cli::{App, Target};
use crate::error::SyncError;
use crate::ingest::{self, ImportBatch, Layout, Normalizer};
use crate::models::{Role, User};
use crate::sinks::{Sink, SinkReport, WriteMode};
use crate::sources::{source_from_arg, GoogleSheetSource, SheetRef, SheetSource};

fn normalizer(app: &App, broker_id: Option<i64>) -> Normalizer {
    Normalizer {
        default_city: app.settings.default_city.clone(),
        default_image: app.settings.default_image.clone(),
        broker_id: broker_id.or(app.settings.default_broker_id),
    }
}

fn print_batch(batch: &ImportBatch) {
    println!(
        "Read {} rows: {} listings, {} brokers, {} skipped, {} duplicates",
        batch.rows_read,
        batch.objects.len(),
        batch.brokers.len(),
        batch.skipped,
        batch.duplicates
    );
    for issue in &batch.issues {
        println!("   line {}: {}", issue.line, issue.message);
    }
}

fn print_report(report: &SinkReport) {
    println!(
        "✅ {} inserted, {} updated, {} deleted, {} failed",
        report.inserted, report.updated, report.deleted, report.failed
    );
    if report.brokers_created > 0 {
        println!("   {} new brokers", report.brokers_created);
    }
    if report.notified > 0 {
        println!("   {} notifications sent", report.notified);
    }
}

pub struct ImportArgs {
    pub source: Option<String>,
    pub layout: Layout,
    pub broker_id: Option<i64>,
    pub target: Target,
    pub mode: WriteMode,
    pub notify: bool,
    pub dry_run: bool,
}

pub async fn import(app: &App, args: ImportArgs) -> Result<()> {
    let source: Box<dyn SheetSource> = match args.source.as_deref() {
        Some(arg) => source_from_arg(arg)?,
        None => {
            let key = app.settings.published_key.clone().ok_or_else(|| {
                SyncError::Config("no source given and ESTATE_PUBLISHED_KEY is not set".into())
            })?;
            Box::new(GoogleSheetSource::new(SheetRef::Published { key })?)
        }
    };

    info!("📥 Importing from {}", source.source_name());
    let text = source.fetch().await?;
    let batch = ingest::ingest(&text, args.layout, &normalizer(app, args.broker_id))
        .with_context(|| format!("Failed to parse {}", source.source_name()))?;
    print_batch(&batch);

    if args.dry_run {
        info!("Dry run, nothing written");
        return Ok(());
    }
    if batch.is_empty() {
        warn!("Nothing to import");
        return Ok(());
    }

    let sink = app.sink(args.target)?;
    info!("Writing {} listings to {}", batch.objects.len(), sink.sink_name());
    let report = sink.write(&batch, args.mode, args.notify).await?;
    print_report(&report);
    Ok(())
}

fn require_admin(user: &User) -> Result<()> {
    if !user.is_admin() {
        bail!("User #{} is not an admin", user.id);
    }
    Ok(())
}

/// Brokers whose tabs should be synced, as (id, tab name) pairs.
async fn broker_tabs(app: &App, target: Target, actor: i64) -> Result<Vec<(i64, String)>> {
    match target {
        Target::Store => {
            let store = app.store.load().await?;
            let user = store.user(actor).ok_or(SyncError::UserNotFound(actor))?;
            require_admin(user)?;
            Ok(store
                .brokers
                .iter()
                .map(|b| (b.id, b.name.clone()))
                .collect())
        }
        Target::Api => {
            let api = app.api()?;
            require_admin(&api.get_user(actor).await?)?;
            Ok(api
                .get_users()
                .await?
                .into_iter()
                .filter(|u| u.role == Role::Broker)
                .map(|u| (u.id, u.name))
                .collect())
        }
    }
}

/// The API cannot delete listings, so its tabs are merged into what is there.
fn sync_mode(target: Target) -> WriteMode {
    match target {
        Target::Store => WriteMode::ReplaceBroker,
        Target::Api => WriteMode::Merge,
    }
}

#[derive(Debug)]
enum TabOutcome {
    Synced(SinkReport),
    Skipped(String),
    Failed(String),
}

/// Ingests one fetched broker tab and writes it. Errors end up in the
/// outcome so one broken tab does not stop the others.
async fn sync_tab(
    sink: &dyn Sink,
    mode: WriteMode,
    normalizer: &Normalizer,
    fetched: Result<String>,
    notify: bool,
) -> TabOutcome {
    let text = match fetched {
        Ok(text) => text,
        Err(e) => return TabOutcome::Failed(format!("{e:#}")),
    };

    let batch = match ingest::ingest(&text, Layout::BrokerSheet, normalizer) {
        Ok(batch) => batch,
        Err(e) => return TabOutcome::Failed(e.to_string()),
    };

    if batch.is_empty() {
        let reason = batch
            .issues
            .first()
            .map(|i| i.message.clone())
            .unwrap_or_else(|| "no listings".into());
        return TabOutcome::Skipped(reason);
    }

    match sink.write(&batch, mode, notify).await {
        Ok(report) => TabOutcome::Synced(report),
        Err(e) => TabOutcome::Failed(format!("{e:#}")),
    }
}

pub async fn sync_brokers(
    app: &App,
    sheet_id: Option<String>,
    actor: i64,
    target: Target,
    notify: bool,
) -> Result<()> {
    let sheet_id = sheet_id
        .or_else(|| app.settings.sheet_id.clone())
        .ok_or_else(|| SyncError::Config("no workbook id given and ESTATE_SHEET_ID is not set".into()))?;

    let brokers = broker_tabs(app, target, actor).await?;
    if brokers.is_empty() {
        bail!("No brokers found");
    }

    let sink = app.sink(target)?;
    let mode = sync_mode(target);
    let mut total = SinkReport::default();

    for (broker_id, name) in brokers {
        let source = GoogleSheetSource::new(SheetRef::Named {
            sheet_id: sheet_id.clone(),
            sheet_name: name.clone(),
        })?;
        info!("🔄 Syncing {} ({})", name, source.sheet().csv_url());

        let fetched = source.fetch().await;
        let normalizer = normalizer(app, Some(broker_id));
        match sync_tab(sink.as_ref(), mode, &normalizer, fetched, notify).await {
            TabOutcome::Synced(report) => {
                println!(
                    "{name}: {} imported, {} updated, {} removed",
                    report.inserted, report.updated, report.deleted
                );
                total.inserted += report.inserted;
                total.updated += report.updated;
                total.deleted += report.deleted;
                total.failed += report.failed;
                total.brokers_created += report.brokers_created;
                total.notified += report.notified;
            }
            TabOutcome::Skipped(reason) => println!("{name}: skipped, {reason}"),
            TabOutcome::Failed(error) => {
                warn!("Skipping {}: {}", name, error);
                println!("{name}: error, {error}");
            }
        }
    }

    print_report(&total);
    Ok(())
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex;

    use anyhow::anyhow;
    use async_trait::async_trait;
    use chrono::Utc;

    use super::*;
    use crate::models::{NewObject, Role};
    use crate::sinks::store::Store;
    use crate::sinks::JsonStore;

    const EMPTIED_TAB: &str = "Брокер: Юрий,,,\n\
                               Объект / фокус внимания,,,Вход\n\
                               ,,,\n\
                               Объект / фокус внимания,,,\n";

    const ONE_LISTING_TAB: &str = "Брокер: Юрий,,,,\n\
                                   Объект / фокус внимания,,,Вход,Цена\n\
                                   ,,,,\n\
                                   Объект / фокус внимания,,,,\n\
                                   Новый склад,,,,\"5 000 000\"\n";

    /// Records what each write was asked to do.
    #[derive(Default)]
    struct RecordingSink {
        writes: Mutex<Vec<(WriteMode, Option<i64>, usize)>>,
    }

    #[async_trait]
    impl Sink for RecordingSink {
        async fn write(&self, batch: &ImportBatch, mode: WriteMode, _notify: bool) -> Result<SinkReport> {
            let mut writes = self.writes.lock().unwrap();
            writes.push((mode, batch.owner, batch.objects.len()));
            Ok(SinkReport {
                inserted: batch.objects.len(),
                ..Default::default()
            })
        }

        fn sink_name(&self) -> &'static str {
            "recording"
        }
    }

    fn listing(title: &str, broker_id: i64) -> NewObject {
        NewObject {
            title: title.into(),
            broker_id: Some(broker_id),
            ..Default::default()
        }
    }

    #[test]
    fn api_tabs_are_merged() {
        assert_eq!(sync_mode(Target::Store), WriteMode::ReplaceBroker);
        assert_eq!(sync_mode(Target::Api), WriteMode::Merge);
    }

    #[test]
    fn only_admins_sync() {
        let mut store = Store::default();
        let now = Utc::now();
        let admin = store.add_user("admin@x.ru", "Админ", Role::Admin, false, now);
        let broker = store.add_user("broker@x.ru", "Юрий", Role::Broker, false, now);

        assert!(require_admin(store.user(admin).unwrap()).is_ok());
        let err = require_admin(store.user(broker).unwrap()).unwrap_err();
        assert!(err.to_string().contains("not an admin"));
    }

    #[tokio::test]
    async fn emptied_tab_clears_the_brokers_listings() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonStore::new(dir.path().join("store.json"));
        let mut store = Store::default();
        let now = Utc::now();
        store.insert_object(listing("Старый", 7), now);
        store.insert_object(listing("Чужой", 8), now);
        sink.save(&store).await.unwrap();

        let normalizer = Normalizer::default().for_broker(Some(7));
        let outcome = sync_tab(&sink, WriteMode::ReplaceBroker, &normalizer, Ok(EMPTIED_TAB.into()), false).await;

        match outcome {
            TabOutcome::Synced(report) => {
                assert_eq!(report.deleted, 1);
                assert_eq!(report.inserted, 0);
            }
            other => panic!("unexpected outcome {other:?}"),
        }
        let titles: Vec<_> = sink
            .load()
            .await
            .unwrap()
            .objects
            .into_iter()
            .map(|o| o.fields.title)
            .collect();
        assert_eq!(titles, vec!["Чужой"]);
    }

    #[tokio::test]
    async fn tab_replaces_only_its_own_broker() {
        let dir = tempfile::tempdir().unwrap();
        let sink = JsonStore::new(dir.path().join("store.json"));
        let mut store = Store::default();
        let now = Utc::now();
        store.insert_object(listing("Старый", 7), now);
        store.insert_object(listing("Чужой", 8), now);
        sink.save(&store).await.unwrap();

        let normalizer = Normalizer::default().for_broker(Some(7));
        let outcome = sync_tab(&sink, WriteMode::ReplaceBroker, &normalizer, Ok(ONE_LISTING_TAB.into()), false).await;
        assert!(matches!(outcome, TabOutcome::Synced(ref r) if r.inserted == 1 && r.deleted == 1));

        let stored = sink.load().await.unwrap().objects;
        let titles: Vec<_> = stored.iter().map(|o| o.fields.title.as_str()).collect();
        assert_eq!(titles, vec!["Чужой", "Новый склад"]);
        assert_eq!(stored[1].fields.broker_id, Some(7));
    }

    #[tokio::test]
    async fn short_tab_is_skipped_without_writing() {
        let sink = RecordingSink::default();
        let normalizer = Normalizer::default().for_broker(Some(7));
        let outcome = sync_tab(&sink, WriteMode::ReplaceBroker, &normalizer, Ok("Брокер: Юрий\n".into()), false).await;

        assert!(matches!(outcome, TabOutcome::Skipped(_)));
        assert!(sink.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn fetch_errors_fail_the_tab_only() {
        let sink = RecordingSink::default();
        let normalizer = Normalizer::default().for_broker(Some(7));
        let outcome = sync_tab(&sink, WriteMode::Merge, &normalizer, Err(anyhow!("HTTP 404")), false).await;

        match outcome {
            TabOutcome::Failed(message) => assert!(message.contains("404")),
            other => panic!("unexpected outcome {other:?}"),
        }
        assert!(sink.writes.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn tab_is_written_with_the_given_mode() {
        let sink = RecordingSink::default();
        let normalizer = Normalizer::default().for_broker(Some(7));
        let outcome = sync_tab(&sink, WriteMode::Merge, &normalizer, Ok(ONE_LISTING_TAB.into()), true).await;

        assert!(matches!(outcome, TabOutcome::Synced(_)));
        let writes = sink.writes.lock().unwrap();
        assert_eq!(*writes, vec![(WriteMode::Merge, Some(7), 1)]);
    }
}
