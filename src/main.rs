mod analytics;
mod api;
mod cli;
mod config;
mod error;
mod filter;
mod ingest;
mod models;
mod sinks;
mod sources;

use clap::Parser;
use cli::import::ImportArgs;
use cli::{App, Cli, Command};
use config::Settings;
use tracing::info;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let filter = match cli.verbose {
        0 => "warn",
        1 => "info",
        2 => "debug",
        _ => "trace",
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let mut settings = Settings::load()?;
    if let Some(path) = cli.store {
        settings.store_path = path;
    }
    if let Some(url) = cli.api_url {
        settings.api_url = url;
    }
    info!("🏠 estate-sync {}", env!("CARGO_PKG_VERSION"));
    info!("Store: {}, API: {}", settings.store_path.display(), settings.api_url);

    let app = App::new(settings);

    match cli.command {
        Command::Import {
            source,
            layout,
            broker_id,
            target,
            mode,
            notify,
            dry_run,
        } => {
            let args = ImportArgs {
                source,
                layout,
                broker_id,
                target,
                mode,
                notify,
                dry_run,
            };
            cli::import::import(&app, args).await?
        }
        Command::SyncBrokers {
            sheet_id,
            actor,
            target,
            notify,
        } => cli::import::sync_brokers(&app, sheet_id, actor, target, notify).await?,
        Command::List {
            filters,
            sort,
            remote,
            json,
        } => cli::catalog::list(&app, filters.into_filters(), sort, remote, json).await?,
        Command::Stats { remote, json } => cli::catalog::stats(&app, remote, json).await?,
        Command::Status { id, status, remote } => {
            cli::catalog::set_status(&app, id, status, remote).await?
        }
        Command::Delete { id, actor } => cli::catalog::delete(&app, id, actor).await?,
        Command::Favorite { remote, command } => cli::account::favorite(&app, command, remote).await?,
        Command::Notifications { remote, command } => {
            cli::account::notifications(&app, command, remote).await?
        }
        Command::User { remote, command } => cli::account::user(&app, command, remote).await?,
    }

    Ok(())
}
