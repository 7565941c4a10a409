pub mod account;
pub mod catalog;
pub mod import;

use anyhow::Result;
use clap::{Parser, Subcommand, ValueEnum};

use crate::api::ApiClient;
use crate::config::Settings;
use crate::filter::{ObjectFilters, PaybackBucket, SortOrder, YieldBucket};
use crate::ingest::Layout;
use crate::models::{InvestmentObject, ObjectStatus, PropertyType, Role};
use crate::sinks::{ApiSink, JsonStore, Sink, WriteMode};

#[derive(Parser)]
#[command(
    name = "estate-sync",
    version,
    about = "Import investment listings from Google Sheets and manage the marketplace catalogue"
)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    /// Local store file (overrides ESTATE_STORE_PATH)
    #[arg(long, global = true)]
    pub store: Option<std::path::PathBuf>,

    /// Marketplace API URL (overrides ESTATE_API_URL)
    #[arg(long, global = true)]
    pub api_url: Option<String>,

    /// Increase logging verbosity (-v, -vv, -vvv)
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    pub verbose: u8,
}

/// Where imported listings are written
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum Target {
    /// The local JSON store
    Store,
    /// The marketplace REST API
    Api,
}

#[derive(Subcommand)]
pub enum Command {
    /// Import listings from a sheet URL, published sheet key or CSV file
    Import {
        /// URL, CSV path or published key (defaults to ESTATE_PUBLISHED_KEY)
        source: Option<String>,
        #[arg(long, value_enum, default_value = "flat")]
        layout: Layout,
        /// Assign every listing to this broker
        #[arg(long)]
        broker_id: Option<i64>,
        #[arg(long, value_enum, default_value = "store")]
        target: Target,
        #[arg(long, value_enum, default_value = "replace")]
        mode: WriteMode,
        /// Notify subscribed users about new listings
        #[arg(long)]
        notify: bool,
        /// Parse and report without writing anything
        #[arg(long)]
        dry_run: bool,
    },
    /// Re-import every broker's own tab of the brokers workbook
    SyncBrokers {
        /// Workbook id (defaults to ESTATE_SHEET_ID)
        #[arg(long)]
        sheet_id: Option<String>,
        /// Admin user running the sync
        #[arg(long)]
        actor: i64,
        #[arg(long, value_enum, default_value = "store")]
        target: Target,
        #[arg(long)]
        notify: bool,
    },
    /// List catalogue listings
    List {
        #[command(flatten)]
        filters: FilterArgs,
        #[arg(long, value_enum, default_value = "newest")]
        sort: SortOrder,
        /// Read listings from the API instead of the local store
        #[arg(long)]
        remote: bool,
        /// Print JSON instead of a text listing
        #[arg(long)]
        json: bool,
    },
    /// Show dashboard statistics
    Stats {
        #[arg(long)]
        remote: bool,
        #[arg(long)]
        json: bool,
    },
    /// Move a listing to another sale status
    Status {
        id: i64,
        #[arg(value_parser = parse_status)]
        status: ObjectStatus,
        #[arg(long)]
        remote: bool,
    },
    /// Delete a listing (owning broker or admin only)
    Delete {
        id: i64,
        /// User performing the deletion
        #[arg(long)]
        actor: i64,
    },
    /// Manage favorites
    Favorite {
        #[arg(long, global = true)]
        remote: bool,
        #[command(subcommand)]
        command: FavoriteCommand,
    },
    /// Read notifications
    Notifications {
        #[arg(long, global = true)]
        remote: bool,
        #[command(subcommand)]
        command: NotificationCommand,
    },
    /// Manage users
    User {
        #[arg(long, global = true)]
        remote: bool,
        #[command(subcommand)]
        command: UserCommand,
    },
}

#[derive(Subcommand)]
pub enum FavoriteCommand {
    Add { user: i64, object: i64 },
    Remove { user: i64, object: i64 },
    List { user: i64 },
}

#[derive(Subcommand)]
pub enum NotificationCommand {
    /// Newest first
    List { user: i64 },
    Read { id: i64 },
}

#[derive(Subcommand)]
pub enum UserCommand {
    Add {
        email: String,
        name: String,
        #[arg(long, value_parser = parse_role, default_value = "investor")]
        role: Role,
        /// Subscribe to new-listing notifications
        #[arg(long)]
        notify: bool,
    },
    List,
    /// Turn new-listing notifications on or off
    Notify {
        id: i64,
        #[arg(action = clap::ArgAction::Set)]
        enabled: bool,
    },
}

#[derive(clap::Args, Debug, Default)]
pub struct FilterArgs {
    /// Substring of title, city or address
    #[arg(long)]
    pub search: Option<String>,
    #[arg(long = "city")]
    pub cities: Vec<String>,
    #[arg(long = "type", value_parser = parse_property_type)]
    pub types: Vec<PropertyType>,
    #[arg(long)]
    pub min_price: Option<f64>,
    #[arg(long)]
    pub max_price: Option<f64>,
    #[arg(long = "yield", value_enum)]
    pub yields: Vec<YieldBucket>,
    #[arg(long = "payback", value_enum)]
    pub paybacks: Vec<PaybackBucket>,
    #[arg(long, value_parser = parse_status)]
    pub status: Option<ObjectStatus>,
}

impl FilterArgs {
    pub fn into_filters(self) -> ObjectFilters {
        ObjectFilters {
            search: self.search,
            cities: self.cities,
            types: self.types,
            min_price: self.min_price,
            max_price: self.max_price,
            yields: self.yields,
            paybacks: self.paybacks,
            status: self.status,
        }
    }
}

fn parse_property_type(s: &str) -> Result<PropertyType, String> {
    PropertyType::parse(s).ok_or_else(|| format!("unknown property type '{s}'"))
}

fn parse_status(s: &str) -> Result<ObjectStatus, String> {
    ObjectStatus::parse(s).ok_or_else(|| format!("unknown status '{s}'"))
}

fn parse_role(s: &str) -> Result<Role, String> {
    Role::parse(s).ok_or_else(|| format!("unknown role '{s}'"))
}

/// Shared handles every command runs against
pub struct App {
    pub settings: Settings,
    pub store: JsonStore,
}

impl App {
    pub fn new(settings: Settings) -> Self {
        let store = JsonStore::new(settings.store_path.clone());
        Self { settings, store }
    }

    pub fn api(&self) -> Result<ApiClient> {
        ApiClient::new(self.settings.api_url.clone())
    }

    pub fn sink(&self, target: Target) -> Result<Box<dyn Sink>> {
        Ok(match target {
            Target::Store => Box::new(JsonStore::new(self.settings.store_path.clone())),
            Target::Api => Box::new(ApiSink::new(self.api()?)),
        })
    }
}

pub fn print_object(object: &InvestmentObject) {
    let fields = &object.fields;
    println!("#{} {} [{}]", object.id, fields.title, fields.status);
    println!(
        "   {} {}, {}",
        fields.property_type.as_str(),
        fields.city,
        fields.address
    );
    println!(
        "   {:.0} ₽, доходность {}%, окупаемость {} лет",
        fields.price, fields.yield_percent, fields.payback_years
    );
    if let Some(broker_id) = fields.broker_id {
        println!("   broker #{broker_id}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_list_filters() {
        let cli = Cli::try_parse_from([
            "estate-sync", "list", "--city", "Москва", "--city", "Сочи", "--type", "commercial",
            "--yield", "10-15", "--yield", "15+", "--status", "бронь", "--sort", "price-desc",
        ])
        .unwrap();
        let Command::List { filters, sort, remote, .. } = cli.command else {
            panic!("expected list");
        };
        assert_eq!(sort, SortOrder::PriceDesc);
        assert!(!remote);
        let filters = filters.into_filters();
        assert_eq!(filters.cities, vec!["Москва", "Сочи"]);
        assert_eq!(filters.types, vec![PropertyType::Commercial]);
        assert_eq!(filters.yields, vec![YieldBucket::High, YieldBucket::Top]);
        assert_eq!(filters.status, Some(ObjectStatus::Reserved));
    }

    #[test]
    fn parses_import_defaults() {
        let cli = Cli::try_parse_from(["estate-sync", "-vv", "import", "sheet.csv"]).unwrap();
        assert_eq!(cli.verbose, 2);
        let Command::Import { source, layout, target, mode, notify, .. } = cli.command else {
            panic!("expected import");
        };
        assert_eq!(source.as_deref(), Some("sheet.csv"));
        assert_eq!(layout, Layout::Flat);
        assert_eq!(target, Target::Store);
        assert_eq!(mode, WriteMode::Replace);
        assert!(!notify);
    }

    #[test]
    fn rejects_unknown_values() {
        assert!(Cli::try_parse_from(["estate-sync", "status", "1", "lost"]).is_err());
        assert!(Cli::try_parse_from(["estate-sync", "user", "add", "a@x.ru", "A", "--role", "guest"]).is_err());
    }
}
