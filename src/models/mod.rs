use chrono::{DateTime, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};

use crate::error::SyncError;

/// Kind of investment property
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash, PartialOrd, Ord)]
#[serde(rename_all = "lowercase")]
pub enum PropertyType {
    #[default]
    Flats,
    Apartments,
    Commercial,
    Country,
}

impl PropertyType {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Flats => "flats",
            Self::Apartments => "apartments",
            Self::Commercial => "commercial",
            Self::Country => "country",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "flats" => Some(Self::Flats),
            "apartments" => Some(Self::Apartments),
            "commercial" => Some(Self::Commercial),
            "country" => Some(Self::Country),
            _ => None,
        }
    }
}

/// Sale status of a listing
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum ObjectStatus {
    #[default]
    Available,
    Reserved,
    Sold,
}

impl ObjectStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Available => "available",
            Self::Reserved => "reserved",
            Self::Sold => "sold",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "available" | "в продаже" | "доступен" | "свободен" => Some(Self::Available),
            "reserved" | "бронь" | "забронирован" | "резерв" => Some(Self::Reserved),
            "sold" | "продан" | "продано" => Some(Self::Sold),
            _ => None,
        }
    }

    fn rank(&self) -> i8 {
        match self {
            Self::Available => 0,
            Self::Reserved => 1,
            Self::Sold => 2,
        }
    }

    /// Listings move one step at a time: available <-> reserved <-> sold.
    pub fn transition(self, to: ObjectStatus) -> Result<ObjectStatus, SyncError> {
        if (self.rank() - to.rank()).abs() == 1 {
            Ok(to)
        } else {
            Err(SyncError::InvalidTransition { from: self, to })
        }
    }
}

impl std::fmt::Display for ObjectStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Listing fields shared by stored objects and import drafts
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct NewObject {
    pub title: String,
    pub property_type: PropertyType,
    pub city: String,
    pub address: String,
    pub price: f64,
    pub yield_percent: f64,
    pub payback_years: f64,
    pub area: f64,
    pub status: ObjectStatus,
    pub images: Vec<String>,
    pub description: String,
    pub broker_id: Option<i64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_income: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub min_investment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub monthly_payment: Option<f64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub strategy: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deal_cycle: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub presentation_link: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub investment_decision: Option<String>,
}

impl NewObject {
    /// Key used to recognise the same listing across imports.
    pub fn dedupe_key(&self) -> (Option<i64>, String, String) {
        (self.broker_id, fold(&self.title), fold(&self.address))
    }
}

fn fold(s: &str) -> String {
    s.split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .to_lowercase()
}

/// Stored investment object
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InvestmentObject {
    pub id: i64,
    #[serde(flatten)]
    pub fields: NewObject,
    pub created_at: DateTime<Utc>,
}

/// Listing owner
#[derive(Debug, Clone, Default, Serialize, Deserialize, PartialEq)]
pub struct Broker {
    pub id: i64,
    pub name: String,
    pub company: String,
    pub phone: String,
    pub email: String,
    pub rating: f64,
    pub deals_completed: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub city: Option<String>,
}

#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    #[default]
    Investor,
    Broker,
    Admin,
}

impl Role {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Investor => "investor",
            Self::Broker => "broker",
            Self::Admin => "admin",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_lowercase().as_str() {
            "investor" | "инвестор" => Some(Self::Investor),
            "broker" | "брокер" => Some(Self::Broker),
            "admin" | "администратор" => Some(Self::Admin),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct User {
    pub id: i64,
    pub email: String,
    pub name: String,
    pub role: Role,
    #[serde(default)]
    pub is_admin: bool,
    #[serde(default)]
    pub notify_new_objects: bool,
    #[serde(default, deserialize_with = "lenient_time", skip_serializing_if = "Option::is_none")]
    pub created_at: Option<DateTime<Utc>>,
}

impl User {
    pub fn is_admin(&self) -> bool {
        self.is_admin || self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Favorite {
    pub user_id: i64,
    pub object_id: i64,
    #[serde(default, deserialize_with = "lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Notification {
    pub id: i64,
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
    #[serde(default)]
    pub is_read: bool,
    #[serde(default, deserialize_with = "lenient_time")]
    pub created_at: Option<DateTime<Utc>>,
}

/// Parses RFC 3339 as well as the naive `2024-05-01T10:00:00.123` form the API emits.
pub fn parse_time(raw: &str) -> Option<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|t| t.with_timezone(&Utc))
        .ok()
        .or_else(|| {
            NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f")
                .ok()
                .map(|t| t.and_utc())
        })
}

fn lenient_time<'de, D>(deserializer: D) -> Result<Option<DateTime<Utc>>, D::Error>
where
    D: Deserializer<'de>,
{
    let raw: Option<String> = Option::deserialize(deserializer)?;
    Ok(raw.as_deref().and_then(parse_time))
}
