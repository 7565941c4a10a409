use chrono::Utc;
use serde::{Deserialize, Serialize};

use crate::models::{parse_time, InvestmentObject, NewObject, ObjectStatus, PropertyType, Role};

/// Object as the API returns it; several columns may be null.
#[derive(Debug, Clone, Deserialize)]
pub struct ApiObject {
    pub id: i64,
    pub broker_id: Option<i64>,
    pub title: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub address: String,
    #[serde(default)]
    pub property_type: PropertyType,
    #[serde(default)]
    pub area: f64,
    #[serde(default)]
    pub price: f64,
    #[serde(default)]
    pub yield_percent: f64,
    #[serde(default)]
    pub payback_years: f64,
    pub description: Option<String>,
    pub images: Option<Vec<String>>,
    #[serde(default)]
    pub status: ObjectStatus,
    pub created_at: Option<String>,
}

impl ApiObject {
    pub fn into_object(self) -> InvestmentObject {
        let created_at = self
            .created_at
            .as_deref()
            .and_then(parse_time)
            .unwrap_or_else(Utc::now);
        InvestmentObject {
            id: self.id,
            fields: NewObject {
                title: self.title,
                property_type: self.property_type,
                city: self.city,
                address: self.address,
                price: self.price,
                yield_percent: self.yield_percent,
                payback_years: self.payback_years,
                area: self.area,
                status: self.status,
                images: self.images.unwrap_or_default(),
                description: self.description.unwrap_or_default(),
                broker_id: self.broker_id,
                ..Default::default()
            },
            created_at,
        }
    }
}

/// Filters the `objects` listing accepts as query parameters
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectQuery {
    pub city: Option<String>,
    pub property_type: Option<PropertyType>,
    pub status: Option<ObjectStatus>,
    pub min_price: Option<f64>,
    pub max_price: Option<f64>,
    pub min_yield: Option<f64>,
    pub max_yield: Option<f64>,
}

impl ObjectQuery {
    pub fn to_params(&self) -> Vec<(&'static str, String)> {
        let mut params = Vec::new();
        if let Some(city) = &self.city {
            params.push(("city", city.clone()));
        }
        if let Some(kind) = self.property_type {
            params.push(("property_type", kind.as_str().to_string()));
        }
        if let Some(status) = self.status {
            params.push(("status", status.as_str().to_string()));
        }
        let numbers = [
            ("min_price", self.min_price),
            ("max_price", self.max_price),
            ("min_yield", self.min_yield),
            ("max_yield", self.max_yield),
        ];
        for (key, value) in numbers {
            if let Some(value) = value {
                params.push((key, value.to_string()));
            }
        }
        params
    }
}

/// Fields the API lets an owner change on an existing object
#[derive(Debug, Clone, Default, Serialize)]
pub struct ObjectUpdate {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ObjectStatus>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub price: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub yield_percent: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub images: Option<Vec<String>>,
}

impl ObjectUpdate {
    pub fn from_object(object: &NewObject) -> Self {
        Self {
            status: Some(object.status),
            price: Some(object.price),
            yield_percent: Some(object.yield_percent),
            description: Some(object.description.clone()),
            images: Some(object.images.clone()),
        }
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct NewUser {
    pub email: String,
    pub name: String,
    pub role: Role,
}

#[derive(Debug, Clone, Serialize)]
pub struct NewNotification {
    pub user_id: i64,
    #[serde(rename = "type")]
    pub kind: String,
    pub title: String,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub object_id: Option<i64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct ApiMessage {
    #[serde(default)]
    pub message: String,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ApiErrorBody {
    pub error: String,
}
