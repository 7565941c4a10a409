use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::{Client, Method, StatusCode, Url};
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::{debug, warn};

use crate::api::types::{
    ApiErrorBody, ApiMessage, ApiObject, NewNotification, NewUser, ObjectQuery, ObjectUpdate,
};
use crate::error::SyncError;
use crate::models::{Favorite, NewObject, Notification, User};

/// Client for the marketplace REST API (`{base}?resource=...`)
#[derive(Clone)]
pub struct ApiClient {
    client: Client,
    base_url: String,
}

impl ApiClient {
    pub fn new(base_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .build()
            .context("Failed to create HTTP client")?;
        Ok(Self {
            client,
            base_url: base_url.into(),
        })
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    pub fn url(&self, resource: &str, params: &[(&str, String)]) -> Result<Url> {
        let mut url = Url::parse(&self.base_url)
            .with_context(|| format!("Invalid API URL: {}", self.base_url))?;
        {
            let mut pairs = url.query_pairs_mut();
            pairs.append_pair("resource", resource);
            for (key, value) in params {
                pairs.append_pair(key, value);
            }
        }
        Ok(url)
    }

    async fn request<T: DeserializeOwned>(
        &self,
        resource: &str,
        method: Method,
        body: Option<Value>,
        params: &[(&str, String)],
    ) -> Result<T> {
        let url = self.url(resource, params)?;
        debug!("{} {}", method, url);

        let mut request = self.client.request(method.clone(), url);
        if let Some(body) = body {
            if method == Method::POST || method == Method::PUT {
                request = request.json(&body);
            }
        }

        let response = request
            .send()
            .await
            .with_context(|| format!("API request to '{resource}' failed"))?;

        let status = response.status();
        if !status.is_success() {
            let text = response.text().await.unwrap_or_default();
            warn!("API returned {} for '{}'", status, resource);
            return Err(error_from_body(status, &text).into());
        }

        response
            .json::<T>()
            .await
            .with_context(|| format!("Failed to decode '{resource}' response"))
    }

    pub async fn get_users(&self) -> Result<Vec<User>> {
        self.request("users", Method::GET, None, &[]).await
    }

    pub async fn get_user(&self, id: i64) -> Result<User> {
        self.request("users", Method::GET, None, &[("id", id.to_string())])
            .await
    }

    /// `None` when the API answers 404.
    pub async fn get_user_by_email(&self, email: &str) -> Result<Option<User>> {
        match self
            .request("users", Method::GET, None, &[("email", email.to_string())])
            .await
        {
            Ok(user) => Ok(Some(user)),
            Err(e) if is_not_found(&e) => Ok(None),
            Err(e) => Err(e),
        }
    }

    /// Creating an existing email returns the existing user's id.
    pub async fn create_user(&self, user: &NewUser) -> Result<i64> {
        let created: Value = self
            .request("users", Method::POST, Some(serde_json::to_value(user)?), &[])
            .await?;
        created
            .get("id")
            .and_then(Value::as_i64)
            .context("API did not return a user id")
    }

    pub async fn update_user(
        &self,
        id: i64,
        name: Option<&str>,
        notify_new_objects: Option<bool>,
    ) -> Result<User> {
        let mut body = json!({ "id": id });
        if let Some(name) = name {
            body["name"] = json!(name);
        }
        if let Some(notify) = notify_new_objects {
            body["notify_new_objects"] = json!(notify);
        }
        self.request("users", Method::PUT, Some(body), &[]).await
    }

    pub async fn get_objects(&self, query: &ObjectQuery) -> Result<Vec<ApiObject>> {
        self.request("objects", Method::GET, None, &query.to_params())
            .await
    }

    pub async fn get_object(&self, id: i64) -> Result<ApiObject> {
        self.request("objects", Method::GET, None, &[("id", id.to_string())])
            .await
    }

    pub async fn create_object(&self, object: &NewObject) -> Result<ApiObject> {
        self.request("objects", Method::POST, Some(serde_json::to_value(object)?), &[])
            .await
    }

    pub async fn update_object(&self, id: i64, update: &ObjectUpdate) -> Result<ApiObject> {
        let mut body = serde_json::to_value(update)?;
        body["id"] = json!(id);
        self.request("objects", Method::PUT, Some(body), &[]).await
    }

    pub async fn get_favorites(&self, user_id: i64) -> Result<Vec<Favorite>> {
        self.request("favorites", Method::GET, None, &[("user_id", user_id.to_string())])
            .await
    }

    pub async fn add_favorite(&self, user_id: i64, object_id: i64) -> Result<Value> {
        let body = json!({ "user_id": user_id, "object_id": object_id });
        self.request("favorites", Method::POST, Some(body), &[]).await
    }

    pub async fn remove_favorite(&self, user_id: i64, object_id: i64) -> Result<ApiMessage> {
        let params = [
            ("user_id", user_id.to_string()),
            ("object_id", object_id.to_string()),
        ];
        self.request("favorites", Method::DELETE, None, &params).await
    }

    pub async fn get_notifications(&self, user_id: i64) -> Result<Vec<Notification>> {
        self.request(
            "notifications",
            Method::GET,
            None,
            &[("user_id", user_id.to_string())],
        )
        .await
    }

    pub async fn mark_notification_read(&self, id: i64) -> Result<Notification> {
        self.request("notifications", Method::PUT, Some(json!({ "id": id })), &[])
            .await
    }

    pub async fn create_notification(&self, notification: &NewNotification) -> Result<Value> {
        self.request(
            "notifications",
            Method::POST,
            Some(serde_json::to_value(notification)?),
            &[],
        )
        .await
    }
}

fn error_from_body(status: StatusCode, body: &str) -> SyncError {
    let message = serde_json::from_str::<ApiErrorBody>(body)
        .map(|b| b.error)
        .unwrap_or_else(|_| {
            status
                .canonical_reason()
                .unwrap_or("API request failed")
                .to_string()
        });
    SyncError::Api {
        status: status.as_u16(),
        message,
    }
}

fn is_not_found(err: &anyhow::Error) -> bool {
    matches!(
        err.downcast_ref::<SyncError>(),
        Some(SyncError::Api { status: 404, .. })
    )
}
