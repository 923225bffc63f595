use crate::api::*;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Event {
    pub id: i64,
    pub name: String,
    #[serde(default)]
    pub total_tickets: Option<i32>,
    #[serde(default)]
    pub available_tickets: Option<i32>,
    #[serde(default)]
    pub sale_start_time: Option<NaiveDateTime>,
    #[serde(default)]
    pub location: Option<String>,
    #[serde(default)]
    pub price: Option<serde_json::Number>,
    #[serde(default)]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct NewEvent {
    pub name: String,
    pub total_tickets: i32,
    pub sale_start_time: NaiveDateTime,
    pub location: String,
    pub price: serde_json::Number,
    pub description: String,
}

pub struct InventoryApi {
    session: Arc<dyn SessionApi>,
    base: String,
}

impl InventoryApi {
    pub fn new(session: Arc<dyn SessionApi>, endpoints: &ServiceEndpoints) -> Self {
        Self {
            session,
            base: endpoints.inventory.clone(),
        }
    }

    pub async fn list_events(&self) -> Result<Vec<Event>, SessionError> {
        fetch_json(self.session.as_ref(), HttpRequest::get(self.base.as_str())).await
    }

    pub async fn get_event(&self, event_id: i64) -> Result<Event, SessionError> {
        let url = format!("{}/{}", self.base, event_id);
        fetch_json(self.session.as_ref(), HttpRequest::get(url)).await
    }

    pub async fn create_event(&self, event: &NewEvent) -> Result<Event, SessionError> {
        let request = HttpRequest::post(self.base.as_str()).json(json!(event));
        fetch_json(self.session.as_ref(), request).await
    }

    pub async fn update_event(&self, event_id: i64, event: &NewEvent) -> Result<Event, SessionError> {
        let url = format!("{}/{}", self.base, event_id);
        fetch_json(self.session.as_ref(), HttpRequest::put(url).json(json!(event))).await
    }

    pub async fn delete_event(&self, event_id: i64) -> Result<(), SessionError> {
        let url = format!("{}/{}", self.base, event_id);
        expect_success(self.session.as_ref(), HttpRequest::delete(url)).await
    }
}
