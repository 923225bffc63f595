use crate::api::*;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JoinQueue {
    pub user_id: String,
    pub event_id: i64,
    pub requested_quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PositionInfo {
    pub user_id: String,
    pub position: i32,
    #[serde(default)]
    pub estimated_wait_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum QueuePosition {
    Waiting(PositionInfo),
    /// The service no longer lists the user. Read as admitted.
    Admitted,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct QueueStatus {
    pub total_waiting: i64,
    pub total_admitted: i64,
    #[serde(default)]
    pub estimated_wait_time: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AdmittedBatch {
    pub admitted_users: Vec<String>,
    pub count: usize,
}

pub struct WaitingRoomApi {
    session: Arc<dyn SessionApi>,
    base: String,
}

impl WaitingRoomApi {
    pub fn new(session: Arc<dyn SessionApi>, endpoints: &ServiceEndpoints) -> Self {
        Self {
            session,
            base: endpoints.waiting_room.clone(),
        }
    }

    pub async fn join_queue(&self, join: &JoinQueue) -> Result<PositionInfo, SessionError> {
        let request = HttpRequest::post(format!("{}/join", self.base)).json(json!(join));
        fetch_json(self.session.as_ref(), request).await
    }

    pub async fn position(&self, user_id: &str, event_id: i64) -> Result<QueuePosition, SessionError> {
        let url = format!("{}/position/{}?eventId={}", self.base, user_id, event_id);
        let response = self.session.send(HttpRequest::get(url)).await?;
        match response.status {
            404 => Ok(QueuePosition::Admitted),
            _ if response.is_success() => Ok(QueuePosition::Waiting(response.json()?)),
            _ => Err(SessionError::Status(response)),
        }
    }

    pub async fn status(&self, event_id: i64) -> Result<QueueStatus, SessionError> {
        let url = format!("{}/status?eventId={}", self.base, event_id);
        fetch_json(self.session.as_ref(), HttpRequest::get(url)).await
    }

    /// Lets the next `batch_size` queued users through.
    pub async fn admit_batch(&self, event_id: i64, batch_size: u32) -> Result<AdmittedBatch, SessionError> {
        let request = HttpRequest::post(format!("{}/admit", self.base))
            .json(json!({ "eventId": event_id, "batchSize": batch_size }));
        fetch_json(self.session.as_ref(), request).await
    }
}
