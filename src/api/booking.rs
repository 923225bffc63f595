use crate::api::*;
use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};
use serde_json::json;
use std::sync::Arc;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderStatus {
    Pending,
    PaymentFailed,
    Paid,
    Expired,
    Cancelled,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct BookingRequest {
    pub user_id: UserId,
    pub event_id: i64,
    pub quantity: i32,
}

#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Order {
    pub order_id: i64,
    #[serde(default)]
    pub user_id: Option<UserId>,
    pub event_id: i64,
    pub quantity: i32,
    #[serde(default)]
    pub total_amount: Option<serde_json::Number>,
    pub status: OrderStatus,
    #[serde(default)]
    pub created_at: Option<NaiveDateTime>,
    #[serde(default)]
    pub message: Option<String>,
}

pub struct BookingApi {
    session: Arc<dyn SessionApi>,
    base: String,
}

impl BookingApi {
    pub fn new(session: Arc<dyn SessionApi>, endpoints: &ServiceEndpoints) -> Self {
        Self {
            session,
            base: endpoints.booking.clone(),
        }
    }

    pub async fn create_booking(&self, booking: &BookingRequest) -> Result<Order, SessionError> {
        let request = HttpRequest::post(self.base.as_str()).json(json!(booking));
        fetch_json(self.session.as_ref(), request).await
    }

    /// Bookings of the signed-in user.
    pub async fn my_bookings(&self) -> Result<Vec<Order>, SessionError> {
        let url = format!("{}/user", self.base);
        fetch_json(self.session.as_ref(), HttpRequest::get(url)).await
    }

    pub async fn get_booking(&self, order_id: i64) -> Result<Order, SessionError> {
        let url = format!("{}/{}", self.base, order_id);
        fetch_json(self.session.as_ref(), HttpRequest::get(url)).await
    }

    pub async fn confirm_booking(&self, order_id: i64) -> Result<Order, SessionError> {
        let url = format!("{}/{}/confirm", self.base, order_id);
        fetch_json(self.session.as_ref(), HttpRequest::post(url)).await
    }

    pub async fn cancel_booking(&self, order_id: i64) -> Result<(), SessionError> {
        let url = format!("{}/{}/cancel", self.base, order_id);
        expect_success(self.session.as_ref(), HttpRequest::post(url)).await
    }
}
