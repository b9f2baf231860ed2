use serde::Serialize;
use sqlx::FromRow;
use time::OffsetDateTime;
use uuid::Uuid;

pub const STATUS_CREATED: &str = "created";
pub const STATUS_PAID: &str = "paid";

/// Gateway order opened for a credit purchase.
#[derive(Debug, Clone, Serialize, FromRow)]
pub struct PaymentOrder {
    pub order_id: String,
    pub user_id: Uuid,
    pub credits: i64,
    pub amount: i64,
    pub currency: String,
    pub status: String,
    pub payment_id: Option<String>,
    #[serde(with = "time::serde::rfc3339")]
    pub created_at: OffsetDateTime,
}

impl PaymentOrder {
    pub fn is_paid(&self) -> bool {
        self.status == STATUS_PAID
    }
}
