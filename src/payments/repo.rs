use std::collections::HashMap;

use async_trait::async_trait;
use sqlx::PgPool;
use time::OffsetDateTime;
use tokio::sync::Mutex;
use uuid::Uuid;

use super::repo_types::{PaymentOrder, STATUS_CREATED, STATUS_PAID};

/// Persistence collaborator for gateway orders.
#[async_trait]
pub trait OrderRepository: Send + Sync {
    async fn create(
        &self,
        order_id: &str,
        user_id: Uuid,
        credits: i64,
        amount: i64,
        currency: &str,
    ) -> anyhow::Result<PaymentOrder>;
    async fn find(&self, order_id: &str) -> anyhow::Result<Option<PaymentOrder>>;
    /// Moves a created order to paid. Returns false if it was not in the
    /// created state, so a payment is only ever applied once.
    async fn mark_paid(&self, order_id: &str, payment_id: &str) -> anyhow::Result<bool>;
}

const ORDER_COLUMNS: &str =
    "order_id, user_id, credits, amount, currency, status, payment_id, created_at";

pub struct PgOrderRepository {
    db: PgPool,
}

impl PgOrderRepository {
    pub fn new(db: PgPool) -> Self {
        Self { db }
    }
}

#[async_trait]
impl OrderRepository for PgOrderRepository {
    async fn create(
        &self,
        order_id: &str,
        user_id: Uuid,
        credits: i64,
        amount: i64,
        currency: &str,
    ) -> anyhow::Result<PaymentOrder> {
        let order = sqlx::query_as::<_, PaymentOrder>(&format!(
            r#"
            INSERT INTO payment_orders (order_id, user_id, credits, amount, currency, status)
            VALUES ($1, $2, $3, $4, $5, $6)
            RETURNING {ORDER_COLUMNS}
            "#
        ))
        .bind(order_id)
        .bind(user_id)
        .bind(credits)
        .bind(amount)
        .bind(currency)
        .bind(STATUS_CREATED)
        .fetch_one(&self.db)
        .await?;
        Ok(order)
    }

    async fn find(&self, order_id: &str) -> anyhow::Result<Option<PaymentOrder>> {
        let order = sqlx::query_as::<_, PaymentOrder>(&format!(
            "SELECT {ORDER_COLUMNS} FROM payment_orders WHERE order_id = $1"
        ))
        .bind(order_id)
        .fetch_optional(&self.db)
        .await?;
        Ok(order)
    }

    async fn mark_paid(&self, order_id: &str, payment_id: &str) -> anyhow::Result<bool> {
        let res = sqlx::query(
            r#"
            UPDATE payment_orders
            SET status = $3, payment_id = $2
            WHERE order_id = $1 AND status = $4
            "#,
        )
        .bind(order_id)
        .bind(payment_id)
        .bind(STATUS_PAID)
        .bind(STATUS_CREATED)
        .execute(&self.db)
        .await?;
        Ok(res.rows_affected() == 1)
    }
}

#[derive(Default)]
pub struct InMemoryOrderRepository {
    orders: Mutex<HashMap<String, PaymentOrder>>,
}

impl InMemoryOrderRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OrderRepository for InMemoryOrderRepository {
    async fn create(
        &self,
        order_id: &str,
        user_id: Uuid,
        credits: i64,
        amount: i64,
        currency: &str,
    ) -> anyhow::Result<PaymentOrder> {
        let mut orders = self.orders.lock().await;
        anyhow::ensure!(!orders.contains_key(order_id), "duplicate order {order_id}");
        let order = PaymentOrder {
            order_id: order_id.to_string(),
            user_id,
            credits,
            amount,
            currency: currency.to_string(),
            status: STATUS_CREATED.to_string(),
            payment_id: None,
            created_at: OffsetDateTime::now_utc(),
        };
        orders.insert(order.order_id.clone(), order.clone());
        Ok(order)
    }

    async fn find(&self, order_id: &str) -> anyhow::Result<Option<PaymentOrder>> {
        Ok(self.orders.lock().await.get(order_id).cloned())
    }

    async fn mark_paid(&self, order_id: &str, payment_id: &str) -> anyhow::Result<bool> {
        let mut orders = self.orders.lock().await;
        match orders.get_mut(order_id) {
            Some(o) if o.status == STATUS_CREATED => {
                o.status = STATUS_PAID.to_string();
                o.payment_id = Some(payment_id.to_string());
                Ok(true)
            }
            _ => Ok(false),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn mark_paid_is_one_shot() {
        let repo = InMemoryOrderRepository::new();
        let user = Uuid::new_v4();
        repo.create("order_1", user, 10, 99_900, "INR").await.unwrap();

        assert!(repo.mark_paid("order_1", "pay_1").await.unwrap());
        assert!(!repo.mark_paid("order_1", "pay_2").await.unwrap());

        let order = repo.find("order_1").await.unwrap().unwrap();
        assert!(order.is_paid());
        assert_eq!(order.payment_id.as_deref(), Some("pay_1"));
    }

    #[tokio::test]
    async fn mark_paid_on_unknown_order_is_false() {
        let repo = InMemoryOrderRepository::new();
        assert!(!repo.mark_paid("nope", "pay").await.unwrap());
    }
}
