use async_trait::async_trait;
use hmac::{Hmac, Mac};
use serde::{Deserialize, Serialize};
use sha2::Sha256;
use tracing::{debug, error};
use uuid::Uuid;

use crate::config::RazorpayConfig;

type HmacSha256 = Hmac<Sha256>;

/// Order as returned by the gateway.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct GatewayOrder {
    pub id: String,
    pub amount: i64,
    pub currency: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct OrderNotes {
    pub user_id: Uuid,
    pub credits: i64,
}

#[derive(Debug, Serialize)]
struct CreateOrderBody<'a> {
    amount: i64,
    currency: &'a str,
    receipt: &'a str,
    notes: &'a OrderNotes,
}

/// Third-party payment collaborator.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Public key the checkout widget needs.
    fn key_id(&self) -> &str;

    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: &OrderNotes,
    ) -> anyhow::Result<GatewayOrder>;

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool;
}

/// Hex HMAC-SHA256 of `"{order_id}|{payment_id}"`, the checkout signature format.
pub fn checkout_signature(secret: &str, order_id: &str, payment_id: &str) -> String {
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a checkout signature.
pub fn verify_checkout_signature(
    secret: &str,
    order_id: &str,
    payment_id: &str,
    signature: &str,
) -> bool {
    let Ok(sig) = hex::decode(signature.trim()) else {
        return false;
    };
    let mut mac =
        HmacSha256::new_from_slice(secret.as_bytes()).expect("HMAC can take key of any size");
    mac.update(format!("{order_id}|{payment_id}").as_bytes());
    mac.verify_slice(&sig).is_ok()
}

pub struct RazorpayClient {
    http: reqwest::Client,
    key_id: String,
    key_secret: String,
    api_base: String,
}

impl RazorpayClient {
    pub fn new(http: reqwest::Client, cfg: &RazorpayConfig) -> Self {
        Self {
            http,
            key_id: cfg.key_id.clone(),
            key_secret: cfg.key_secret.clone(),
            api_base: cfg.api_base.trim_end_matches('/').to_string(),
        }
    }
}

#[async_trait]
impl PaymentGateway for RazorpayClient {
    fn key_id(&self) -> &str {
        &self.key_id
    }

    async fn create_order(
        &self,
        amount: i64,
        currency: &str,
        receipt: &str,
        notes: &OrderNotes,
    ) -> anyhow::Result<GatewayOrder> {
        let res = self
            .http
            .post(format!("{}/orders", self.api_base))
            .basic_auth(&self.key_id, Some(&self.key_secret))
            .json(&CreateOrderBody {
                amount,
                currency,
                receipt,
                notes,
            })
            .send()
            .await?;

        let status = res.status();
        if !status.is_success() {
            let body = res.text().await.unwrap_or_default();
            error!(%status, %body, "razorpay order creation rejected");
            anyhow::bail!("razorpay returned {status}");
        }
        let order: GatewayOrder = res.json().await?;
        debug!(order_id = %order.id, amount = order.amount, "razorpay order created");
        Ok(order)
    }

    fn verify_signature(&self, order_id: &str, payment_id: &str, signature: &str) -> bool {
        verify_checkout_signature(&self.key_secret, order_id, payment_id, signature)
    }
}

#[cfg(test)]
pub use fake::StubGateway;


#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn signature_is_hex_sha256() {
        let sig = checkout_signature("secret", "order_A", "pay_B");
        assert_eq!(sig.len(), 64);
        assert!(sig.chars().all(|c| c.is_ascii_hexdigit()));
    }

    #[test]
    fn signature_binds_order_and_payment() {
        let sig = checkout_signature("secret", "order_A", "pay_B");
        assert!(verify_checkout_signature("secret", "order_A", "pay_B", &sig));
        assert!(!verify_checkout_signature("secret", "order_A", "pay_C", &sig));
        assert!(!verify_checkout_signature("secret", "order_X", "pay_B", &sig));
        assert!(!verify_checkout_signature("other", "order_A", "pay_B", &sig));
    }

    #[test]
    fn malformed_signature_is_rejected() {
        assert!(!verify_checkout_signature("secret", "o", "p", "zz-not-hex"));
        assert!(!verify_checkout_signature("secret", "o", "p", ""));
    }

    #[test]
    fn order_body_serializes_notes() {
        let notes = OrderNotes {
            user_id: Uuid::nil(),
            credits: 10,
        };
        let body = CreateOrderBody {
            amount: 99_900,
            currency: "INR",
            receipt: "rcpt_1",
            notes: &notes,
        };
        let v = serde_json::to_value(&body).unwrap();
        assert_eq!(v["amount"], 99_900);
        assert_eq!(v["notes"]["credits"], 10);
    }
}
