use serde::{Deserialize, Serialize};

use super::plans::Plan;

#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderRequest {
    pub amount: i64,
    pub credits: i64,
}

/// What the checkout widget needs to open the payment dialog.
#[derive(Debug, Serialize, Deserialize)]
pub struct CreateOrderResponse {
    pub id: String,
    pub amount: i64,
    pub currency: String,
    pub key_id: String,
}

/// Fields handed back by the checkout widget after payment.
#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyPaymentRequest {
    pub razorpay_order_id: String,
    pub razorpay_payment_id: String,
    pub razorpay_signature: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct VerifyPaymentResponse {
    pub success: bool,
    pub message: String,
    pub credits: i64,
}

#[derive(Debug, Serialize)]
pub struct PlansResponse {
    pub plans: &'static [Plan],
}
