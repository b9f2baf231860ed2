use axum::{
    extract::State,
    routing::{get, post},
    Json, Router,
};
use tracing::{info, instrument, warn};
use uuid::Uuid;

use super::{
    dto::{
        CreateOrderRequest, CreateOrderResponse, PlansResponse, VerifyPaymentRequest,
        VerifyPaymentResponse,
    },
    gateway::OrderNotes,
    plans::{find_plan, PLANS},
};
use crate::{
    auth::AuthUser,
    error::{ApiError, ApiJson, ApiResult},
    state::AppState,
};

pub fn payment_routes() -> Router<AppState> {
    Router::new()
        .route("/payment/plans", get(list_plans))
        .route("/payment/create-order", post(create_order))
        .route("/payment/verify-payment", post(verify_payment))
}

pub async fn list_plans() -> Json<PlansResponse> {
    Json(PlansResponse { plans: &PLANS })
}

#[instrument(skip(state, payload))]
pub async fn create_order(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<CreateOrderRequest>,
) -> ApiResult<Json<CreateOrderResponse>> {
    let plan = find_plan(payload.credits, payload.amount).ok_or_else(|| {
        warn!(%user_id, credits = payload.credits, amount = payload.amount, "unknown plan");
        ApiError::bad_request("Invalid plan")
    })?;

    let receipt = format!("rcpt_{}", Uuid::new_v4().simple());
    let notes = OrderNotes {
        user_id,
        credits: plan.credits,
    };
    let order = state
        .payments
        .create_order(plan.amount, plan.currency, &receipt, &notes)
        .await
        .map_err(|e| ApiError::internal("Failed to create order", e))?;

    state
        .orders
        .create(&order.id, user_id, plan.credits, order.amount, &order.currency)
        .await
        .map_err(|e| ApiError::internal("Failed to create order", e))?;

    info!(%user_id, order_id = %order.id, credits = plan.credits, "payment order created");
    Ok(Json(CreateOrderResponse {
        id: order.id,
        amount: order.amount,
        currency: order.currency,
        key_id: state.payments.key_id().to_string(),
    }))
}

#[instrument(skip(state, payload))]
pub async fn verify_payment(
    State(state): State<AppState>,
    AuthUser(user_id): AuthUser,
    ApiJson(payload): ApiJson<VerifyPaymentRequest>,
) -> ApiResult<Json<VerifyPaymentResponse>> {
    let VerifyPaymentRequest {
        razorpay_order_id: order_id,
        razorpay_payment_id: payment_id,
        razorpay_signature: signature,
    } = payload;

    if !state
        .payments
        .verify_signature(&order_id, &payment_id, &signature)
    {
        warn!(%user_id, %order_id, "payment signature mismatch");
        return Err(ApiError::bad_request("Invalid payment signature"));
    }

    let order = state
        .orders
        .find(&order_id)
        .await?
        .filter(|o| o.user_id == user_id)
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    if !state.orders.mark_paid(&order_id, &payment_id).await? {
        warn!(%user_id, %order_id, "payment replay");
        return Err(ApiError::bad_request("Payment already processed"));
    }

    let credits = state.users.add_credits(user_id, order.credits).await?;
    info!(%user_id, %order_id, %payment_id, added = order.credits, balance = credits, "credits granted");

    Ok(Json(VerifyPaymentResponse {
        success: true,
        message: "Payment verified successfully".into(),
        credits,
    }))
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::test_support::{send_json, TestApp};

    #[tokio::test]
    async fn plans_are_public() {
        let t = TestApp::new();
        let (status, body) = send_json(&t.app(), Method::GET, "/api/payment/plans", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["plans"].as_array().unwrap().len(), 3);
    }

    #[tokio::test]
    async fn create_order_requires_auth() {
        let t = TestApp::new();
        let (status, _) = send_json(
            &t.app(),
            Method::POST,
            "/api/payment/create-order",
            Some(json!({"amount": 99900, "credits": 10})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn create_order_rejects_custom_price() {
        let t = TestApp::new();
        let (_, token) = t.seed_user("ada@example.com", 5).await;
        let (status, body) = send_json(
            &t.app(),
            Method::POST,
            "/api/payment/create-order",
            Some(json!({"amount": 100, "credits": 50})),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid plan");
    }

    #[tokio::test]
    async fn gateway_failure_is_500() {
        let t = TestApp::new();
        let (_, token) = t.seed_user("ada@example.com", 5).await;
        t.fakes.gateway.set_failing(true);
        let (status, body) = send_json(
            &t.app(),
            Method::POST,
            "/api/payment/create-order",
            Some(json!({"amount": 99900, "credits": 10})),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to create order");
    }

    #[tokio::test]
    async fn purchase_grants_credits_once() {
        let t = TestApp::new();
        let (_, token) = t.seed_user("ada@example.com", 5).await;
        let app = t.app();

        let (status, order) = send_json(
            &app,
            Method::POST,
            "/api/payment/create-order",
            Some(json!({"amount": 199900, "credits": 25})),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(order["amount"], 199900);
        assert_eq!(order["key_id"], "rzp_test_stub");
        let order_id = order["id"].as_str().unwrap().to_string();

        let signature = t.fakes.gateway.sign(&order_id, "pay_1");
        let body = json!({
            "razorpay_order_id": order_id,
            "razorpay_payment_id": "pay_1",
            "razorpay_signature": signature,
        });
        let (status, resp) = send_json(
            &app,
            Method::POST,
            "/api/payment/verify-payment",
            Some(body.clone()),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["credits"], 30);

        let (status, resp) = send_json(
            &app,
            Method::POST,
            "/api/payment/verify-payment",
            Some(body),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "Payment already processed");
    }

    #[tokio::test]
    async fn forged_signature_rejected() {
        let t = TestApp::new();
        let (_, token) = t.seed_user("ada@example.com", 5).await;
        let (status, body) = send_json(
            &t.app(),
            Method::POST,
            "/api/payment/verify-payment",
            Some(json!({
                "razorpay_order_id": "order_stub1",
                "razorpay_payment_id": "pay_1",
                "razorpay_signature": "00".repeat(32),
            })),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Invalid payment signature");
    }

    #[tokio::test]
    async fn cannot_redeem_someone_elses_order() {
        let t = TestApp::new();
        let (_, owner) = t.seed_user("owner@example.com", 0).await;
        let (_, other) = t.seed_user("other@example.com", 0).await;
        let app = t.app();

        let (_, order) = send_json(
            &app,
            Method::POST,
            "/api/payment/create-order",
            Some(json!({"amount": 99900, "credits": 10})),
            Some(&owner),
        )
        .await;
        let order_id = order["id"].as_str().unwrap().to_string();
        let signature = t.fakes.gateway.sign(&order_id, "pay_9");

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/payment/verify-payment",
            Some(json!({
                "razorpay_order_id": order_id,
                "razorpay_payment_id": "pay_9",
                "razorpay_signature": signature,
            })),
            Some(&other),
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn non_numeric_amount_is_a_json_400() {
        let t = TestApp::new();
        let (_, token) = t.seed_user("ada@example.com", 5).await;
        let (status, body) = send_json(
            &t.app(),
            Method::POST,
            "/api/payment/create-order",
            Some(json!({"amount": "999", "credits": 10})),
            Some(&token),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["success"], false);
    }
}
