use axum::{extract::State, routing::post, Json, Router};
use tracing::{error, info, instrument, warn};

use super::{
    dto::{MessageResponse, SendOtpRequest, VerifyOtpRequest},
    store::FlowType,
};
use crate::{
    auth::services::{hash_password, normalize_email, validate_password},
    error::{ApiError, ApiJson, ApiResult},
    state::AppState,
};

pub fn otp_routes() -> Router<AppState> {
    Router::new()
        .route("/send-otp", post(send_otp))
        .route("/verify-otp", post(verify_otp))
}

/// Issues a code for either flow. Also serves as "resend": a new code
/// replaces the pending one.
#[instrument(skip(state, payload))]
pub async fn send_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<SendOtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    let email = normalize_email(&payload.email)?;
    let existing = state.users.find_by_email(&email).await?;

    match (payload.flow, existing) {
        (FlowType::Verification, Some(_)) => {
            warn!(%email, "verification requested for registered email");
            return Err(ApiError::bad_request("Email already registered"));
        }
        (FlowType::ForgotPassword, None) => {
            warn!(%email, "password reset requested for unknown email");
            return Err(ApiError::not_found("User not found"));
        }
        _ => {}
    }

    let code = state.otp.issue(&email, payload.flow).await?;
    state
        .mailer
        .send_otp(&email, &code, payload.flow, state.config.otp_ttl_minutes())
        .await
        .map_err(|e| {
            error!(error = %e, %email, "otp email failed");
            ApiError::internal("Failed to send OTP", e)
        })?;

    Ok(Json(MessageResponse::ok("OTP sent successfully")))
}

#[instrument(skip(state, payload))]
pub async fn verify_otp(
    State(state): State<AppState>,
    ApiJson(payload): ApiJson<VerifyOtpRequest>,
) -> ApiResult<Json<MessageResponse>> {
    if payload.email.trim().is_empty() || payload.otp.trim().is_empty() {
        return Err(ApiError::bad_request("Email and OTP are required"));
    }
    let email = normalize_email(&payload.email)?;
    let code = payload.otp.trim();

    match payload.flow {
        FlowType::Verification => {
            state.otp.verify(&email, code, FlowType::Verification).await?;
            state.otp.mark_email_verified(&email).await?;
            info!(%email, "email verified");
            Ok(Json(MessageResponse::ok("Email verified successfully")))
        }
        FlowType::ForgotPassword => {
            // A malformed password must not burn the code.
            let new_password = payload
                .new_password
                .as_deref()
                .filter(|p| !p.is_empty())
                .ok_or_else(|| ApiError::bad_request("New password is required"))?;
            validate_password(new_password)?;

            state.otp.verify(&email, code, FlowType::ForgotPassword).await?;

            let user = state.users.find_by_email(&email).await?.ok_or_else(|| {
                warn!(%email, "reset code verified for missing account");
                ApiError::not_found("User not found")
            })?;
            let hash = hash_password(new_password)?;
            if !state.users.update_password(user.id, &hash).await? {
                return Err(ApiError::not_found("User not found"));
            }
            info!(user_id = %user.id, "password reset");
            Ok(Json(MessageResponse::ok("Password updated successfully")))
        }
    }
}

#[cfg(test)]
mod tests {
    use axum::http::{Method, StatusCode};
    use serde_json::json;

    use crate::{
        auth::services::{hash_password, verify_password},
        otp::FlowType,
        test_support::{send_json, TestApp},
        users::NewUser,
    };

    const TTL: i64 = 600_000;

    async fn seed_user(t: &TestApp, email: &str) {
        t.state
            .users
            .create(NewUser {
                email: email.into(),
                name: None,
                password_hash: Some(hash_password("old-password").unwrap()),
                google_id: None,
                credits: 0,
            })
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn send_otp_emails_a_code() {
        let t = TestApp::new();
        let (status, body) = send_json(
            &t.app(),
            Method::POST,
            "/api/send-otp",
            Some(json!({"email": "new@example.com"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["message"], "OTP sent successfully");
        let sent = t.fakes.mailer.sent().await;
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].flow, FlowType::Verification);
        assert_eq!(sent[0].code.len(), 6);
    }

    #[tokio::test]
    async fn send_otp_requires_email() {
        let t = TestApp::new();
        let (status, body) =
            send_json(&t.app(), Method::POST, "/api/send-otp", Some(json!({})), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email is required");
    }

    #[tokio::test]
    async fn verification_refused_for_registered_email() {
        let t = TestApp::new();
        seed_user(&t, "ada@example.com").await;
        let (status, body) = send_json(
            &t.app(),
            Method::POST,
            "/api/send-otp",
            Some(json!({"email": "ada@example.com", "type": "verification"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["message"], "Email already registered");
    }

    #[tokio::test]
    async fn forgot_password_for_unknown_email_is_not_found() {
        let t = TestApp::new();
        let (status, _) = send_json(
            &t.app(),
            Method::POST,
            "/api/send-otp",
            Some(json!({"email": "ghost@example.com", "type": "forgot-password"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn mail_failure_is_a_generic_500() {
        let t = TestApp::new();
        t.fakes.mailer.set_failing(true);
        let (status, body) = send_json(
            &t.app(),
            Method::POST,
            "/api/send-otp",
            Some(json!({"email": "new@example.com"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["message"], "Failed to send OTP");
    }

    #[tokio::test]
    async fn forgot_password_reset_then_replay_fails() {
        let t = TestApp::new();
        seed_user(&t, "ada@example.com").await;
        let app = t.app();

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/send-otp",
            Some(json!({"email": "ada@example.com", "type": "forgot-password"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let code = t.fakes.mailer.last_code_for("ada@example.com").await.unwrap();

        t.fakes.clock.advance(TTL - 1);
        let body = json!({
            "email": "ada@example.com",
            "otp": code,
            "newPassword": "brand-new-pass",
            "type": "forgot-password"
        });
        let (status, resp) =
            send_json(&app, Method::POST, "/api/verify-otp", Some(body.clone()), None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["message"], "Password updated successfully");

        let user = t
            .state
            .users
            .find_by_email("ada@example.com")
            .await
            .unwrap()
            .unwrap();
        assert!(verify_password("brand-new-pass", user.password_hash.as_deref().unwrap()).unwrap());

        let (status, resp) = send_json(&app, Method::POST, "/api/verify-otp", Some(body), None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "No OTP found");
    }

    #[tokio::test]
    async fn missing_new_password_does_not_consume_code() {
        let t = TestApp::new();
        seed_user(&t, "ada@example.com").await;
        let app = t.app();
        send_json(
            &app,
            Method::POST,
            "/api/send-otp",
            Some(json!({"email": "ada@example.com", "type": "forgot-password"})),
            None,
        )
        .await;
        let code = t.fakes.mailer.last_code_for("ada@example.com").await.unwrap();

        let (status, resp) = send_json(
            &app,
            Method::POST,
            "/api/verify-otp",
            Some(json!({"email": "ada@example.com", "otp": code, "type": "forgot-password"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "New password is required");

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/verify-otp",
            Some(json!({
                "email": "ada@example.com",
                "otp": code,
                "newPassword": "brand-new-pass",
                "type": "forgot-password"
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn expired_code_reports_expired() {
        let t = TestApp::new();
        let app = t.app();
        send_json(
            &app,
            Method::POST,
            "/api/send-otp",
            Some(json!({"email": "new@example.com"})),
            None,
        )
        .await;
        let code = t.fakes.mailer.last_code_for("new@example.com").await.unwrap();
        t.fakes.clock.advance(TTL + 1);

        let (status, resp) = send_json(
            &app,
            Method::POST,
            "/api/verify-otp",
            Some(json!({"email": "new@example.com", "otp": code})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "OTP expired");
    }

    #[tokio::test]
    async fn signup_code_rejected_for_reset_without_account() {
        let t = TestApp::new();
        let app = t.app();
        send_json(
            &app,
            Method::POST,
            "/api/send-otp",
            Some(json!({"email": "new@example.com"})),
            None,
        )
        .await;
        let code = t.fakes.mailer.last_code_for("new@example.com").await.unwrap();

        let (status, resp) = send_json(
            &app,
            Method::POST,
            "/api/verify-otp",
            Some(json!({
                "email": "new@example.com",
                "otp": code,
                "newPassword": "brand-new-pass",
                "type": "forgot-password"
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "Invalid OTP type");

        // The mismatch leaves the entry for its own flow.
        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/verify-otp",
            Some(json!({"email": "new@example.com", "otp": code})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
    }

    #[tokio::test]
    async fn reset_without_pending_code_reports_no_otp() {
        let t = TestApp::new();
        let (status, resp) = send_json(
            &t.app(),
            Method::POST,
            "/api/verify-otp",
            Some(json!({
                "email": "ghost@example.com",
                "otp": "123456",
                "newPassword": "brand-new-pass",
                "type": "forgot-password"
            })),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["message"], "No OTP found");
    }

    #[tokio::test]
    async fn unknown_type_is_a_json_400() {
        let t = TestApp::new();
        let (status, resp) = send_json(
            &t.app(),
            Method::POST,
            "/api/send-otp",
            Some(json!({"email": "a@example.com", "type": "bogus"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(resp["success"], false);
        assert!(resp["message"].as_str().unwrap().contains("bogus"));
        assert!(t.fakes.mailer.sent().await.is_empty());
    }

    #[tokio::test]
    async fn verification_then_signup() {
        let t = TestApp::new();
        let app = t.app();
        send_json(
            &app,
            Method::POST,
            "/api/send-otp",
            Some(json!({"email": "new@example.com", "type": "verification"})),
            None,
        )
        .await;
        let code = t.fakes.mailer.last_code_for("new@example.com").await.unwrap();

        let (status, resp) = send_json(
            &app,
            Method::POST,
            "/api/verify-otp",
            Some(json!({"email": "new@example.com", "otp": code})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(resp["message"], "Email verified successfully");

        let (status, _) = send_json(
            &app,
            Method::POST,
            "/api/signup",
            Some(json!({"email": "new@example.com", "password": "password123"})),
            None,
        )
        .await;
        assert_eq!(status, StatusCode::CREATED);
    }
}
