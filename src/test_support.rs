use axum::{
    body::Body,
    extract::FromRef,
    http::{header, Method, Request, StatusCode},
    Router,
};
use serde_json::Value;
use tower::ServiceExt;

use crate::{
    app::build_app,
    auth::{services::hash_password, JwtKeys},
    state::{AppState, Fakes},
    users::{NewUser, User},
};

pub struct TestApp {
    pub state: AppState,
    pub fakes: Fakes,
}

impl TestApp {
    pub fn new() -> Self {
        let (state, fakes) = AppState::fake();
        Self { state, fakes }
    }

    pub fn app(&self) -> Router {
        build_app(self.state.clone())
    }

    /// Inserts a password account and returns it with a valid bearer token.
    pub async fn seed_user(&self, email: &str, credits: i64) -> (User, String) {
        let user = self
            .state
            .users
            .create(NewUser {
                email: email.into(),
                name: Some("Test".into()),
                password_hash: Some(hash_password("password123").unwrap()),
                google_id: None,
                credits,
            })
            .await
            .unwrap();
        let token = JwtKeys::from_ref(&self.state).sign(user.id).unwrap();
        (user, token)
    }
}

/// Sends a request through the router and returns status plus JSON body
/// (`Value::Null` when the body is empty or not JSON).
pub async fn send_json(
    app: &Router,
    method: Method,
    uri: &str,
    body: Option<Value>,
    token: Option<&str>,
) -> (StatusCode, Value) {
    let mut req = Request::builder().method(method).uri(uri);
    if let Some(token) = token {
        req = req.header(header::AUTHORIZATION, format!("Bearer {token}"));
    }
    let req = match body {
        Some(v) => req
            .header(header::CONTENT_TYPE, "application/json")
            .body(Body::from(v.to_string()))
            .unwrap(),
        None => req.body(Body::empty()).unwrap(),
    };

    let res = app.clone().oneshot(req).await.unwrap();
    let status = res.status();
    let bytes = axum::body::to_bytes(res.into_body(), usize::MAX)
        .await
        .unwrap();
    let json = serde_json::from_slice(&bytes).unwrap_or(Value::Null);
    (status, json)
}
