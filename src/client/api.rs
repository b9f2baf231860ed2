use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use serde::{de::DeserializeOwned, Serialize};
use tracing::{debug, instrument};

use super::{flow::AuthApi, ClientError};
use crate::{
    auth::dto::{AuthResponse, LoginRequest, SignupRequest},
    error::ErrorBody,
    otp::dto::{MessageResponse, SendOtpRequest, VerifyOtpRequest},
};

static APP_USER_AGENT: &str = concat!(env!("CARGO_PKG_NAME"), "/", env!("CARGO_PKG_VERSION"));

const REQUEST_TIMEOUT: Duration = Duration::from_secs(8);

/// HTTP client for the JSON API.
#[derive(Clone)]
pub struct ApiClient {
    http: Client,
    base: String,
}

impl ApiClient {
    pub fn new(base: &str) -> Result<Self, ClientError> {
        let http = Client::builder()
            .user_agent(APP_USER_AGENT)
            .timeout(REQUEST_TIMEOUT)
            .build()?;
        Ok(Self::with_client(http, base))
    }

    pub fn with_client(http: Client, base: &str) -> Self {
        Self {
            http,
            base: base.trim_end_matches('/').to_string(),
        }
    }

    #[instrument(skip(self, body))]
    async fn post<B, R>(&self, path: &str, body: &B) -> Result<R, ClientError>
    where
        B: Serialize + Sync,
        R: DeserializeOwned,
    {
        let url = format!("{}{path}", self.base);
        let res = self.http.post(&url).json(body).send().await?;

        let status = res.status();
        if !status.is_success() {
            let message = match res.json::<ErrorBody>().await {
                Ok(body) => body.message,
                Err(_) => status
                    .canonical_reason()
                    .unwrap_or("Request failed")
                    .to_string(),
            };
            debug!(%status, %message, "api call rejected");
            return Err(ClientError::Api {
                status: status.as_u16(),
                message,
            });
        }
        Ok(res.json().await?)
    }
}

#[async_trait]
impl AuthApi for ApiClient {
    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError> {
        self.post("/api/login", req).await
    }

    async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse, ClientError> {
        self.post("/api/signup", req).await
    }

    async fn send_otp(&self, req: &SendOtpRequest) -> Result<MessageResponse, ClientError> {
        self.post("/api/send-otp", req).await
    }

    async fn verify_otp(&self, req: &VerifyOtpRequest) -> Result<MessageResponse, ClientError> {
        self.post("/api/verify-otp", req).await
    }
}
