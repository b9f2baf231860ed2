use std::sync::Arc;

use rand::{rngs::OsRng, Rng};
use tracing::{debug, info};

use super::store::{Clock, FlowType, OtpCheck, OtpEntry, OtpStore};
use crate::error::ApiError;

#[derive(Debug, thiserror::Error)]
pub enum OtpError {
    #[error("No OTP found")]
    NotFound,

    #[error("OTP expired")]
    Expired,

    #[error("Invalid OTP type")]
    FlowMismatch,

    #[error("Invalid OTP")]
    CodeMismatch,

    #[error("otp store failure: {0}")]
    Store(#[from] anyhow::Error),
}

impl From<OtpError> for ApiError {
    fn from(e: OtpError) -> Self {
        match e {
            OtpError::Store(source) => ApiError::internal("Server error", source),
            other => ApiError::bad_request(other.to_string()),
        }
    }
}

/// Random 6-digit code from the OS CSPRNG.
pub fn generate_code() -> String {
    OsRng.gen_range(100_000..=999_999).to_string()
}

/// Issues and verifies OTPs on top of an [`OtpStore`].
#[derive(Clone)]
pub struct OtpService {
    store: Arc<dyn OtpStore>,
    clock: Arc<dyn Clock>,
    ttl_ms: i64,
}

impl OtpService {
    pub fn new(store: Arc<dyn OtpStore>, clock: Arc<dyn Clock>, ttl_ms: i64) -> Self {
        Self {
            store,
            clock,
            ttl_ms,
        }
    }

    pub fn ttl_ms(&self) -> i64 {
        self.ttl_ms
    }

    /// Stores a fresh code for `email`, invalidating any earlier one.
    pub async fn issue(&self, email: &str, flow: FlowType) -> Result<String, OtpError> {
        let code = generate_code();
        let entry = OtpEntry {
            code: code.clone(),
            expires_at_ms: self.clock.now_ms() + self.ttl_ms,
            flow,
        };
        self.store.put(email, entry).await?;
        info!(%email, %flow, "otp issued");
        Ok(code)
    }

    /// Consumes the pending code for `email` if it matches.
    pub async fn verify(&self, email: &str, code: &str, flow: FlowType) -> Result<(), OtpError> {
        let outcome = self
            .store
            .check_and_clear(email, code, flow, self.clock.now_ms())
            .await?;
        debug!(%email, %flow, ?outcome, "otp checked");
        match outcome {
            OtpCheck::Valid => Ok(()),
            OtpCheck::NotFound => Err(OtpError::NotFound),
            OtpCheck::Expired => Err(OtpError::Expired),
            OtpCheck::FlowMismatch => Err(OtpError::FlowMismatch),
            OtpCheck::CodeMismatch => Err(OtpError::CodeMismatch),
        }
    }

    /// Records that `email` passed verification; valid for one TTL window.
    pub async fn mark_email_verified(&self, email: &str) -> Result<(), OtpError> {
        let now = self.clock.now_ms();
        self.store.mark_verified(email, now + self.ttl_ms, now).await?;
        Ok(())
    }

    pub async fn consume_email_verification(&self, email: &str) -> Result<bool, OtpError> {
        Ok(self.store.take_verified(email, self.clock.now_ms()).await?)
    }
}
