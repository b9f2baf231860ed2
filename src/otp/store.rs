use std::{
    collections::HashMap,
    sync::atomic::{AtomicI64, Ordering},
};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use time::OffsetDateTime;
use tokio::sync::Mutex;

/// Which flow an OTP was issued for. A code is only valid for its own flow.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "kebab-case")]
pub enum FlowType {
    #[default]
    Verification,
    ForgotPassword,
}

impl FlowType {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlowType::Verification => "verification",
            FlowType::ForgotPassword => "forgot-password",
        }
    }
}

impl std::fmt::Display for FlowType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending code for one email. Replaced wholesale on re-issue.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OtpEntry {
    pub code: String,
    pub expires_at_ms: i64,
    pub flow: FlowType,
}

/// Outcome of checking a submitted code against the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    NotFound,
    Expired,
    FlowMismatch,
    CodeMismatch,
}

impl OtpEntry {
    /// Expiry wins over flow, flow wins over value.
    pub fn check(&self, code: &str, flow: FlowType, now_ms: i64) -> OtpCheck {
        if now_ms > self.expires_at_ms {
            OtpCheck::Expired
        } else if self.flow != flow {
            OtpCheck::FlowMismatch
        } else if self.code != code {
            OtpCheck::CodeMismatch
        } else {
            OtpCheck::Valid
        }
    }
}

/// Keyed TTL store for pending OTPs and for emails that passed verification.
///
/// Implementations must make `check_and_clear` atomic per email: a valid
/// code is consumed by exactly one caller.
#[async_trait]
pub trait OtpStore: Send + Sync {
    /// Stores `entry`, replacing any previous entry for `email`.
    async fn put(&self, email: &str, entry: OtpEntry) -> anyhow::Result<()>;

    /// Checks the submitted code and clears the entry when it is valid or expired.
    async fn check_and_clear(
        &self,
        email: &str,
        code: &str,
        flow: FlowType,
        now_ms: i64,
    ) -> anyhow::Result<OtpCheck>;

    /// Marks `email` verified until `until_ms`. Implementations may drop
    /// markers that expired before `now_ms`.
    async fn mark_verified(&self, email: &str, until_ms: i64, now_ms: i64) -> anyhow::Result<()>;

    /// Removes the verified marker, returning whether it was still live.
    async fn take_verified(&self, email: &str, now_ms: i64) -> anyhow::Result<bool>;
}

/// Single-process store. Not shared across instances and never swept;
/// expired entries are dropped when touched. Verified markers are pruned
/// whenever a new one is recorded, so abandoned signups do not pile up.
#[derive(Default)]
pub struct InMemoryOtpStore {
    entries: Mutex<HashMap<String, OtpEntry>>,
    verified: Mutex<HashMap<String, i64>>,
}

impl InMemoryOtpStore {
    pub fn new() -> Self {
        Self::default()
    }

    #[cfg(test)]
    pub(crate) async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    #[cfg(test)]
    pub(crate) async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    #[cfg(test)]
    pub(crate) async fn get(&self, email: &str) -> Option<OtpEntry> {
        self.entries.lock().await.get(email).cloned()
    }

    #[cfg(test)]
    pub(crate) async fn verified_len(&self) -> usize {
        self.verified.lock().await.len()
    }
}

#[async_trait]
impl OtpStore for InMemoryOtpStore {
    async fn put(&self, email: &str, entry: OtpEntry) -> anyhow::Result<()> {
        self.entries.lock().await.insert(email.to_string(), entry);
        Ok(())
    }

    async fn check_and_clear(
        &self,
        email: &str,
        code: &str,
        flow: FlowType,
        now_ms: i64,
    ) -> anyhow::Result<OtpCheck> {
        let mut entries = self.entries.lock().await;
        let outcome = match entries.get(email) {
            None => OtpCheck::NotFound,
            Some(entry) => entry.check(code, flow, now_ms),
        };
        if matches!(outcome, OtpCheck::Valid | OtpCheck::Expired) {
            entries.remove(email);
        }
        Ok(outcome)
    }

    async fn mark_verified(&self, email: &str, until_ms: i64, now_ms: i64) -> anyhow::Result<()> {
        let mut verified = self.verified.lock().await;
        verified.retain(|_, until| *until >= now_ms);
        verified.insert(email.to_string(), until_ms);
        Ok(())
    }

    async fn take_verified(&self, email: &str, now_ms: i64) -> anyhow::Result<bool> {
        let until = self.verified.lock().await.remove(email);
        Ok(matches!(until, Some(until) if now_ms <= until))
    }
}

/// Source of "now" in epoch milliseconds.
pub trait Clock: Send + Sync {
    fn now_ms(&self) -> i64;
}

pub struct SystemClock;

impl Clock for SystemClock {
    fn now_ms(&self) -> i64 {
        (OffsetDateTime::now_utc().unix_timestamp_nanos() / 1_000_000) as i64
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: AtomicI64,
}

impl ManualClock {
    pub fn new(start_ms: i64) -> Self {
        Self {
            now: AtomicI64::new(start_ms),
        }
    }

    pub fn advance(&self, ms: i64) {
        self.now.fetch_add(ms, Ordering::SeqCst);
    }
}

impl Clock for ManualClock {
    fn now_ms(&self) -> i64 {
        self.now.load(Ordering::SeqCst)
    }
}
