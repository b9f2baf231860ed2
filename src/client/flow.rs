use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::Mutex;
use tracing::debug;

use super::{
    single_flight::{FormId, SingleFlight},
    ClientError,
};
use crate::{
    auth::{
        dto::{AuthResponse, LoginRequest, SignupRequest},
        services::MIN_PASSWORD_LEN,
    },
    otp::{
        dto::{MessageResponse, SendOtpRequest, VerifyOtpRequest},
        FlowType,
    },
    users::PublicUser,
};

/// Backend calls the flows depend on.
#[async_trait]
pub trait AuthApi: Send + Sync {
    async fn login(&self, req: &LoginRequest) -> Result<AuthResponse, ClientError>;
    async fn signup(&self, req: &SignupRequest) -> Result<AuthResponse, ClientError>;
    async fn send_otp(&self, req: &SendOtpRequest) -> Result<MessageResponse, ClientError>;
    async fn verify_otp(&self, req: &VerifyOtpRequest) -> Result<MessageResponse, ClientError>;
}

#[derive(Debug, Clone, PartialEq)]
pub struct Session {
    pub token: String,
    pub user: PublicUser,
}

impl From<AuthResponse> for Session {
    fn from(r: AuthResponse) -> Self {
        Self {
            token: r.token,
            user: r.user,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum AuthMode {
    #[default]
    Login,
    Signup,
}

#[derive(Debug, Clone, PartialEq)]
pub enum AuthState {
    CredentialsEntry,
    OtpPending { email: String },
    Resolved(Session),
}

fn is_otp_code(code: &str) -> bool {
    code.len() == 6 && code.bytes().all(|b| b.is_ascii_digit())
}

/// Signup details held while the email is being verified.
#[derive(Debug, Clone)]
struct PendingSignup {
    email: String,
    password: String,
    name: Option<String>,
    email_verified: bool,
}

#[derive(Debug)]
struct AuthInner {
    mode: AuthMode,
    state: AuthState,
    pending: Option<PendingSignup>,
}

/// Login/signup form: `CredentialsEntry -> OtpPending -> Resolved`.
/// A failed call leaves the state as it was.
pub struct AuthFlow {
    api: Arc<dyn AuthApi>,
    flights: SingleFlight<FormId>,
    inner: Mutex<AuthInner>,
}

impl AuthFlow {
    pub fn new(api: Arc<dyn AuthApi>, flights: SingleFlight<FormId>) -> Self {
        Self {
            api,
            flights,
            inner: Mutex::new(AuthInner {
                mode: AuthMode::default(),
                state: AuthState::CredentialsEntry,
                pending: None,
            }),
        }
    }

    pub async fn state(&self) -> AuthState {
        self.inner.lock().await.state.clone()
    }

    pub async fn mode(&self) -> AuthMode {
        self.inner.lock().await.mode
    }

    /// Switches between login and signup and returns to credentials entry.
    /// Refused while a submission of this form is outstanding.
    pub async fn toggle_mode(&self) -> Result<AuthMode, ClientError> {
        let _flight = self
            .flights
            .try_acquire(FormId::Auth)
            .ok_or(ClientError::InFlight)?;
        let mut inner = self.inner.lock().await;
        inner.mode = match inner.mode {
            AuthMode::Login => AuthMode::Signup,
            AuthMode::Signup => AuthMode::Login,
        };
        inner.state = AuthState::CredentialsEntry;
        inner.pending = None;
        Ok(inner.mode)
    }

    /// Login mode signs in directly. Signup mode requests a verification
    /// code and moves to `OtpPending`.
    pub async fn submit_credentials(
        &self,
        email: &str,
        password: &str,
        name: Option<&str>,
    ) -> Result<AuthState, ClientError> {
        let _flight = self
            .flights
            .try_acquire(FormId::Auth)
            .ok_or(ClientError::InFlight)?;

        let email = email.trim();
        if email.is_empty() || password.is_empty() {
            return Err(ClientError::InvalidInput("Email and password are required"));
        }

        let mode = {
            let inner = self.inner.lock().await;
            if !matches!(inner.state, AuthState::CredentialsEntry) {
                return Err(ClientError::InvalidState);
            }
            inner.mode
        };

        let next = match mode {
            AuthMode::Login => {
                let resp = self
                    .api
                    .login(&LoginRequest {
                        email: email.to_string(),
                        password: password.to_string(),
                    })
                    .await?;
                debug!(user_id = %resp.user.id, "logged in");
                (AuthState::Resolved(resp.into()), None)
            }
            AuthMode::Signup => {
                if password.chars().count() < MIN_PASSWORD_LEN {
                    return Err(ClientError::InvalidInput(
                        "Password must be at least 8 characters",
                    ));
                }
                self.api
                    .send_otp(&SendOtpRequest {
                        email: email.to_string(),
                        flow: FlowType::Verification,
                    })
                    .await?;
                let pending = PendingSignup {
                    email: email.to_string(),
                    password: password.to_string(),
                    name: name.map(str::trim).filter(|n| !n.is_empty()).map(String::from),
                    email_verified: false,
                };
                (
                    AuthState::OtpPending {
                        email: email.to_string(),
                    },
                    Some(pending),
                )
            }
        };

        let mut inner = self.inner.lock().await;
        inner.state = next.0.clone();
        inner.pending = next.1;
        Ok(next.0)
    }

    /// Verifies the emailed code, then creates the account.
    pub async fn verify_otp(&self, code: &str) -> Result<AuthState, ClientError> {
        let _flight = self
            .flights
            .try_acquire(FormId::Auth)
            .ok_or(ClientError::InFlight)?;

        let code = code.trim();
        if !is_otp_code(code) {
            return Err(ClientError::InvalidInput("Enter the 6-digit code"));
        }
        let pending = self.pending().await?;

        // A previous attempt may have verified the email and then failed at
        // signup; the code is spent by then.
        if !pending.email_verified {
            self.api
                .verify_otp(&VerifyOtpRequest {
                    email: pending.email.clone(),
                    otp: code.to_string(),
                    new_password: None,
                    flow: FlowType::Verification,
                })
                .await?;
            if let Some(p) = self.inner.lock().await.pending.as_mut() {
                p.email_verified = true;
            }
        }

        let resp = self
            .api
            .signup(&SignupRequest {
                email: pending.email,
                password: pending.password,
                name: pending.name,
            })
            .await?;
        debug!(user_id = %resp.user.id, "signed up");

        let next = AuthState::Resolved(resp.into());
        let mut inner = self.inner.lock().await;
        inner.state = next.clone();
        inner.pending = None;
        Ok(next)
    }

    /// Requests a fresh code; the state does not change.
    pub async fn resend_otp(&self) -> Result<(), ClientError> {
        let _flight = self
            .flights
            .try_acquire(FormId::Auth)
            .ok_or(ClientError::InFlight)?;
        let pending = self.pending().await?;
        self.api
            .send_otp(&SendOtpRequest {
                email: pending.email,
                flow: FlowType::Verification,
            })
            .await?;
        if let Some(p) = self.inner.lock().await.pending.as_mut() {
            p.email_verified = false;
        }
        Ok(())
    }

    async fn pending(&self) -> Result<PendingSignup, ClientError> {
        let inner = self.inner.lock().await;
        match (&inner.state, &inner.pending) {
            (AuthState::OtpPending { .. }, Some(p)) => Ok(p.clone()),
            _ => Err(ClientError::InvalidState),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ForgotPasswordState {
    EmailEntry,
    ResetEntry { email: String },
    Done,
}

/// Password reset form: `EmailEntry -> ResetEntry -> Done`.
pub struct ForgotPasswordFlow {
    api: Arc<dyn AuthApi>,
    flights: SingleFlight<FormId>,
    state: Mutex<ForgotPasswordState>,
}

impl ForgotPasswordFlow {
    pub fn new(api: Arc<dyn AuthApi>, flights: SingleFlight<FormId>) -> Self {
        Self {
            api,
            flights,
            state: Mutex::new(ForgotPasswordState::EmailEntry),
        }
    }

    pub async fn state(&self) -> ForgotPasswordState {
        self.state.lock().await.clone()
    }

    pub async fn send_otp(&self, email: &str) -> Result<ForgotPasswordState, ClientError> {
        let _flight = self
            .flights
            .try_acquire(FormId::ForgotPassword)
            .ok_or(ClientError::InFlight)?;

        let email = email.trim();
        if email.is_empty() {
            return Err(ClientError::InvalidInput("Email is required"));
        }
        if *self.state.lock().await != ForgotPasswordState::EmailEntry {
            return Err(ClientError::InvalidState);
        }

        self.api
            .send_otp(&SendOtpRequest {
                email: email.to_string(),
                flow: FlowType::ForgotPassword,
            })
            .await?;

        let next = ForgotPasswordState::ResetEntry {
            email: email.to_string(),
        };
        *self.state.lock().await = next.clone();
        Ok(next)
    }

    pub async fn reset(
        &self,
        code: &str,
        new_password: &str,
    ) -> Result<ForgotPasswordState, ClientError> {
        let _flight = self
            .flights
            .try_acquire(FormId::ForgotPassword)
            .ok_or(ClientError::InFlight)?;

        let code = code.trim();
        if !is_otp_code(code) {
            return Err(ClientError::InvalidInput("Enter the 6-digit code"));
        }
        if new_password.chars().count() < MIN_PASSWORD_LEN {
            return Err(ClientError::InvalidInput(
                "Password must be at least 8 characters",
            ));
        }
        let email = self.reset_email().await?;

        self.api
            .verify_otp(&VerifyOtpRequest {
                email,
                otp: code.to_string(),
                new_password: Some(new_password.to_string()),
                flow: FlowType::ForgotPassword,
            })
            .await?;

        *self.state.lock().await = ForgotPasswordState::Done;
        Ok(ForgotPasswordState::Done)
    }

    pub async fn resend_otp(&self) -> Result<(), ClientError> {
        let _flight = self
            .flights
            .try_acquire(FormId::ForgotPassword)
            .ok_or(ClientError::InFlight)?;
        let email = self.reset_email().await?;
        self.api
            .send_otp(&SendOtpRequest {
                email,
                flow: FlowType::ForgotPassword,
            })
            .await?;
        Ok(())
    }

    async fn reset_email(&self) -> Result<String, ClientError> {
        match &*self.state.lock().await {
            ForgotPasswordState::ResetEntry { email } => Ok(email.clone()),
            _ => Err(ClientError::InvalidState),
        }
    }
}
