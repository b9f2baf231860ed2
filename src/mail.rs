use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

use crate::{config::SmtpConfig, otp::FlowType};

/// Outbound email collaborator.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send_otp(
        &self,
        to: &str,
        code: &str,
        flow: FlowType,
        ttl_minutes: i64,
    ) -> anyhow::Result<()>;
}

/// Subject and HTML body of an OTP email.
pub fn render_otp_email(brand: &str, code: &str, flow: FlowType, ttl_minutes: i64) -> (String, String) {
    let (subject, heading, lead) = match flow {
        FlowType::Verification => (
            format!("Verify your {brand} account"),
            format!("Welcome to {brand}!"),
            "Your verification code is:",
        ),
        FlowType::ForgotPassword => (
            format!("Reset your {brand} password"),
            "Password reset requested".to_string(),
            "Use this code to set a new password:",
        ),
    };
    let html = format!(
        r#"<div style="font-family: Arial, sans-serif; max-width: 600px; margin: 0 auto;">
  <h2 style="color: #6b46c1;">{heading}</h2>
  <p>{lead}</p>
  <h1 style="color: #4c1d95; letter-spacing: 5px;">{code}</h1>
  <p>Code expires in {ttl_minutes} minutes.</p>
</div>"#
    );
    (subject, html)
}

pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
    brand: String,
}

impl SmtpMailer {
    /// STARTTLS relay with username/password auth.
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let creds = Credentials::new(cfg.username.clone(), cfg.password.clone());
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)?
            .port(cfg.port)
            .credentials(creds)
            .build();
        let from: Mailbox = format!("{} <{}>", cfg.from_name, cfg.username).parse()?;
        Ok(Self {
            transport,
            from,
            brand: cfg.from_name.clone(),
        })
    }

    /// Opens a connection to check host and credentials.
    pub async fn test_connection(&self) -> bool {
        match self.transport.test_connection().await {
            Ok(ok) => ok,
            Err(e) => {
                error!(error = %e, "smtp connection check failed");
                false
            }
        }
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send_otp(
        &self,
        to: &str,
        code: &str,
        flow: FlowType,
        ttl_minutes: i64,
    ) -> anyhow::Result<()> {
        let (subject, html) = render_otp_email(&self.brand, code, flow, ttl_minutes);
        let message = Message::builder()
            .from(self.from.clone())
            .to(to.parse()?)
            .subject(subject)
            .header(ContentType::TEXT_HTML)
            .body(html)?;
        let response = self.transport.send(message).await?;
        info!(%to, %flow, smtp_code = %response.code(), "otp email sent");
        Ok(())
    }
}

#[cfg(test)]
pub use fake::RecordingMailer;
