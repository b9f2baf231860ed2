use std::{sync::Arc, time::Duration};

use crate::{
    config::AppConfig,
    mail::{Mailer, SmtpMailer},
    oauth::{GoogleClient, GoogleIdentity},
    otp::{InMemoryOtpStore, OtpService, SystemClock},
    payments::{OrderRepository, PaymentGateway, PgOrderRepository, RazorpayClient},
    users::{PgUserRepository, UserRepository},
};

/// Shared collaborators handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub config: Arc<AppConfig>,
    pub users: Arc<dyn UserRepository>,
    pub orders: Arc<dyn OrderRepository>,
    pub otp: OtpService,
    pub mailer: Arc<dyn Mailer>,
    pub payments: Arc<dyn PaymentGateway>,
    pub google: Arc<dyn GoogleIdentity>,
}

impl AppState {
    pub async fn init() -> anyhow::Result<Self> {
        let config = Arc::new(AppConfig::from_env()?);

        let db = sqlx::postgres::PgPoolOptions::new()
            .max_connections(10)
            .connect(&config.database_url)
            .await?;

        if let Err(e) = sqlx::migrate!("./migrations").run(&db).await {
            tracing::warn!(error = %e, "migration failed; continuing");
        }

        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(15))
            .build()?;

        let mailer = SmtpMailer::new(&config.smtp)?;
        if !mailer.test_connection().await {
            tracing::warn!(host = %config.smtp.host, "smtp not reachable at startup");
        }

        let otp = OtpService::new(
            Arc::new(InMemoryOtpStore::new()),
            Arc::new(SystemClock),
            config.otp.ttl_ms,
        );

        Ok(Self {
            users: Arc::new(PgUserRepository::new(db.clone())),
            orders: Arc::new(PgOrderRepository::new(db)),
            otp,
            mailer: Arc::new(mailer),
            payments: Arc::new(RazorpayClient::new(http.clone(), &config.razorpay)),
            google: Arc::new(GoogleClient::new(http, &config.google)),
            config,
        })
    }
}

#[cfg(test)]
pub use fake::Fakes;
