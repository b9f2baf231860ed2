use anyhow::Context;
use serde::Deserialize;

#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    pub secret: String,
    pub issuer: String,
    pub audience: String,
    pub ttl_minutes: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct OtpConfig {
    /// Lifetime of an issued code, in milliseconds.
    pub ttl_ms: i64,
}

#[derive(Debug, Clone, Deserialize)]
pub struct SmtpConfig {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    pub from_name: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RazorpayConfig {
    pub key_id: String,
    pub key_secret: String,
    pub api_base: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct GoogleConfig {
    pub client_id: String,
    pub client_secret: String,
    pub callback_url: String,
}

#[derive(Debug, Clone, Deserialize)]
pub struct AppConfig {
    pub database_url: String,
    pub jwt: JwtConfig,
    pub otp: OtpConfig,
    pub smtp: SmtpConfig,
    pub razorpay: RazorpayConfig,
    pub google: GoogleConfig,
    pub client_url: String,
    pub signup_credits: i64,
}

fn required(key: &str) -> anyhow::Result<String> {
    std::env::var(key).with_context(|| format!("{key} must be set"))
}

fn parsed_or<T: std::str::FromStr>(key: &str, default: T) -> T {
    std::env::var(key)
        .ok()
        .and_then(|v| v.parse::<T>().ok())
        .unwrap_or(default)
}

impl AppConfig {
    pub fn from_env() -> anyhow::Result<Self> {
        let database_url = required("DATABASE_URL")?;
        let jwt = JwtConfig {
            secret: required("JWT_SECRET")?,
            issuer: std::env::var("JWT_ISSUER").unwrap_or_else(|_| "astrapix".into()),
            audience: std::env::var("JWT_AUDIENCE").unwrap_or_else(|_| "astrapix-users".into()),
            ttl_minutes: parsed_or("JWT_TTL_MINUTES", 60 * 24 * 7),
        };
        let otp = OtpConfig {
            ttl_ms: parsed_or("OTP_EXPIRE_TIME", 10 * 60 * 1000),
        };
        let smtp = SmtpConfig {
            host: std::env::var("SMTP_HOST").unwrap_or_else(|_| "smtp.gmail.com".into()),
            port: parsed_or("SMTP_PORT", 587),
            username: required("EMAIL_USER")?,
            password: required("EMAIL_PASS")?,
            from_name: std::env::var("MAIL_FROM_NAME").unwrap_or_else(|_| "AstraPix".into()),
        };
        let razorpay = RazorpayConfig {
            key_id: required("RAZORPAY_KEY_ID")?,
            key_secret: required("RAZORPAY_KEY_SECRET")?,
            api_base: std::env::var("RAZORPAY_API_BASE")
                .unwrap_or_else(|_| "https://api.razorpay.com/v1".into()),
        };
        let google = GoogleConfig {
            client_id: required("GOOGLE_CLIENT_ID")?,
            client_secret: required("GOOGLE_CLIENT_SECRET")?,
            callback_url: required("GOOGLE_CALLBACK_URL")?,
        };
        Ok(Self {
            database_url,
            jwt,
            otp,
            smtp,
            razorpay,
            google,
            client_url: std::env::var("CLIENT_URL")
                .unwrap_or_else(|_| "http://localhost:5173".into()),
            signup_credits: parsed_or("SIGNUP_CREDITS", 5),
        })
    }

    /// OTP lifetime rounded up to whole minutes, for user-facing copy.
    pub fn otp_ttl_minutes(&self) -> i64 {
        (self.otp.ttl_ms + 59_999) / 60_000
    }
}
