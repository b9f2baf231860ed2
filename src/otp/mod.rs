use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod handlers;
pub mod service;
pub mod store;

pub use service::{OtpError, OtpService};
pub use store::{Clock, FlowType, InMemoryOtpStore, ManualClock, OtpEntry, OtpStore, SystemClock};

pub fn router() -> Router<AppState> {
    handlers::otp_routes()
}
