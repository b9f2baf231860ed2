pub mod google;
pub mod handlers;

pub use google::{GoogleClient, GoogleIdentity, GoogleProfile};

use crate::state::AppState;
use axum::Router;

pub fn router() -> Router<AppState> {
    handlers::oauth_routes()
}
