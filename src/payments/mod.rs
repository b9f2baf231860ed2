use crate::state::AppState;
use axum::Router;

pub mod dto;
pub mod gateway;
pub mod handlers;
pub mod plans;
pub mod repo;
pub mod repo_types;

pub use gateway::{PaymentGateway, RazorpayClient};
pub use repo::{InMemoryOrderRepository, OrderRepository, PgOrderRepository};

pub fn router() -> Router<AppState> {
    handlers::payment_routes()
}
