pub mod app;
pub mod auth;
pub mod client;
pub mod config;
pub mod error;
pub mod mail;
pub mod oauth;
pub mod otp;
pub mod payments;
pub mod profile;
pub mod state;
pub mod users;

#[cfg(test)]
mod test_support;
