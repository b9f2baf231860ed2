//! Client side of the auth protocol: an HTTP client for the API and the
//! state machines a login page drives on top of it.

pub mod api;
pub mod flow;
pub mod single_flight;

pub use api::ApiClient;
pub use flow::{AuthApi, AuthFlow, AuthMode, AuthState, ForgotPasswordFlow, ForgotPasswordState, Session};
pub use single_flight::{FlightGuard, FormId, SingleFlight};

#[derive(Debug, thiserror::Error)]
pub enum ClientError {
    /// The same form already has a request outstanding.
    #[error("request already in progress")]
    InFlight,

    #[error("{0}")]
    InvalidInput(&'static str),

    /// The call is not allowed in the flow's current state.
    #[error("not allowed in the current step")]
    InvalidState,

    /// The server answered with a non-success status; `message` is what it said.
    #[error("{message}")]
    Api { status: u16, message: String },

    #[error(transparent)]
    Transport(#[from] reqwest::Error),
}
