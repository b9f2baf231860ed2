use axum::{
    extract::{FromRef, Query, State},
    response::Redirect,
    routing::get,
    Router,
};
use serde::Deserialize;
use tracing::{error, info, instrument, warn};
use url::Url;

use super::google::GoogleProfile;
use crate::{
    auth::{handlers::issue_session, services::normalize_email, JwtKeys},
    state::AppState,
    users::{NewUser, User},
};

pub fn oauth_routes() -> Router<AppState> {
    Router::new()
        .route("/google", get(google_start))
        .route("/google/callback", get(google_callback))
}

#[derive(Debug, Deserialize)]
pub struct CallbackQuery {
    pub code: Option<String>,
    pub state: Option<String>,
    pub error: Option<String>,
}

fn failure_redirect(client_url: &str) -> Redirect {
    Redirect::to(&format!(
        "{}/auth?error=Authentication%20failed",
        client_url.trim_end_matches('/')
    ))
}

#[instrument(skip(state))]
pub async fn google_start(State(state): State<AppState>) -> Redirect {
    let target = JwtKeys::from_ref(&state)
        .sign_oauth_state()
        .and_then(|st| state.google.authorize_url(&st));
    match target {
        Ok(url) => Redirect::to(&url),
        Err(e) => {
            error!(error = %e, "could not build google consent url");
            failure_redirect(&state.config.client_url)
        }
    }
}

#[instrument(skip(state, query))]
pub async fn google_callback(
    State(state): State<AppState>,
    Query(query): Query<CallbackQuery>,
) -> Redirect {
    match complete_login(&state, query).await {
        Ok(url) => Redirect::to(&url),
        Err(e) => {
            warn!(error = %format!("{e:#}"), "google login failed");
            failure_redirect(&state.config.client_url)
        }
    }
}

/// Runs the callback and returns the client URL carrying the new session.
async fn complete_login(state: &AppState, query: CallbackQuery) -> anyhow::Result<String> {
    if let Some(err) = query.error {
        anyhow::bail!("provider returned error: {err}");
    }
    let st = query.state.ok_or_else(|| anyhow::anyhow!("missing state"))?;
    JwtKeys::from_ref(state).verify_oauth_state(&st)?;
    let code = query.code.ok_or_else(|| anyhow::anyhow!("missing code"))?;

    let profile = state.google.exchange(&code).await?;
    let user = find_or_create(state, profile).await?;

    let session = issue_session(state, &user).map_err(anyhow::Error::new)?;
    let user_json = serde_json::to_string(&session.user)?;
    let base = format!("{}/oauth-callback", state.config.client_url.trim_end_matches('/'));
    let url = Url::parse_with_params(
        &base,
        &[("token", session.token.as_str()), ("user", user_json.as_str())],
    )?;
    info!(user_id = %user.id, "google login");
    Ok(url.into())
}

/// Google id first, then an existing account with the same email, else a
/// fresh passwordless account.
async fn find_or_create(state: &AppState, profile: GoogleProfile) -> anyhow::Result<User> {
    if let Some(user) = state.users.find_by_google_id(&profile.sub).await? {
        return Ok(user);
    }
    anyhow::ensure!(profile.email_verified, "google email not verified");
    let email = normalize_email(&profile.email).map_err(anyhow::Error::new)?;

    if let Some(mut user) = state.users.find_by_email(&email).await? {
        state.users.link_google(user.id, &profile.sub).await?;
        info!(user_id = %user.id, "google account linked");
        user.google_id = Some(profile.sub);
        return Ok(user);
    }

    let name = profile
        .name
        .map(|n| n.trim().to_string())
        .filter(|n| !n.is_empty());
    let user = state
        .users
        .create(NewUser {
            email,
            name,
            password_hash: None,
            google_id: Some(profile.sub),
            credits: state.config.signup_credits,
        })
        .await?;
    info!(user_id = %user.id, "user registered via google");
    Ok(user)
}
