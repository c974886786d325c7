use chrono::Utc;
use cpapi_oauth::{Authenticator, Config, SessionManager, SessionState, build_client};
use miette::{IntoDiagnostic, Result, miette};
use tracing_subscriber::EnvFilter;

fn enter(state: &mut SessionState, next: SessionState) {
    tracing::info!(from = %state, to = %next, "session state changed");
    *state = next;
}

/// Only a successful logout ends the session
fn record_logout(state: &mut SessionState, outcome: &cpapi_oauth::Result<()>) {
    match outcome {
        Ok(()) => enter(state, SessionState::Ended),
        Err(e) => tracing::error!(state = %state, "logout failed: {}", e),
    }
}

async fn shutdown_signal() {
    if let Err(e) = tokio::signal::ctrl_c().await {
        tracing::warn!("failed to listen for ctrl-c, stopping keep-alive: {}", e);
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    // Configuration and key problems abort here, before any request is sent
    let config = Config::from_env().into_diagnostic()?;
    let http = build_client(&config.gateway).into_diagnostic()?;
    let auth = Authenticator::from_config(&config, http.clone()).into_diagnostic()?;
    let sessions = SessionManager::new(http, &config.gateway);

    let mut state = SessionState::Uninitialized;

    let access_token = auth.access_token(Utc::now()).await.into_diagnostic()?;
    enter(&mut state, SessionState::HasAccessToken);

    let bearer = auth
        .bearer_token(&access_token, Utc::now())
        .await
        .into_diagnostic()?
        .ok_or_else(|| miette!("gateway refused to issue a bearer token"))?;
    enter(&mut state, SessionState::HasBearerToken);

    let validation = sessions.validate_sso(&bearer).await.into_diagnostic()?;
    tracing::debug!("sso validation: {}", validation);

    sessions.ssodh_init(&bearer).await.into_diagnostic()?;
    enter(&mut state, SessionState::SessionActive);

    tracing::info!(
        "keeping session alive every {}s, press ctrl-c to log out",
        config.gateway.tickle_interval.as_secs()
    );
    let kept = sessions
        .keep_alive(&bearer, config.gateway.tickle_interval, shutdown_signal())
        .await;

    let logout = sessions.logout(&bearer).await;
    record_logout(&mut state, &logout);

    if let Some(session) = kept.into_diagnostic()? {
        tracing::info!("last session id: {}", session);
    }
    logout.into_diagnostic()
}
