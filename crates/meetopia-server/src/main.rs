mod cleanup;
mod config;

use std::net::SocketAddr;
use std::sync::Arc;

use axum::{
    Router,
    extract::{State, WebSocketUpgrade},
    http::HeaderMap,
    response::IntoResponse,
    routing::get,
};
use axum_extra::extract::CookieJar;
use tower_http::cors::CorsLayer;
use tower_http::trace::TraceLayer;
use tracing::{info, warn};

use meetopia_api::auth::{AppState, AppStateInner};
use meetopia_api::middleware::{extract_token, resolve_session};
use meetopia_api::session::SessionSettings;
use meetopia_gateway::connection::{self, SocketIdentity};
use meetopia_gateway::dispatcher::Dispatcher;
use meetopia_gateway::ice::IceConfig;
use meetopia_gateway::matchmaker::Matchmaker;

use crate::config::Config;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env if present
    let _ = dotenvy::dotenv();

    // Init logging
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "meetopia=debug,tower_http=debug".into()),
        )
        .init();

    let config = Config::from_env()?;

    // Init database
    let db = meetopia_db::Database::open(&config.db_path)?;

    // Shared state
    let state: AppState = Arc::new(AppStateInner {
        db,
        dispatcher: Dispatcher::new(),
        matchmaker: Matchmaker::default(),
        sessions: SessionSettings {
            ttl: chrono::Duration::hours(config.session_ttl_hours),
            secure_cookie: config.cookie_secure,
        },
        ice: IceConfig {
            stun_urls: config.stun_urls.clone(),
            turn_urls: config.turn_urls.clone(),
            turn_secret: config.turn_secret.clone(),
        },
    });

    if !config.turn_urls.is_empty() && config.turn_secret.is_none() {
        warn!("MEETOPIA_TURN_URLS set without MEETOPIA_TURN_SECRET, TURN disabled");
    }

    tokio::spawn(cleanup::run_cleanup_loop(
        state.clone(),
        config.cleanup_interval_secs,
    ));

    let ws_route = Router::new()
        .route("/socket", get(ws_upgrade))
        .with_state(state.clone());

    let app = Router::new()
        .merge(meetopia_api::router(state))
        .merge(ws_route)
        .layer(CorsLayer::permissive())
        .layer(TraceLayer::new_for_http());

    let addr: SocketAddr = format!("{}:{}", config.host, config.port).parse()?;
    info!("Meetopia server listening on {}", addr);

    let listener = tokio::net::TcpListener::bind(addr).await?;
    axum::serve(listener, app).await?;

    Ok(())
}

/// Sockets may connect anonymously. A valid session cookie or bearer token
/// ties the socket to its user.
async fn ws_upgrade(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
    ws: WebSocketUpgrade,
) -> impl IntoResponse {
    let identity = match extract_token(&jar, &headers) {
        Some(token) => match resolve_session(&state, &token).await {
            Ok(current) => current.map(|c| SocketIdentity {
                user_id: c.user_id,
                username: c.username,
            }),
            Err(e) => {
                warn!("Session lookup failed on socket upgrade: {}", e);
                None
            }
        },
        None => None,
    };

    let dispatcher = state.dispatcher.clone();
    ws.on_upgrade(move |socket| connection::handle_connection(socket, dispatcher, identity))
}
