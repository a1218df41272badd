use axum::{Json, extract::State, http::HeaderMap, response::IntoResponse};
use axum_extra::extract::CookieJar;

use meetopia_types::api::IceServersResponse;

use crate::auth::AppState;
use crate::error::Result;
use crate::middleware::{extract_token, resolve_session};

/// STUN/TURN list for the browser. Signed-in callers get TURN credentials
/// bound to their user id, everyone else to "guest".
pub async fn ice_servers(
    State(state): State<AppState>,
    jar: CookieJar,
    headers: HeaderMap,
) -> Result<impl IntoResponse> {
    let current = match extract_token(&jar, &headers) {
        Some(token) => resolve_session(&state, &token).await?,
        None => None,
    };
    let label = current
        .map(|c| c.user_id.to_string())
        .unwrap_or_else(|| "guest".to_string());

    let ice_servers = state.ice.servers_for(&label, chrono::Utc::now())?;
    Ok(Json(IceServersResponse { ice_servers }))
}
