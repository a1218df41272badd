use axum::{
    extract::{Request, State},
    http::{HeaderMap, header},
    middleware::Next,
    response::Response,
};
use axum_extra::extract::CookieJar;
use tracing::debug;
use uuid::Uuid;

use crate::auth::AppState;
use crate::error::{ApiError, Result};
use crate::session::{SESSION_COOKIE, hash_token};

/// The authenticated caller, inserted into request extensions by `require_session`.
#[derive(Debug, Clone)]
pub struct CurrentUser {
    pub user_id: Uuid,
    pub username: String,
    pub session_id: String,
}

/// Session token from the cookie, falling back to `Authorization: Bearer`.
pub fn extract_token(jar: &CookieJar, headers: &HeaderMap) -> Option<String> {
    if let Some(cookie) = jar.get(SESSION_COOKIE) {
        return Some(cookie.value().to_string());
    }

    headers
        .get(header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
        .map(|t| t.trim().to_string())
        .filter(|t| !t.is_empty())
}

/// Look up a live session for `token`. Expired sessions are deleted on sight.
pub async fn resolve_session(state: &AppState, token: &str) -> Result<Option<CurrentUser>> {
    let db = state.clone();
    let token_hash = hash_token(token);
    let session = tokio::task::spawn_blocking(move || db.db.get_session_by_token_hash(&token_hash)).await??;

    let Some(session) = session else {
        return Ok(None);
    };

    let live = meetopia_db::parse_timestamp(&session.expires_at)
        .is_some_and(|expires_at| expires_at > chrono::Utc::now());
    if !live {
        debug!("Session {} expired, removing", session.id);
        state.db.delete_session(&session.id)?;
        return Ok(None);
    }

    let user_id = session
        .user_id
        .parse()
        .map_err(|e| ApiError::Internal(anyhow::anyhow!("corrupt user id on session {}: {}", session.id, e)))?;

    Ok(Some(CurrentUser {
        user_id,
        username: session.username,
        session_id: session.id,
    }))
}

/// Reject the request with 401 unless it carries a live session.
pub async fn require_session(
    State(state): State<AppState>,
    jar: CookieJar,
    mut req: Request,
    next: Next,
) -> Result<Response> {
    let token = extract_token(&jar, req.headers())
        .ok_or_else(|| ApiError::Unauthorized("Not authenticated".into()))?;

    let current = resolve_session(&state, &token)
        .await?
        .ok_or_else(|| ApiError::Unauthorized("Session expired".into()))?;

    req.extensions_mut().insert(current);
    Ok(next.run(req).await)
}
