use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use chrono::{Duration, Utc};
use sha2::{Digest, Sha256};
use uuid::Uuid;

use meetopia_db::format_timestamp;

use crate::auth::AppStateInner;
use crate::error::Result;

/// Session cookie name
pub const SESSION_COOKIE: &str = "meetopia_session";

#[derive(Debug, Clone)]
pub struct SessionSettings {
    pub ttl: Duration,
    /// Set the `Secure` attribute. Needs HTTPS in front of the server.
    pub secure_cookie: bool,
}

impl Default for SessionSettings {
    fn default() -> Self {
        Self {
            ttl: Duration::days(7),
            secure_cookie: false,
        }
    }
}

/// 32 random bytes, base64url. Only ever stored client-side.
pub fn generate_token() -> String {
    let bytes: [u8; 32] = rand::random();
    URL_SAFE_NO_PAD.encode(bytes)
}

/// What the sessions table stores in place of the token.
pub fn hash_token(token: &str) -> String {
    hex::encode(Sha256::digest(token.as_bytes()))
}

/// Create a session row for `user_id` and return the cookie that carries it.
pub async fn issue_session(state: &std::sync::Arc<AppStateInner>, user_id: &str) -> Result<Cookie<'static>> {
    let token = generate_token();
    let token_hash = hash_token(&token);
    let session_id = Uuid::new_v4().to_string();
    let now = Utc::now();
    let created_at = format_timestamp(now);
    let expires_at = format_timestamp(now + state.sessions.ttl);

    let db = state.clone();
    let uid = user_id.to_string();
    tokio::task::spawn_blocking(move || {
        db.db.create_session(&session_id, &uid, &token_hash, &created_at, &expires_at)
    })
    .await??;

    Ok(session_cookie(token, &state.sessions))
}

pub fn session_cookie(token: String, settings: &SessionSettings) -> Cookie<'static> {
    Cookie::build((SESSION_COOKIE, token))
        .path("/")
        .http_only(true)
        .same_site(SameSite::Lax)
        .secure(settings.secure_cookie)
        .max_age(time::Duration::seconds(settings.ttl.num_seconds()))
        .build()
}

/// Cookie used to remove the session cookie from the browser.
pub fn removal_cookie() -> Cookie<'static> {
    Cookie::build(SESSION_COOKIE).path("/").build()
}
