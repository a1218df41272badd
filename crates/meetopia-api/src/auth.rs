use std::collections::HashSet;
use std::sync::Arc;

use argon2::{Argon2, PasswordHash, PasswordHasher, PasswordVerifier, password_hash::SaltString};
use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use axum_extra::extract::CookieJar;
use rand_core::OsRng;
use tracing::info;
use uuid::Uuid;

use meetopia_db::models::{NewUser, UserConflict};
use meetopia_db::{Database, format_timestamp};
use meetopia_gateway::dispatcher::Dispatcher;
use meetopia_gateway::ice::IceConfig;
use meetopia_gateway::matchmaker::Matchmaker;
use meetopia_types::api::{AuthResponse, SigninRequest, SignupRequest, UpdateProfileRequest};

use crate::convert;
use crate::error::{ApiError, Result};
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;
use crate::session::{SessionSettings, issue_session, removal_cookie};

pub const MAX_INTERESTS: usize = 10;
pub const MAX_INTEREST_CHARS: usize = 32;
pub const MAX_BIO_CHARS: usize = 500;
pub const MAX_DISPLAY_NAME_CHARS: usize = 64;

pub type AppState = Arc<AppStateInner>;

pub struct AppStateInner {
    pub db: Database,
    pub dispatcher: Dispatcher,
    pub matchmaker: Matchmaker,
    pub sessions: SessionSettings,
    pub ice: IceConfig,
}

pub async fn signup(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<SignupRequest>,
) -> Result<impl IntoResponse> {
    let email = req.email.trim().to_lowercase();
    validate_email(&email)?;
    validate_username(&req.username)?;
    validate_password(&req.password)?;
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| check_len(s, MAX_DISPLAY_NAME_CHARS, "Display name"))
        .transpose()?
        .map(str::to_string);

    if state.db.get_user_by_email(&email)?.is_some() {
        return Err(conflict_error(UserConflict::Email));
    }
    if state.db.get_user_by_username(&req.username)?.is_some() {
        return Err(conflict_error(UserConflict::Username));
    }

    // Hash on the blocking pool
    let password = req.password;
    let password_hash = tokio::task::spawn_blocking(move || hash_password(&password)).await??;

    // A concurrent signup can still win the race between the checks above and this insert
    let user_id = Uuid::new_v4().to_string();
    state
        .db
        .create_user(
            &NewUser {
                id: &user_id,
                email: &email,
                username: &req.username,
                password_hash: &password_hash,
                display_name: display_name.as_deref(),
            },
            &format_timestamp(chrono::Utc::now()),
        )?
        .map_err(conflict_error)?;

    let user = state
        .db
        .get_user_by_id(&user_id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("user {} vanished after insert", user_id)))?;

    info!("New user {} ({})", user.username, user.id);

    let cookie = issue_session(&state, &user_id).await?;
    Ok((
        StatusCode::CREATED,
        jar.add(cookie),
        Json(AuthResponse {
            user: convert::profile(&user),
        }),
    ))
}

fn conflict_error(conflict: UserConflict) -> ApiError {
    match conflict {
        UserConflict::Email => ApiError::Validation("Email already registered".into()),
        UserConflict::Username => ApiError::Validation("Username already taken".into()),
    }
}

pub async fn signin(
    State(state): State<AppState>,
    jar: CookieJar,
    ApiJson(req): ApiJson<SigninRequest>,
) -> Result<impl IntoResponse> {
    let invalid = || ApiError::Unauthorized("Invalid credentials".into());

    let email = req.email.trim().to_lowercase();
    let user = state.db.get_user_by_email(&email)?.ok_or_else(invalid)?;

    let stored = user.password.clone();
    let password = req.password;
    let matches = tokio::task::spawn_blocking(move || verify_password(&password, &stored)).await??;
    if !matches {
        return Err(invalid());
    }

    let cookie = issue_session(&state, &user.id).await?;
    info!("{} ({}) signed in", user.username, user.id);

    Ok((
        jar.add(cookie),
        Json(AuthResponse {
            user: convert::profile(&user),
        }),
    ))
}

pub async fn signout(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    jar: CookieJar,
) -> Result<impl IntoResponse> {
    state.db.delete_session(&current.session_id)?;
    info!("{} ({}) signed out", current.username, current.user_id);

    Ok((jar.remove(removal_cookie()), Json(serde_json::json!({ "success": true }))))
}

pub async fn get_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_id(&current.user_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(convert::profile(&user)))
}

pub async fn update_profile(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<UpdateProfileRequest>,
) -> Result<impl IntoResponse> {
    let display_name = req
        .display_name
        .as_deref()
        .map(str::trim)
        .map(|s| check_len(s, MAX_DISPLAY_NAME_CHARS, "Display name"))
        .transpose()?;
    let bio = req
        .bio
        .as_deref()
        .map(|s| check_len(s, MAX_BIO_CHARS, "Bio"))
        .transpose()?;
    let interests = req.interests.as_deref().map(normalize_interests).transpose()?;

    let user = state
        .db
        .update_profile(
            &current.user_id.to_string(),
            display_name,
            bio,
            interests.as_deref(),
            &format_timestamp(chrono::Utc::now()),
        )?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(convert::profile(&user)))
}

pub fn hash_password(password: &str) -> anyhow::Result<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| anyhow::anyhow!("password hashing failed: {}", e))?
        .to_string();
    Ok(hash)
}

pub fn verify_password(password: &str, stored: &str) -> anyhow::Result<bool> {
    let parsed = PasswordHash::new(stored).map_err(|e| anyhow::anyhow!("stored hash unreadable: {}", e))?;
    Ok(Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

pub fn validate_email(email: &str) -> Result<()> {
    let valid = email.len() <= 254
        && !email.contains(char::is_whitespace)
        && match email.split_once('@') {
            Some((local, domain)) => {
                !local.is_empty()
                    && !domain.contains('@')
                    && domain.contains('.')
                    && !domain.starts_with('.')
                    && !domain.ends_with('.')
            }
            None => false,
        };

    if valid {
        Ok(())
    } else {
        Err(ApiError::Validation("Invalid email address".into()))
    }
}

pub fn validate_username(username: &str) -> Result<()> {
    if username.len() < 3 || username.len() > 32 {
        return Err(ApiError::Validation("Username must be 3-32 characters".into()));
    }
    if !username.chars().all(|c| c.is_ascii_alphanumeric() || c == '_') {
        return Err(ApiError::Validation(
            "Username may only contain letters, digits and underscores".into(),
        ));
    }
    Ok(())
}

pub fn validate_password(password: &str) -> Result<()> {
    if password.chars().count() < 8 {
        return Err(ApiError::Validation("Password must be at least 8 characters".into()));
    }
    if password.len() > 128 {
        return Err(ApiError::Validation("Password is too long".into()));
    }
    Ok(())
}

/// Trim, lowercase and de-duplicate interests, keeping first-seen order.
pub fn normalize_interests(raw: &[String]) -> Result<Vec<String>> {
    let mut seen = HashSet::new();
    let mut out = Vec::new();
    for interest in raw {
        let cleaned = interest.trim().to_lowercase();
        if cleaned.is_empty() {
            continue;
        }
        if cleaned.chars().count() > MAX_INTEREST_CHARS {
            return Err(ApiError::Validation(format!(
                "Interests must be at most {} characters",
                MAX_INTEREST_CHARS
            )));
        }
        if seen.insert(cleaned.clone()) {
            out.push(cleaned);
        }
    }
    if out.len() > MAX_INTERESTS {
        return Err(ApiError::Validation(format!("At most {} interests", MAX_INTERESTS)));
    }
    Ok(out)
}

pub(crate) fn check_len<'a>(value: &'a str, max: usize, field: &str) -> Result<&'a str> {
    if value.chars().count() > max {
        return Err(ApiError::Validation(format!(
            "{} must be at most {} characters",
            field, max
        )));
    }
    Ok(value)
}
