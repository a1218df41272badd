use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use meetopia_db::format_timestamp;

use crate::auth::AppState;
use crate::convert;
use crate::error::{ApiError, Result};
use crate::extract::{ApiPath, ApiQuery};
use crate::middleware::CurrentUser;

const MAX_SEARCH_LIMIT: u32 = 100;

#[derive(Debug, Deserialize)]
pub struct UserQuery {
    /// Substring of username or display name.
    pub q: Option<String>,
    #[serde(default = "default_limit")]
    pub limit: u32,
}

fn default_limit() -> u32 {
    20
}

pub async fn list_users(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<UserQuery>,
) -> Result<impl IntoResponse> {
    let limit = query.limit.clamp(1, MAX_SEARCH_LIMIT);
    let needle = query.q.map(|q| q.trim().to_string()).filter(|q| !q.is_empty());

    let db = state.clone();
    let me = current.user_id.to_string();
    let rows = tokio::task::spawn_blocking(move || db.db.search_users(&me, needle.as_deref(), limit)).await??;

    let users: Vec<_> = rows.into_iter().map(convert::public_user).collect();
    Ok(Json(users))
}

pub async fn get_user(
    State(state): State<AppState>,
    ApiPath(user_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_id(&user_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    Ok(Json(convert::public_user(user)))
}

pub async fn list_friends(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let friends = state.db.list_friends(&current.user_id.to_string())?;
    Ok(Json(friends.into_iter().map(convert::public_user).collect::<Vec<_>>()))
}

pub async fn add_friend(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(friend_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    if friend_id == current.user_id {
        return Err(ApiError::Validation("You cannot add yourself as a friend".into()));
    }

    let friend = state
        .db
        .get_user_by_id(&friend_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let added = state.db.add_friend(
        &current.user_id.to_string(),
        &friend.id,
        &format_timestamp(chrono::Utc::now()),
    )?;
    if added {
        info!("{} added {} as a friend", current.username, friend.username);
    }

    let status = if added { StatusCode::CREATED } else { StatusCode::OK };
    Ok((status, Json(convert::public_user(friend))))
}

pub async fn remove_friend(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(friend_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let removed = state
        .db
        .remove_friend(&current.user_id.to_string(), &friend_id.to_string())?;
    if !removed {
        return Err(ApiError::NotFound("Not friends with this user".into()));
    }

    Ok(StatusCode::NO_CONTENT)
}
