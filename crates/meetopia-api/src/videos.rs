use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use chrono::{DateTime, Utc};
use serde::Deserialize;
use tracing::info;
use uuid::Uuid;

use meetopia_db::format_timestamp;
use meetopia_db::models::FeedCursor;
use meetopia_types::api::{CreateVideoRequest, LikeResponse};

use crate::auth::{AppState, check_len};
use crate::convert;
use crate::error::{ApiError, Result};
use crate::extract::{ApiJson, ApiPath, ApiQuery};
use crate::middleware::CurrentUser;

const MAX_FEED_LIMIT: u32 = 50;
const MAX_URL_CHARS: usize = 2048;
const MAX_TITLE_CHARS: usize = 200;

#[derive(Debug, Deserialize)]
pub struct FeedQuery {
    #[serde(default = "default_limit")]
    pub limit: u32,
    /// `createdAt` of the last video on the previous page.
    pub before: Option<DateTime<Utc>>,
    /// `id` of that video, breaks ties between equal timestamps.
    #[serde(rename = "beforeId")]
    pub before_id: Option<Uuid>,
}

fn default_limit() -> u32 {
    20
}

pub async fn get_feed(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiQuery(query): ApiQuery<FeedQuery>,
) -> Result<impl IntoResponse> {
    let limit = query.limit.clamp(1, MAX_FEED_LIMIT);
    let before = query.before.map(format_timestamp);
    let before_id = query.before_id.map(|id| id.to_string());

    let db = state.clone();
    let viewer = current.user_id.to_string();
    let rows = tokio::task::spawn_blocking(move || {
        let cursor = before.as_deref().map(|created_at| FeedCursor {
            created_at,
            id: before_id.as_deref(),
        });
        db.db.get_feed(&viewer, limit, cursor)
    })
    .await??;

    Ok(Json(rows.into_iter().map(convert::video).collect::<Vec<_>>()))
}

pub async fn create_video(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreateVideoRequest>,
) -> Result<impl IntoResponse> {
    let url = req.url.trim();
    validate_video_url(url)?;
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| check_len(t, MAX_TITLE_CHARS, "Title"))
        .transpose()?;

    let video_id = Uuid::new_v4().to_string();
    let user_id = current.user_id.to_string();
    state.db.insert_video(
        &video_id,
        url,
        title,
        &user_id,
        &format_timestamp(Utc::now()),
    )?;
    info!("{} posted video {}", current.username, video_id);

    let row = state
        .db
        .get_video(&video_id, &user_id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("video {} vanished after insert", video_id)))?;

    Ok((StatusCode::CREATED, Json(convert::video(row))))
}

pub async fn toggle_like(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(video_id): ApiPath<Uuid>,
) -> Result<impl IntoResponse> {
    let db = state.clone();
    let vid = video_id.to_string();
    let uid = current.user_id.to_string();
    let now = format_timestamp(Utc::now());
    let (liked, likes) = tokio::task::spawn_blocking(move || db.db.toggle_like(&vid, &uid, &now))
        .await??
        .ok_or_else(|| ApiError::NotFound("Video not found".into()))?;

    Ok(Json(LikeResponse { liked, likes }))
}

pub fn validate_video_url(url: &str) -> Result<()> {
    if url.chars().count() > MAX_URL_CHARS {
        return Err(ApiError::Validation(format!(
            "URL must be at most {} characters",
            MAX_URL_CHARS
        )));
    }

    let rest = url
        .strip_prefix("https://")
        .or_else(|| url.strip_prefix("http://"))
        .ok_or_else(|| ApiError::Validation("URL must start with http:// or https://".into()))?;

    if rest.is_empty() || rest.starts_with('/') || url.contains(char::is_whitespace) {
        return Err(ApiError::Validation("Invalid URL".into()));
    }
    Ok(())
}
