use axum::{
    Extension, Json,
    extract::State,
    http::StatusCode,
    response::IntoResponse,
};
use tracing::info;
use uuid::Uuid;

use meetopia_db::format_timestamp;
use meetopia_types::api::CreateMeetingRequest;

use crate::auth::{AppState, check_len};
use crate::convert;
use crate::error::{ApiError, Result};
use crate::extract::{ApiPath, OptionalJson};
use crate::middleware::CurrentUser;

const MAX_TITLE_CHARS: usize = 200;

pub async fn create_meeting(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    OptionalJson(req): OptionalJson<CreateMeetingRequest>,
) -> Result<impl IntoResponse> {
    let title = req
        .title
        .as_deref()
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(|t| check_len(t, MAX_TITLE_CHARS, "Title"))
        .transpose()?;

    let meeting_id = Uuid::new_v4().to_string();
    let room_id = Uuid::new_v4().to_string();
    state.db.create_meeting(
        &meeting_id,
        &room_id,
        &current.user_id.to_string(),
        title,
        &format_timestamp(chrono::Utc::now()),
    )?;
    info!("{} opened meeting room {}", current.username, room_id);

    let row = state
        .db
        .get_meeting_by_room(&room_id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("meeting {} vanished after insert", room_id)))?;

    Ok((StatusCode::CREATED, Json(convert::meeting(row))))
}

pub async fn list_meetings(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let rows = state.db.list_meetings_by_host(&current.user_id.to_string())?;
    Ok(Json(rows.into_iter().map(convert::meeting).collect::<Vec<_>>()))
}

pub async fn get_meeting(
    State(state): State<AppState>,
    ApiPath(room_id): ApiPath<String>,
) -> Result<impl IntoResponse> {
    let row = state
        .db
        .get_meeting_by_room(&room_id)?
        .ok_or_else(|| ApiError::NotFound("Meeting not found".into()))?;

    Ok(Json(convert::meeting(row)))
}

/// Host-only. Ending twice is a no-op that returns the meeting as it stands.
pub async fn end_meeting(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiPath(room_id): ApiPath<String>,
) -> Result<impl IntoResponse> {
    let row = state
        .db
        .get_meeting_by_room(&room_id)?
        .ok_or_else(|| ApiError::NotFound("Meeting not found".into()))?;

    if row.host_id != current.user_id.to_string() {
        return Err(ApiError::Forbidden("Only the host can end this meeting".into()));
    }

    if state.db.end_meeting(&room_id, &format_timestamp(chrono::Utc::now()))? {
        info!("{} ended meeting room {}", current.username, room_id);
    }

    let row = state
        .db
        .get_meeting_by_room(&room_id)?
        .ok_or_else(|| ApiError::NotFound("Meeting not found".into()))?;

    Ok(Json(convert::meeting(row)))
}
