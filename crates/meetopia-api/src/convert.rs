//! Row → wire conversions. Corrupt ids or timestamps are logged and replaced
//! with defaults rather than failing the whole response.

use chrono::{DateTime, Utc};
use tracing::warn;
use uuid::Uuid;

use meetopia_db::models::{MeetingRow, ReportRow, UserRow, VideoRow};
use meetopia_types::api::{MeetingResponse, PublicUser, ReportResponse, UserProfile, VideoResponse};
use meetopia_types::models::ReportStatus;

pub(crate) fn parse_id(raw: &str, what: &str) -> Uuid {
    raw.parse().unwrap_or_else(|e| {
        warn!("Corrupt {} '{}': {}", what, raw, e);
        Uuid::default()
    })
}

pub(crate) fn parse_time(raw: &str, what: &str) -> DateTime<Utc> {
    meetopia_db::parse_timestamp(raw).unwrap_or_else(|| {
        warn!("Corrupt {} '{}'", what, raw);
        DateTime::default()
    })
}

pub(crate) fn profile(row: &UserRow) -> UserProfile {
    UserProfile {
        id: parse_id(&row.id, "user id"),
        email: row.email.clone(),
        username: row.username.clone(),
        display_name: row.display_name.clone(),
        bio: row.bio.clone(),
        interests: row.interests.clone(),
        is_flagged: row.is_flagged,
        created_at: parse_time(&row.created_at, "user created_at"),
    }
}

pub(crate) fn public_user(row: UserRow) -> PublicUser {
    PublicUser {
        id: parse_id(&row.id, "user id"),
        username: row.username,
        display_name: row.display_name,
        bio: row.bio,
        interests: row.interests,
    }
}

pub(crate) fn report(row: ReportRow) -> ReportResponse {
    ReportResponse {
        id: parse_id(&row.id, "report id"),
        reporter_id: parse_id(&row.reporter_id, "reporter id"),
        reported_user_id: parse_id(&row.reported_user_id, "reported user id"),
        status: row.status.parse().unwrap_or_else(|e| {
            warn!("Report {}: {}", row.id, e);
            ReportStatus::Pending
        }),
        created_at: parse_time(&row.created_at, "report created_at"),
        reason: row.reason,
        details: row.details,
    }
}

pub(crate) fn video(row: VideoRow) -> VideoResponse {
    VideoResponse {
        id: parse_id(&row.id, "video id"),
        user_id: parse_id(&row.user_id, "video user id"),
        created_at: parse_time(&row.created_at, "video created_at"),
        url: row.url,
        title: row.title,
        username: row.username,
        likes: row.likes,
        liked_by_me: row.liked_by_me,
    }
}

pub(crate) fn meeting(row: MeetingRow) -> MeetingResponse {
    MeetingResponse {
        id: parse_id(&row.id, "meeting id"),
        host_id: parse_id(&row.host_id, "meeting host id"),
        active: row.ended_at.is_none(),
        created_at: parse_time(&row.created_at, "meeting created_at"),
        ended_at: row.ended_at.as_deref().map(|t| parse_time(t, "meeting ended_at")),
        room_id: row.room_id,
        title: row.title,
    }
}
