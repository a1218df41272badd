use axum::{Extension, Json, extract::State, http::StatusCode, response::IntoResponse};
use tracing::{info, warn};
use uuid::Uuid;

use meetopia_db::format_timestamp;
use meetopia_db::models::NewReport;
use meetopia_types::api::CreateReportRequest;

use crate::auth::{AppState, check_len};
use crate::convert;
use crate::error::{ApiError, Result};
use crate::extract::ApiJson;
use crate::middleware::CurrentUser;

/// Distinct reporters needed before a user is flagged.
pub const FLAG_THRESHOLD: usize = 3;

const MAX_REASON_CHARS: usize = 100;
const MAX_DETAILS_CHARS: usize = 2000;

pub async fn create_report(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    ApiJson(req): ApiJson<CreateReportRequest>,
) -> Result<impl IntoResponse> {
    if req.reported_user_id == current.user_id {
        return Err(ApiError::Validation("You cannot report yourself".into()));
    }

    let reason = req.reason.trim();
    if reason.is_empty() {
        return Err(ApiError::Validation("Reason is required".into()));
    }
    check_len(reason, MAX_REASON_CHARS, "Reason")?;
    let details = req
        .details
        .as_deref()
        .map(str::trim)
        .filter(|d| !d.is_empty())
        .map(|d| check_len(d, MAX_DETAILS_CHARS, "Details"))
        .transpose()?;

    let reported = state
        .db
        .get_user_by_id(&req.reported_user_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    let report_id = Uuid::new_v4().to_string();
    let reporter_id = current.user_id.to_string();
    let newly_flagged = state.db.file_report(
        &NewReport {
            id: &report_id,
            reporter_id: &reporter_id,
            reported_user_id: &reported.id,
            reason,
            details,
        },
        &format_timestamp(chrono::Utc::now()),
        FLAG_THRESHOLD,
    )?;

    info!("{} reported {} ({})", current.username, reported.username, reason);
    if newly_flagged {
        warn!("User {} ({}) flagged after repeated reports", reported.username, reported.id);
        state.matchmaker.cancel(req.reported_user_id);
    }

    let row = state
        .db
        .get_report(&report_id)?
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("report {} vanished after insert", report_id)))?;

    Ok((StatusCode::CREATED, Json(convert::report(row))))
}

/// Reports filed by the caller.
pub async fn list_reports(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let rows = state.db.list_reports_by_reporter(&current.user_id.to_string())?;
    Ok(Json(rows.into_iter().map(convert::report).collect::<Vec<_>>()))
}
