use axum::{Extension, Json, extract::State, response::IntoResponse};
use tracing::{debug, info};

use meetopia_gateway::matchmaker::MatchOutcome;
use meetopia_types::api::{MatchRequestBody, MatchResponse};
use meetopia_types::events::SignalEvent;
use meetopia_types::models::Match;

use crate::auth::{AppState, normalize_interests};
use crate::error::{ApiError, Result};
use crate::extract::OptionalJson;
use crate::middleware::CurrentUser;

pub async fn request_match(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
    OptionalJson(req): OptionalJson<MatchRequestBody>,
) -> Result<impl IntoResponse> {
    let user = state
        .db
        .get_user_by_id(&current.user_id.to_string())?
        .ok_or_else(|| ApiError::NotFound("User not found".into()))?;

    if user.is_flagged {
        return Err(ApiError::Forbidden("Your account is under review".into()));
    }

    let interests = match req.interests {
        Some(raw) => normalize_interests(&raw)?,
        None => user.interests,
    };

    let outcome = state
        .matchmaker
        .request(current.user_id, interests, chrono::Utc::now());

    let found = match outcome {
        MatchOutcome::Waiting => return Ok(Json(MatchResponse::Waiting)),
        MatchOutcome::Claimed(found) => found,
        MatchOutcome::Paired(found) => {
            notify_waiting_peer(&state, &found, &current).await;
            found
        }
    };

    let peer_id = found
        .peer_of(current.user_id)
        .ok_or_else(|| ApiError::Internal(anyhow::anyhow!("match {} does not include caller", found.room_id)))?;

    Ok(Json(MatchResponse::Matched {
        room_id: found.room_id,
        peer_id,
        common_interests: found.common_interests,
    }))
}

/// Push `match-found` to the peer that was waiting. If any of their sockets
/// got it the pending match is consumed so their next poll does not repeat it.
async fn notify_waiting_peer(state: &AppState, found: &Match, current: &CurrentUser) {
    let Some(peer) = found.peer_of(current.user_id) else {
        return;
    };

    let delivered = state
        .dispatcher
        .send_to_user(
            peer,
            SignalEvent::MatchFound {
                room_id: found.room_id.clone(),
                peer_id: current.user_id,
                common_interests: found.common_interests.clone(),
            },
        )
        .await;

    if delivered > 0 {
        state.matchmaker.take_ready(peer);
        info!("Notified {} of match in room {} over {} socket(s)", peer, found.room_id, delivered);
    } else {
        debug!("{} has no live socket, match waits for their next poll", peer);
    }
}

pub async fn cancel_match(
    State(state): State<AppState>,
    Extension(current): Extension<CurrentUser>,
) -> Result<impl IntoResponse> {
    let removed = state.matchmaker.cancel(current.user_id);
    Ok(Json(serde_json::json!({ "removed": removed })))
}
