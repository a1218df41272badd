pub mod auth;
mod convert;
pub mod error;
pub mod extract;
pub mod ice;
pub mod matching;
pub mod meetings;
pub mod middleware;
pub mod reports;
pub mod session;
pub mod users;
pub mod videos;

use axum::{
    Json, Router,
    middleware::from_fn_with_state,
    routing::{get, post},
};

use crate::auth::AppState;
use crate::middleware::require_session;

/// Every REST route under `/api`. The WebSocket route is mounted by the server.
pub fn router(state: AppState) -> Router {
    let public_routes = Router::new()
        .route("/api/health", get(health))
        .route("/api/auth/signup", post(auth::signup))
        .route("/api/auth/signin", post(auth::signin))
        .route("/api/ice-servers", get(ice::ice_servers));

    let protected_routes = Router::new()
        .route("/api/auth/signout", post(auth::signout))
        .route("/api/auth/profile", get(auth::get_profile).put(auth::update_profile))
        .route("/api/users", get(users::list_users))
        .route("/api/users/{user_id}", get(users::get_user))
        .route("/api/friends", get(users::list_friends))
        .route(
            "/api/friends/{friend_id}",
            post(users::add_friend).delete(users::remove_friend),
        )
        .route("/api/reports", post(reports::create_report).get(reports::list_reports))
        .route("/api/videos", post(videos::create_video))
        .route("/api/videos/feed", get(videos::get_feed))
        .route("/api/videos/{video_id}/like", post(videos::toggle_like))
        .route("/api/meetings", post(meetings::create_meeting).get(meetings::list_meetings))
        .route("/api/meetings/{room_id}", get(meetings::get_meeting))
        .route("/api/meetings/{room_id}/end", post(meetings::end_meeting))
        .route("/api/match", post(matching::request_match).delete(matching::cancel_match))
        .route_layer(from_fn_with_state(state.clone(), require_session));

    Router::new()
        .merge(public_routes)
        .merge(protected_routes)
        .with_state(state)
}

async fn health() -> Json<serde_json::Value> {
    Json(serde_json::json!({ "status": "ok" }))
}
