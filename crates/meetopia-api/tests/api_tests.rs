use std::sync::Arc;

use axum::{
    Router,
    body::Body,
    http::{Request, StatusCode, header},
};
use chrono::{Duration, Utc};
use serde_json::{Value, json};
use tower::ServiceExt;

use meetopia_api::auth::{AppState, AppStateInner};
use meetopia_api::router;
use meetopia_api::session::{SESSION_COOKIE, SessionSettings, hash_token};
use meetopia_db::{Database, format_timestamp};
use meetopia_gateway::dispatcher::Dispatcher;
use meetopia_gateway::ice::IceConfig;
use meetopia_gateway::matchmaker::Matchmaker;
use meetopia_types::events::SignalEvent;

struct TestApp {
    state: AppState,
    router: Router,
}

impl TestApp {
    fn new() -> Self {
        let state: AppState = Arc::new(AppStateInner {
            db: Database::open_in_memory().unwrap(),
            dispatcher: Dispatcher::new(),
            matchmaker: Matchmaker::default(),
            sessions: SessionSettings::default(),
            ice: IceConfig {
                stun_urls: vec!["stun:stun.example.org:3478".into()],
                turn_urls: vec!["turn:turn.example.org:3478".into()],
                turn_secret: Some("north".into()),
            },
        });
        Self {
            router: router(state.clone()),
            state,
        }
    }

    async fn call(&self, method: &str, uri: &str, cookie: Option<&str>, body: Option<Value>) -> Response {
        match body {
            Some(body) => {
                self.call_raw(method, uri, cookie, Some("application/json"), &body.to_string())
                    .await
            }
            None => self.call_raw(method, uri, cookie, None, "").await,
        }
    }

    async fn call_raw(
        &self,
        method: &str,
        uri: &str,
        cookie: Option<&str>,
        content_type: Option<&str>,
        body: &str,
    ) -> Response {
        let mut req = Request::builder().method(method).uri(uri);
        if let Some(cookie) = cookie {
            req = req.header(header::COOKIE, cookie);
        }
        if let Some(content_type) = content_type {
            req = req.header(header::CONTENT_TYPE, content_type);
        }
        let req = req.body(Body::from(body.to_string())).unwrap();

        let response = self.router.clone().oneshot(req).await.unwrap();
        let status = response.status();
        let set_cookie = response
            .headers()
            .get(header::SET_COOKIE)
            .map(|v| v.to_str().unwrap().to_string());
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };

        Response {
            status,
            set_cookie,
            body,
        }
    }

    /// Sign up and return `(cookie header value, user id)`.
    async fn signup(&self, name: &str) -> (String, String) {
        let res = self
            .call(
                "POST",
                "/api/auth/signup",
                None,
                Some(json!({
                    "email": format!("{}@example.com", name),
                    "username": name,
                    "password": "hunter2hunter2",
                })),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED, "{:?}", res.body);
        let cookie = res.session_cookie().expect("signup sets the session cookie");
        (cookie, res.body["user"]["id"].as_str().unwrap().to_string())
    }
}

struct Response {
    status: StatusCode,
    set_cookie: Option<String>,
    body: Value,
}

impl Response {
    /// `name=value` part of the Set-Cookie header.
    fn session_cookie(&self) -> Option<String> {
        let raw = self.set_cookie.as_deref()?;
        let pair = raw.split(';').next()?.trim();
        pair.starts_with(&format!("{}=", SESSION_COOKIE))
            .then(|| pair.to_string())
    }

    fn error(&self) -> &str {
        self.body["error"].as_str().unwrap_or_default()
    }
}

#[tokio::test]
async fn health_is_public() {
    let app = TestApp::new();
    let res = app.call("GET", "/api/health", None, None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["status"], "ok");
}

#[tokio::test]
async fn signup_sets_http_only_cookie_and_returns_profile() {
    let app = TestApp::new();
    let res = app
        .call(
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({
                "email": "Ada@Example.com",
                "username": "ada",
                "password": "analytical",
                "displayName": "Ada L.",
            })),
        )
        .await;

    assert_eq!(res.status, StatusCode::CREATED);
    let raw = res.set_cookie.as_deref().unwrap();
    assert!(raw.contains("HttpOnly"));
    assert!(raw.contains("Path=/"));
    assert_eq!(res.body["user"]["email"], "ada@example.com");
    assert_eq!(res.body["user"]["displayName"], "Ada L.");
    assert!(res.body["user"].get("password").is_none());
}

#[tokio::test]
async fn signup_rejects_duplicates() {
    let app = TestApp::new();
    app.signup("grace").await;

    let res = app
        .call(
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({"email": "grace@example.com", "username": "other", "password": "password123"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Email already registered");

    let res = app
        .call(
            "POST",
            "/api/auth/signup",
            None,
            Some(json!({"email": "fresh@example.com", "username": "grace", "password": "password123"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert_eq!(res.error(), "Username already taken");
}

#[tokio::test]
async fn signup_validates_input() {
    let app = TestApp::new();
    for body in [
        json!({"email": "nope", "username": "valid_1", "password": "password123"}),
        json!({"email": "a@b.co", "username": "x", "password": "password123"}),
        json!({"email": "a@b.co", "username": "valid_1", "password": "short"}),
    ] {
        let res = app.call("POST", "/api/auth/signup", None, Some(body)).await;
        assert_eq!(res.status, StatusCode::BAD_REQUEST);
        assert!(!res.error().is_empty());
    }
}

#[tokio::test]
async fn signin_rejects_bad_credentials() {
    let app = TestApp::new();
    app.signup("linus").await;

    let res = app
        .call(
            "POST",
            "/api/auth/signin",
            None,
            Some(json!({"email": "linus@example.com", "password": "wrong-password"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Invalid credentials");
    assert!(res.set_cookie.is_none());

    let res = app
        .call(
            "POST",
            "/api/auth/signin",
            None,
            Some(json!({"email": "nobody@example.com", "password": "hunter2hunter2"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Invalid credentials");

    let res = app
        .call(
            "POST",
            "/api/auth/signin",
            None,
            Some(json!({"email": "LINUS@example.com", "password": "hunter2hunter2"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert!(res.session_cookie().is_some());
}

#[tokio::test]
async fn protected_routes_need_a_session() {
    let app = TestApp::new();
    for (method, uri) in [
        ("GET", "/api/auth/profile"),
        ("GET", "/api/friends"),
        ("GET", "/api/videos/feed"),
        ("DELETE", "/api/match"),
    ] {
        let res = app.call(method, uri, None, None).await;
        assert_eq!(res.status, StatusCode::UNAUTHORIZED, "{} {}", method, uri);
        assert_eq!(res.error(), "Not authenticated");
    }

    let res = app
        .call("GET", "/api/auth/profile", Some("meetopia_session=made-up"), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn expired_session_is_rejected_and_removed() {
    let app = TestApp::new();
    let (_, user_id) = app.signup("ghost").await;

    let past = Utc::now() - Duration::hours(1);
    app.state
        .db
        .create_session(
            "stale-session",
            &user_id,
            &hash_token("stale-token"),
            &format_timestamp(past - Duration::hours(1)),
            &format_timestamp(past),
        )
        .unwrap();

    let res = app
        .call("GET", "/api/auth/profile", Some("meetopia_session=stale-token"), None)
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
    assert_eq!(res.error(), "Session expired");
    assert!(app.state.db.get_session_by_token_hash(&hash_token("stale-token")).unwrap().is_none());
}

#[tokio::test]
async fn bearer_token_works_like_the_cookie() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("bearer").await;
    let token = cookie.split_once('=').unwrap().1;

    let req = Request::builder()
        .uri("/api/auth/profile")
        .header(header::AUTHORIZATION, format!("Bearer {}", token))
        .body(Body::empty())
        .unwrap();
    let response = app.router.clone().oneshot(req).await.unwrap();
    assert_eq!(response.status(), StatusCode::OK);
}

#[tokio::test]
async fn signout_invalidates_the_session() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("leaver").await;

    let res = app.call("POST", "/api/auth/signout", Some(&cookie), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["success"], true);
    assert!(res.set_cookie.as_deref().unwrap().starts_with("meetopia_session="));

    let res = app.call("GET", "/api/auth/profile", Some(&cookie), None).await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn profile_update_normalizes_interests() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("tinker").await;

    let res = app
        .call(
            "PUT",
            "/api/auth/profile",
            Some(&cookie),
            Some(json!({"bio": "builds things", "interests": [" Rust ", "rust", "Climbing"]})),
        )
        .await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["bio"], "builds things");
    assert_eq!(res.body["interests"], json!(["rust", "climbing"]));

    let res = app
        .call("PUT", "/api/auth/profile", Some(&cookie), Some(json!({"bio": "x".repeat(501)})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn friends_are_mutual() {
    let app = TestApp::new();
    let (alice, alice_id) = app.signup("alice").await;
    let (bob, bob_id) = app.signup("bob").await;

    let res = app.call("POST", &format!("/api/friends/{}", alice_id), Some(&alice), None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    let unknown = uuid::Uuid::new_v4();
    let res = app.call("POST", &format!("/api/friends/{}", unknown), Some(&alice), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.call("POST", &format!("/api/friends/{}", bob_id), Some(&alice), None).await;
    assert_eq!(res.status, StatusCode::CREATED);

    let res = app.call("GET", "/api/friends", Some(&bob), None).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);
    assert_eq!(res.body[0]["username"], "alice");

    let res = app.call("DELETE", &format!("/api/friends/{}", alice_id), Some(&bob), None).await;
    assert_eq!(res.status, StatusCode::NO_CONTENT);

    let res = app.call("DELETE", &format!("/api/friends/{}", alice_id), Some(&bob), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn user_search_excludes_caller() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("seeker").await;
    app.signup("seen_one").await;
    app.signup("other").await;

    let res = app.call("GET", "/api/users?q=seen", Some(&cookie), None).await;
    assert_eq!(res.status, StatusCode::OK);
    let names: Vec<&str> = res
        .body
        .as_array()
        .unwrap()
        .iter()
        .map(|u| u["username"].as_str().unwrap())
        .collect();
    assert_eq!(names, vec!["seen_one"]);

    let res = app.call("GET", "/api/users", Some(&cookie), None).await;
    assert_eq!(res.body.as_array().unwrap().len(), 2);
}

#[tokio::test]
async fn reports_validate_and_flag_after_three_reporters() {
    let app = TestApp::new();
    let (target, target_id) = app.signup("troll").await;

    let res = app
        .call(
            "POST",
            "/api/reports",
            None,
            Some(json!({"reportedUserId": target_id, "reason": "spam"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::UNAUTHORIZED);

    let res = app
        .call(
            "POST",
            "/api/reports",
            Some(&target),
            Some(json!({"reportedUserId": target_id, "reason": "spam"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);

    // Queued before the reports land; flagging pulls them out
    let res = app.call("POST", "/api/match", Some(&target), None).await;
    assert_eq!(res.body, json!({"status": "waiting"}));
    assert_eq!(app.state.matchmaker.waiting_count(), 1);

    for name in ["one", "two", "three"] {
        let (reporter, _) = app.signup(&format!("reporter_{}", name)).await;
        let res = app
            .call(
                "POST",
                "/api/reports",
                Some(&reporter),
                Some(json!({"reportedUserId": target_id, "reason": "harassment", "details": "rude"})),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
        assert_eq!(res.body["status"], "pending");

        let listed = app.call("GET", "/api/reports", Some(&reporter), None).await;
        assert_eq!(listed.body.as_array().unwrap().len(), 1);
    }

    let profile = app.call("GET", "/api/auth/profile", Some(&target), None).await;
    assert_eq!(profile.body["isFlagged"], true);
    assert_eq!(app.state.matchmaker.waiting_count(), 0);

    let res = app.call("POST", "/api/match", Some(&target), Some(json!({}))).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);
}

#[tokio::test]
async fn report_for_unknown_user_is_404() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("reporter").await;
    let res = app
        .call(
            "POST",
            "/api/reports",
            Some(&cookie),
            Some(json!({"reportedUserId": uuid::Uuid::new_v4(), "reason": "spam"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn likes_toggle_and_count_likers() {
    let app = TestApp::new();
    let (poster, _) = app.signup("poster").await;
    let (fan, _) = app.signup("fan").await;

    let res = app
        .call(
            "POST",
            "/api/videos",
            Some(&poster),
            Some(json!({"url": "https://cdn.example.com/a.mp4", "title": "first"})),
        )
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    let video_id = res.body["id"].as_str().unwrap().to_string();
    let like_uri = format!("/api/videos/{}/like", video_id);

    let res = app.call("POST", &like_uri, Some(&poster), None).await;
    assert_eq!(res.body, json!({"liked": true, "likes": 1}));
    let res = app.call("POST", &like_uri, Some(&fan), None).await;
    assert_eq!(res.body, json!({"liked": true, "likes": 2}));
    let res = app.call("POST", &like_uri, Some(&poster), None).await;
    assert_eq!(res.body, json!({"liked": false, "likes": 1}));

    let feed = app.call("GET", "/api/videos/feed", Some(&fan), None).await;
    assert_eq!(feed.body[0]["likes"], 1);
    assert_eq!(feed.body[0]["likedByMe"], true);
    assert_eq!(feed.body[0]["username"], "poster");

    let res = app
        .call("POST", &format!("/api/videos/{}/like", uuid::Uuid::new_v4()), Some(&fan), None)
        .await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app
        .call("POST", "/api/videos", Some(&poster), Some(json!({"url": "file:///etc/passwd"})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
}

#[tokio::test]
async fn only_the_host_ends_a_meeting() {
    let app = TestApp::new();
    let (host, host_id) = app.signup("host").await;
    let (guest, _) = app.signup("guest").await;

    let res = app
        .call("POST", "/api/meetings", Some(&host), Some(json!({"title": "standup"})))
        .await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["hostId"], host_id.as_str());
    assert_eq!(res.body["active"], true);
    let room_id = res.body["roomId"].as_str().unwrap().to_string();

    let res = app.call("GET", &format!("/api/meetings/{}", room_id), Some(&guest), None).await;
    assert_eq!(res.status, StatusCode::OK);

    let end_uri = format!("/api/meetings/{}/end", room_id);
    let res = app.call("POST", &end_uri, Some(&guest), None).await;
    assert_eq!(res.status, StatusCode::FORBIDDEN);

    let res = app.call("POST", &end_uri, Some(&host), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body["active"], false);
    assert!(res.body["endedAt"].is_string());

    let res = app.call("GET", "/api/meetings/no-such-room", Some(&host), None).await;
    assert_eq!(res.status, StatusCode::NOT_FOUND);

    let res = app.call("GET", "/api/meetings", Some(&host), None).await;
    assert_eq!(res.body.as_array().unwrap().len(), 1);
}

#[tokio::test]
async fn two_users_get_matched_on_shared_interests() {
    let app = TestApp::new();
    let (first, first_id) = app.signup("first").await;
    let (second, second_id) = app.signup("second").await;

    let res = app
        .call("POST", "/api/match", Some(&first), Some(json!({"interests": ["Chess", "jazz"]})))
        .await;
    assert_eq!(res.body, json!({"status": "waiting"}));

    // The waiting side has a live socket and hears about the match over it
    let (_socket, mut events) = app.state.dispatcher.register(Some(first_id.parse().unwrap())).await;

    let res = app
        .call("POST", "/api/match", Some(&second), Some(json!({"interests": ["chess"]})))
        .await;
    assert_eq!(res.body["status"], "matched");
    assert_eq!(res.body["peerId"], first_id.as_str());
    assert_eq!(res.body["commonInterests"], json!(["chess"]));
    let room_id = res.body["roomId"].as_str().unwrap().to_string();

    match events.recv().await.unwrap() {
        SignalEvent::MatchFound { room_id: pushed, peer_id, .. } => {
            assert_eq!(pushed, room_id);
            assert_eq!(peer_id.to_string(), second_id);
        }
        other => panic!("unexpected event {:?}", other),
    }

    // Delivered over the socket, so the next poll queues again
    let res = app.call("POST", "/api/match", Some(&first), Some(json!({}))).await;
    assert_eq!(res.body, json!({"status": "waiting"}));

    let res = app.call("DELETE", "/api/match", Some(&first), None).await;
    assert_eq!(res.body, json!({"removed": true}));
}

#[tokio::test]
async fn waiting_user_without_socket_claims_match_on_next_poll() {
    let app = TestApp::new();
    let (first, _) = app.signup("poller").await;
    let (second, second_id) = app.signup("joiner").await;

    app.call("POST", "/api/match", Some(&first), Some(json!({}))).await;
    let made = app.call("POST", "/api/match", Some(&second), Some(json!({}))).await;
    assert_eq!(made.body["status"], "matched");

    let claimed = app.call("POST", "/api/match", Some(&first), Some(json!({}))).await;
    assert_eq!(claimed.body["status"], "matched");
    assert_eq!(claimed.body["roomId"], made.body["roomId"]);
    assert_eq!(claimed.body["peerId"], second_id.as_str());
}

#[tokio::test]
async fn ice_servers_include_turn_credentials() {
    let app = TestApp::new();
    let res = app.call("GET", "/api/ice-servers", None, None).await;
    assert_eq!(res.status, StatusCode::OK);

    let servers = res.body["iceServers"].as_array().unwrap();
    assert_eq!(servers.len(), 2);
    assert_eq!(servers[0]["urls"], json!(["stun:stun.example.org:3478"]));
    assert!(servers[0].get("credential").is_none());
    assert!(servers[1]["username"].as_str().unwrap().ends_with(":guest"));
    assert!(servers[1]["credential"].is_string());

    let (cookie, user_id) = app.signup("caller").await;
    let res = app.call("GET", "/api/ice-servers", Some(&cookie), None).await;
    let username = res.body["iceServers"][1]["username"].as_str().unwrap().to_string();
    assert!(username.ends_with(&format!(":{}", user_id)));
}

#[tokio::test]
async fn malformed_requests_get_json_validation_errors() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("strict").await;

    let res = app
        .call("POST", "/api/auth/signup", None, Some(json!({"email": "a@b.co"})))
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(!res.error().is_empty());

    let res = app
        .call_raw("POST", "/api/auth/signin", None, Some("application/json"), "{not json")
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(!res.error().is_empty());

    let body = json!({"email": "x@y.co", "username": "nobody", "password": "hunter2hunter2"});
    let res = app
        .call_raw("POST", "/api/auth/signup", None, None, &body.to_string())
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(!res.error().is_empty());

    let res = app.call("GET", "/api/users/not-a-uuid", Some(&cookie), None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(!res.error().is_empty());

    let res = app.call("GET", "/api/videos/feed?limit=abc", Some(&cookie), None).await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(!res.error().is_empty());
}

#[tokio::test]
async fn match_and_meeting_accept_an_empty_body() {
    let app = TestApp::new();
    let (cookie, host_id) = app.signup("minimal").await;

    let res = app.call("POST", "/api/match", Some(&cookie), None).await;
    assert_eq!(res.status, StatusCode::OK);
    assert_eq!(res.body, json!({"status": "waiting"}));

    let res = app.call("POST", "/api/meetings", Some(&cookie), None).await;
    assert_eq!(res.status, StatusCode::CREATED);
    assert_eq!(res.body["hostId"], host_id.as_str());
    assert!(res.body["roomId"].is_string());

    let res = app
        .call_raw("POST", "/api/meetings", Some(&cookie), Some("application/json"), "[1, 2")
        .await;
    assert_eq!(res.status, StatusCode::BAD_REQUEST);
    assert!(!res.error().is_empty());
}

#[tokio::test]
async fn declared_user_id_cannot_intercept_match_events() {
    let app = TestApp::new();
    let (victim, victim_id) = app.signup("victim").await;
    let (other, _) = app.signup("other").await;

    // Anonymous socket claiming to be the victim
    let (impostor, mut impostor_events) = app.state.dispatcher.register(None).await;
    app.state
        .dispatcher
        .join_room(impostor, "lobby", Some(victim_id.clone()))
        .await
        .unwrap();

    let res = app.call("POST", "/api/match", Some(&victim), None).await;
    assert_eq!(res.body, json!({"status": "waiting"}));
    let made = app.call("POST", "/api/match", Some(&other), None).await;
    assert_eq!(made.body["status"], "matched");

    assert!(impostor_events.try_recv().is_err());

    let claimed = app.call("POST", "/api/match", Some(&victim), None).await;
    assert_eq!(claimed.body["status"], "matched");
    assert_eq!(claimed.body["roomId"], made.body["roomId"]);
}

#[tokio::test]
async fn feed_pages_without_gaps_or_repeats() {
    let app = TestApp::new();
    let (cookie, _) = app.signup("pager").await;
    for i in 0..3 {
        let res = app
            .call(
                "POST",
                "/api/videos",
                Some(&cookie),
                Some(json!({"url": format!("https://cdn.example.com/{}.mp4", i)})),
            )
            .await;
        assert_eq!(res.status, StatusCode::CREATED);
    }

    let first = app.call("GET", "/api/videos/feed?limit=2", Some(&cookie), None).await;
    let first = first.body.as_array().unwrap().clone();
    assert_eq!(first.len(), 2);

    let last = &first[1];
    let uri = format!(
        "/api/videos/feed?limit=2&before={}&beforeId={}",
        last["createdAt"].as_str().unwrap(),
        last["id"].as_str().unwrap()
    );
    let second = app.call("GET", &uri, Some(&cookie), None).await;
    assert_eq!(second.status, StatusCode::OK);
    let second = second.body.as_array().unwrap().clone();
    assert_eq!(second.len(), 1);

    let mut ids: Vec<&str> = first.iter().chain(&second).map(|v| v["id"].as_str().unwrap()).collect();
    ids.sort_unstable();
    ids.dedup();
    assert_eq!(ids.len(), 3);
}
