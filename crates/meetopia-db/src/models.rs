//! Database row types. These map directly to SQLite rows and stay
//! independent of the wire types in meetopia-types.

#[derive(Debug, Clone)]
pub struct UserRow {
    pub id: String,
    pub email: String,
    pub username: String,
    pub password: String,
    pub display_name: Option<String>,
    pub bio: Option<String>,
    pub interests: Vec<String>,
    pub is_flagged: bool,
    pub created_at: String,
    pub updated_at: String,
}

/// Exclusive feed position: the last video of the previous page.
/// Without an `id`, every video sharing `created_at` is skipped.
#[derive(Debug, Clone, Copy)]
pub struct FeedCursor<'a> {
    pub created_at: &'a str,
    pub id: Option<&'a str>,
}

/// Unique user column an insert collided with.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserConflict {
    Email,
    Username,
}

pub struct NewUser<'a> {
    pub id: &'a str,
    pub email: &'a str,
    pub username: &'a str,
    pub password_hash: &'a str,
    pub display_name: Option<&'a str>,
}

/// Session joined with the owning user's name.
#[derive(Debug, Clone)]
pub struct SessionRow {
    pub id: String,
    pub user_id: String,
    pub username: String,
    pub created_at: String,
    pub expires_at: String,
}

#[derive(Debug, Clone)]
pub struct ReportRow {
    pub id: String,
    pub reporter_id: String,
    pub reported_user_id: String,
    pub reason: String,
    pub details: Option<String>,
    pub status: String,
    pub created_at: String,
}

pub struct NewReport<'a> {
    pub id: &'a str,
    pub reporter_id: &'a str,
    pub reported_user_id: &'a str,
    pub reason: &'a str,
    pub details: Option<&'a str>,
}

#[derive(Debug, Clone)]
pub struct VideoRow {
    pub id: String,
    pub url: String,
    pub title: Option<String>,
    pub user_id: String,
    pub username: String,
    pub likes: i64,
    pub liked_by_me: bool,
    pub created_at: String,
}

#[derive(Debug, Clone)]
pub struct MeetingRow {
    pub id: String,
    pub room_id: String,
    pub host_id: String,
    pub title: Option<String>,
    pub created_at: String,
    pub ended_at: Option<String>,
}
