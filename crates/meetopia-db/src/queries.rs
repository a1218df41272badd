use crate::Database;
use crate::models::{FeedCursor, MeetingRow, NewReport, NewUser, ReportRow, SessionRow, UserConflict, UserRow, VideoRow};
use anyhow::Result;
use rusqlite::{Connection, Row};
use tracing::warn;

const USER_COLUMNS: &str =
    "id, email, username, password, display_name, bio, interests, is_flagged, created_at, updated_at";

impl Database {
    // -- Users --

    /// Insert a user. A taken email or username comes back as `Ok(Err(..))`
    /// so callers can report it instead of failing.
    pub fn create_user(&self, user: &NewUser<'_>, now: &str) -> Result<std::result::Result<(), UserConflict>> {
        self.with_conn(|conn| {
            let inserted = conn.execute(
                "INSERT INTO users (id, email, username, password, display_name, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                rusqlite::params![
                    user.id,
                    user.email,
                    user.username,
                    user.password_hash,
                    user.display_name,
                    now
                ],
            );
            match inserted {
                Ok(_) => Ok(Ok(())),
                Err(e) => match user_conflict(&e) {
                    Some(conflict) => Ok(Err(conflict)),
                    None => Err(e.into()),
                },
            }
        })
    }

    pub fn get_user_by_email(&self, email: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "email", email))
    }

    pub fn get_user_by_username(&self, username: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "username", username))
    }

    pub fn get_user_by_id(&self, id: &str) -> Result<Option<UserRow>> {
        self.with_conn(|conn| query_user(conn, "id", id))
    }

    /// Apply the given profile fields; `None` leaves a column untouched.
    /// Returns the updated row, or `None` if the user does not exist.
    pub fn update_profile(
        &self,
        id: &str,
        display_name: Option<&str>,
        bio: Option<&str>,
        interests: Option<&[String]>,
        now: &str,
    ) -> Result<Option<UserRow>> {
        let interests_json = interests.map(serde_json::to_string).transpose()?;

        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE users SET
                    display_name = COALESCE(?2, display_name),
                    bio          = COALESCE(?3, bio),
                    interests    = COALESCE(?4, interests),
                    updated_at   = ?5
                 WHERE id = ?1",
                rusqlite::params![id, display_name, bio, interests_json, now],
            )?;
            if changed == 0 {
                return Ok(None);
            }
            query_user(conn, "id", id)
        })
    }

    /// Users other than `exclude_id`, optionally filtered by a substring of
    /// username or display name.
    pub fn search_users(&self, exclude_id: &str, query: Option<&str>, limit: u32) -> Result<Vec<UserRow>> {
        let pattern = query
            .map(str::trim)
            .filter(|q| !q.is_empty())
            .map(|q| format!("%{}%", escape_like(q)));

        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE id != ?1
                   AND (?2 IS NULL OR username LIKE ?2 ESCAPE '\\' OR display_name LIKE ?2 ESCAPE '\\')
                 ORDER BY username
                 LIMIT ?3"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map(rusqlite::params![exclude_id, pattern, limit], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Friends --

    /// Link two users in both directions. Returns false if they were already friends.
    pub fn add_friend(&self, user_id: &str, friend_id: &str, now: &str) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            let inserted = tx.execute(
                "INSERT OR IGNORE INTO friendships (user_id, friend_id, created_at) VALUES (?1, ?2, ?3)",
                (user_id, friend_id, now),
            )?;
            tx.execute(
                "INSERT OR IGNORE INTO friendships (user_id, friend_id, created_at) VALUES (?1, ?2, ?3)",
                (friend_id, user_id, now),
            )?;
            tx.commit()?;
            Ok(inserted > 0)
        })
    }

    /// Unlink two users in both directions. Returns false if they were not friends.
    pub fn remove_friend(&self, user_id: &str, friend_id: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let removed = conn.execute(
                "DELETE FROM friendships
                 WHERE (user_id = ?1 AND friend_id = ?2) OR (user_id = ?2 AND friend_id = ?1)",
                (user_id, friend_id),
            )?;
            Ok(removed > 0)
        })
    }

    pub fn list_friends(&self, user_id: &str) -> Result<Vec<UserRow>> {
        self.with_conn(|conn| {
            let sql = format!(
                "SELECT {USER_COLUMNS} FROM users
                 WHERE id IN (SELECT friend_id FROM friendships WHERE user_id = ?1)
                 ORDER BY username"
            );
            let mut stmt = conn.prepare(&sql)?;
            let rows = stmt
                .query_map([user_id], user_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Sessions --

    pub fn create_session(
        &self,
        id: &str,
        user_id: &str,
        token_hash: &str,
        created_at: &str,
        expires_at: &str,
    ) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, token_hash, created_at, expires_at)
                 VALUES (?1, ?2, ?3, ?4, ?5)",
                (id, user_id, token_hash, created_at, expires_at),
            )?;
            Ok(())
        })
    }

    pub fn get_session_by_token_hash(&self, token_hash: &str) -> Result<Option<SessionRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT s.id, s.user_id, u.username, s.created_at, s.expires_at
                 FROM sessions s
                 JOIN users u ON s.user_id = u.id
                 WHERE s.token_hash = ?1",
                [token_hash],
                |row| {
                    Ok(SessionRow {
                        id: row.get(0)?,
                        user_id: row.get(1)?,
                        username: row.get(2)?,
                        created_at: row.get(3)?,
                        expires_at: row.get(4)?,
                    })
                },
            )
            .optional()
        })
    }

    pub fn delete_session(&self, id: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute("DELETE FROM sessions WHERE id = ?1", [id])?;
            Ok(())
        })
    }

    /// Delete sessions whose `expires_at` is before `now`. Returns the number removed.
    pub fn delete_expired_sessions(&self, now: &str) -> Result<usize> {
        self.with_conn(|conn| {
            let removed = conn.execute("DELETE FROM sessions WHERE expires_at < ?1", [now])?;
            Ok(removed)
        })
    }

    // -- Reports --

    /// Insert a report and flag the reported user once `flag_threshold`
    /// distinct users have reported them. Returns true if this report flagged them.
    pub fn file_report(&self, report: &NewReport<'_>, now: &str, flag_threshold: usize) -> Result<bool> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;
            tx.execute(
                "INSERT INTO reports (id, reporter_id, reported_user_id, reason, details, status, created_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, 'pending', ?6)",
                rusqlite::params![
                    report.id,
                    report.reporter_id,
                    report.reported_user_id,
                    report.reason,
                    report.details,
                    now
                ],
            )?;

            let reporters: i64 = tx.query_row(
                "SELECT COUNT(DISTINCT reporter_id) FROM reports WHERE reported_user_id = ?1",
                [report.reported_user_id],
                |row| row.get(0),
            )?;

            let flagged = if reporters as usize >= flag_threshold {
                tx.execute(
                    "UPDATE users SET is_flagged = 1, updated_at = ?2 WHERE id = ?1 AND is_flagged = 0",
                    (report.reported_user_id, now),
                )? > 0
            } else {
                false
            };

            tx.commit()?;
            Ok(flagged)
        })
    }

    pub fn get_report(&self, id: &str) -> Result<Option<ReportRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, reporter_id, reported_user_id, reason, details, status, created_at
                 FROM reports WHERE id = ?1",
                [id],
                report_from_row,
            )
            .optional()
        })
    }

    pub fn list_reports_by_reporter(&self, reporter_id: &str) -> Result<Vec<ReportRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, reporter_id, reported_user_id, reason, details, status, created_at
                 FROM reports WHERE reporter_id = ?1
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([reporter_id], report_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    // -- Videos --

    pub fn insert_video(&self, id: &str, url: &str, title: Option<&str>, user_id: &str, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO videos (id, url, title, user_id, likes, created_at) VALUES (?1, ?2, ?3, ?4, 0, ?5)",
                rusqlite::params![id, url, title, user_id, now],
            )?;
            Ok(())
        })
    }

    pub fn get_video(&self, id: &str, viewer_id: &str) -> Result<Option<VideoRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT v.id, v.url, v.title, v.user_id, COALESCE(u.username, 'unknown'), v.likes,
                        EXISTS(SELECT 1 FROM video_likes l WHERE l.video_id = v.id AND l.user_id = ?2),
                        v.created_at
                 FROM videos v
                 LEFT JOIN users u ON v.user_id = u.id
                 WHERE v.id = ?1",
                (id, viewer_id),
                video_from_row,
            )
            .optional()
        })
    }

    /// Newest-first feed page, ordered by `(created_at, id)` so equal timestamps page stably.
    pub fn get_feed(&self, viewer_id: &str, limit: u32, before: Option<FeedCursor<'_>>) -> Result<Vec<VideoRow>> {
        let before_at = before.map(|c| c.created_at);
        let before_id = before.and_then(|c| c.id);
        self.with_conn(|conn| {
            // JOIN users to fetch the uploader name in the same query
            let mut stmt = conn.prepare(
                "SELECT v.id, v.url, v.title, v.user_id, COALESCE(u.username, 'unknown'), v.likes,
                        EXISTS(SELECT 1 FROM video_likes l WHERE l.video_id = v.id AND l.user_id = ?1),
                        v.created_at
                 FROM videos v
                 LEFT JOIN users u ON v.user_id = u.id
                 WHERE ?2 IS NULL
                    OR v.created_at < ?2
                    OR (v.created_at = ?2 AND ?4 IS NOT NULL AND v.id < ?4)
                 ORDER BY v.created_at DESC, v.id DESC
                 LIMIT ?3",
            )?;
            let rows = stmt
                .query_map(rusqlite::params![viewer_id, before_at, limit, before_id], video_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Toggle a like: removes it if present, adds it if not.
    /// Returns `(liked, likes)` after the toggle, or `None` if the video does not exist.
    pub fn toggle_like(&self, video_id: &str, user_id: &str, now: &str) -> Result<Option<(bool, i64)>> {
        self.with_conn_mut(|conn| {
            let tx = conn.transaction()?;

            let exists: Option<i64> = tx
                .query_row("SELECT 1 FROM videos WHERE id = ?1", [video_id], |row| row.get(0))
                .optional()?;
            if exists.is_none() {
                return Ok(None);
            }

            let removed = tx.execute(
                "DELETE FROM video_likes WHERE video_id = ?1 AND user_id = ?2",
                (video_id, user_id),
            )?;

            let liked = if removed > 0 {
                tx.execute("UPDATE videos SET likes = likes - 1 WHERE id = ?1", [video_id])?;
                false
            } else {
                tx.execute(
                    "INSERT INTO video_likes (video_id, user_id, created_at) VALUES (?1, ?2, ?3)",
                    (video_id, user_id, now),
                )?;
                tx.execute("UPDATE videos SET likes = likes + 1 WHERE id = ?1", [video_id])?;
                true
            };

            let likes: i64 = tx.query_row("SELECT likes FROM videos WHERE id = ?1", [video_id], |row| {
                row.get(0)
            })?;

            tx.commit()?;
            Ok(Some((liked, likes)))
        })
    }

    // -- Meetings --

    pub fn create_meeting(&self, id: &str, room_id: &str, host_id: &str, title: Option<&str>, now: &str) -> Result<()> {
        self.with_conn(|conn| {
            conn.execute(
                "INSERT INTO meetings (id, room_id, host_id, title, created_at) VALUES (?1, ?2, ?3, ?4, ?5)",
                rusqlite::params![id, room_id, host_id, title, now],
            )?;
            Ok(())
        })
    }

    pub fn get_meeting_by_room(&self, room_id: &str) -> Result<Option<MeetingRow>> {
        self.with_conn(|conn| {
            conn.query_row(
                "SELECT id, room_id, host_id, title, created_at, ended_at FROM meetings WHERE room_id = ?1",
                [room_id],
                meeting_from_row,
            )
            .optional()
        })
    }

    pub fn list_meetings_by_host(&self, host_id: &str) -> Result<Vec<MeetingRow>> {
        self.with_conn(|conn| {
            let mut stmt = conn.prepare(
                "SELECT id, room_id, host_id, title, created_at, ended_at FROM meetings
                 WHERE host_id = ?1
                 ORDER BY created_at DESC",
            )?;
            let rows = stmt
                .query_map([host_id], meeting_from_row)?
                .collect::<std::result::Result<Vec<_>, _>>()?;
            Ok(rows)
        })
    }

    /// Mark a meeting ended. Returns false if it was already ended or does not exist.
    pub fn end_meeting(&self, room_id: &str, now: &str) -> Result<bool> {
        self.with_conn(|conn| {
            let changed = conn.execute(
                "UPDATE meetings SET ended_at = ?2 WHERE room_id = ?1 AND ended_at IS NULL",
                (room_id, now),
            )?;
            Ok(changed > 0)
        })
    }
}

fn query_user(conn: &Connection, column: &str, value: &str) -> Result<Option<UserRow>> {
    let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE {column} = ?1");
    let mut stmt = conn.prepare(&sql)?;
    stmt.query_row([value], user_from_row).optional()
}

fn user_conflict(err: &rusqlite::Error) -> Option<UserConflict> {
    let rusqlite::Error::SqliteFailure(failure, Some(message)) = err else {
        return None;
    };
    if failure.code != rusqlite::ErrorCode::ConstraintViolation {
        return None;
    }
    if message.contains("users.email") {
        Some(UserConflict::Email)
    } else if message.contains("users.username") {
        Some(UserConflict::Username)
    } else {
        None
    }
}

fn user_from_row(row: &Row<'_>) -> rusqlite::Result<UserRow> {
    let id: String = row.get(0)?;
    let interests: String = row.get(6)?;
    let interests = decode_interests(&id, &interests);
    Ok(UserRow {
        id,
        email: row.get(1)?,
        username: row.get(2)?,
        password: row.get(3)?,
        display_name: row.get(4)?,
        bio: row.get(5)?,
        interests,
        is_flagged: row.get(7)?,
        created_at: row.get(8)?,
        updated_at: row.get(9)?,
    })
}

/// Stored as a JSON array. A corrupt column reads as no interests.
fn decode_interests(user_id: &str, raw: &str) -> Vec<String> {
    match serde_json::from_str(raw) {
        Ok(interests) => interests,
        Err(e) => {
            warn!("Corrupt interests for user {}: {}", user_id, e);
            Vec::new()
        }
    }
}

fn report_from_row(row: &Row<'_>) -> rusqlite::Result<ReportRow> {
    Ok(ReportRow {
        id: row.get(0)?,
        reporter_id: row.get(1)?,
        reported_user_id: row.get(2)?,
        reason: row.get(3)?,
        details: row.get(4)?,
        status: row.get(5)?,
        created_at: row.get(6)?,
    })
}

fn video_from_row(row: &Row<'_>) -> rusqlite::Result<VideoRow> {
    Ok(VideoRow {
        id: row.get(0)?,
        url: row.get(1)?,
        title: row.get(2)?,
        user_id: row.get(3)?,
        username: row.get(4)?,
        likes: row.get(5)?,
        liked_by_me: row.get(6)?,
        created_at: row.get(7)?,
    })
}

fn meeting_from_row(row: &Row<'_>) -> rusqlite::Result<MeetingRow> {
    Ok(MeetingRow {
        id: row.get(0)?,
        room_id: row.get(1)?,
        host_id: row.get(2)?,
        title: row.get(3)?,
        created_at: row.get(4)?,
        ended_at: row.get(5)?,
    })
}

fn escape_like(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    for c in raw.chars() {
        if matches!(c, '%' | '_' | '\\') {
            out.push('\\');
        }
        out.push(c);
    }
    out
}

/// Extension trait for optional query results
trait OptionalExt<T> {
    fn optional(self) -> Result<Option<T>>;
}

impl<T> OptionalExt<T> for std::result::Result<T, rusqlite::Error> {
    fn optional(self) -> Result<Option<T>> {
        match self {
            Ok(val) => Ok(Some(val)),
            Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
            Err(e) => Err(e.into()),
        }
    }
}
