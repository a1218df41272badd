use anyhow::Result;
use rusqlite::Connection;
use tracing::info;

pub fn run(conn: &Connection) -> Result<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS users (
            id            TEXT PRIMARY KEY,
            email         TEXT NOT NULL UNIQUE,
            username      TEXT NOT NULL UNIQUE,
            password      TEXT NOT NULL,
            display_name  TEXT,
            bio           TEXT,
            interests     TEXT NOT NULL DEFAULT '[]',
            is_flagged    INTEGER NOT NULL DEFAULT 0,
            created_at    TEXT NOT NULL,
            updated_at    TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS friendships (
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            friend_id   TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (user_id, friend_id)
        );

        CREATE TABLE IF NOT EXISTS sessions (
            id          TEXT PRIMARY KEY,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            token_hash  TEXT NOT NULL UNIQUE,
            created_at  TEXT NOT NULL,
            expires_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_sessions_expires
            ON sessions(expires_at);

        CREATE TABLE IF NOT EXISTS reports (
            id                TEXT PRIMARY KEY,
            reporter_id       TEXT NOT NULL REFERENCES users(id),
            reported_user_id  TEXT NOT NULL REFERENCES users(id),
            reason            TEXT NOT NULL,
            details           TEXT,
            status            TEXT NOT NULL DEFAULT 'pending',
            created_at        TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_reports_reported
            ON reports(reported_user_id);

        CREATE TABLE IF NOT EXISTS videos (
            id          TEXT PRIMARY KEY,
            url         TEXT NOT NULL,
            title       TEXT,
            user_id     TEXT NOT NULL REFERENCES users(id),
            likes       INTEGER NOT NULL DEFAULT 0,
            created_at  TEXT NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_videos_created
            ON videos(created_at);

        CREATE TABLE IF NOT EXISTS video_likes (
            video_id    TEXT NOT NULL REFERENCES videos(id) ON DELETE CASCADE,
            user_id     TEXT NOT NULL REFERENCES users(id) ON DELETE CASCADE,
            created_at  TEXT NOT NULL,
            PRIMARY KEY (video_id, user_id)
        );

        CREATE TABLE IF NOT EXISTS meetings (
            id          TEXT PRIMARY KEY,
            room_id     TEXT NOT NULL UNIQUE,
            host_id     TEXT NOT NULL REFERENCES users(id),
            title       TEXT,
            created_at  TEXT NOT NULL,
            ended_at    TEXT
        );

        CREATE INDEX IF NOT EXISTS idx_meetings_host
            ON meetings(host_id, created_at);
        ",
    )?;

    info!("Database migrations complete");
    Ok(())
}
