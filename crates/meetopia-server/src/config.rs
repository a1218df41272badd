use std::path::PathBuf;

use anyhow::Context;

const DEFAULT_STUN_URL: &str = "stun:stun.l.google.com:19302";
const MAX_SESSION_TTL_HOURS: i64 = 24 * 365;

/// Server settings, read from `MEETOPIA_*` environment variables.
#[derive(Debug, Clone)]
pub struct Config {
    pub host: String,
    pub port: u16,
    pub db_path: PathBuf,
    pub session_ttl_hours: i64,
    pub cookie_secure: bool,
    pub cleanup_interval_secs: u64,
    pub stun_urls: Vec<String>,
    pub turn_urls: Vec<String>,
    pub turn_secret: Option<String>,
}

impl Config {
    pub fn from_env() -> anyhow::Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> anyhow::Result<Self> {
        let get = |key: &str, default: &str| lookup(key).unwrap_or_else(|| default.to_string());

        let port = get("MEETOPIA_PORT", "3000")
            .parse()
            .context("MEETOPIA_PORT must be a port number")?;
        let session_ttl_hours: i64 = get("MEETOPIA_SESSION_TTL_HOURS", "168")
            .parse()
            .context("MEETOPIA_SESSION_TTL_HOURS must be a whole number of hours")?;
        if !(1..=MAX_SESSION_TTL_HOURS).contains(&session_ttl_hours) {
            anyhow::bail!("MEETOPIA_SESSION_TTL_HOURS must be between 1 and {}", MAX_SESSION_TTL_HOURS);
        }
        let cookie_secure = parse_bool(&get("MEETOPIA_COOKIE_SECURE", "false"))
            .context("MEETOPIA_COOKIE_SECURE must be true or false")?;
        let cleanup_interval_secs: u64 = get("MEETOPIA_CLEANUP_INTERVAL_SECS", "300")
            .parse()
            .context("MEETOPIA_CLEANUP_INTERVAL_SECS must be a whole number of seconds")?;
        if cleanup_interval_secs == 0 {
            anyhow::bail!("MEETOPIA_CLEANUP_INTERVAL_SECS must be positive");
        }

        Ok(Self {
            host: get("MEETOPIA_HOST", "0.0.0.0"),
            port,
            db_path: PathBuf::from(get("MEETOPIA_DB_PATH", "meetopia.db")),
            session_ttl_hours,
            cookie_secure,
            cleanup_interval_secs,
            stun_urls: split_list(&get("MEETOPIA_STUN_URLS", DEFAULT_STUN_URL)),
            turn_urls: split_list(&get("MEETOPIA_TURN_URLS", "")),
            turn_secret: lookup("MEETOPIA_TURN_SECRET").filter(|s| !s.is_empty()),
        })
    }
}

fn split_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

fn parse_bool(raw: &str) -> Option<bool> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
