use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Moderation state of a report.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ReportStatus {
    Pending,
    Reviewed,
    Resolved,
    Dismissed,
}

impl ReportStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Reviewed => "reviewed",
            Self::Resolved => "resolved",
            Self::Dismissed => "dismissed",
        }
    }
}

impl fmt::Display for ReportStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ReportStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "pending" => Ok(Self::Pending),
            "reviewed" => Ok(Self::Reviewed),
            "resolved" => Ok(Self::Resolved),
            "dismissed" => Ok(Self::Dismissed),
            other => Err(format!("unknown report status: {}", other)),
        }
    }
}

/// A user waiting in the random-match queue. Lives in memory only.
#[derive(Debug, Clone)]
pub struct MatchRequest {
    pub user_id: Uuid,
    pub interests: Vec<String>,
    pub requested_at: DateTime<Utc>,
}

/// Two users paired into a fresh signaling room. Lives in memory only.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Match {
    pub room_id: String,
    pub user_ids: [Uuid; 2],
    pub common_interests: Vec<String>,
}

impl Match {
    /// The other participant, if `user_id` is part of this match.
    pub fn peer_of(&self, user_id: Uuid) -> Option<Uuid> {
        match self.user_ids {
            [a, b] if a == user_id => Some(b),
            [a, b] if b == user_id => Some(a),
            _ => None,
        }
    }
}
