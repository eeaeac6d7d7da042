use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which timer produced a duration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityType {
    Stopwatch,
    Countdown,
    Pomodoro,
}

impl ActivityType {
    pub fn as_str(&self) -> &'static str {
        match self {
            ActivityType::Stopwatch => "stopwatch",
            ActivityType::Countdown => "countdown",
            ActivityType::Pomodoro => "pomodoro",
        }
    }
}

impl fmt::Display for ActivityType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One entry of a project's session history.
///
/// Two kinds share this shape: day-buckets (`date` is set, the record is
/// incremented by every flush for the same type and day) and discrete logs
/// (`date` is `None`, written once by an explicit "log this run").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionRecord {
    pub id: String,
    #[serde(rename = "type")]
    pub activity: ActivityType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    /// First flush of the bucket, or start of a discrete run.
    pub start: DateTime<Utc>,
    /// Last flush of the bucket, or end of a discrete run.
    pub end: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

impl SessionRecord {
    pub fn is_day_bucket(&self) -> bool {
        self.date.is_some()
    }
}

/// Input for the discrete logging path.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct NewSession {
    #[serde(rename = "type")]
    pub activity: ActivityType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

/// Last aggregate the remote store reported for a project. Advisory only.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteShadow {
    pub total_ms: u64,
    pub session_count: usize,
    pub synced_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Project {
    pub id: String,
    #[serde(default)]
    pub remote_id: Option<String>,
    pub name: String,
    #[serde(default)]
    pub description: String,
    pub created_at: DateTime<Utc>,
    /// Always equal to the sum of `sessions[*].duration_ms`.
    #[serde(default)]
    pub total_ms: u64,
    /// Most recent first.
    #[serde(default)]
    pub sessions: Vec<SessionRecord>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remote_shadow: Option<RemoteShadow>,
}

impl Project {
    pub fn matches_id(&self, id: &str) -> bool {
        self.id == id || self.remote_id.as_deref() == Some(id)
    }

    pub fn sessions_total_ms(&self) -> u64 {
        self.sessions
            .iter()
            .fold(0u64, |acc, s| acc.saturating_add(s.duration_ms))
    }
}

/// Body of `POST /projects/{remoteId}/sessions`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionPayload {
    #[serde(rename = "type")]
    pub activity: ActivityType,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub duration_ms: u64,
}

/// Project document as returned by the remote API. Only the fields the
/// engine reads are modelled; unknown fields are ignored.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RemoteProject {
    #[serde(default, alias = "_id")]
    pub id: String,
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub total_ms: u64,
    #[serde(default)]
    pub sessions: Vec<serde_json::Value>,
}
