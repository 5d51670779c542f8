use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::AppResult;
use crate::format::timestamp_to_utc;

/// Backend query window. `start <= stop` is expected but not enforced.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TimeRange {
    pub start: DateTime<Utc>,
    pub stop: DateTime<Utc>,
}

impl TimeRange {
    #[must_use]
    pub fn new(start: DateTime<Utc>, stop: DateTime<Utc>) -> Self {
        Self { start, stop }
    }

    #[must_use]
    pub fn is_ordered(&self) -> bool {
        self.start <= self.stop
    }

    /// `start`/`stop` query parameters: ISO-8601 with milliseconds and
    /// without the trailing `Z` (the backend parses naive UTC).
    #[must_use]
    pub fn query_params(&self) -> [(&'static str, String); 2] {
        [("start", iso_naive(self.start)), ("stop", iso_naive(self.stop))]
    }
}

fn iso_naive(t: DateTime<Utc>) -> String {
    t.format("%Y-%m-%dT%H:%M:%S%.3f").to_string()
}

/// Backend endpoints under `/api/web`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Endpoint {
    Data,
    Logs,
    Sync,
}

impl Endpoint {
    #[must_use]
    pub fn path(self) -> &'static str {
        match self {
            Self::Data => "/api/web/data",
            Self::Logs => "/api/web/logs",
            Self::Sync => "/api/web/sync",
        }
    }

    /// Whether the endpoint takes a time range.
    #[must_use]
    pub fn is_ranged(self) -> bool {
        !matches!(self, Self::Sync)
    }
}

/// Response from `/api/web/sync`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SyncResponse {
    /// Last time the edge device synced, ms since epoch
    #[serde(default)]
    pub last_sync: Option<i64>,
    /// Timestamp of the newest stored sample, ms since epoch
    #[serde(default)]
    pub last_data: Option<i64>,
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct SyncStatus {
    pub last_sync: Option<DateTime<Utc>>,
    pub last_data: Option<DateTime<Utc>>,
}

impl TryFrom<SyncResponse> for SyncStatus {
    type Error = crate::error::AppError;

    fn try_from(raw: SyncResponse) -> AppResult<Self> {
        Ok(Self {
            last_sync: raw.last_sync.map(timestamp_to_utc).transpose()?,
            last_data: raw.last_data.map(timestamp_to_utc).transpose()?,
        })
    }
}

/// Response from `/api/web/logs`. Each row is positional against `columns`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LogsPayload {
    #[serde(default)]
    pub columns: Vec<String>,
    #[serde(default)]
    pub data: Vec<Vec<serde_json::Value>>,
}

impl LogsPayload {
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }
}
