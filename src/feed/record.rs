use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use crate::error::FeedError;
use crate::feed::classify::{classify_experience, ExperienceLevel};

/// Identifier assigned by the upstream aggregator.
pub type JobId = i64;

/// Per-record workflow state. Absent or unrecognized values decode as `New`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum JobStatus {
    #[default]
    New,
    Applied,
    Draft,
}

impl JobStatus {
    pub const ALL: [JobStatus; 3] = [JobStatus::New, JobStatus::Applied, JobStatus::Draft];

    pub fn as_str(&self) -> &'static str {
        match self {
            JobStatus::New => "NEW",
            JobStatus::Applied => "APPLIED",
            JobStatus::Draft => "DRAFT",
        }
    }

    /// Legacy records carry free-form status text; anything unknown is `New`.
    pub fn from_lenient(raw: &str) -> Self {
        raw.parse().unwrap_or_default()
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for JobStatus {
    type Err = FeedError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "NEW" => Ok(JobStatus::New),
            "APPLIED" => Ok(JobStatus::Applied),
            "DRAFT" => Ok(JobStatus::Draft),
            _ => Err(FeedError::InvalidValue {
                field: "status",
                value: s.to_string(),
            }),
        }
    }
}

impl<'de> Deserialize<'de> for JobStatus {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        match Value::deserialize(deserializer)? {
            Value::String(raw) => Ok(JobStatus::from_lenient(&raw)),
            _ => Ok(JobStatus::New),
        }
    }
}

fn null_as_empty<'de, D: Deserializer<'de>>(deserializer: D) -> Result<String, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Null => String::new(),
        Value::String(text) => text,
        other => other.to_string(),
    })
}

/// Strings pass through and epoch numbers are kept as their digits.
/// Anything else is treated as missing.
fn lenient_timestamp<'de, D: Deserializer<'de>>(
    deserializer: D,
) -> Result<Option<String>, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::String(raw) => Some(raw),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    })
}

/// A job posting as delivered by the bulk endpoint or the push channel.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub title: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub company: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub location: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub url: String,
    #[serde(default, deserialize_with = "null_as_empty")]
    pub source: String,
    #[serde(default)]
    pub status: JobStatus,
    #[serde(default, deserialize_with = "lenient_timestamp")]
    pub posted_at: Option<String>,
}

impl JobRecord {
    pub fn new(id: JobId, title: &str, company: &str, url: &str) -> Self {
        Self {
            id,
            title: title.to_string(),
            company: company.to_string(),
            location: String::new(),
            description: String::new(),
            url: url.to_string(),
            source: String::new(),
            status: JobStatus::New,
            posted_at: None,
        }
    }

    pub fn with_source(mut self, source: &str) -> Self {
        self.source = source.to_string();
        self
    }

    pub fn with_description(mut self, description: &str) -> Self {
        self.description = description.to_string();
        self
    }

    pub fn with_location(mut self, location: &str) -> Self {
        self.location = location.to_string();
        self
    }

    pub fn with_status(mut self, status: JobStatus) -> Self {
        self.status = status;
        self
    }

    pub fn with_posted_at(mut self, posted_at: &str) -> Self {
        self.posted_at = Some(posted_at.to_string());
        self
    }

    pub fn experience(&self) -> ExperienceLevel {
        classify_experience(&self.title, &self.description)
    }

    /// Posting time in epoch milliseconds, if the timestamp parses.
    pub fn posted_at_millis(&self) -> Option<i64> {
        self.posted_at
            .as_deref()
            .and_then(parse_timestamp)
            .map(|t| t.timestamp_millis())
    }
}

/// Parse the timestamp shapes the aggregator is known to emit.
///
/// Accepts RFC 3339, zone-less ISO date-times (read as UTC) and bare dates.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(t) = DateTime::parse_from_rfc3339(raw) {
        return Some(t.with_timezone(&Utc));
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M:%S%.f") {
        return Some(t.and_utc());
    }
    if let Ok(t) = NaiveDateTime::parse_from_str(raw, "%Y-%m-%dT%H:%M") {
        return Some(t.and_utc());
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|t| t.and_utc())
}

/// Human-readable age of a posting relative to `now`.
pub fn time_ago(posted_at: Option<&str>, now: DateTime<Utc>) -> String {
    let Some(posted) = posted_at.and_then(parse_timestamp) else {
        return "Just now".to_string();
    };
    let seconds = (now - posted).num_seconds();

    const BUCKETS: [(i64, &str); 5] = [
        (31_536_000, "years"),
        (2_592_000, "months"),
        (86_400, "days"),
        (3_600, "hours"),
        (60, "mins"),
    ];
    for (unit, label) in BUCKETS {
        if seconds > unit {
            return format!("{} {} ago", seconds / unit, label);
        }
    }
    if seconds < 10 {
        return "Just now".to_string();
    }
    format!("{} secs ago", seconds)
}
