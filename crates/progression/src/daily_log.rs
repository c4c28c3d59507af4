use chrono::NaiveDateTime;
use serde::{Deserialize, Serialize};

use crate::calendar::CalendarDate;
use crate::error::ProgressionError;

pub const DAILY_LOG_KEY_PREFIX: &str = "dailyTasks:";
pub const MAX_LOG_TEXT_CHARS: usize = 100;
pub const DEFAULT_RETENTION_DAYS: u32 = 30;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DailyLogEntry {
    pub text: String,
    pub time: NaiveDateTime,
    pub date: CalendarDate,
}

/// Every daily log key ever written, in first-write order. Retention walks
/// this instead of the store; opening the engine re-adds stored logs it lost.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DailyLogIndex {
    keys: Vec<String>,
}

impl DailyLogIndex {
    pub fn keys(&self) -> &[String] {
        &self.keys
    }

    pub fn contains(&self, key: &str) -> bool {
        self.keys.iter().any(|known| known == key)
    }

    /// Returns true when the key was not yet indexed.
    pub fn insert(&mut self, key: String) -> bool {
        if self.contains(&key) {
            return false;
        }
        self.keys.push(key);
        true
    }

    pub fn retain(&mut self, mut keep: impl FnMut(&str) -> bool) {
        self.keys.retain(|key| keep(key));
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetentionDecision {
    Keep { age_days: i64 },
    Expire { age_days: i64 },
    /// The key does not carry a readable date; never deleted.
    Unparsable,
}

#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PurgeReport {
    pub removed: Vec<String>,
    pub retained: usize,
    pub skipped_unparsable: Vec<String>,
}

pub fn daily_log_key(date: CalendarDate) -> String {
    format!("{DAILY_LOG_KEY_PREFIX}{date}")
}

pub fn date_from_log_key(key: &str) -> Option<CalendarDate> {
    key.strip_prefix(DAILY_LOG_KEY_PREFIX)?.parse().ok()
}

/// Trims `raw` and checks it fits a log entry.
pub fn validate_log_text(raw: &str) -> Result<String, ProgressionError> {
    let text = raw.trim();
    if text.is_empty() {
        return Err(ProgressionError::EmptyLogText);
    }
    let len = text.chars().count();
    if len > MAX_LOG_TEXT_CHARS {
        return Err(ProgressionError::LogTextTooLong {
            len,
            max: MAX_LOG_TEXT_CHARS,
        });
    }
    Ok(text.to_string())
}

/// A log expires once it is strictly older than `retention_days` whole days.
pub fn retention_decision(
    key: &str,
    today: CalendarDate,
    retention_days: u32,
) -> RetentionDecision {
    let Some(date) = date_from_log_key(key) else {
        return RetentionDecision::Unparsable;
    };
    let age_days = today.days_since(date);
    if age_days > i64::from(retention_days) {
        RetentionDecision::Expire { age_days }
    } else {
        RetentionDecision::Keep { age_days }
    }
}
