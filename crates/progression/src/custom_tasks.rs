use serde::{Deserialize, Serialize};

use crate::catalog::{TaskCard, TaskCategory};
use crate::error::ValidationError;

pub const MIN_CUSTOM_TEXT_CHARS: usize = 5;
pub const CUSTOM_ID_PREFIX: &str = "custom_";

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CustomTask {
    pub id: String,
    pub text: String,
    pub category: TaskCategory,
    pub duration: String,
    pub unlock_level: u32,
}

impl CustomTask {
    pub fn to_card(&self) -> TaskCard {
        TaskCard {
            id: self.id.clone(),
            text: self.text.clone(),
            category: self.category,
            duration: self.duration.clone(),
            unlock_level: self.unlock_level,
            custom: true,
        }
    }
}

/// Validated input for a custom task, before it gets an id.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CustomTaskDraft {
    pub text: String,
    pub category: TaskCategory,
    pub duration: String,
}

/// Checks text, then category, then duration; the first failure wins.
pub fn validate_custom_task(
    text: &str,
    category: &str,
    duration: Option<&str>,
) -> Result<CustomTaskDraft, ValidationError> {
    let text = text.trim();
    if text.chars().count() < MIN_CUSTOM_TEXT_CHARS {
        return Err(ValidationError::InvalidText);
    }
    let category =
        TaskCategory::from_name(category.trim()).ok_or(ValidationError::InvalidCategory)?;
    let duration = duration
        .map(str::trim)
        .filter(|marker| !marker.is_empty())
        .ok_or(ValidationError::MissingDuration)?;

    Ok(CustomTaskDraft {
        text: text.to_string(),
        category,
        duration: duration.to_string(),
    })
}

/// Time-based id, bumped past any id already taken.
pub fn next_custom_id(now_millis: i64, existing: &[CustomTask]) -> String {
    let mut stamp = now_millis;
    loop {
        let candidate = format!("{CUSTOM_ID_PREFIX}{stamp}");
        if !existing.iter().any(|task| task.id == candidate) {
            return candidate;
        }
        stamp = stamp.saturating_add(1);
    }
}
