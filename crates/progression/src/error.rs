use thiserror::Error;

use crate::calendar::CalendarDate;

/// Rejected custom-task input. `Display` is the reason shown to the player.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum ValidationError {
    #[error("Task must be at least 5 characters")]
    InvalidText,
    #[error("Invalid category")]
    InvalidCategory,
    #[error("Duration icon required")]
    MissingDuration,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ProgressionError {
    #[error(transparent)]
    Validation(#[from] ValidationError),
    #[error("xp award must be positive")]
    InvalidXpAmount,
    #[error("Please enter a task to log!")]
    EmptyLogText,
    #[error("task log text is {len} characters; at most {max} allowed")]
    LogTextTooLong { len: usize, max: usize },
    #[error("{kind} '{id}' is not unlocked yet")]
    CosmeticLocked { kind: &'static str, id: String },
    #[error("the saved log for {date} could not be read; nothing was logged")]
    DailyLogUnreadable { date: CalendarDate },
}

/// A stored record exists but does not decode into the expected shape.
#[derive(Debug, Error)]
#[error("stored record {key} failed to decode at {path}: {message}")]
pub struct DecodeError {
    pub key: String,
    pub path: String,
    pub message: String,
}
