//! Offset-obfuscated URL slugs for notification ids.

use crate::model::notification::NotificationId;
use std::error::Error;
use std::fmt::{Display, Formatter};

const SLUG_OFFSET: i64 = 110_909;

/// Slug parse errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SlugError {
    Malformed(String),
    OutOfRange(i64),
}

impl Display for SlugError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Malformed(value) => write!(f, "malformed notification slug `{value}`"),
            Self::OutOfRange(value) => write!(f, "notification slug out of range: {value}"),
        }
    }
}

impl Error for SlugError {}

pub fn id_to_slug(id: NotificationId) -> i64 {
    id + SLUG_OFFSET
}

/// Parses a slug back into a notification id.
///
/// Slugs that would map to a non-positive id are rejected.
pub fn slug_to_id(slug: &str) -> Result<NotificationId, SlugError> {
    let trimmed = slug.trim();
    let value: i64 = trimmed
        .parse()
        .map_err(|_| SlugError::Malformed(trimmed.to_string()))?;
    match value.checked_sub(SLUG_OFFSET) {
        Some(id) if id > 0 => Ok(id),
        _ => Err(SlugError::OutOfRange(value)),
    }
}
