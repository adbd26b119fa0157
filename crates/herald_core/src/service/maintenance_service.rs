//! Age-based notification cleanup.

use crate::query::manager::NotificationManager;
use crate::query::QueryResult;
use crate::repo::notification_repo::NotificationStore;
use chrono::{DateTime, Duration, Utc};
use log::info;

/// Hard-deletes every notification created at or before `now - max_age`,
/// regardless of read or deleted state. Returns the number removed.
///
/// A `max_age` reaching past the earliest representable time matches
/// nothing and removes zero rows.
pub fn delete_old_notifications<S: NotificationStore>(
    manager: &NotificationManager<S>,
    max_age: Duration,
    now: DateTime<Utc>,
) -> QueryResult<usize> {
    let removed = match now.checked_sub_signed(max_age) {
        Some(cutoff) => manager.all().older_than(cutoff).delete()?,
        None => 0,
    };
    info!(
        "event=delete_old module=maintenance status=ok max_age_secs={} removed={removed}",
        max_age.num_seconds()
    );
    Ok(removed)
}
