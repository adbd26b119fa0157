//! Composable notification query engine.
//!
//! # Responsibility
//! - Provide chainable status filters (read/unread, sent/unsent,
//!   public/private, active/deleted) over a notification store.
//! - Provide set-based bulk state transitions that report changed rows.
//! - Gate every deleted-state operation behind the soft-delete setting.
//!
//! # Invariants
//! - Filters never mutate the view they are called on.
//! - Deleted-state operations fail with [`QueryError::SoftDeleteDisabled`]
//!   while soft delete is off; an empty result is never used to signal it.

use crate::repo::notification_repo::RepoError;
use crate::settings::SettingsHandle;
use std::error::Error;
use std::fmt::{Display, Formatter};

pub mod filter;
pub mod manager;
pub mod queryset;

pub type QueryResult<T> = Result<T, QueryError>;

/// Query-engine error.
#[derive(Debug)]
pub enum QueryError {
    /// A deleted-state operation was used while soft delete is disabled.
    SoftDeleteDisabled,
    Repo(RepoError),
}

impl QueryError {
    /// Fails with [`QueryError::SoftDeleteDisabled`] unless soft delete is on.
    pub fn require_soft_delete(settings: &SettingsHandle) -> QueryResult<()> {
        if settings.soft_delete() {
            Ok(())
        } else {
            Err(Self::SoftDeleteDisabled)
        }
    }

    pub fn is_configuration_error(&self) -> bool {
        matches!(self, Self::SoftDeleteDisabled)
    }
}

impl Display for QueryError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::SoftDeleteDisabled => write!(
                f,
                "deleted-state operations require soft-delete to be enabled"
            ),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for QueryError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::SoftDeleteDisabled => None,
            Self::Repo(err) => Some(err),
        }
    }
}

impl From<RepoError> for QueryError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}
