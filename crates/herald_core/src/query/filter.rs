//! Predicate sets and flag updates passed from the query engine to storage.
//!
//! # Invariants
//! - A filter is the conjunction of its predicates; order carries no meaning.
//! - Adding a predicate returns a new filter and never mutates the original.

use crate::model::notification::{Level, NotificationId, ObjectRef, UserId};
use chrono::{DateTime, Utc};

/// One equality or range condition on a notification row.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Predicate {
    Id(NotificationId),
    Recipient(UserId),
    Unread(bool),
    Emailed(bool),
    Public(bool),
    Deleted(bool),
    Level(Level),
    Actor(ObjectRef),
    Target(ObjectRef),
    /// `timestamp <= cutoff`.
    TimestampAtOrBefore(DateTime<Utc>),
}

/// Accumulated conjunction of predicates.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct NotificationFilter {
    predicates: Vec<Predicate>,
}

impl NotificationFilter {
    /// Filter matching every row.
    pub fn all() -> Self {
        Self::default()
    }

    /// Returns a new filter that additionally requires `predicate`.
    pub fn and(&self, predicate: Predicate) -> Self {
        let mut predicates = self.predicates.clone();
        if !predicates.contains(&predicate) {
            predicates.push(predicate);
        }
        Self { predicates }
    }

    pub fn predicates(&self) -> &[Predicate] {
        &self.predicates
    }

    pub fn is_empty(&self) -> bool {
        self.predicates.is_empty()
    }
}

/// Flag assignments applied by a bulk update. `None` leaves a column as is.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FlagUpdate {
    pub unread: Option<bool>,
    pub deleted: Option<bool>,
    pub emailed: Option<bool>,
    pub public: Option<bool>,
}

impl FlagUpdate {
    pub fn unread(value: bool) -> Self {
        Self {
            unread: Some(value),
            ..Self::default()
        }
    }

    pub fn deleted(value: bool) -> Self {
        Self {
            deleted: Some(value),
            ..Self::default()
        }
    }

    pub fn emailed(value: bool) -> Self {
        Self {
            emailed: Some(value),
            ..Self::default()
        }
    }

    pub fn public(value: bool) -> Self {
        Self {
            public: Some(value),
            ..Self::default()
        }
    }

    pub fn is_empty(&self) -> bool {
        self.unread.is_none()
            && self.deleted.is_none()
            && self.emailed.is_none()
            && self.public.is_none()
    }
}

/// Pagination window for ordered reads.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Window {
    pub limit: Option<u32>,
    pub offset: u32,
}

impl Window {
    pub fn limit(limit: u32) -> Self {
        Self {
            limit: Some(limit),
            offset: 0,
        }
    }
}
