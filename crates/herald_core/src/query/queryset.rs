//! Immutable, chainable notification views.
//!
//! # Invariants
//! - Each filter method returns a new view; the receiver is left unchanged.
//! - Read-state filters add `deleted = false` only when soft delete is on and
//!   `include_deleted` is false.
//! - `mark_all_as_*` first restricts to rows in the opposite state, so the
//!   returned count is the number of rows that changed and a repeated call
//!   returns zero.
//! - Only `mark_all_as_read` and `mark_all_as_unread` reach soft-deleted rows;
//!   the other `mark_all_as_*` operations leave them alone when soft delete is on.
//! - Read-state filters capture the soft-delete setting when the view is
//!   built. Soft-delete gating on `active`, `deleted` and the deleted-state
//!   updates reads the setting when the method runs.

use crate::model::notification::{Level, Notification, NotificationId, ObjectRef, UserId};
use crate::query::filter::{FlagUpdate, NotificationFilter, Predicate, Window};
use crate::query::{QueryError, QueryResult};
use crate::repo::notification_repo::NotificationStore;
use crate::settings::SettingsHandle;
use chrono::{DateTime, Utc};
use log::info;

/// A filtered view over a notification store.
pub struct NotificationQuerySet<'s, S: NotificationStore + ?Sized> {
    store: &'s S,
    settings: SettingsHandle,
    filter: NotificationFilter,
}

impl<S: NotificationStore + ?Sized> Clone for NotificationQuerySet<'_, S> {
    fn clone(&self) -> Self {
        Self {
            store: self.store,
            settings: self.settings.clone(),
            filter: self.filter.clone(),
        }
    }
}

impl<S: NotificationStore + ?Sized> std::fmt::Debug for NotificationQuerySet<'_, S> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationQuerySet")
            .field("filter", &self.filter)
            .finish()
    }
}

impl<'s, S: NotificationStore + ?Sized> NotificationQuerySet<'s, S> {
    /// Unfiltered view over `store`.
    pub fn new(store: &'s S, settings: SettingsHandle) -> Self {
        Self {
            store,
            settings,
            filter: NotificationFilter::all(),
        }
    }

    pub fn filter(&self) -> &NotificationFilter {
        &self.filter
    }

    /// Returns a new view that additionally requires `predicate`.
    pub fn matching(&self, predicate: Predicate) -> Self {
        Self {
            store: self.store,
            settings: self.settings.clone(),
            filter: self.filter.and(predicate),
        }
    }

    fn read_state(&self, predicate: Predicate, include_deleted: bool) -> Self {
        let view = self.matching(predicate);
        if self.settings.soft_delete() && !include_deleted {
            view.matching(Predicate::Deleted(false))
        } else {
            view
        }
    }

    pub fn unread(&self, include_deleted: bool) -> Self {
        self.read_state(Predicate::Unread(true), include_deleted)
    }

    pub fn read(&self, include_deleted: bool) -> Self {
        self.read_state(Predicate::Unread(false), include_deleted)
    }

    pub fn sent(&self, include_deleted: bool) -> Self {
        self.read_state(Predicate::Emailed(true), include_deleted)
    }

    pub fn unsent(&self, include_deleted: bool) -> Self {
        self.read_state(Predicate::Emailed(false), include_deleted)
    }

    pub fn public(&self, include_deleted: bool) -> Self {
        self.read_state(Predicate::Public(true), include_deleted)
    }

    pub fn private(&self, include_deleted: bool) -> Self {
        self.read_state(Predicate::Public(false), include_deleted)
    }

    /// Rows not soft-deleted. Requires soft delete.
    pub fn active(&self) -> QueryResult<Self> {
        QueryError::require_soft_delete(&self.settings)?;
        Ok(self.matching(Predicate::Deleted(false)))
    }

    /// Soft-deleted rows. Requires soft delete.
    pub fn deleted(&self) -> QueryResult<Self> {
        QueryError::require_soft_delete(&self.settings)?;
        Ok(self.matching(Predicate::Deleted(true)))
    }

    pub fn for_recipient(&self, recipient: UserId) -> Self {
        self.matching(Predicate::Recipient(recipient))
    }

    pub fn with_level(&self, level: Level) -> Self {
        self.matching(Predicate::Level(level))
    }

    pub fn by_actor(&self, actor: &ObjectRef) -> Self {
        self.matching(Predicate::Actor(actor.clone()))
    }

    pub fn by_target(&self, target: &ObjectRef) -> Self {
        self.matching(Predicate::Target(target.clone()))
    }

    pub fn with_id(&self, id: NotificationId) -> Self {
        self.matching(Predicate::Id(id))
    }

    /// Rows created at or before `cutoff`.
    pub fn older_than(&self, cutoff: DateTime<Utc>) -> Self {
        self.matching(Predicate::TimestampAtOrBefore(cutoff))
    }

    /// All matching rows, newest first.
    pub fn list(&self) -> QueryResult<Vec<Notification>> {
        Ok(self.store.select(&self.filter, Window::default())?)
    }

    /// One page of matching rows, newest first.
    pub fn list_window(&self, limit: u32, offset: u32) -> QueryResult<Vec<Notification>> {
        Ok(self.store.select(
            &self.filter,
            Window {
                limit: Some(limit),
                offset,
            },
        )?)
    }

    /// Newest matching row.
    pub fn first(&self) -> QueryResult<Option<Notification>> {
        Ok(self
            .store
            .select(&self.filter, Window::limit(1))?
            .into_iter()
            .next())
    }

    /// Matching row with `id`, if any.
    pub fn get(&self, id: NotificationId) -> QueryResult<Option<Notification>> {
        self.with_id(id).first()
    }

    pub fn count(&self) -> QueryResult<u64> {
        Ok(self.store.count(&self.filter)?)
    }

    pub fn exists(&self) -> QueryResult<bool> {
        Ok(self.first()?.is_some())
    }

    /// Marks unread rows read, including soft-deleted ones.
    pub fn mark_all_as_read(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.unread(true)
            .update_scoped("mark_all_as_read", recipient, FlagUpdate::unread(false))
    }

    /// Marks read rows unread, including soft-deleted ones.
    pub fn mark_all_as_unread(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.read(true)
            .update_scoped("mark_all_as_unread", recipient, FlagUpdate::unread(true))
    }

    /// Marks unsent rows sent, skipping soft-deleted ones when soft delete is on.
    pub fn mark_all_as_sent(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.unsent(false)
            .update_scoped("mark_all_as_sent", recipient, FlagUpdate::emailed(true))
    }

    pub fn mark_all_as_unsent(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.sent(false)
            .update_scoped("mark_all_as_unsent", recipient, FlagUpdate::emailed(false))
    }

    pub fn mark_all_as_public(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.private(false)
            .update_scoped("mark_all_as_public", recipient, FlagUpdate::public(true))
    }

    pub fn mark_all_as_private(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.public(false)
            .update_scoped("mark_all_as_private", recipient, FlagUpdate::public(false))
    }

    /// Soft-deletes active rows. Requires soft delete.
    pub fn mark_all_as_deleted(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.active()?
            .update_scoped("mark_all_as_deleted", recipient, FlagUpdate::deleted(true))
    }

    /// Restores soft-deleted rows. Requires soft delete.
    pub fn mark_all_as_active(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.deleted()?
            .update_scoped("mark_all_as_active", recipient, FlagUpdate::deleted(false))
    }

    /// Sets `unread = false` on every row in the view, without restricting to
    /// unread rows first.
    pub fn mark_as_read(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.update_scoped("mark_as_read", recipient, FlagUpdate::unread(false))
    }

    pub fn mark_as_unread(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.update_scoped("mark_as_unread", recipient, FlagUpdate::unread(true))
    }

    pub fn mark_as_sent(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.update_scoped("mark_as_sent", recipient, FlagUpdate::emailed(true))
    }

    pub fn mark_as_unsent(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.update_scoped("mark_as_unsent", recipient, FlagUpdate::emailed(false))
    }

    pub fn mark_as_public(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.update_scoped("mark_as_public", recipient, FlagUpdate::public(true))
    }

    pub fn mark_as_private(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        self.update_scoped("mark_as_private", recipient, FlagUpdate::public(false))
    }

    /// Sets `deleted = true` on every row in the view. Requires soft delete.
    pub fn mark_as_deleted(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        QueryError::require_soft_delete(&self.settings)?;
        self.update_scoped("mark_as_deleted", recipient, FlagUpdate::deleted(true))
    }

    /// Sets `deleted = false` on every row in the view. Requires soft delete.
    pub fn mark_as_active(&self, recipient: Option<UserId>) -> QueryResult<usize> {
        QueryError::require_soft_delete(&self.settings)?;
        self.update_scoped("mark_as_active", recipient, FlagUpdate::deleted(false))
    }

    /// Removes every matching row from storage.
    pub fn delete(&self) -> QueryResult<usize> {
        let removed = self.store.delete_matching(&self.filter)?;
        info!("event=bulk_delete module=query status=ok affected={removed}");
        Ok(removed)
    }

    fn update_scoped(
        &self,
        op: &'static str,
        recipient: Option<UserId>,
        update: FlagUpdate,
    ) -> QueryResult<usize> {
        let view = match recipient {
            Some(recipient) => self.for_recipient(recipient),
            None => self.clone(),
        };
        let affected = view.store.update_matching(&view.filter, update)?;
        info!(
            "event=bulk_update module=query status=ok op={op} scoped={} affected={affected}",
            recipient.is_some()
        );
        Ok(affected)
    }
}
