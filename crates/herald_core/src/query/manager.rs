//! Entry point that binds a store to the current settings.

use crate::model::notification::{Notification, NotificationId, UserId};
use crate::query::queryset::NotificationQuerySet;
use crate::query::QueryResult;
use crate::repo::notification_repo::NotificationStore;
use crate::settings::SettingsHandle;

/// Owns a notification store and hands out query views over it.
pub struct NotificationManager<S: NotificationStore> {
    store: S,
    settings: SettingsHandle,
}

impl<S: NotificationStore> NotificationManager<S> {
    pub fn new(store: S, settings: SettingsHandle) -> Self {
        Self { store, settings }
    }

    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn settings(&self) -> &SettingsHandle {
        &self.settings
    }

    /// Unfiltered view, newest first.
    pub fn all(&self) -> NotificationQuerySet<'_, S> {
        NotificationQuerySet::new(&self.store, self.settings.clone())
    }

    /// View limited to one recipient's notifications.
    pub fn for_recipient(&self, recipient: UserId) -> NotificationQuerySet<'_, S> {
        self.all().for_recipient(recipient)
    }

    pub fn unread(&self, include_deleted: bool) -> NotificationQuerySet<'_, S> {
        self.all().unread(include_deleted)
    }

    pub fn read(&self, include_deleted: bool) -> NotificationQuerySet<'_, S> {
        self.all().read(include_deleted)
    }

    pub fn get(&self, id: NotificationId) -> QueryResult<Option<Notification>> {
        Ok(self.store.get(id)?)
    }
}
