//! Core notification domain for Herald.
//! Entity model, storage, query engine and event emission live here; the API
//! and CLI crates only orchestrate these types.

pub mod db;
pub mod logging;
pub mod model;
pub mod query;
pub mod registry;
pub mod repo;
pub mod service;
pub mod settings;
pub mod slug;

pub use db::{open_db, open_db_in_memory, DbError, DbResult};
pub use logging::{default_log_level, init_logging, logging_status, LoggingError};
pub use model::notification::{
    Level, NewNotification, Notification, NotificationData, NotificationId,
    NotificationValidationError, ObjectRef, UserId,
};
pub use query::filter::{FlagUpdate, NotificationFilter, Predicate, Window};
pub use query::manager::NotificationManager;
pub use query::queryset::NotificationQuerySet;
pub use query::{QueryError, QueryResult};
pub use registry::{ObjectRegistry, ObjectResolver, RegistryError};
pub use repo::directory_repo::{DirectoryStore, GroupId, SqliteDirectoryStore, User};
pub use repo::notification_repo::{
    NotificationStore, RepoError, RepoResult, SqliteNotificationStore,
};
pub use service::maintenance_service::delete_old_notifications;
pub use service::notify_service::{Notifier, NotifyError, NotifyRequest, Recipient};
pub use settings::{
    NotificationSettings, SettingsError, SettingsHandle, SettingsResult, SettingsSource,
};
pub use slug::{id_to_slug, slug_to_id, SlugError};

/// Minimal health-check API for the CLI and embedding layers.
pub fn ping() -> &'static str {
    "pong"
}

/// Returns the core crate version.
pub fn core_version() -> &'static str {
    env!("CARGO_PKG_VERSION")
}
