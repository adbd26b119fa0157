//! Notification record, severity level and tagged object references.
//!
//! # Responsibility
//! - Define the persisted shape of one "actor verb target" notification.
//! - Provide guarded single-row transitions (`mark_as_read` and friends).
//! - Render the human-readable summary and object links.
//!
//! # Invariants
//! - `id` and `uuid` are assigned once by storage and never change.
//! - Single-row transitions write only when the flag actually changes.
//! - `data` is only ever populated by the notifier when extended attributes
//!   are enabled.

use crate::model::timesince::{naturalday, timesince};
use crate::query::filter::FlagUpdate;
use crate::query::QueryError;
use crate::registry::ObjectRegistry;
use crate::repo::notification_repo::{NotificationStore, RepoResult};
use crate::settings::SettingsHandle;
use crate::slug::id_to_slug;
use chrono::{DateTime, NaiveDate, Utc};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

/// Storage-assigned, monotonically increasing notification id.
pub type NotificationId = i64;

/// Recipient user id.
pub type UserId = i64;

/// Free-form extension attributes stored in the `data` column.
pub type NotificationData = Map<String, Value>;

const MAX_VERB_CHARS: usize = 255;
const MAX_OBJECT_ID_CHARS: usize = 255;

static OBJECT_KIND_RE: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^[A-Za-z][A-Za-z0-9_.]*$").expect("valid object kind regex"));

/// Notification severity.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum Level {
    Success,
    #[default]
    Info,
    Warning,
    Error,
}

impl Level {
    /// Stable storage/wire value.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Info => "info",
            Self::Warning => "warning",
            Self::Error => "error",
        }
    }

    pub fn parse(value: &str) -> Option<Self> {
        match value {
            "success" => Some(Self::Success),
            "info" => Some(Self::Info),
            "warning" => Some(Self::Warning),
            "error" => Some(Self::Error),
            _ => None,
        }
    }
}

impl Display for Level {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Tagged reference to an arbitrary domain object.
///
/// `kind` plays the role of a content type (`auth.user`, `blog.post`), `id`
/// is the object's primary key rendered as text.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ObjectRef {
    pub kind: String,
    pub id: String,
}

impl ObjectRef {
    pub fn new(kind: impl Into<String>, id: impl ToString) -> Self {
        Self {
            kind: kind.into(),
            id: id.to_string(),
        }
    }

    fn validate(&self, field: &'static str) -> Result<(), NotificationValidationError> {
        if !OBJECT_KIND_RE.is_match(&self.kind) {
            return Err(NotificationValidationError::InvalidObjectKind {
                field,
                kind: self.kind.clone(),
            });
        }
        if self.id.trim().is_empty() || self.id.chars().count() > MAX_OBJECT_ID_CHARS {
            return Err(NotificationValidationError::InvalidObjectId { field });
        }
        Ok(())
    }
}

impl Display for ObjectRef {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}#{}", self.kind, self.id)
    }
}

/// Shape errors rejected before a notification is persisted.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum NotificationValidationError {
    EmptyVerb,
    VerbTooLong(usize),
    InvalidObjectKind { field: &'static str, kind: String },
    InvalidObjectId { field: &'static str },
}

impl Display for NotificationValidationError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::EmptyVerb => write!(f, "notification verb must not be empty"),
            Self::VerbTooLong(chars) => write!(
                f,
                "notification verb has {chars} characters; at most {MAX_VERB_CHARS} allowed"
            ),
            Self::InvalidObjectKind { field, kind } => {
                write!(f, "invalid object kind `{kind}` for {field}")
            }
            Self::InvalidObjectId { field } => write!(
                f,
                "{field} id must be non-empty and at most {MAX_OBJECT_ID_CHARS} characters"
            ),
        }
    }
}

impl Error for NotificationValidationError {}

/// Outcome of assigning a named extra attribute onto a draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AttributeAssignment {
    /// The draft has a settable attribute with this name and it was set.
    Assigned,
    /// No such attribute; the value belongs in `data`.
    Unknown,
    /// The attribute exists but the value has the wrong type.
    TypeMismatch,
    /// The name is a core field that must be supplied through its own argument.
    Reserved,
}

const RESERVED_ATTRIBUTES: &[&str] = &[
    "id",
    "uuid",
    "recipient",
    "actor",
    "verb",
    "description",
    "target",
    "action_object",
    "timestamp",
    "level",
    "public",
    "data",
];

/// Unsaved notification draft.
#[derive(Debug, Clone, PartialEq)]
pub struct NewNotification {
    pub recipient: UserId,
    pub actor: ObjectRef,
    pub verb: String,
    pub description: Option<String>,
    pub target: Option<ObjectRef>,
    pub action_object: Option<ObjectRef>,
    pub level: Level,
    pub timestamp: DateTime<Utc>,
    pub public: bool,
    pub unread: bool,
    pub deleted: bool,
    pub emailed: bool,
    pub data: Option<NotificationData>,
}

impl NewNotification {
    /// Creates a draft with default flags, `Level::Info` and the current time.
    pub fn new(recipient: UserId, actor: ObjectRef, verb: impl Into<String>) -> Self {
        Self {
            recipient,
            actor,
            verb: verb.into(),
            description: None,
            target: None,
            action_object: None,
            level: Level::Info,
            timestamp: Utc::now(),
            public: true,
            unread: true,
            deleted: false,
            emailed: false,
            data: None,
        }
    }

    /// Checks the draft shape before persistence.
    pub fn validate(&self) -> Result<(), NotificationValidationError> {
        let verb_chars = self.verb.chars().count();
        if self.verb.trim().is_empty() {
            return Err(NotificationValidationError::EmptyVerb);
        }
        if verb_chars > MAX_VERB_CHARS {
            return Err(NotificationValidationError::VerbTooLong(verb_chars));
        }
        self.actor.validate("actor")?;
        if let Some(target) = &self.target {
            target.validate("target")?;
        }
        if let Some(action_object) = &self.action_object {
            action_object.validate("action_object")?;
        }
        Ok(())
    }

    /// Sets a settable attribute by name.
    ///
    /// Only the caller-managed flags (`unread`, `deleted`, `emailed`) are
    /// settable this way.
    pub fn assign_attribute(&mut self, name: &str, value: &Value) -> AttributeAssignment {
        if RESERVED_ATTRIBUTES.contains(&name) {
            return AttributeAssignment::Reserved;
        }
        let slot = match name {
            "unread" => &mut self.unread,
            "deleted" => &mut self.deleted,
            "emailed" => &mut self.emailed,
            _ => return AttributeAssignment::Unknown,
        };
        match value.as_bool() {
            Some(flag) => {
                *slot = flag;
                AttributeAssignment::Assigned
            }
            None => AttributeAssignment::TypeMismatch,
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Flag {
    Unread,
    Deleted,
}

impl Flag {
    fn slot(self, notification: &mut Notification) -> &mut bool {
        match self {
            Self::Unread => &mut notification.unread,
            Self::Deleted => &mut notification.deleted,
        }
    }

    fn update(self, value: bool) -> FlagUpdate {
        match self {
            Self::Unread => FlagUpdate::unread(value),
            Self::Deleted => FlagUpdate::deleted(value),
        }
    }
}

/// Persisted notification row.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Notification {
    id: NotificationId,
    uuid: Uuid,
    pub recipient: UserId,
    pub actor: ObjectRef,
    pub verb: String,
    pub description: Option<String>,
    pub target: Option<ObjectRef>,
    pub action_object: Option<ObjectRef>,
    pub level: Level,
    pub timestamp: DateTime<Utc>,
    pub public: bool,
    pub unread: bool,
    pub deleted: bool,
    pub emailed: bool,
    pub data: Option<NotificationData>,
}

impl Notification {
    /// Builds the persisted form of `draft`. Only storage implementations
    /// assign ids.
    pub fn from_stored(id: NotificationId, uuid: Uuid, draft: NewNotification) -> Self {
        Self {
            id,
            uuid,
            recipient: draft.recipient,
            actor: draft.actor,
            verb: draft.verb,
            description: draft.description,
            target: draft.target,
            action_object: draft.action_object,
            level: draft.level,
            timestamp: draft.timestamp,
            public: draft.public,
            unread: draft.unread,
            deleted: draft.deleted,
            emailed: draft.emailed,
            data: draft.data,
        }
    }

    pub fn id(&self) -> NotificationId {
        self.id
    }

    /// Stable opaque identifier suitable for external references.
    pub fn uuid(&self) -> Uuid {
        self.uuid
    }

    /// URL slug for this notification.
    pub fn slug(&self) -> i64 {
        id_to_slug(self.id)
    }

    /// Marks this notification read. Returns whether a write happened.
    pub fn mark_as_read<S: NotificationStore + ?Sized>(&mut self, store: &S) -> RepoResult<bool> {
        self.set_flag(store, Flag::Unread, false)
    }

    /// Marks this notification unread. Returns whether a write happened.
    pub fn mark_as_unread<S: NotificationStore + ?Sized>(
        &mut self,
        store: &S,
    ) -> RepoResult<bool> {
        self.set_flag(store, Flag::Unread, true)
    }

    /// Soft-deletes this notification. Requires soft delete to be enabled.
    pub fn mark_as_deleted<S: NotificationStore + ?Sized>(
        &mut self,
        store: &S,
        settings: &SettingsHandle,
    ) -> Result<bool, QueryError> {
        QueryError::require_soft_delete(settings)?;
        Ok(self.set_flag(store, Flag::Deleted, true)?)
    }

    /// Restores a soft-deleted notification. Requires soft delete to be enabled.
    pub fn mark_as_active<S: NotificationStore + ?Sized>(
        &mut self,
        store: &S,
        settings: &SettingsHandle,
    ) -> Result<bool, QueryError> {
        QueryError::require_soft_delete(settings)?;
        Ok(self.set_flag(store, Flag::Deleted, false)?)
    }

    fn set_flag<S: NotificationStore + ?Sized>(
        &mut self,
        store: &S,
        flag: Flag,
        target: bool,
    ) -> RepoResult<bool> {
        if *flag.slot(self) == target {
            return Ok(false);
        }
        *flag.slot(self) = target;
        if let Err(err) = store.update_flags(self.id, flag.update(target)) {
            *flag.slot(self) = !target;
            return Err(err);
        }
        Ok(true)
    }

    /// Elapsed time since `timestamp`, e.g. "3 hours, 2 minutes".
    pub fn timesince(&self, now: DateTime<Utc>) -> String {
        timesince(self.timestamp, now)
    }

    /// Calendar-relative day of `timestamp` ("today", "yesterday", ...).
    pub fn naturalday(&self, today: NaiveDate) -> String {
        naturalday(self.timestamp, today)
    }

    /// One-sentence summary: actor, verb, optional action object and target,
    /// and the elapsed time.
    pub fn summary(&self, registry: &ObjectRegistry, now: DateTime<Utc>) -> String {
        let actor = registry.display(&self.actor);
        let elapsed = self.timesince(now);
        match (&self.action_object, &self.target) {
            (Some(action_object), Some(target)) => format!(
                "{actor} {} {} on {} {elapsed} ago",
                self.verb,
                registry.display(action_object),
                registry.display(target)
            ),
            (None, Some(target)) => format!(
                "{actor} {} {} {elapsed} ago",
                self.verb,
                registry.display(target)
            ),
            (Some(action_object), None) => format!(
                "{actor} {} {} {elapsed} ago",
                self.verb,
                registry.display(action_object)
            ),
            (None, None) => format!("{actor} {} {elapsed} ago", self.verb),
        }
    }

    /// Admin link for the actor, or its raw id.
    pub fn actor_object_url(&self, registry: &ObjectRegistry) -> String {
        registry.object_link(&self.actor)
    }

    /// Admin link for the target, or its raw id. Empty when there is no target.
    pub fn target_object_url(&self, registry: &ObjectRegistry) -> String {
        self.target
            .as_ref()
            .map(|target| registry.object_link(target))
            .unwrap_or_default()
    }

    /// Admin link for the action object, or its raw id. Empty when absent.
    pub fn action_object_url(&self, registry: &ObjectRegistry) -> String {
        self.action_object
            .as_ref()
            .map(|action_object| registry.object_link(action_object))
            .unwrap_or_default()
    }
}

#[cfg(test)]
mod tests {
    use super::{
        AttributeAssignment, Level, NewNotification, Notification, NotificationValidationError,
        ObjectRef,
    };
    use crate::registry::ObjectRegistry;
    use chrono::{Duration, TimeZone, Utc};
    use serde_json::json;
    use uuid::Uuid;

    fn stored(draft: NewNotification) -> Notification {
        Notification::from_stored(1, Uuid::new_v4(), draft)
    }

    #[test]
    fn level_round_trips_through_storage_text() {
        for level in [Level::Success, Level::Info, Level::Warning, Level::Error] {
            assert_eq!(Level::parse(level.as_str()), Some(level));
        }
        assert_eq!(Level::parse("fatal"), None);
        assert_eq!(Level::default(), Level::Info);
    }

    #[test]
    fn draft_defaults_match_schema_defaults() {
        let draft = NewNotification::new(3, ObjectRef::new("auth.user", 1), "followed");
        assert!(draft.public);
        assert!(draft.unread);
        assert!(!draft.deleted);
        assert!(!draft.emailed);
        assert_eq!(draft.level, Level::Info);
        assert!(draft.data.is_none());
    }

    #[test]
    fn validate_rejects_bad_shapes() {
        let mut draft = NewNotification::new(3, ObjectRef::new("auth.user", 1), "  ");
        assert_eq!(draft.validate(), Err(NotificationValidationError::EmptyVerb));

        draft.verb = "x".repeat(256);
        assert_eq!(
            draft.validate(),
            Err(NotificationValidationError::VerbTooLong(256))
        );

        draft.verb = "liked".to_string();
        draft.target = Some(ObjectRef::new("9post", "1"));
        assert!(matches!(
            draft.validate(),
            Err(NotificationValidationError::InvalidObjectKind { field: "target", .. })
        ));

        draft.target = Some(ObjectRef::new("blog.post", ""));
        assert_eq!(
            draft.validate(),
            Err(NotificationValidationError::InvalidObjectId { field: "target" })
        );

        draft.target = Some(ObjectRef::new("blog.post", "1"));
        assert!(draft.validate().is_ok());
    }

    #[test]
    fn assign_attribute_only_touches_caller_managed_flags() {
        let mut draft = NewNotification::new(3, ObjectRef::new("auth.user", 1), "pinged");
        assert_eq!(
            draft.assign_attribute("emailed", &json!(true)),
            AttributeAssignment::Assigned
        );
        assert!(draft.emailed);
        assert_eq!(
            draft.assign_attribute("unread", &json!("no")),
            AttributeAssignment::TypeMismatch
        );
        assert!(draft.unread);
        assert_eq!(
            draft.assign_attribute("verb", &json!("hijacked")),
            AttributeAssignment::Reserved
        );
        assert_eq!(
            draft.assign_attribute("foo", &json!("bar")),
            AttributeAssignment::Unknown
        );
    }

    #[test]
    fn summary_picks_template_from_present_objects() {
        let now = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let registry = ObjectRegistry::new();
        let mut draft = NewNotification::new(3, ObjectRef::new("user", "alice"), "closed");
        draft.timestamp = now - Duration::hours(2);

        let mut notification = stored(draft);
        assert_eq!(
            notification.summary(&registry, now),
            "user#alice closed 2 hours ago"
        );

        notification.action_object = Some(ObjectRef::new("issue", 70));
        assert_eq!(
            notification.summary(&registry, now),
            "user#alice closed issue#70 2 hours ago"
        );

        notification.target = Some(ObjectRef::new("repo", "flask"));
        assert_eq!(
            notification.summary(&registry, now),
            "user#alice closed issue#70 on repo#flask 2 hours ago"
        );

        notification.action_object = None;
        assert_eq!(
            notification.summary(&registry, now),
            "user#alice closed repo#flask 2 hours ago"
        );
    }

    #[test]
    fn object_urls_fall_back_to_raw_ids() {
        let mut draft = NewNotification::new(3, ObjectRef::new("user", "42"), "joined");
        draft.target = Some(ObjectRef::new("group", "7"));
        let notification = stored(draft);
        let registry = ObjectRegistry::new();

        assert_eq!(notification.actor_object_url(&registry), "42");
        assert_eq!(notification.target_object_url(&registry), "7");
        assert_eq!(notification.action_object_url(&registry), "");
    }
}
