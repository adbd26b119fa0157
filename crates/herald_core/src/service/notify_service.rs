//! Event emission: one notification per resolved recipient.
//!
//! # Responsibility
//! - Resolve a user, a group or a user list into concrete recipients.
//! - Build one draft per recipient sharing actor/verb/objects/timestamp.
//! - Route extra attributes onto settable flags or into `data` when
//!   extended attributes are enabled; drop them otherwise.
//!
//! # Invariants
//! - All notifications of one emission are inserted in one transaction.
//! - Returned notifications follow recipient resolution order.

use crate::model::notification::{
    AttributeAssignment, Level, NewNotification, Notification, NotificationData,
    NotificationValidationError, ObjectRef, UserId,
};
use crate::repo::directory_repo::{DirectoryStore, GroupId};
use crate::repo::notification_repo::{NotificationStore, RepoError};
use crate::settings::SettingsHandle;
use chrono::{DateTime, Utc};
use log::{info, warn};
use serde_json::Value;
use std::collections::BTreeMap;
use std::error::Error;
use std::fmt::{Display, Formatter};

/// Who receives an emitted event.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Recipient {
    User(UserId),
    /// Every member of the group, ordered by user id.
    Group(GroupId),
    /// Each listed user, in list order.
    Users(Vec<UserId>),
}

/// One event to emit.
#[derive(Debug, Clone, PartialEq)]
pub struct NotifyRequest {
    pub actor: ObjectRef,
    pub recipient: Recipient,
    pub verb: String,
    pub target: Option<ObjectRef>,
    pub action_object: Option<ObjectRef>,
    pub description: Option<String>,
    /// Defaults to the emission time.
    pub timestamp: Option<DateTime<Utc>>,
    pub level: Level,
    pub public: bool,
    /// Attributes that are not core notification fields.
    pub extra: BTreeMap<String, Value>,
}

impl NotifyRequest {
    pub fn new(actor: ObjectRef, recipient: Recipient, verb: impl Into<String>) -> Self {
        Self {
            actor,
            recipient,
            verb: verb.into(),
            target: None,
            action_object: None,
            description: None,
            timestamp: None,
            level: Level::Info,
            public: true,
            extra: BTreeMap::new(),
        }
    }

    pub fn target(mut self, target: ObjectRef) -> Self {
        self.target = Some(target);
        self
    }

    pub fn action_object(mut self, action_object: ObjectRef) -> Self {
        self.action_object = Some(action_object);
        self
    }

    pub fn description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn timestamp(mut self, timestamp: DateTime<Utc>) -> Self {
        self.timestamp = Some(timestamp);
        self
    }

    pub fn level(mut self, level: Level) -> Self {
        self.level = level;
        self
    }

    pub fn public(mut self, public: bool) -> Self {
        self.public = public;
        self
    }

    pub fn extra(mut self, name: impl Into<String>, value: impl Into<Value>) -> Self {
        self.extra.insert(name.into(), value.into());
        self
    }
}

/// Emission error.
#[derive(Debug)]
pub enum NotifyError {
    UnknownRecipient(UserId),
    UnknownGroup(GroupId),
    /// Extra attribute names a core field or has the wrong type for a flag.
    InvalidAttribute { name: String, reason: &'static str },
    Validation(NotificationValidationError),
    Repo(RepoError),
}

impl Display for NotifyError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::UnknownRecipient(id) => write!(f, "recipient user does not exist: {id}"),
            Self::UnknownGroup(id) => write!(f, "recipient group does not exist: {id}"),
            Self::InvalidAttribute { name, reason } => {
                write!(f, "invalid notify attribute `{name}`: {reason}")
            }
            Self::Validation(err) => write!(f, "{err}"),
            Self::Repo(err) => write!(f, "{err}"),
        }
    }
}

impl Error for NotifyError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Repo(err) => Some(err),
            _ => None,
        }
    }
}

impl From<RepoError> for NotifyError {
    fn from(value: RepoError) -> Self {
        match value {
            RepoError::UserNotFound(id) => Self::UnknownRecipient(id),
            RepoError::GroupNotFound(id) => Self::UnknownGroup(id),
            RepoError::Validation(err) => Self::Validation(err),
            other => Self::Repo(other),
        }
    }
}

/// Construct-and-persist handler for emitted events.
pub struct Notifier<N: NotificationStore, D: DirectoryStore> {
    notifications: N,
    directory: D,
    settings: SettingsHandle,
}

impl<N: NotificationStore, D: DirectoryStore> Notifier<N, D> {
    pub fn new(notifications: N, directory: D, settings: SettingsHandle) -> Self {
        Self {
            notifications,
            directory,
            settings,
        }
    }

    /// Emits `request` and returns the created notifications, one per
    /// recipient.
    pub fn notify(&self, request: NotifyRequest) -> Result<Vec<Notification>, NotifyError> {
        let recipients = self.resolve_recipients(&request.recipient)?;
        if recipients.is_empty() {
            info!("event=notify module=notify status=ok recipients=0");
            return Ok(Vec::new());
        }

        let timestamp = request.timestamp.unwrap_or_else(Utc::now);
        let extended = self.settings.use_jsonfield();
        if !extended && !request.extra.is_empty() {
            warn!(
                "event=notify module=notify status=dropped_extra count={}",
                request.extra.len()
            );
        }

        let mut drafts = Vec::with_capacity(recipients.len());
        for recipient in recipients {
            let mut draft = NewNotification::new(recipient, request.actor.clone(), &request.verb);
            draft.description = request.description.clone();
            draft.target = request.target.clone();
            draft.action_object = request.action_object.clone();
            draft.level = request.level;
            draft.timestamp = timestamp;
            draft.public = request.public;
            if extended {
                apply_extra(&mut draft, &request.extra)?;
            }
            draft.validate().map_err(NotifyError::Validation)?;
            drafts.push(draft);
        }

        let created = self.notifications.insert_batch(drafts)?;
        info!(
            "event=notify module=notify status=ok recipients={} extended={extended}",
            created.len()
        );
        Ok(created)
    }

    fn resolve_recipients(&self, recipient: &Recipient) -> Result<Vec<UserId>, NotifyError> {
        match recipient {
            Recipient::User(user_id) => {
                self.require_user(*user_id)?;
                Ok(vec![*user_id])
            }
            Recipient::Group(group_id) => Ok(self.directory.group_members(*group_id)?),
            Recipient::Users(user_ids) => {
                for user_id in user_ids {
                    self.require_user(*user_id)?;
                }
                Ok(user_ids.clone())
            }
        }
    }

    fn require_user(&self, user_id: UserId) -> Result<(), NotifyError> {
        if self.directory.user_exists(user_id)? {
            Ok(())
        } else {
            Err(NotifyError::UnknownRecipient(user_id))
        }
    }
}

fn apply_extra(
    draft: &mut NewNotification,
    extra: &BTreeMap<String, Value>,
) -> Result<(), NotifyError> {
    let mut data = NotificationData::new();
    for (name, value) in extra {
        match draft.assign_attribute(name, value) {
            AttributeAssignment::Assigned => {}
            AttributeAssignment::Unknown => {
                data.insert(name.clone(), value.clone());
            }
            AttributeAssignment::TypeMismatch => {
                return Err(NotifyError::InvalidAttribute {
                    name: name.clone(),
                    reason: "expected a boolean",
                });
            }
            AttributeAssignment::Reserved => {
                return Err(NotifyError::InvalidAttribute {
                    name: name.clone(),
                    reason: "core fields must be passed as request fields",
                });
            }
        }
    }
    if !data.is_empty() {
        draft.data = Some(data);
    }
    Ok(())
}
