//! Notification storage contract and SQLite implementation.
//!
//! # Responsibility
//! - Persist notification drafts and decode stored rows.
//! - Evaluate query-engine filters inside SQLite, including set-based
//!   `UPDATE ... WHERE` and `DELETE ... WHERE` statements.
//!
//! # Invariants
//! - Default read order is `timestamp DESC, id DESC`.
//! - Fan-out inserts commit all rows or none.
//! - Bulk mutations evaluate their filter at statement time.

use crate::db::migrations::latest_version;
use crate::db::DbError;
use crate::model::notification::{
    Level, NewNotification, Notification, NotificationData, NotificationId,
    NotificationValidationError, ObjectRef, UserId,
};
use crate::query::filter::{FlagUpdate, NotificationFilter, Predicate, Window};
use chrono::{DateTime, Utc};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, Row};
use std::error::Error;
use std::fmt::{Display, Formatter};
use uuid::Uuid;

const NOTIFICATION_SELECT_SQL: &str = "SELECT
    id,
    uuid,
    recipient_id,
    level,
    actor_kind,
    actor_id,
    verb,
    description,
    target_kind,
    target_id,
    action_object_kind,
    action_object_id,
    timestamp,
    public,
    unread,
    deleted,
    emailed,
    data
FROM notifications";

const DEFAULT_ORDER_SQL: &str = " ORDER BY timestamp DESC, id DESC";

pub type RepoResult<T> = Result<T, RepoError>;

/// Repository error for notification and directory persistence.
#[derive(Debug)]
pub enum RepoError {
    Validation(NotificationValidationError),
    Db(DbError),
    NotFound(NotificationId),
    UserNotFound(UserId),
    GroupNotFound(i64),
    /// Connection schema is not at the version this binary expects.
    UninitializedConnection {
        expected_version: u32,
        actual_version: u32,
    },
    InvalidData(String),
}

impl Display for RepoError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Validation(err) => write!(f, "{err}"),
            Self::Db(err) => write!(f, "{err}"),
            Self::NotFound(id) => write!(f, "notification not found: {id}"),
            Self::UserNotFound(id) => write!(f, "user not found: {id}"),
            Self::GroupNotFound(id) => write!(f, "group not found: {id}"),
            Self::UninitializedConnection {
                expected_version,
                actual_version,
            } => write!(
                f,
                "notification store requires schema version {expected_version}, got {actual_version}"
            ),
            Self::InvalidData(message) => {
                write!(f, "invalid persisted notification data: {message}")
            }
        }
    }
}

impl Error for RepoError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Validation(err) => Some(err),
            Self::Db(err) => Some(err),
            _ => None,
        }
    }
}

impl From<NotificationValidationError> for RepoError {
    fn from(value: NotificationValidationError) -> Self {
        Self::Validation(value)
    }
}

impl From<DbError> for RepoError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<rusqlite::Error> for RepoError {
    fn from(value: rusqlite::Error) -> Self {
        Self::Db(DbError::Sqlite(value))
    }
}

/// Storage contract consumed by the query engine and the notifier.
pub trait NotificationStore {
    /// Inserts all drafts atomically and returns them with assigned ids, in
    /// input order.
    fn insert_batch(&self, drafts: Vec<NewNotification>) -> RepoResult<Vec<Notification>>;
    fn get(&self, id: NotificationId) -> RepoResult<Option<Notification>>;
    fn get_by_uuid(&self, uuid: Uuid) -> RepoResult<Option<Notification>>;
    /// Persists the mutable state (flags and `data`) of one row.
    fn save(&self, notification: &Notification) -> RepoResult<()>;
    /// Writes only the columns named in `update` on one row, leaving
    /// concurrent changes to other flags intact.
    fn update_flags(&self, id: NotificationId, update: FlagUpdate) -> RepoResult<()>;
    /// Removes one row.
    fn delete(&self, id: NotificationId) -> RepoResult<()>;
    fn select(&self, filter: &NotificationFilter, window: Window)
        -> RepoResult<Vec<Notification>>;
    fn count(&self, filter: &NotificationFilter) -> RepoResult<u64>;
    /// Applies `update` to every row matching `filter` in one statement and
    /// returns the number of rows changed.
    fn update_matching(&self, filter: &NotificationFilter, update: FlagUpdate)
        -> RepoResult<usize>;
    /// Deletes every row matching `filter` in one statement.
    fn delete_matching(&self, filter: &NotificationFilter) -> RepoResult<usize>;

    fn insert(&self, draft: NewNotification) -> RepoResult<Notification> {
        self.insert_batch(vec![draft])?
            .pop()
            .ok_or_else(|| RepoError::InvalidData("insert returned no row".to_string()))
    }
}

/// SQLite-backed notification store.
pub struct SqliteNotificationStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteNotificationStore<'conn> {
    /// Creates a store from a migrated connection.
    pub fn try_new(conn: &'conn Connection) -> RepoResult<Self> {
        ensure_connection_ready(conn)?;
        Ok(Self { conn })
    }

    pub fn connection(&self) -> &'conn Connection {
        self.conn
    }
}

impl NotificationStore for SqliteNotificationStore<'_> {
    fn insert_batch(&self, drafts: Vec<NewNotification>) -> RepoResult<Vec<Notification>> {
        for draft in &drafts {
            draft.validate()?;
        }

        let tx = self.conn.unchecked_transaction()?;
        let mut inserted = Vec::with_capacity(drafts.len());
        {
            let mut stmt = tx.prepare(
                "INSERT INTO notifications (
                    uuid,
                    recipient_id,
                    level,
                    actor_kind,
                    actor_id,
                    verb,
                    description,
                    target_kind,
                    target_id,
                    action_object_kind,
                    action_object_id,
                    timestamp,
                    public,
                    unread,
                    deleted,
                    emailed,
                    data
                ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13, ?14, ?15, ?16, ?17);",
            )?;

            for draft in drafts {
                let uuid = Uuid::new_v4();
                let data = encode_data(draft.data.as_ref())?;
                stmt.execute(params![
                    uuid.to_string(),
                    draft.recipient,
                    draft.level.as_str(),
                    draft.actor.kind.as_str(),
                    draft.actor.id.as_str(),
                    draft.verb.as_str(),
                    draft.description.as_deref(),
                    draft.target.as_ref().map(|target| target.kind.as_str()),
                    draft.target.as_ref().map(|target| target.id.as_str()),
                    draft.action_object.as_ref().map(|object| object.kind.as_str()),
                    draft.action_object.as_ref().map(|object| object.id.as_str()),
                    draft.timestamp.timestamp_millis(),
                    bool_to_int(draft.public),
                    bool_to_int(draft.unread),
                    bool_to_int(draft.deleted),
                    bool_to_int(draft.emailed),
                    data,
                ])?;
                let id = tx.last_insert_rowid();
                inserted.push(Notification::from_stored(id, uuid, draft));
            }
        }
        tx.commit()?;

        Ok(inserted)
    }

    fn get(&self, id: NotificationId) -> RepoResult<Option<Notification>> {
        self.select_one(&format!("{NOTIFICATION_SELECT_SQL} WHERE id = ?1;"), Value::Integer(id))
    }

    fn get_by_uuid(&self, uuid: Uuid) -> RepoResult<Option<Notification>> {
        self.select_one(
            &format!("{NOTIFICATION_SELECT_SQL} WHERE uuid = ?1;"),
            Value::Text(uuid.to_string()),
        )
    }

    fn save(&self, notification: &Notification) -> RepoResult<()> {
        let data = encode_data(notification.data.as_ref())?;
        let changed = self.conn.execute(
            "UPDATE notifications
             SET
                public = ?1,
                unread = ?2,
                deleted = ?3,
                emailed = ?4,
                data = ?5
             WHERE id = ?6;",
            params![
                bool_to_int(notification.public),
                bool_to_int(notification.unread),
                bool_to_int(notification.deleted),
                bool_to_int(notification.emailed),
                data,
                notification.id(),
            ],
        )?;

        if changed == 0 {
            return Err(RepoError::NotFound(notification.id()));
        }

        Ok(())
    }

    fn update_flags(&self, id: NotificationId, update: FlagUpdate) -> RepoResult<()> {
        let changed =
            self.update_matching(&NotificationFilter::all().and(Predicate::Id(id)), update)?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn delete(&self, id: NotificationId) -> RepoResult<()> {
        let changed = self
            .conn
            .execute("DELETE FROM notifications WHERE id = ?1;", [id])?;
        if changed == 0 {
            return Err(RepoError::NotFound(id));
        }
        Ok(())
    }

    fn select(
        &self,
        filter: &NotificationFilter,
        window: Window,
    ) -> RepoResult<Vec<Notification>> {
        let (where_sql, mut bind_values) = where_clause(filter);
        let mut sql = format!("{NOTIFICATION_SELECT_SQL}{where_sql}{DEFAULT_ORDER_SQL}");

        if let Some(limit) = window.limit {
            sql.push_str(" LIMIT ?");
            bind_values.push(Value::Integer(i64::from(limit)));
            if window.offset > 0 {
                sql.push_str(" OFFSET ?");
                bind_values.push(Value::Integer(i64::from(window.offset)));
            }
        } else if window.offset > 0 {
            sql.push_str(" LIMIT -1 OFFSET ?");
            bind_values.push(Value::Integer(i64::from(window.offset)));
        }

        let mut stmt = self.conn.prepare(&sql)?;
        let mut rows = stmt.query(params_from_iter(bind_values))?;
        let mut notifications = Vec::new();
        while let Some(row) = rows.next()? {
            notifications.push(parse_notification_row(row)?);
        }

        Ok(notifications)
    }

    fn count(&self, filter: &NotificationFilter) -> RepoResult<u64> {
        let (where_sql, bind_values) = where_clause(filter);
        let count: i64 = self.conn.query_row(
            &format!("SELECT COUNT(*) FROM notifications{where_sql};"),
            params_from_iter(bind_values),
            |row| row.get(0),
        )?;
        u64::try_from(count)
            .map_err(|_| RepoError::InvalidData(format!("negative row count {count}")))
    }

    fn update_matching(
        &self,
        filter: &NotificationFilter,
        update: FlagUpdate,
    ) -> RepoResult<usize> {
        if update.is_empty() {
            return Ok(0);
        }

        let mut assignments = Vec::new();
        let mut bind_values = Vec::new();
        for (column, value) in [
            ("unread", update.unread),
            ("deleted", update.deleted),
            ("emailed", update.emailed),
            ("public", update.public),
        ] {
            if let Some(value) = value {
                assignments.push(format!("{column} = ?"));
                bind_values.push(Value::Integer(bool_to_int(value)));
            }
        }

        let (where_sql, where_values) = where_clause(filter);
        bind_values.extend(where_values);
        let changed = self.conn.execute(
            &format!(
                "UPDATE notifications SET {}{where_sql};",
                assignments.join(", ")
            ),
            params_from_iter(bind_values),
        )?;
        Ok(changed)
    }

    fn delete_matching(&self, filter: &NotificationFilter) -> RepoResult<usize> {
        let (where_sql, bind_values) = where_clause(filter);
        let changed = self.conn.execute(
            &format!("DELETE FROM notifications{where_sql};"),
            params_from_iter(bind_values),
        )?;
        Ok(changed)
    }
}

impl SqliteNotificationStore<'_> {
    fn select_one(&self, sql: &str, key: Value) -> RepoResult<Option<Notification>> {
        let mut stmt = self.conn.prepare(sql)?;
        let mut rows = stmt.query([key])?;
        if let Some(row) = rows.next()? {
            return Ok(Some(parse_notification_row(row)?));
        }
        Ok(None)
    }
}

/// Renders `filter` as a ` WHERE ...` suffix with positional bind values.
///
/// An empty filter renders as an empty string.
pub fn where_clause(filter: &NotificationFilter) -> (String, Vec<Value>) {
    if filter.is_empty() {
        return (String::new(), Vec::new());
    }

    let mut clauses = Vec::with_capacity(filter.predicates().len());
    let mut bind_values = Vec::new();
    for predicate in filter.predicates() {
        match predicate {
            Predicate::Id(id) => {
                clauses.push("id = ?");
                bind_values.push(Value::Integer(*id));
            }
            Predicate::Recipient(user_id) => {
                clauses.push("recipient_id = ?");
                bind_values.push(Value::Integer(*user_id));
            }
            Predicate::Unread(value) => {
                clauses.push("unread = ?");
                bind_values.push(Value::Integer(bool_to_int(*value)));
            }
            Predicate::Emailed(value) => {
                clauses.push("emailed = ?");
                bind_values.push(Value::Integer(bool_to_int(*value)));
            }
            Predicate::Public(value) => {
                clauses.push("public = ?");
                bind_values.push(Value::Integer(bool_to_int(*value)));
            }
            Predicate::Deleted(value) => {
                clauses.push("deleted = ?");
                bind_values.push(Value::Integer(bool_to_int(*value)));
            }
            Predicate::Level(level) => {
                clauses.push("level = ?");
                bind_values.push(Value::Text(level.as_str().to_string()));
            }
            Predicate::Actor(object) => {
                clauses.push("(actor_kind = ? AND actor_id = ?)");
                bind_values.push(Value::Text(object.kind.clone()));
                bind_values.push(Value::Text(object.id.clone()));
            }
            Predicate::Target(object) => {
                clauses.push("(target_kind = ? AND target_id = ?)");
                bind_values.push(Value::Text(object.kind.clone()));
                bind_values.push(Value::Text(object.id.clone()));
            }
            Predicate::TimestampAtOrBefore(cutoff) => {
                clauses.push("timestamp <= ?");
                bind_values.push(Value::Integer(cutoff.timestamp_millis()));
            }
        }
    }

    (format!(" WHERE {}", clauses.join(" AND ")), bind_values)
}

fn parse_notification_row(row: &Row<'_>) -> RepoResult<Notification> {
    let id: NotificationId = row.get("id")?;

    let uuid_text: Option<String> = row.get("uuid")?;
    let uuid = uuid_text
        .as_deref()
        .and_then(|value| Uuid::parse_str(value).ok())
        .ok_or_else(|| {
            RepoError::InvalidData(format!("invalid uuid value {uuid_text:?} for notification {id}"))
        })?;

    let level_text: String = row.get("level")?;
    let level = Level::parse(&level_text).ok_or_else(|| {
        RepoError::InvalidData(format!("invalid level `{level_text}` for notification {id}"))
    })?;

    let timestamp_ms: i64 = row.get("timestamp")?;
    let timestamp = DateTime::<Utc>::from_timestamp_millis(timestamp_ms).ok_or_else(|| {
        RepoError::InvalidData(format!(
            "invalid timestamp `{timestamp_ms}` for notification {id}"
        ))
    })?;

    let data = match row.get::<_, Option<String>>("data")? {
        Some(text) => Some(serde_json::from_str::<NotificationData>(&text).map_err(|err| {
            RepoError::InvalidData(format!("invalid data json for notification {id}: {err}"))
        })?),
        None => None,
    };

    let draft = NewNotification {
        recipient: row.get("recipient_id")?,
        actor: ObjectRef::new(
            row.get::<_, String>("actor_kind")?,
            row.get::<_, String>("actor_id")?,
        ),
        verb: row.get("verb")?,
        description: row.get("description")?,
        target: parse_object_ref(row, "target_kind", "target_id", id)?,
        action_object: parse_object_ref(row, "action_object_kind", "action_object_id", id)?,
        level,
        timestamp,
        public: parse_flag(row, "public", id)?,
        unread: parse_flag(row, "unread", id)?,
        deleted: parse_flag(row, "deleted", id)?,
        emailed: parse_flag(row, "emailed", id)?,
        data,
    };

    Ok(Notification::from_stored(id, uuid, draft))
}

fn parse_object_ref(
    row: &Row<'_>,
    kind_column: &str,
    id_column: &str,
    notification_id: NotificationId,
) -> RepoResult<Option<ObjectRef>> {
    let kind: Option<String> = row.get(kind_column)?;
    let object_id: Option<String> = row.get(id_column)?;
    match (kind, object_id) {
        (Some(kind), Some(object_id)) => Ok(Some(ObjectRef::new(kind, object_id))),
        (None, None) => Ok(None),
        _ => Err(RepoError::InvalidData(format!(
            "half-set reference `{kind_column}`/`{id_column}` for notification {notification_id}"
        ))),
    }
}

fn parse_flag(row: &Row<'_>, column: &str, notification_id: NotificationId) -> RepoResult<bool> {
    match row.get::<_, i64>(column)? {
        0 => Ok(false),
        1 => Ok(true),
        other => Err(RepoError::InvalidData(format!(
            "invalid {column} value `{other}` for notification {notification_id}"
        ))),
    }
}

fn encode_data(data: Option<&NotificationData>) -> RepoResult<Option<String>> {
    data.map(serde_json::to_string)
        .transpose()
        .map_err(|err| RepoError::InvalidData(format!("unencodable notification data: {err}")))
}

fn ensure_connection_ready(conn: &Connection) -> RepoResult<()> {
    let actual_version: u32 = conn.query_row("PRAGMA user_version;", [], |row| row.get(0))?;
    let expected_version = latest_version();
    if actual_version != expected_version {
        return Err(RepoError::UninitializedConnection {
            expected_version,
            actual_version,
        });
    }
    Ok(())
}

fn bool_to_int(value: bool) -> i64 {
    if value {
        1
    } else {
        0
    }
}
