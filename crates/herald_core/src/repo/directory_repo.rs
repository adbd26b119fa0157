//! Recipient directory: users and groups.
//!
//! # Responsibility
//! - Provide the user/group lookups the notifier needs for fan-out.
//! - Keep membership ordering deterministic (`user_id ASC`).

use crate::model::notification::UserId;
use crate::repo::notification_repo::{RepoError, RepoResult};
use rusqlite::{params, Connection, OptionalExtension};

/// Stable group identifier.
pub type GroupId = i64;

/// Directory read model for one user.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct User {
    pub id: UserId,
    pub username: String,
}

/// Directory contract used for recipient resolution.
pub trait DirectoryStore {
    fn create_user(&self, username: &str) -> RepoResult<UserId>;
    fn get_user(&self, id: UserId) -> RepoResult<Option<User>>;
    fn user_exists(&self, id: UserId) -> RepoResult<bool>;
    fn create_group(&self, name: &str) -> RepoResult<GroupId>;
    /// Adds a user to a group. Adding an existing member is a no-op.
    fn add_member(&self, group_id: GroupId, user_id: UserId) -> RepoResult<()>;
    /// Lists member ids ordered by user id.
    fn group_members(&self, group_id: GroupId) -> RepoResult<Vec<UserId>>;
}

/// SQLite-backed directory.
pub struct SqliteDirectoryStore<'conn> {
    conn: &'conn Connection,
}

impl<'conn> SqliteDirectoryStore<'conn> {
    pub fn new(conn: &'conn Connection) -> Self {
        Self { conn }
    }
}

impl DirectoryStore for SqliteDirectoryStore<'_> {
    fn create_user(&self, username: &str) -> RepoResult<UserId> {
        self.conn
            .execute("INSERT INTO users (username) VALUES (?1);", [username])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn get_user(&self, id: UserId) -> RepoResult<Option<User>> {
        let user = self
            .conn
            .query_row(
                "SELECT id, username FROM users WHERE id = ?1;",
                [id],
                |row| {
                    Ok(User {
                        id: row.get("id")?,
                        username: row.get("username")?,
                    })
                },
            )
            .optional()?;
        Ok(user)
    }

    fn user_exists(&self, id: UserId) -> RepoResult<bool> {
        exists(self.conn, "SELECT EXISTS(SELECT 1 FROM users WHERE id = ?1);", id)
    }

    fn create_group(&self, name: &str) -> RepoResult<GroupId> {
        self.conn
            .execute("INSERT INTO groups (name) VALUES (?1);", [name])?;
        Ok(self.conn.last_insert_rowid())
    }

    fn add_member(&self, group_id: GroupId, user_id: UserId) -> RepoResult<()> {
        if !exists(
            self.conn,
            "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?1);",
            group_id,
        )? {
            return Err(RepoError::GroupNotFound(group_id));
        }
        if !self.user_exists(user_id)? {
            return Err(RepoError::UserNotFound(user_id));
        }

        self.conn.execute(
            "INSERT OR IGNORE INTO group_members (group_id, user_id) VALUES (?1, ?2);",
            params![group_id, user_id],
        )?;
        Ok(())
    }

    fn group_members(&self, group_id: GroupId) -> RepoResult<Vec<UserId>> {
        if !exists(
            self.conn,
            "SELECT EXISTS(SELECT 1 FROM groups WHERE id = ?1);",
            group_id,
        )? {
            return Err(RepoError::GroupNotFound(group_id));
        }

        let mut stmt = self.conn.prepare(
            "SELECT user_id
             FROM group_members
             WHERE group_id = ?1
             ORDER BY user_id ASC;",
        )?;
        let mut rows = stmt.query([group_id])?;
        let mut members = Vec::new();
        while let Some(row) = rows.next()? {
            members.push(row.get(0)?);
        }
        Ok(members)
    }
}

fn exists(conn: &Connection, sql: &str, id: i64) -> RepoResult<bool> {
    let exists: i64 = conn.query_row(sql, [id], |row| row.get(0))?;
    Ok(exists == 1)
}
