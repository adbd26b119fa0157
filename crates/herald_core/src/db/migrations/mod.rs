//! Herald schema history.
//!
//! # Responsibility
//! - Name each schema step: directory tables, the notification table, then
//!   the uuid column with its backfill for rows created before it existed.
//! - Bring a connection from any earlier version to the latest in one
//!   transaction.
//!
//! # Invariants
//! - `version` values are contiguous from 1 and never reused.
//! - The applied version is mirrored to `PRAGMA user_version`.

use crate::db::{DbError, DbResult};
use log::{error, info};
use rusqlite::{Connection, Transaction};

#[derive(Debug, Clone, Copy)]
struct Migration {
    version: u32,
    name: &'static str,
    sql: &'static str,
}

const MIGRATIONS: &[Migration] = &[
    Migration {
        version: 1,
        name: "directory",
        sql: include_str!("0001_directory.sql"),
    },
    Migration {
        version: 2,
        name: "notifications",
        sql: include_str!("0002_notifications.sql"),
    },
    Migration {
        version: 3,
        name: "notification_uuid",
        sql: include_str!("0003_notification_uuid.sql"),
    },
];

/// Latest schema version this binary can open.
pub fn latest_version() -> u32 {
    MIGRATIONS.last().map_or(0, |migration| migration.version)
}

/// `(version, name)` of every known schema step, oldest first.
pub fn known_migrations() -> impl Iterator<Item = (u32, &'static str)> {
    MIGRATIONS
        .iter()
        .map(|migration| (migration.version, migration.name))
}

/// Applies every step newer than the connection's `user_version`.
///
/// # Errors
/// - [`DbError::UnsupportedSchemaVersion`] when the file was written by a
///   newer binary.
/// - [`DbError::Migration`] naming the failing step; nothing is applied.
pub fn apply_migrations(conn: &mut Connection) -> DbResult<()> {
    let current_version = current_user_version(conn)?;
    let latest = latest_version();

    if current_version > latest {
        error!(
            "event=db_migrate module=db status=error from_version={current_version} latest={latest} error_code=schema_too_new"
        );
        return Err(DbError::UnsupportedSchemaVersion {
            db_version: current_version,
            latest_supported: latest,
        });
    }

    if current_version == latest {
        return Ok(());
    }

    let tx = conn.transaction()?;
    for migration in MIGRATIONS
        .iter()
        .filter(|migration| migration.version > current_version)
    {
        apply_step(&tx, migration)?;
    }
    tx.commit()?;

    info!(
        "event=db_migrate module=db status=ok from_version={current_version} to_version={latest}"
    );
    Ok(())
}

fn apply_step(tx: &Transaction<'_>, migration: &Migration) -> DbResult<()> {
    let version = migration.version;
    tx.execute_batch(migration.sql)
        .and_then(|()| tx.execute_batch(&format!("PRAGMA user_version = {version};")))
        .map_err(|source| {
            error!(
                "event=db_migrate module=db status=error version={version} name={} error={source}",
                migration.name
            );
            DbError::Migration {
                version,
                name: migration.name,
                source,
            }
        })?;
    info!(
        "event=db_migrate module=db status=step version={version} name={}",
        migration.name
    );
    Ok(())
}

fn current_user_version(conn: &Connection) -> DbResult<u32> {
    let version = conn.query_row("PRAGMA user_version;", [], |row| row.get::<_, u32>(0))?;
    Ok(version)
}
