//! Management commands over a Herald database file.
//!
//! # Responsibility
//! - Run cleanup, counting and bulk-read commands against one database.
//! - Emit events from scripts and seed the recipient directory.
//! - Keep stdout machine-readable; errors go to stderr with exit code 1.

mod cli;

use chrono::{Duration, Utc};
use clap::Parser;
use cli::{Cli, Commands, DirectoryCommands, EmitArgs};
use herald_core::{
    default_log_level, delete_old_notifications, init_logging, open_db, DbError,
    DirectoryStore, Level, LoggingError, NotificationManager, Notifier, NotifyError,
    NotifyRequest, ObjectRef, QueryError, Recipient, RepoError, SettingsError, SettingsHandle,
    SettingsSource, SqliteDirectoryStore, SqliteNotificationStore,
};
use log::info;
use rusqlite::Connection;
use serde_json::Value;
use std::error::Error;
use std::fmt::{Display, Formatter};
use std::process::ExitCode;

#[derive(Debug)]
enum CliError {
    Usage(String),
    Logging(LoggingError),
    Settings(SettingsError),
    Db(DbError),
    Repo(RepoError),
    Query(QueryError),
    Notify(NotifyError),
    Json(serde_json::Error),
}

impl Display for CliError {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Usage(message) => write!(f, "{message}"),
            Self::Logging(err) => write!(f, "logging: {err}"),
            Self::Settings(err) => write!(f, "settings: {err}"),
            Self::Db(err) => write!(f, "database: {err}"),
            Self::Repo(err) => write!(f, "{err}"),
            Self::Query(err) => write!(f, "{err}"),
            Self::Notify(err) => write!(f, "{err}"),
            Self::Json(err) => write!(f, "json: {err}"),
        }
    }
}

impl Error for CliError {
    fn source(&self) -> Option<&(dyn Error + 'static)> {
        match self {
            Self::Usage(_) => None,
            Self::Logging(err) => Some(err),
            Self::Settings(err) => Some(err),
            Self::Db(err) => Some(err),
            Self::Repo(err) => Some(err),
            Self::Query(err) => Some(err),
            Self::Notify(err) => Some(err),
            Self::Json(err) => Some(err),
        }
    }
}

impl From<LoggingError> for CliError {
    fn from(value: LoggingError) -> Self {
        Self::Logging(value)
    }
}

impl From<SettingsError> for CliError {
    fn from(value: SettingsError) -> Self {
        Self::Settings(value)
    }
}

impl From<DbError> for CliError {
    fn from(value: DbError) -> Self {
        Self::Db(value)
    }
}

impl From<RepoError> for CliError {
    fn from(value: RepoError) -> Self {
        Self::Repo(value)
    }
}

impl From<QueryError> for CliError {
    fn from(value: QueryError) -> Self {
        Self::Query(value)
    }
}

impl From<NotifyError> for CliError {
    fn from(value: NotifyError) -> Self {
        Self::Notify(value)
    }
}

impl From<serde_json::Error> for CliError {
    fn from(value: serde_json::Error) -> Self {
        Self::Json(value)
    }
}

fn main() -> ExitCode {
    let cli = Cli::parse();
    match run(cli) {
        Ok(()) => ExitCode::SUCCESS,
        Err(err) => {
            eprintln!("herald: {err}");
            ExitCode::FAILURE
        }
    }
}

fn run(cli: Cli) -> Result<(), CliError> {
    if let Some(log_dir) = &cli.log_dir {
        let level = cli.log_level.as_deref().unwrap_or_else(|| default_log_level());
        init_logging(level, log_dir)?;
    }

    if let Commands::Ping = cli.command {
        println!("herald_core ping={}", herald_core::ping());
        println!("herald_core version={}", herald_core::core_version());
        return Ok(());
    }

    let settings = SettingsHandle::load(match &cli.config {
        Some(path) => SettingsSource::File(path.clone()),
        None => SettingsSource::Defaults,
    })?;
    let conn = open_db(&cli.db)?;

    match cli.command {
        Commands::Ping => Ok(()),
        Commands::DeleteOld { max_age_seconds } => {
            let max_age = i64::try_from(max_age_seconds)
                .ok()
                .and_then(Duration::try_seconds)
                .ok_or_else(|| CliError::Usage(format!("age too large: {max_age_seconds}")))?;
            let manager = manager(&conn, settings)?;
            let removed = delete_old_notifications(&manager, max_age, Utc::now())?;
            println!("{removed}");
            Ok(())
        }
        Commands::UnreadCount { user } => {
            let manager = manager(&conn, settings)?;
            println!("{}", manager.for_recipient(user).unread(false).count()?);
            Ok(())
        }
        Commands::MarkAllRead { user } => {
            let manager = manager(&conn, settings)?;
            println!("{}", manager.all().mark_all_as_read(Some(user))?);
            Ok(())
        }
        Commands::Emit(args) => emit(&conn, settings, args),
        Commands::Directory { command } => directory(&conn, command),
    }
}

fn manager(
    conn: &Connection,
    settings: SettingsHandle,
) -> Result<NotificationManager<SqliteNotificationStore<'_>>, CliError> {
    Ok(NotificationManager::new(
        SqliteNotificationStore::try_new(conn)?,
        settings,
    ))
}

fn emit(conn: &Connection, settings: SettingsHandle, args: EmitArgs) -> Result<(), CliError> {
    let recipient = match args.group {
        Some(group) => Recipient::Group(group),
        None if args.user.len() == 1 => Recipient::User(args.user[0]),
        None => Recipient::Users(args.user),
    };
    let level = Level::parse(&args.level)
        .ok_or_else(|| CliError::Usage(format!("unknown level `{}`", args.level)))?;

    let mut request = NotifyRequest::new(parse_object_ref(&args.actor)?, recipient, args.verb)
        .level(level)
        .public(!args.private);
    if let Some(target) = &args.target {
        request = request.target(parse_object_ref(target)?);
    }
    if let Some(action_object) = &args.action_object {
        request = request.action_object(parse_object_ref(action_object)?);
    }
    if let Some(description) = args.description {
        request = request.description(description);
    }
    for extra in &args.extras {
        let (name, value) = parse_extra(extra)?;
        request = request.extra(name, value);
    }

    let notifier = Notifier::new(
        SqliteNotificationStore::try_new(conn)?,
        SqliteDirectoryStore::new(conn),
        settings,
    );
    let created = notifier.notify(request)?;
    info!("event=cli_emit module=cli status=ok created={}", created.len());
    println!("{}", serde_json::to_string_pretty(&created)?);
    Ok(())
}

fn directory(conn: &Connection, command: DirectoryCommands) -> Result<(), CliError> {
    let directory = SqliteDirectoryStore::new(conn);
    match command {
        DirectoryCommands::AddUser { username } => {
            println!("{}", directory.create_user(&username)?);
        }
        DirectoryCommands::AddGroup { name } => {
            println!("{}", directory.create_group(&name)?);
        }
        DirectoryCommands::AddMember { group, user } => {
            directory.add_member(group, user)?;
        }
    }
    Ok(())
}

/// Parses `KIND:ID`.
fn parse_object_ref(raw: &str) -> Result<ObjectRef, CliError> {
    match raw.split_once(':') {
        Some((kind, id)) if !kind.is_empty() && !id.is_empty() => Ok(ObjectRef::new(kind, id)),
        _ => Err(CliError::Usage(format!(
            "object reference must be KIND:ID, got `{raw}`"
        ))),
    }
}

/// Parses `NAME=JSON`; a value that is not valid JSON is kept as a string.
fn parse_extra(raw: &str) -> Result<(String, Value), CliError> {
    let (name, value) = raw
        .split_once('=')
        .filter(|(name, _)| !name.is_empty())
        .ok_or_else(|| CliError::Usage(format!("extra must be NAME=VALUE, got `{raw}`")))?;
    let value = serde_json::from_str(value).unwrap_or_else(|_| Value::String(value.to_string()));
    Ok((name.to_string(), value))
}
