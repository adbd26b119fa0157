use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// Herald notification store management
#[derive(Parser)]
#[command(name = "herald", version, about)]
pub struct Cli {
    /// SQLite database file
    #[arg(long, env = "HERALD_DB", default_value = "herald.sqlite3", global = true)]
    pub db: PathBuf,

    /// JSON settings file; defaults apply when omitted
    #[arg(long, env = "HERALD_CONFIG", global = true)]
    pub config: Option<PathBuf>,

    /// Absolute directory for rolling log files; logging is off when omitted
    #[arg(long, env = "HERALD_LOG_DIR", global = true)]
    pub log_dir: Option<PathBuf>,

    /// trace|debug|info|warn|error
    #[arg(long, env = "HERALD_LOG_LEVEL", global = true)]
    pub log_level: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Check core linkage
    Ping,

    /// Hard-delete notifications older than the given age
    DeleteOld {
        /// Maximum age in seconds
        max_age_seconds: u64,
    },

    /// Print a user's unread count
    UnreadCount {
        #[arg(long)]
        user: i64,
    },

    /// Mark every notification of a user as read
    MarkAllRead {
        #[arg(long)]
        user: i64,
    },

    /// Emit one event and print the created notifications as JSON
    Emit(EmitArgs),

    /// Manage the recipient directory
    Directory {
        #[command(subcommand)]
        command: DirectoryCommands,
    },
}

#[derive(Args)]
pub struct EmitArgs {
    /// Actor reference as KIND:ID
    #[arg(long)]
    pub actor: String,

    #[arg(long)]
    pub verb: String,

    /// Recipient user ids
    #[arg(long, value_delimiter = ',', conflicts_with = "group", required_unless_present = "group")]
    pub user: Vec<i64>,

    /// Recipient group id
    #[arg(long)]
    pub group: Option<i64>,

    /// Target reference as KIND:ID
    #[arg(long)]
    pub target: Option<String>,

    /// Action object reference as KIND:ID
    #[arg(long)]
    pub action_object: Option<String>,

    #[arg(long)]
    pub description: Option<String>,

    /// success|info|warning|error
    #[arg(long, default_value = "info")]
    pub level: String,

    /// Create the notifications as private
    #[arg(long)]
    pub private: bool,

    /// Extra attribute as NAME=JSON (bare text is stored as a string)
    #[arg(long = "extra")]
    pub extras: Vec<String>,
}

#[derive(Subcommand)]
pub enum DirectoryCommands {
    /// Create a user and print its id
    AddUser { username: String },
    /// Create a group and print its id
    AddGroup { name: String },
    /// Add a user to a group
    AddMember {
        #[arg(long)]
        group: i64,
        #[arg(long)]
        user: i64,
    },
}
