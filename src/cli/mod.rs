//! Command-line interface, built with `clap`'s derive API.

mod commands;

use clap::{Parser, Subcommand};

pub use commands::{
    cmd_backup_list, cmd_backup_restore, cmd_history, cmd_mappings_search, cmd_sync, cmd_undo,
};

/// PlexAniBridge - keeps an AniList list in sync with Plex watch state.
#[derive(Parser)]
#[command(name = "plexanibridge")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Run as a background daemon with the full scheduler and API.
    #[command(alias = "-d", alias = "--daemon")]
    Daemon,

    /// Run a single sync pass for one profile and exit.
    Sync {
        /// Profile name, as configured in config.toml.
        profile: String,
        /// Force a full library rescan instead of an incremental one.
        #[arg(long)]
        full: bool,
        /// Preview the plan without writing to AniList.
        #[arg(long)]
        dry_run: bool,
    },

    /// Show recent sync history for a profile.
    #[command(alias = "h")]
    History {
        /// Profile name.
        profile: String,
        /// Number of entries to show.
        #[arg(default_value = "20")]
        limit: u64,
    },

    /// Reverse a single history event.
    Undo {
        /// History event id.
        event_id: i64,
    },

    /// List or restore AniList list backups.
    Backup {
        #[command(subcommand)]
        command: BackupCommands,
    },

    /// Search the mappings store.
    #[command(alias = "search")]
    Mappings {
        /// Free-text or field query, e.g. `tvdb:81797` or `"cowboy bebop"`.
        #[arg(required = true)]
        query: Vec<String>,
    },
}

#[derive(Subcommand)]
pub enum BackupCommands {
    /// List stored backups for a profile.
    List {
        profile: String,
    },
    /// Restore a backup by id.
    Restore {
        profile: String,
        id: i64,
    },
}
