//! Application-wide constants.
//!
//! Centralizes magic values used across multiple modules.

/// AniList's GraphQL endpoint.
pub const ANILIST_GRAPHQL_URL: &str = "https://graphql.anilist.co";

/// Plex's remote metadata agent, used when a profile enables online
/// metadata mode.
pub const PLEX_METADATA_URL: &str = "https://metadata.provider.plex.tv";

/// Database filename under `data_path`.
pub const DATABASE_FILENAME: &str = "anibridge.db";

/// Backups subdirectory under `data_path`.
pub const BACKUPS_DIRNAME: &str = "backups";

/// Custom mapping override filename stems, tried in order under `data_path`.
pub const CUSTOM_MAPPING_STEMS: &[&str] = &["mappings.custom"];

/// Authoritative mapping source, refreshed by the database-sync job.
pub const DEFAULT_MAPPINGS_SOURCE_URL: &str =
    "https://raw.githubusercontent.com/eliasbenb/PlexAniBridge-mappings/main/mappings.json";

/// Extensions tried for custom mapping / config files, in order.
pub const STRUCTURED_FILE_EXTENSIONS: &[&str] = &["json", "yaml", "yml", "toml"];

/// Default fuzzy-title-match acceptance threshold (0-100).
pub const DEFAULT_FUZZY_THRESHOLD: u8 = 90;

/// Maximum number of `SaveMediaListEntry` mutations coalesced into one
/// aliased GraphQL document when `batch_requests` is enabled.
pub const DEFAULT_BATCH_SIZE: usize = 50;

/// Default backup retention, in days.
pub const DEFAULT_BACKUP_RETENTION_DAYS: u32 = 7;

/// Default database-sync (mappings refresh) cadence.
pub mod intervals {
    use std::time::Duration;

    /// Default cadence for refreshing the mappings store from its
    /// authoritative remote source.
    pub const DATABASE_SYNC: Duration = Duration::from_secs(24 * 60 * 60);

    /// Minimum recommended `sync_interval`; profiles below this still work
    /// but log a warning on startup.
    pub const MIN_RECOMMENDED_SYNC_INTERVAL: i64 = 60;
}

/// Scheduler failure-cooldown tuning.
pub mod cooldown {
    /// Consecutive failures before a profile enters cooldown backoff.
    pub const FAILURE_THRESHOLD: u32 = 5;
}

/// Per-profile dispatch-queue depth (one pending item per trigger kind).
pub const DISPATCH_QUEUE_DEPTH: usize = 1;

/// Observability bus buffer size.
pub const EVENT_BUS_BUFFER_SIZE: usize = 256;
