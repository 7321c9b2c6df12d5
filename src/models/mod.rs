//! Plain value types shared across the resolver, reconciliation engine, and
//! the history/backup subsystem. These carry no I/O; conversions to/from
//! `SeaORM` entities live in `crate::entities` and `crate::db::repositories`.

pub mod anilist_entry;
pub mod history;
pub mod mapping;
pub mod pin;
pub mod plan;
pub mod plex_item;

pub use anilist_entry::{AniListListEntry, AniListStatus};
pub use history::{HistoryEvent, SyncOutcome};
pub use mapping::{EpisodeRange, Mapping, SeasonRangeTable};
pub use pin::PinRecord;
pub use plan::{PlanKind, PlanOp};
pub use plex_item::{PlexGuid, PlexItem, PlexItemType};
