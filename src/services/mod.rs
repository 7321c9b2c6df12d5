//! Thin service layer over `Store` + `AnilistClient`, one struct per
//! concern, mirroring the teacher's `services::{download, rss, logs}` split.
//! These are what the API and CLI surfaces actually call; neither talks to
//! `Store` or `AnilistClient` directly.

pub mod backup;
pub mod pins;
pub mod undo;

pub use backup::BackupService;
pub use pins::PinService;
pub use undo::UndoService;
