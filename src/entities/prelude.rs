pub use super::backups::Entity as Backups;
pub use super::history_events::Entity as HistoryEvents;
pub use super::mappings::Entity as Mappings;
pub use super::pin_records::Entity as PinRecords;
pub use super::scheduler_watermarks::Entity as SchedulerWatermarks;
