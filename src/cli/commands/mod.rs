mod backup;
mod history;
mod mappings;
mod sync;
mod undo;

pub use backup::{cmd_backup_list, cmd_backup_restore};
pub use history::cmd_history;
pub use mappings::cmd_mappings_search;
pub use sync::cmd_sync;
pub use undo::cmd_undo;

use anyhow::{Context, Result};

use crate::config::{Config, ProfileConfig};
use crate::constants::DATABASE_FILENAME;
use crate::db::Store;

/// Resolves a profile's database handle, sharing the `data_path` convention
/// every command (and the daemon) uses.
pub async fn open_store(config: &Config, profile: &ProfileConfig) -> Result<Store> {
    let data_path = profile.data_path(&config.general);
    let db_path = format!("{data_path}/{DATABASE_FILENAME}");
    Store::new(&format!("sqlite:{db_path}")).await
}

pub fn profile_config<'a>(config: &'a Config, name: &str) -> Result<&'a ProfileConfig> {
    config
        .profile(name)
        .with_context(|| format!("no profile named '{name}' in config"))
}
