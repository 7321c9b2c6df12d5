use anyhow::Result;

use crate::clients::anilist::AnilistClient;
use crate::config::Config;
use crate::services::BackupService;

use super::{open_store, profile_config};

pub async fn cmd_backup_list(config: &Config, profile_name: &str) -> Result<()> {
    let profile = profile_config(config, profile_name)?;
    let store = open_store(config, profile).await?;
    let anilist = AnilistClient::new(&profile.anilist_token);
    let service = BackupService::new(store, anilist);

    let backups = service.list_backups(profile_name).await?;
    if backups.is_empty() {
        println!("No backups for profile '{profile_name}'.");
        return Ok(());
    }

    for backup in backups {
        println!(
            "#{} {} entries={} reason={}",
            backup.id, backup.created_at, backup.entry_count, backup.reason
        );
    }
    Ok(())
}

pub async fn cmd_backup_restore(config: &Config, profile_name: &str, id: i64) -> Result<()> {
    let profile = profile_config(config, profile_name)?;
    let store = open_store(config, profile).await?;
    let anilist = AnilistClient::new(&profile.anilist_token);
    let service = BackupService::new(store, anilist);

    let count = service.restore_backup(id).await?;
    println!("restored {count} entries from backup #{id}");
    Ok(())
}
