use anyhow::Result;
use tokio::sync::broadcast;

use crate::config::Config;
use crate::domain::events::NotificationEvent;
use crate::scheduler::{ProfileSupervisor, TriggerKind};

use super::{open_store, profile_config};

pub async fn cmd_sync(config: &Config, profile_name: &str, full: bool, dry_run: bool) -> Result<()> {
    let mut profile = profile_config(config, profile_name)?.clone();
    if dry_run {
        profile.dry_run = true;
    }

    let store = open_store(config, &profile).await?;
    let (events_tx, _events_rx) = broadcast::channel::<NotificationEvent>(64);

    let supervisor = ProfileSupervisor::new(profile_name.to_string(), profile, store, events_tx);
    let trigger = if full { TriggerKind::Full } else { TriggerKind::Partial };

    let (applied, skipped, failed) = supervisor.run_single(trigger).await?;
    println!("profile '{profile_name}': applied {applied}, skipped {skipped}, failed {failed}");
    Ok(())
}
