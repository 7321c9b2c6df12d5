use anyhow::{Context, Result};

use crate::clients::anilist::AnilistClient;
use crate::config::Config;
use crate::services::UndoService;

use super::open_store;

/// Profiles may share a `data_path` or not; an event id is only unique
/// within a single profile's store, so the first profile whose store
/// contains it wins.
pub async fn cmd_undo(config: &Config, event_id: i64) -> Result<()> {
    for (name, profile) in &config.profiles {
        let store = open_store(config, profile).await?;
        if store.get_history_event(event_id).await?.is_none() {
            continue;
        }

        let anilist = AnilistClient::new(&profile.anilist_token);
        let undo = UndoService::new(store, anilist);
        undo.undo(event_id, profile.destructive_sync).await?;
        println!("undid history event #{event_id} for profile '{name}'");
        return Ok(());
    }

    Err(anyhow::anyhow!("history event #{event_id} not found in any configured profile"))
        .context("undo failed")
}
