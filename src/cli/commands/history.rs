use anyhow::Result;

use crate::config::Config;

use super::{open_store, profile_config};

pub async fn cmd_history(config: &Config, profile_name: &str, limit: u64) -> Result<()> {
    let profile = profile_config(config, profile_name)?;
    let store = open_store(config, profile).await?;
    let events = store.list_history(profile_name, limit, 0).await?;

    if events.is_empty() {
        println!("No sync history for profile '{profile_name}'.");
        return Ok(());
    }

    println!("Recent sync history for '{profile_name}' (last {}):", events.len());
    println!("{:-<70}", "");

    for event in events {
        let undone = if event.undone_at.is_some() { " [undone]" } else { "" };
        println!(
            "#{} anilist:{} {:?} {:?}{undone}",
            event.id, event.anilist_id, event.kind, event.outcome
        );
        println!("  {}", event.reason);
    }

    Ok(())
}
