use anyhow::Result;

use crate::config::Config;
use crate::constants::DATABASE_FILENAME;
use crate::db::Store;

pub async fn cmd_mappings_search(config: &Config, query: &str) -> Result<()> {
    let db_path = format!("{}/{DATABASE_FILENAME}", config.general.data_path);
    let store = Store::new(&format!("sqlite:{db_path}")).await?;

    let ids = store.search_mapping_titles(query).await?;
    if ids.is_empty() {
        println!("No mappings match '{query}'.");
        return Ok(());
    }

    for id in ids {
        if let Some(mapping) = store.get_mapping(id).await? {
            let title = mapping.title.as_deref().unwrap_or("(untitled)");
            println!("anilist:{} {title} ({})", mapping.anilist_id, mapping.year.unwrap_or(0));
        }
    }
    Ok(())
}
