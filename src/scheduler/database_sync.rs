//! Database-sync job: refreshes the mappings store from the authoritative
//! remote source and re-merges the local custom-override file, on a
//! configurable cadence. Runs independently of profile syncs; readers see a
//! consistent snapshot because the authoritative replace and the custom
//! upsert each commit as a single unit of work.
//!
//! `$includes` on a mapping entry are resolved here, depth-first with cycle
//! detection, producing a materialized snapshot — profile sync runs never
//! touch the network for mapping data.

use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use futures::FutureExt;
use reqwest::Client;
use tracing::{info, warn};

use crate::constants::{CUSTOM_MAPPING_STEMS, STRUCTURED_FILE_EXTENSIONS};
use crate::db::Store;
use crate::models::mapping::Mapping;

pub struct DatabaseSyncJob {
    store: Store,
    client: Client,
    source_url: String,
    data_path: String,
}

impl DatabaseSyncJob {
    #[must_use]
    pub fn new(store: Store, source_url: String, data_path: String) -> Self {
        Self {
            store,
            client: Client::builder()
                .user_agent(concat!("plexanibridge/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| Client::new()),
            source_url,
            data_path,
        }
    }

    pub async fn run_forever(&self, interval: Duration) {
        loop {
            if let Err(err) = self.run_once().await {
                warn!(?err, "database-sync run failed");
            }
            tokio::time::sleep(interval).await;
        }
    }

    pub async fn run_once(&self) -> Result<()> {
        let authoritative = self.fetch_authoritative().await?;
        info!(count = authoritative.len(), "fetched authoritative mappings");
        self.store.replace_authoritative_mappings(&authoritative).await?;

        let overrides = self.load_custom_overrides().await?;
        for mapping in &overrides {
            let merged = match self.store.get_mapping(mapping.anilist_id).await? {
                Some(mut base) => {
                    base.merge_overlay(mapping.clone());
                    base
                }
                None => mapping.clone(),
            };
            self.store.upsert_mapping(&merged).await?;
        }
        info!(count = overrides.len(), "merged custom mapping overrides");
        Ok(())
    }

    async fn fetch_authoritative(&self) -> Result<Vec<Mapping>> {
        let response = self
            .client
            .get(&self.source_url)
            .send()
            .await
            .context("failed to reach mappings source")?
            .error_for_status()
            .context("mappings source returned an error status")?;
        let body = response.text().await?;
        let mut mappings: Vec<Mapping> =
            serde_json::from_str(&body).context("mappings source returned malformed JSON")?;

        let mut cache = HashMap::new();
        for mapping in &mut mappings {
            resolve_includes(&self.client, &self.data_path, mapping, &mut cache, &mut Vec::new())
                .await
                .with_context(|| format!("resolving $includes for anilist_id {}", mapping.anilist_id))?;
        }

        Ok(mappings)
    }

    async fn load_custom_overrides(&self) -> Result<Vec<Mapping>> {
        for stem in CUSTOM_MAPPING_STEMS {
            for ext in STRUCTURED_FILE_EXTENSIONS {
                let path = Path::new(&self.data_path).join(format!("{stem}.{ext}"));
                if !path.exists() {
                    continue;
                }
                let content = std::fs::read_to_string(&path)
                    .with_context(|| format!("failed to read {}", path.display()))?;
                let mut mappings = parse_mapping_document(&content, ext)?;

                let mut cache = HashMap::new();
                for mapping in &mut mappings {
                    mapping.custom = true;
                    resolve_includes(&self.client, &self.data_path, mapping, &mut cache, &mut Vec::new())
                        .await
                        .with_context(|| {
                            format!("resolving $includes for anilist_id {}", mapping.anilist_id)
                        })?;
                }
                return Ok(mappings);
            }
        }
        Ok(Vec::new())
    }
}

/// Folds `mapping.includes` in depth-first, earliest-include-first, then
/// folds `mapping`'s own fields on top as the final override. Clears
/// `includes` once resolved so the materialized row carries no runtime
/// reference. `stack` holds the chain of includes currently being resolved;
/// revisiting one is a cycle.
fn resolve_includes<'a>(
    client: &'a Client,
    data_path: &'a str,
    mapping: &'a mut Mapping,
    cache: &'a mut HashMap<String, Mapping>,
    stack: &'a mut Vec<String>,
) -> BoxFuture<'a, Result<()>> {
    async move {
        if mapping.includes.is_empty() {
            return Ok(());
        }

        let includes = std::mem::take(&mut mapping.includes);
        let mut base = Mapping::new(mapping.anilist_id);

        for include in includes {
            if stack.contains(&include) {
                anyhow::bail!("cyclic $includes detected at {include}");
            }

            let resolved = if let Some(cached) = cache.get(&include) {
                cached.clone()
            } else {
                stack.push(include.clone());
                let mut fetched = fetch_include(client, data_path, &include).await?;
                resolve_includes(client, data_path, &mut fetched, cache, stack).await?;
                stack.pop();
                cache.insert(include.clone(), fetched.clone());
                fetched
            };

            base.merge_overlay(resolved);
        }

        let own = std::mem::replace(mapping, base);
        mapping.merge_overlay(own);
        Ok(())
    }
    .boxed()
}

async fn fetch_include(client: &Client, data_path: &str, location: &str) -> Result<Mapping> {
    let (content, ext) = if location.starts_with("http://") || location.starts_with("https://") {
        let body = client
            .get(location)
            .send()
            .await
            .with_context(|| format!("failed to reach $includes source {location}"))?
            .error_for_status()
            .with_context(|| format!("$includes source {location} returned an error status"))?
            .text()
            .await?;
        (body, extension_of(location))
    } else {
        let path = Path::new(data_path).join(location);
        let body = std::fs::read_to_string(&path)
            .with_context(|| format!("failed to read $includes file {}", path.display()))?;
        (body, extension_of(location))
    };

    let mut mappings = parse_mapping_document(&content, ext)?;
    if mappings.len() != 1 {
        anyhow::bail!("$includes document {location} must contain exactly one mapping entry");
    }
    Ok(mappings.remove(0))
}

fn extension_of(location: &str) -> &str {
    Path::new(location)
        .extension()
        .and_then(|e| e.to_str())
        .unwrap_or("json")
}

/// Parses a mapping document that may be either a single entry or a list,
/// normalizing to a list either way.
fn parse_mapping_document(content: &str, ext: &str) -> Result<Vec<Mapping>> {
    match ext {
        "toml" => {
            if let Ok(list) = toml::from_str::<Vec<Mapping>>(content) {
                Ok(list)
            } else {
                Ok(vec![toml::from_str(content)?])
            }
        }
        "yaml" | "yml" => {
            if let Ok(list) = serde_yaml::from_str::<Vec<Mapping>>(content) {
                Ok(list)
            } else {
                Ok(vec![serde_yaml::from_str(content)?])
            }
        }
        _ => {
            if let Ok(list) = serde_json::from_str::<Vec<Mapping>>(content) {
                Ok(list)
            } else {
                Ok(vec![serde_json::from_str(content)?])
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn custom_mapping_stems_and_extensions_cover_every_format() {
        assert!(CUSTOM_MAPPING_STEMS.contains(&"mappings.custom"));
        assert!(STRUCTURED_FILE_EXTENSIONS.contains(&"yaml"));
    }

    #[tokio::test]
    async fn resolve_includes_merges_local_file_depth_first() {
        let dir = std::env::temp_dir().join(format!("plexanibridge-includes-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("base.json"),
            r#"{"anilist_id": 999, "title": "Base Title", "tvdb_id": 1}"#,
        )
        .unwrap();

        let client = Client::new();
        let data_path = dir.to_string_lossy().into_owned();
        let mut mapping = Mapping::new(1);
        mapping.title = Some("Override Title".to_string());
        mapping.includes = vec!["base.json".to_string()];

        let mut cache = HashMap::new();
        resolve_includes(&client, &data_path, &mut mapping, &mut cache, &mut Vec::new())
            .await
            .unwrap();

        assert_eq!(mapping.tvdb_id, Some(1));
        assert_eq!(mapping.title, Some("Override Title".to_string()));
        assert!(mapping.includes.is_empty());

        std::fs::remove_dir_all(&dir).ok();
    }

    #[tokio::test]
    async fn resolve_includes_detects_cycle() {
        let dir = std::env::temp_dir().join(format!("plexanibridge-includes-cycle-{}", std::process::id()));
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(
            dir.join("a.json"),
            r#"{"anilist_id": 1, "$includes": ["b.json"]}"#,
        )
        .unwrap();
        std::fs::write(
            dir.join("b.json"),
            r#"{"anilist_id": 2, "$includes": ["a.json"]}"#,
        )
        .unwrap();

        let client = Client::new();
        let data_path = dir.to_string_lossy().into_owned();
        let mut mapping: Mapping =
            serde_json::from_str(&std::fs::read_to_string(dir.join("a.json")).unwrap()).unwrap();

        let mut cache = HashMap::new();
        let result = resolve_includes(&client, &data_path, &mut mapping, &mut cache, &mut Vec::new()).await;
        assert!(result.is_err());

        std::fs::remove_dir_all(&dir).ok();
    }
}
