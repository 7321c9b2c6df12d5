use std::collections::HashMap;
use std::sync::Arc;

use chrono::{Datelike, NaiveDate};
use reqwest::Client;
use serde::{Deserialize, Serialize};
use serde_json::{Value, json};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::constants::ANILIST_GRAPHQL_URL;
use crate::models::anilist_entry::{AniListListEntry, AniListStatus};

use super::ratelimit::AniListRateLimiter;

#[derive(Debug, thiserror::Error)]
pub enum AniListError {
    #[error("anilist request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("anilist returned errors: {0:?}")]
    GraphQl(Vec<String>),
    #[error("anilist rejected the configured token")]
    Unauthorized,
    #[error("anilist list entry for media {0} has no known id to delete")]
    UnknownListEntry(i32),
}

pub type Result<T> = std::result::Result<T, AniListError>;

/// The authenticated AniList user a profile's token maps to.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Viewer {
    pub id: i32,
    pub name: String,
}

/// A candidate AniList media returned by search or batch-fetch, carrying the
/// titles the fuzzy matcher scores against.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct MediaSearchResult {
    pub id: i32,
    pub romaji_title: Option<String>,
    pub english_title: Option<String>,
    pub native_title: Option<String>,
    pub season_year: Option<i32>,
    pub format: Option<String>,
}

#[derive(Default)]
struct CachedList {
    /// media_id -> (entry, AniList's internal list-entry id)
    entries: HashMap<i32, (AniListListEntry, i32)>,
}

#[derive(Clone)]
pub struct AnilistClient {
    client: Client,
    token: String,
    limiter: Arc<AniListRateLimiter>,
    list_cache: Arc<RwLock<Option<CachedList>>>,
}

impl AnilistClient {
    #[must_use]
    pub fn new(token: &str) -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("plexanibridge/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| Client::new()),
            token: token.to_string(),
            limiter: Arc::new(AniListRateLimiter::new(4)),
            list_cache: Arc::new(RwLock::new(None)),
        }
    }

    async fn execute(&self, query: &str, variables: Value) -> Result<Value> {
        const MAX_ATTEMPTS: u32 = 4;

        for attempt in 0..MAX_ATTEMPTS {
            self.limiter.acquire().await;

            let response = self
                .client
                .post(ANILIST_GRAPHQL_URL)
                .bearer_auth(&self.token)
                .json(&json!({ "query": query, "variables": variables }))
                .send()
                .await?;

            self.limiter.observe_headers(response.headers());

            if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(AniListError::Unauthorized);
            }

            if response.status() == reqwest::StatusCode::TOO_MANY_REQUESTS {
                let wait = AniListRateLimiter::retry_after(response.headers())
                    .unwrap_or(std::time::Duration::from_secs(60));
                warn!(?wait, attempt, "anilist 429, backing off");
                tokio::time::sleep(wait).await;
                continue;
            }

            let body: Value = response.json().await?;

            if let Some(errors) = body.get("errors").and_then(Value::as_array) {
                let messages: Vec<String> = errors
                    .iter()
                    .filter_map(|e| e.get("message").and_then(Value::as_str))
                    .map(str::to_string)
                    .collect();
                return Err(AniListError::GraphQl(messages));
            }

            return Ok(body.get("data").cloned().unwrap_or(Value::Null));
        }

        Err(AniListError::GraphQl(vec![
            "exhausted retry attempts".to_string(),
        ]))
    }

    pub async fn get_viewer(&self) -> Result<Viewer> {
        const QUERY: &str = "query { Viewer { id name } }";
        let data = self.execute(QUERY, json!({})).await?;
        let viewer = &data["Viewer"];
        Ok(Viewer {
            id: viewer["id"].as_i64().unwrap_or_default() as i32,
            name: viewer["name"].as_str().unwrap_or_default().to_string(),
        })
    }

    /// Fetches the viewer's full anime list and populates the list cache
    /// used by `save_entry`/`delete_entry` to resolve list-entry ids.
    pub async fn get_list(&self, user_id: i32) -> Result<Vec<AniListListEntry>> {
        const QUERY: &str = r"
            query ($userId: Int) {
                MediaListCollection(userId: $userId, type: ANIME) {
                    lists {
                        entries {
                            id
                            mediaId
                            status
                            progress
                            repeat
                            score(format: POINT_100)
                            notes
                            startedAt { year month day }
                            completedAt { year month day }
                        }
                    }
                }
            }
        ";

        let data = self.execute(QUERY, json!({ "userId": user_id })).await?;
        let lists = data["MediaListCollection"]["lists"]
            .as_array()
            .cloned()
            .unwrap_or_default();

        let mut cache = CachedList::default();
        let mut entries = Vec::new();

        for list in lists {
            for raw in list["entries"].as_array().cloned().unwrap_or_default() {
                let entry = parse_list_entry(&raw);
                let list_entry_id = raw["id"].as_i64().unwrap_or_default() as i32;
                cache.entries.insert(entry.media_id, (entry.clone(), list_entry_id));
                entries.push(entry);
            }
        }

        *self.list_cache.write().await = Some(cache);
        Ok(entries)
    }

    /// Creates or updates a list entry, using the cached list-entry id for
    /// updates and letting AniList assign one on first creation.
    pub async fn save_entry(&self, entry: &AniListListEntry) -> Result<AniListListEntry> {
        const MUTATION: &str = r"
            mutation (
                $mediaId: Int, $status: MediaListStatus, $progress: Int, $repeat: Int,
                $score: Float, $notes: String, $startedAt: FuzzyDateInput, $completedAt: FuzzyDateInput
            ) {
                SaveMediaListEntry(
                    mediaId: $mediaId, status: $status, progress: $progress, repeat: $repeat,
                    scoreRaw: $score, notes: $notes, startedAt: $startedAt, completedAt: $completedAt
                ) {
                    id
                    mediaId
                    status
                    progress
                    repeat
                    score(format: POINT_100)
                    notes
                    startedAt { year month day }
                    completedAt { year month day }
                }
            }
        ";

        let variables = json!({
            "mediaId": entry.media_id,
            "status": entry.status.map(AniListStatus::as_graphql),
            "progress": entry.progress,
            "repeat": entry.repeat,
            "score": entry.score,
            "notes": entry.notes,
            "startedAt": fuzzy_date(entry.started_at),
            "completedAt": fuzzy_date(entry.completed_at),
        });

        let data = self.execute(MUTATION, variables).await?;
        let saved = parse_list_entry(&data["SaveMediaListEntry"]);
        let list_entry_id = data["SaveMediaListEntry"]["id"].as_i64().unwrap_or_default() as i32;

        if let Some(cache) = self.list_cache.write().await.as_mut() {
            cache
                .entries
                .insert(saved.media_id, (saved.clone(), list_entry_id));
        }

        Ok(saved)
    }

    /// Saves many list entries in one aliased GraphQL mutation document,
    /// falling back to one `save_entry` call per item if the batch itself
    /// errors (AniList rejects the whole document on a single bad entry).
    pub async fn save_entries_batch(&self, entries: &[AniListListEntry]) -> Result<Vec<AniListListEntry>> {
        if entries.is_empty() {
            return Ok(Vec::new());
        }
        if entries.len() == 1 {
            return Ok(vec![self.save_entry(&entries[0]).await?]);
        }

        match self.save_entries_batch_aliased(entries).await {
            Ok(saved) => Ok(saved),
            Err(err) => {
                debug!(?err, "batched save failed, falling back to per-entry saves");
                let mut saved = Vec::with_capacity(entries.len());
                for entry in entries {
                    match self.save_entry(entry).await {
                        Ok(s) => saved.push(s),
                        Err(err) => warn!(
                            ?err,
                            media_id = entry.media_id,
                            "per-entry save failed during batch fallback"
                        ),
                    }
                }
                Ok(saved)
            }
        }
    }

    async fn save_entries_batch_aliased(&self, entries: &[AniListListEntry]) -> Result<Vec<AniListListEntry>> {
        let fields: Vec<String> = entries
            .iter()
            .enumerate()
            .map(|(i, entry)| {
                format!(
                    "s{i}: SaveMediaListEntry(mediaId: {}, status: {}, progress: {}, repeat: {}, \
                     scoreRaw: {}, notes: {}, startedAt: {}, completedAt: {}) {{ \
                     id mediaId status progress repeat score(format: POINT_100) notes \
                     startedAt {{ year month day }} completedAt {{ year month day }} }}",
                    entry.media_id,
                    graphql_enum(entry.status.map(AniListStatus::as_graphql)),
                    entry.progress,
                    entry.repeat,
                    graphql_opt_f32(entry.score),
                    graphql_opt_string(entry.notes.as_deref()),
                    graphql_date(entry.started_at),
                    graphql_date(entry.completed_at),
                )
            })
            .collect();
        let query = format!("mutation {{ {} }}", fields.join(" "));

        let data = self.execute(&query, json!({})).await?;
        let Value::Object(map) = data else {
            return Ok(Vec::new());
        };

        let mut saved = Vec::with_capacity(map.len());
        let mut cache = self.list_cache.write().await;
        for value in map.values() {
            if value.is_null() {
                continue;
            }
            let entry = parse_list_entry(value);
            let list_entry_id = value["id"].as_i64().unwrap_or_default() as i32;
            if let Some(cache) = cache.as_mut() {
                cache.entries.insert(entry.media_id, (entry.clone(), list_entry_id));
            }
            saved.push(entry);
        }
        Ok(saved)
    }

    /// Looks up a media id in the in-memory list cache populated by
    /// `get_list`/`save_entry`. Returns `None` if the cache hasn't been
    /// populated yet or the media has no list entry.
    pub async fn cached_entry(&self, media_id: i32) -> Option<AniListListEntry> {
        self.list_cache
            .read()
            .await
            .as_ref()
            .and_then(|c| c.entries.get(&media_id).map(|(entry, _)| entry.clone()))
    }

    pub async fn delete_entry(&self, media_id: i32) -> Result<()> {
        let list_entry_id = {
            let cache = self.list_cache.read().await;
            cache
                .as_ref()
                .and_then(|c| c.entries.get(&media_id).map(|(_, id)| *id))
        };

        let Some(list_entry_id) = list_entry_id else {
            return Err(AniListError::UnknownListEntry(media_id));
        };

        const MUTATION: &str = r"
            mutation ($id: Int) {
                DeleteMediaListEntry(id: $id) { deleted }
            }
        ";
        self.execute(MUTATION, json!({ "id": list_entry_id })).await?;

        if let Some(cache) = self.list_cache.write().await.as_mut() {
            cache.entries.remove(&media_id);
        }
        Ok(())
    }

    pub async fn search_media(
        &self,
        title: &str,
        year: Option<i32>,
    ) -> Result<Vec<MediaSearchResult>> {
        const QUERY: &str = r"
            query ($search: String, $year: Int) {
                Page(page: 1, perPage: 10) {
                    media(search: $search, type: ANIME, seasonYear: $year) {
                        id
                        title { romaji english native }
                        seasonYear
                        format
                    }
                }
            }
        ";

        let data = self
            .execute(QUERY, json!({ "search": title, "year": year }))
            .await?;
        Ok(parse_media_page(&data))
    }

    /// Fetches media by id, batching via aliased sub-queries and falling
    /// back to one request per id if the batch itself errors (AniList
    /// rejects the whole query on a single invalid id).
    pub async fn get_media_batch(&self, ids: &[i32]) -> Result<Vec<MediaSearchResult>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        match self.get_media_batch_aliased(ids).await {
            Ok(results) => Ok(results),
            Err(err) => {
                debug!(?err, "batched media fetch failed, falling back to per-id");
                let mut results = Vec::with_capacity(ids.len());
                for &id in ids {
                    if let Ok(Some(media)) = self.get_media_by_id(id).await {
                        results.push(media);
                    }
                }
                Ok(results)
            }
        }
    }

    async fn get_media_batch_aliased(&self, ids: &[i32]) -> Result<Vec<MediaSearchResult>> {
        let fields: Vec<String> = ids
            .iter()
            .enumerate()
            .map(|(i, id)| {
                format!(
                    "m{i}: Media(id: {id}, type: ANIME) {{ id title {{ romaji english native }} seasonYear format }}"
                )
            })
            .collect();
        let query = format!("query {{ {} }}", fields.join(" "));

        let data = self.execute(&query, json!({})).await?;
        let Value::Object(map) = data else {
            return Ok(Vec::new());
        };

        Ok(map
            .values()
            .filter(|v| !v.is_null())
            .map(parse_media)
            .collect())
    }

    async fn get_media_by_id(&self, id: i32) -> Result<Option<MediaSearchResult>> {
        const QUERY: &str = r"
            query ($id: Int) {
                Media(id: $id, type: ANIME) {
                    id
                    title { romaji english native }
                    seasonYear
                    format
                }
            }
        ";
        let data = self.execute(QUERY, json!({ "id": id })).await?;
        if data["Media"].is_null() {
            Ok(None)
        } else {
            Ok(Some(parse_media(&data["Media"])))
        }
    }
}

/// Formats a value as a bare GraphQL enum literal (or `null`), for inlining
/// into an aliased batch mutation where per-alias variables aren't possible.
fn graphql_enum(value: Option<&str>) -> String {
    value.map_or_else(|| "null".to_string(), str::to_string)
}

fn graphql_opt_f32(value: Option<f32>) -> String {
    value.map_or_else(|| "null".to_string(), |v| v.to_string())
}

fn graphql_opt_string(value: Option<&str>) -> String {
    match value {
        None => "null".to_string(),
        Some(s) => format!(
            "\"{}\"",
            s.replace('\\', "\\\\").replace('"', "\\\"").replace('\n', "\\n")
        ),
    }
}

fn graphql_date(date: Option<NaiveDate>) -> String {
    match date {
        None => "null".to_string(),
        Some(d) => format!(
            "{{ year: {}, month: {}, day: {} }}",
            d.year(),
            d.month(),
            d.day()
        ),
    }
}

fn fuzzy_date(date: Option<NaiveDate>) -> Value {
    let Some(date) = date else {
        return Value::Null;
    };
    json!({ "year": date.format("%Y").to_string().parse::<i32>().unwrap_or_default(),
            "month": date.format("%m").to_string().parse::<i32>().unwrap_or_default(),
            "day": date.format("%d").to_string().parse::<i32>().unwrap_or_default() })
}

fn parse_fuzzy_date(raw: &Value) -> Option<NaiveDate> {
    let year = raw["year"].as_i64()?;
    let month = raw["month"].as_i64().unwrap_or(1).max(1);
    let day = raw["day"].as_i64().unwrap_or(1).max(1);
    NaiveDate::from_ymd_opt(year as i32, month as u32, day as u32)
}

fn parse_list_entry(raw: &Value) -> AniListListEntry {
    AniListListEntry {
        media_id: raw["mediaId"].as_i64().unwrap_or_default() as i32,
        status: raw["status"]
            .as_str()
            .and_then(AniListStatus::from_graphql),
        progress: raw["progress"].as_i64().unwrap_or_default() as i32,
        repeat: raw["repeat"].as_i64().unwrap_or_default() as i32,
        score: raw["score"].as_f64().map(|s| s as f32).filter(|s| *s > 0.0),
        notes: raw["notes"].as_str().map(str::to_string),
        started_at: parse_fuzzy_date(&raw["startedAt"]),
        completed_at: parse_fuzzy_date(&raw["completedAt"]),
    }
}

fn parse_media(raw: &Value) -> MediaSearchResult {
    MediaSearchResult {
        id: raw["id"].as_i64().unwrap_or_default() as i32,
        romaji_title: raw["title"]["romaji"].as_str().map(str::to_string),
        english_title: raw["title"]["english"].as_str().map(str::to_string),
        native_title: raw["title"]["native"].as_str().map(str::to_string),
        season_year: raw["seasonYear"].as_i64().map(|y| y as i32),
        format: raw["format"].as_str().map(str::to_string),
    }
}

fn parse_media_page(data: &Value) -> Vec<MediaSearchResult> {
    data["Page"]["media"]
        .as_array()
        .cloned()
        .unwrap_or_default()
        .iter()
        .map(parse_media)
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fuzzy_date_round_trips() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        let raw = fuzzy_date(Some(date));
        assert_eq!(parse_fuzzy_date(&raw), Some(date));
        assert_eq!(fuzzy_date(None), Value::Null);
    }

    #[test]
    fn parse_list_entry_treats_zero_score_as_unset() {
        let raw = json!({
            "mediaId": 1, "status": "CURRENT", "progress": 3, "repeat": 0,
            "score": 0.0, "notes": null, "startedAt": {}, "completedAt": {}
        });
        let entry = parse_list_entry(&raw);
        assert_eq!(entry.score, None);
        assert_eq!(entry.status, Some(AniListStatus::Current));
    }

    #[test]
    fn graphql_date_formats_literal_object() {
        let date = NaiveDate::from_ymd_opt(2024, 3, 9).unwrap();
        assert_eq!(graphql_date(Some(date)), "{ year: 2024, month: 3, day: 9 }");
        assert_eq!(graphql_date(None), "null");
    }

    #[test]
    fn graphql_opt_string_escapes_quotes() {
        assert_eq!(graphql_opt_string(Some(r#"she said "hi""#)), r#""she said \"hi\"""#);
        assert_eq!(graphql_opt_string(None), "null");
    }

    #[test]
    fn parse_media_extracts_titles() {
        let raw = json!({
            "id": 42,
            "title": { "romaji": "Shingeki", "english": "Attack on Titan", "native": null },
            "seasonYear": 2013,
            "format": "TV"
        });
        let media = parse_media(&raw);
        assert_eq!(media.id, 42);
        assert_eq!(media.english_title.as_deref(), Some("Attack on Titan"));
        assert_eq!(media.native_title, None);
    }
}
