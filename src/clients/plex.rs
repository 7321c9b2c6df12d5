use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};

use reqwest::Client;
use serde::Deserialize;
use tokio::sync::Mutex;
use tracing::{debug, warn};

use crate::models::plex_item::{PlexGuid, PlexItem, PlexItemType};

#[derive(Debug, thiserror::Error)]
pub enum PlexError {
    #[error("plex request failed: {0}")]
    Request(#[from] reqwest::Error),
    #[error("plex rejected the configured token")]
    Unauthorized,
    #[error("plex item not found")]
    NotFound,
    #[error("failed to parse plex response: {0}")]
    Xml(#[from] quick_xml::de::DeError),
}

pub type Result<T> = std::result::Result<T, PlexError>;

/// One Plex library section (a movie or show library).
#[derive(Debug, Clone)]
pub struct Section {
    pub key: i64,
    pub title: String,
    pub kind: PlexItemType,
}

/// What slice of a section `iter_items` should cover.
#[derive(Debug, Clone, Copy)]
pub enum ScanMode {
    Full,
    Since(chrono::DateTime<chrono::Utc>),
    RecentlyUpdated,
    Single(i64),
}

#[derive(Debug, Deserialize)]
struct MediaContainer {
    #[serde(rename = "@size", default)]
    size: i64,
    #[serde(rename = "Directory", default)]
    directories: Vec<XmlDirectory>,
    #[serde(rename = "Video", default)]
    videos: Vec<XmlVideo>,
}

#[derive(Debug, Deserialize)]
struct XmlDirectory {
    #[serde(rename = "@key", default)]
    key: String,
    #[serde(rename = "@title", default)]
    title: String,
    #[serde(rename = "@type", default)]
    kind: Option<String>,
    #[serde(rename = "@ratingKey", default)]
    rating_key: Option<i64>,
    #[serde(rename = "@parentRatingKey", default)]
    parent_rating_key: Option<i64>,
    #[serde(rename = "@guid", default)]
    guid: Option<String>,
    #[serde(rename = "@index", default)]
    index: Option<i32>,
    #[serde(rename = "@year", default)]
    year: Option<i32>,
    #[serde(rename = "@addedAt", default)]
    added_at: Option<i64>,
    #[serde(rename = "@updatedAt", default)]
    updated_at: Option<i64>,
    #[serde(rename = "Guid", default)]
    guids: Vec<XmlGuid>,
}

#[derive(Debug, Deserialize)]
struct XmlVideo {
    #[serde(rename = "@ratingKey", default)]
    rating_key: i64,
    #[serde(rename = "@parentRatingKey", default)]
    parent_rating_key: Option<i64>,
    #[serde(rename = "@guid", default)]
    guid: String,
    #[serde(rename = "@type", default)]
    kind: String,
    #[serde(rename = "@title", default)]
    title: String,
    #[serde(rename = "@year", default)]
    year: Option<i32>,
    #[serde(rename = "@index", default)]
    episode_index: Option<i32>,
    #[serde(rename = "@parentIndex", default)]
    season_index: Option<i32>,
    #[serde(rename = "@addedAt", default)]
    added_at: i64,
    #[serde(rename = "@updatedAt", default)]
    updated_at: i64,
    #[serde(rename = "@lastViewedAt", default)]
    last_viewed_at: Option<i64>,
    #[serde(rename = "@userRating", default)]
    user_rating: Option<f32>,
    #[serde(rename = "@viewCount", default)]
    view_count: Option<u32>,
    #[serde(rename = "@viewOffset", default)]
    view_offset: Option<u64>,
    #[serde(rename = "@duration", default)]
    duration: Option<u64>,
    #[serde(rename = "Guid", default)]
    guids: Vec<XmlGuid>,
}

#[derive(Debug, Deserialize)]
struct XmlGuid {
    #[serde(rename = "@id")]
    id: String,
}

fn parse_guids(primary: Option<&str>, extra: &[XmlGuid]) -> Vec<PlexGuid> {
    let mut guids: Vec<PlexGuid> = extra.iter().filter_map(|g| PlexGuid::parse(&g.id)).collect();
    if let Some(primary) = primary
        && let Some(g) = PlexGuid::parse(primary)
        && !guids.contains(&g)
    {
        guids.push(g);
    }
    guids
}

fn item_type_from_str(raw: &str) -> PlexItemType {
    match raw {
        "show" => PlexItemType::Show,
        "season" => PlexItemType::Season,
        "episode" => PlexItemType::Episode,
        _ => PlexItemType::Movie,
    }
}

fn unix_to_utc(ts: i64) -> chrono::DateTime<chrono::Utc> {
    chrono::DateTime::from_timestamp(ts, 0).unwrap_or_else(chrono::Utc::now)
}

fn video_to_item(section_key: i64, video: XmlVideo) -> PlexItem {
    PlexItem {
        section_key,
        rating_key: video.rating_key,
        parent_rating_key: video.parent_rating_key,
        guid: video.guid.clone(),
        item_type: item_type_from_str(&video.kind),
        added_at: unix_to_utc(video.added_at),
        updated_at: unix_to_utc(video.updated_at),
        last_viewed_at: video.last_viewed_at.map(unix_to_utc),
        user_rating: video.user_rating,
        view_count: video.view_count.unwrap_or(0),
        view_offset_ms: video.view_offset.unwrap_or(0),
        duration_ms: video.duration.unwrap_or(0),
        title: video.title,
        year: video.year,
        guids: parse_guids(Some(&video.guid), &video.guids),
        season_index: video.season_index,
        episode_index: video.episode_index,
        in_watchlist: false,
        in_continue_watching: false,
        review_text: None,
    }
}

/// Builds the `PlexItem` for one episode of a show, carrying the show's own
/// identity (title, year, external guids) rather than the episode's —
/// resolution matches against the show, not the episode.
fn episode_to_item(section_key: i64, show: &XmlDirectory, show_guids: &[PlexGuid], video: XmlVideo) -> PlexItem {
    let mut guids = show_guids.to_vec();
    for g in parse_guids(Some(&video.guid), &video.guids) {
        if !guids.contains(&g) {
            guids.push(g);
        }
    }

    PlexItem {
        section_key,
        rating_key: video.rating_key,
        parent_rating_key: video.parent_rating_key,
        guid: video.guid.clone(),
        item_type: PlexItemType::Episode,
        added_at: unix_to_utc(video.added_at),
        updated_at: unix_to_utc(video.updated_at),
        last_viewed_at: video.last_viewed_at.map(unix_to_utc),
        user_rating: video.user_rating,
        view_count: video.view_count.unwrap_or(0),
        view_offset_ms: video.view_offset.unwrap_or(0),
        duration_ms: video.duration.unwrap_or(0),
        title: show.title.clone(),
        year: show.year,
        guids,
        season_index: video.season_index,
        episode_index: video.episode_index,
        in_watchlist: false,
        in_continue_watching: false,
        review_text: None,
    }
}

struct CacheEntry {
    item: PlexItem,
    cached_at: Instant,
}

const CACHE_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Thin wrapper over Plex's server XML API, with an LRU+TTL metadata cache
/// and exponential backoff on transient failures.
#[derive(Clone)]
pub struct PlexClient {
    client: Client,
    base_url: String,
    token: Arc<Mutex<String>>,
    cache: Arc<Mutex<HashMap<String, CacheEntry>>>,
}

impl PlexClient {
    #[must_use]
    pub fn new(base_url: &str, token: &str) -> Self {
        Self {
            client: Client::builder()
                .user_agent(concat!("plexanibridge/", env!("CARGO_PKG_VERSION")))
                .build()
                .unwrap_or_else(|_| Client::new()),
            base_url: base_url.trim_end_matches('/').to_string(),
            token: Arc::new(Mutex::new(token.to_string())),
            cache: Arc::new(Mutex::new(HashMap::new())),
        }
    }

    async fn request_xml(&self, path: &str, query: &[(&str, String)]) -> Result<MediaContainer> {
        const MAX_ATTEMPTS: u32 = 4;
        let token = self.token.lock().await.clone();

        let mut attempt = 0;
        loop {
            attempt += 1;
            let response = self
                .client
                .get(format!("{}{path}", self.base_url))
                .header("X-Plex-Token", &token)
                .header("Accept", "application/xml")
                .query(query)
                .send()
                .await?;

            if response.status() == reqwest::StatusCode::UNAUTHORIZED {
                return Err(PlexError::Unauthorized);
            }
            if response.status() == reqwest::StatusCode::NOT_FOUND {
                return Err(PlexError::NotFound);
            }
            if response.status().is_server_error() || response.status().is_client_error() {
                if attempt >= MAX_ATTEMPTS {
                    return Err(PlexError::Request(
                        response.error_for_status().unwrap_err(),
                    ));
                }
                let backoff = Duration::from_millis(200 * 2u64.pow(attempt) + fastrand_jitter());
                warn!(?backoff, attempt, path, "plex request failed, retrying");
                tokio::time::sleep(backoff).await;
                continue;
            }

            let body = response.text().await?;
            return Ok(quick_xml::de::from_str(&body)?);
        }
    }

    /// Switches the client's active token to a Plex home user, per profile
    /// `plex_user` configuration.
    pub async fn resolve_home_user(&self, home_user_token: &str) {
        *self.token.lock().await = home_user_token.to_string();
    }

    pub async fn list_sections(&self) -> Result<Vec<Section>> {
        let container = self.request_xml("/library/sections", &[]).await?;
        Ok(container
            .directories
            .into_iter()
            .filter_map(|d| {
                let kind = match d.kind.as_deref() {
                    Some("movie") => PlexItemType::Movie,
                    Some("show") => PlexItemType::Show,
                    _ => return None,
                };
                Some(Section {
                    key: d.key.parse().ok()?,
                    title: d.title,
                    kind,
                })
            })
            .collect())
    }

    pub async fn fetch_metadata(&self, rating_key: i64) -> Result<PlexItem> {
        if let Some(item) = self.cache_get(&rating_key.to_string()).await {
            return Ok(item);
        }

        let container = self
            .request_xml(&format!("/library/metadata/{rating_key}"), &[])
            .await?;
        let video = container.videos.into_iter().next().ok_or(PlexError::NotFound)?;
        let section_key = 0;
        let item = video_to_item(section_key, video);
        self.cache_put(item.guid.clone(), item.clone()).await;
        Ok(item)
    }

    /// Fetches every episode of a show, flattened across seasons, via Plex's
    /// `allLeaves` endpoint. Each returned `PlexItem` carries the show's own
    /// guids (not the episode's) so the resolver matches against the show.
    async fn fetch_episodes(&self, section_key: i64, show: &XmlDirectory) -> Result<Vec<PlexItem>> {
        let Some(rating_key) = show.rating_key else {
            return Ok(Vec::new());
        };
        let container = self
            .request_xml(&format!("/library/metadata/{rating_key}/allLeaves"), &[])
            .await?;
        let show_guids = parse_guids(show.guid.as_deref(), &show.guids);
        Ok(container
            .videos
            .into_iter()
            .map(|v| episode_to_item(section_key, show, &show_guids, v))
            .collect())
    }

    /// Returns a lazily-paginated cursor over one section's items.
    #[must_use]
    pub fn iter_items(&self, section: &Section, mode: ScanMode) -> ItemCursor {
        ItemCursor::new(self.clone(), section.clone(), mode)
    }

    /// Fetches one page of a section's items. The third element of the
    /// return tuple is the number of top-level library entries (movies or
    /// shows, never episodes) this page consumed, which is what paginates
    /// the underlying `/library/sections/{id}/all` request — distinct from
    /// the item count for show sections, where one show expands into many
    /// episode `PlexItem`s.
    async fn fetch_page(
        &self,
        section: &Section,
        mode: ScanMode,
        start: i64,
        page_size: i64,
    ) -> Result<(Vec<PlexItem>, i64, i64)> {
        match section.kind {
            PlexItemType::Show => self.fetch_show_page(section, mode, start, page_size).await,
            _ => self.fetch_movie_page(section, mode, start, page_size).await,
        }
    }

    fn page_query(mode: ScanMode, start: i64, page_size: i64) -> Option<Vec<(&'static str, String)>> {
        let mut query: Vec<(&str, String)> = vec![
            ("X-Plex-Container-Start", start.to_string()),
            ("X-Plex-Container-Size", page_size.to_string()),
        ];

        match mode {
            ScanMode::Since(ts) => {
                query.push(("sort", "updatedAt:asc".to_string()));
                query.push(("updatedAt>>=", ts.timestamp().to_string()));
            }
            ScanMode::RecentlyUpdated => {
                query.push(("sort", "updatedAt:desc".to_string()));
            }
            ScanMode::Single(_) => return None,
            ScanMode::Full => {
                query.push(("sort", "ratingKey:asc".to_string()));
            }
        }

        Some(query)
    }

    async fn fetch_movie_page(
        &self,
        section: &Section,
        mode: ScanMode,
        start: i64,
        page_size: i64,
    ) -> Result<(Vec<PlexItem>, i64, i64)> {
        if let ScanMode::Single(key) = mode {
            return Ok((vec![self.fetch_metadata(key).await?], 0, 0));
        }
        let Some(query) = Self::page_query(mode, start, page_size) else {
            return Ok((Vec::new(), 0, 0));
        };

        let path = format!("/library/sections/{}/all", section.key);
        let container = self.request_xml(&path, &query).await?;
        let total = container.size;
        let items: Vec<PlexItem> = container
            .videos
            .into_iter()
            .map(|v| video_to_item(section.key, v))
            .collect();
        let advanced = i64::try_from(items.len()).unwrap_or(0);
        Ok((items, total, advanced))
    }

    /// Paginates over shows in the section, expanding each into its full,
    /// flattened episode list via `fetch_episodes`. `/library/sections/{id}/all`
    /// returns one `<Directory>` per show here, never a `<Video>`.
    async fn fetch_show_page(
        &self,
        section: &Section,
        mode: ScanMode,
        start: i64,
        page_size: i64,
    ) -> Result<(Vec<PlexItem>, i64, i64)> {
        if let ScanMode::Single(key) = mode {
            return Ok((vec![self.fetch_metadata(key).await?], 0, 0));
        }
        let Some(query) = Self::page_query(mode, start, page_size) else {
            return Ok((Vec::new(), 0, 0));
        };

        let path = format!("/library/sections/{}/all", section.key);
        let container = self.request_xml(&path, &query).await?;
        let total = container.size;
        let advanced = i64::try_from(container.directories.len()).unwrap_or(0);

        let mut items = Vec::new();
        for show in &container.directories {
            items.extend(self.fetch_episodes(section.key, show).await?);
        }
        Ok((items, total, advanced))
    }

    async fn cache_get(&self, key: &str) -> Option<PlexItem> {
        let mut cache = self.cache.lock().await;
        match cache.get(key) {
            Some(entry) if entry.cached_at.elapsed() < CACHE_TTL => Some(entry.item.clone()),
            Some(_) => {
                cache.remove(key);
                None
            }
            None => None,
        }
    }

    async fn cache_put(&self, key: String, item: PlexItem) {
        let mut cache = self.cache.lock().await;
        cache.insert(
            key,
            CacheEntry {
                item,
                cached_at: Instant::now(),
            },
        );
        if cache.len() > 10_000 {
            debug!("plex metadata cache exceeded 10k entries, clearing");
            cache.clear();
        }
    }
}

fn fastrand_jitter() -> u64 {
    use rand::Rng;
    rand::rng().random_range(0..250)
}

/// A restartable, finite cursor over one section's items for a given scan
/// mode, yielding in stable rating-key order.
pub struct ItemCursor {
    client: PlexClient,
    section: Section,
    mode: ScanMode,
    offset: i64,
    total: Option<i64>,
    page_size: i64,
}

impl ItemCursor {
    fn new(client: PlexClient, section: Section, mode: ScanMode) -> Self {
        Self {
            client,
            section,
            mode,
            offset: 0,
            total: None,
            page_size: 200,
        }
    }

    /// Pulls the next batch, or an empty vec once the section is exhausted.
    pub async fn next_batch(&mut self) -> Result<Vec<PlexItem>> {
        if let Some(total) = self.total
            && self.offset >= total
        {
            return Ok(Vec::new());
        }

        let (items, total, advanced) = self
            .client
            .fetch_page(&self.section, self.mode, self.offset, self.page_size)
            .await?;

        self.total = Some(total);
        self.offset += advanced;

        if matches!(self.mode, ScanMode::Single(_)) {
            self.total = Some(0);
            self.offset = 0;
        }

        Ok(items)
    }

    /// Current progress as `(processed, total)`, for status reporting.
    #[must_use]
    pub fn progress(&self) -> (i64, i64) {
        (self.offset, self.total.unwrap_or(0))
    }
}
