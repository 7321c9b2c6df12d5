use std::collections::HashMap;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::constants::{DEFAULT_BACKUP_RETENTION_DAYS, DEFAULT_FUZZY_THRESHOLD};

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct Config {
    pub general: GeneralConfig,

    #[serde(default)]
    pub server: ServerConfig,

    #[serde(default)]
    pub observability: ObservabilityConfig,

    #[serde(default)]
    pub profiles: HashMap<String, ProfileConfig>,
}

impl Default for Config {
    fn default() -> Self {
        let mut profiles = HashMap::new();
        profiles.insert("default".to_string(), ProfileConfig::default());

        Self {
            general: GeneralConfig::default(),
            server: ServerConfig::default(),
            observability: ObservabilityConfig::default(),
            profiles,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct GeneralConfig {
    pub data_path: String,

    pub log_level: String,

    #[serde(default)]
    pub suppress_connection_errors: bool,

    pub event_bus_buffer_size: usize,

    /// 0 uses the Tokio default (number of CPUs).
    pub worker_threads: usize,
}

impl Default for GeneralConfig {
    fn default() -> Self {
        Self {
            data_path: "data".to_string(),
            log_level: "info".to_string(),
            suppress_connection_errors: false,
            event_bus_buffer_size: crate::constants::EVENT_BUS_BUFFER_SIZE,
            worker_threads: 0,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ServerConfig {
    pub enabled: bool,
    pub port: u16,
    pub cors_allowed_origins: Vec<String>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            port: 8385,
            cors_allowed_origins: vec!["*".to_string()],
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ObservabilityConfig {
    pub metrics_enabled: bool,
    pub metrics_port: Option<u16>,
    pub loki_enabled: bool,
    pub loki_url: String,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            metrics_enabled: true,
            metrics_port: None,
            loki_enabled: false,
            loki_url: "http://localhost:3100".to_string(),
        }
    }
}

/// A mechanism that can enqueue sync work for a profile.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SyncTrigger {
    Periodic,
    Poll,
    Webhook,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct ProfileConfig {
    pub anilist_token: String,

    pub plex_url: String,
    pub plex_token: String,
    pub plex_sections: Vec<i64>,
    pub plex_user: Option<String>,

    /// Seconds between periodic syncs; -1 disables the periodic trigger.
    pub sync_interval: i64,
    pub sync_modes: Vec<SyncTrigger>,

    pub full_scan: bool,
    pub partial_scan: bool,
    pub destructive_sync: bool,
    pub dry_run: bool,

    pub excluded_sync_fields: Vec<String>,
    pub fuzzy_search_threshold: u8,
    pub batch_requests: bool,

    /// Overrides `general.data_path` for this profile when set.
    pub data_path: Option<String>,
    pub backup_retention_days: u32,
    pub log_level: Option<String>,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self {
            anilist_token: String::new(),
            plex_url: "http://localhost:32400".to_string(),
            plex_token: String::new(),
            plex_sections: Vec::new(),
            plex_user: None,
            sync_interval: 3600,
            sync_modes: vec![SyncTrigger::Periodic],
            full_scan: false,
            partial_scan: true,
            destructive_sync: false,
            dry_run: false,
            excluded_sync_fields: Vec::new(),
            fuzzy_search_threshold: DEFAULT_FUZZY_THRESHOLD,
            batch_requests: true,
            data_path: None,
            backup_retention_days: DEFAULT_BACKUP_RETENTION_DAYS,
            log_level: None,
        }
    }
}

impl ProfileConfig {
    #[must_use]
    pub fn sync_mode(&self) -> crate::domain::SyncMode {
        if self.destructive_sync {
            crate::domain::SyncMode::Destructive
        } else {
            crate::domain::SyncMode::Progressive
        }
    }

    #[must_use]
    pub fn data_path<'a>(&'a self, general: &'a GeneralConfig) -> &'a str {
        self.data_path.as_deref().unwrap_or(&general.data_path)
    }
}

enum ConfigFormat {
    Toml,
    Yaml,
    Json,
}

impl ConfigFormat {
    fn from_extension(path: &Path) -> Self {
        match path.extension().and_then(|e| e.to_str()) {
            Some("yaml" | "yml") => Self::Yaml,
            Some("json") => Self::Json,
            _ => Self::Toml,
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        for path in Self::config_paths() {
            if path.exists() {
                info!("loading config from: {}", path.display());
                return Self::load_from_path(&path);
            }
        }

        info!("no config file found, using defaults");
        Ok(Self::default())
    }

    pub fn load_from_path(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read config file: {}", path.display()))?;

        let config = match ConfigFormat::from_extension(path) {
            ConfigFormat::Yaml => serde_yaml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?,
            ConfigFormat::Json => serde_json::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?,
            ConfigFormat::Toml => toml::from_str(&content)
                .with_context(|| format!("failed to parse config file: {}", path.display()))?,
        };

        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::default_config_path())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }

        let content = match ConfigFormat::from_extension(path) {
            ConfigFormat::Yaml => serde_yaml::to_string(self)?,
            ConfigFormat::Json => serde_json::to_string_pretty(self)?,
            ConfigFormat::Toml => toml::to_string_pretty(self)?,
        };

        std::fs::write(path, content)?;
        info!("config saved to: {}", path.display());
        Ok(())
    }

    fn config_paths() -> Vec<PathBuf> {
        let mut paths = vec![
            PathBuf::from("config.toml"),
            PathBuf::from("config.yaml"),
            PathBuf::from("config.yml"),
            PathBuf::from("config.json"),
        ];

        if let Some(config_dir) = dirs::config_dir() {
            paths.push(config_dir.join("plexanibridge").join("config.toml"));
        }
        if let Some(home) = dirs::home_dir() {
            paths.push(home.join(".plexanibridge").join("config.toml"));
        }

        paths
    }

    fn default_config_path() -> PathBuf {
        PathBuf::from("config.toml")
    }

    pub fn create_default_if_missing() -> Result<bool> {
        let path = Self::default_config_path();
        if path.exists() {
            return Ok(false);
        }

        Self::default().save_to_path(&path)?;
        info!("created default config file: {}", path.display());
        Ok(true)
    }

    pub fn validate(&self) -> Result<()> {
        if self.profiles.is_empty() {
            anyhow::bail!("at least one profile must be configured");
        }

        let mut seen_tokens: HashMap<&str, &str> = HashMap::new();
        for (name, profile) in &self.profiles {
            if let Some(other) = seen_tokens.insert(&profile.anilist_token, name)
                && !profile.anilist_token.is_empty()
            {
                anyhow::bail!(
                    "profiles '{other}' and '{name}' use the same anilist_token; each profile must use a distinct AniList account"
                );
            }
        }

        for (name, profile) in &self.profiles {
            if profile.anilist_token.is_empty() {
                anyhow::bail!("profile '{name}' is missing anilist_token");
            }
            if profile.plex_token.is_empty() {
                anyhow::bail!("profile '{name}' is missing plex_token");
            }
            if profile.fuzzy_search_threshold > 100 {
                anyhow::bail!("profile '{name}' fuzzy_search_threshold must be <= 100");
            }
            if profile.sync_interval != -1
                && profile.sync_interval < crate::constants::intervals::MIN_RECOMMENDED_SYNC_INTERVAL
            {
                tracing::warn!(
                    "profile '{name}' sync_interval ({}) is below the recommended minimum ({})",
                    profile.sync_interval,
                    crate::constants::intervals::MIN_RECOMMENDED_SYNC_INTERVAL
                );
            }
        }

        Ok(())
    }

    #[must_use]
    pub fn profile(&self, name: &str) -> Option<&ProfileConfig> {
        self.profiles.get(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_config_has_one_profile() {
        let config = Config::default();
        assert_eq!(config.profiles.len(), 1);
        assert!(config.profiles.contains_key("default"));
    }

    #[test]
    fn toml_round_trips() {
        let config = Config::default();
        let toml_str = toml::to_string_pretty(&config).unwrap();
        let parsed: Config = toml::from_str(&toml_str).unwrap();
        assert_eq!(parsed.profiles.len(), config.profiles.len());
    }

    #[test]
    fn yaml_round_trips() {
        let config = Config::default();
        let yaml_str = serde_yaml::to_string(&config).unwrap();
        let parsed: Config = serde_yaml::from_str(&yaml_str).unwrap();
        assert_eq!(parsed.general.data_path, config.general.data_path);
    }

    #[test]
    fn validate_rejects_missing_tokens() {
        let mut config = Config::default();
        config
            .profiles
            .get_mut("default")
            .unwrap()
            .plex_token
            .clear();
        config.profiles.get_mut("default").unwrap().anilist_token = "abc".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn validate_rejects_duplicate_anilist_token() {
        let mut config = Config::default();
        let mut first = ProfileConfig::default();
        first.anilist_token = "shared".to_string();
        first.plex_token = "plex1".to_string();
        let mut second = first.clone();
        second.plex_token = "plex2".to_string();

        config.profiles.clear();
        config.profiles.insert("first".to_string(), first);
        config.profiles.insert("second".to_string(), second);

        let err = config.validate().unwrap_err();
        assert!(err.to_string().contains("same anilist_token"));
    }

    #[test]
    fn toml_rejects_unknown_keys() {
        let toml_str = "[general]\ndata_path = \"data\"\nbogus_field = 1\n";
        assert!(toml::from_str::<Config>(toml_str).is_err());
    }
}
