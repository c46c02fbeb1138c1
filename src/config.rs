use std::{
    fs,
    path::{Path, PathBuf},
    str::FromStr,
    sync::Mutex,
};

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{info, warn};

use crate::filter::{PipelineOptions, DEFAULT_RADIUS_KM, NEARBY_RADIUS_KM};
use crate::utils;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("config io error: {0}")]
    Io(#[from] std::io::Error),
    #[error("config parse error: {0}")]
    Parse(#[from] serde_json::Error),
    #[error("config mutex poisoned")]
    Poisoned,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub api_url: Option<String>,
    pub api_key: Option<String>,
    pub default_radius_km: f64,
    pub nearby_radius_km: f64,
    pub page_size: usize,
    pub display_increment: usize,
    pub fetch_limit: usize,
    pub diversify_cap: usize,
    pub diversify_relaxed_cap: usize,
    pub taxonomy_ttl_secs: i64,
    pub geolocation_timeout_ms: u64,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            api_url: None,
            api_key: None,
            default_radius_km: DEFAULT_RADIUS_KM,
            nearby_radius_km: NEARBY_RADIUS_KM,
            page_size: crate::paging::DEFAULT_PAGE_SIZE,
            display_increment: crate::paging::DEFAULT_INCREMENT,
            fetch_limit: 500,
            diversify_cap: crate::filter::diversify::DEFAULT_CAP,
            diversify_relaxed_cap: crate::filter::diversify::RELAXED_CAP,
            taxonomy_ttl_secs: crate::cache::DEFAULT_TTL_SECS,
            geolocation_timeout_ms: 8_000,
        }
    }
}

impl AppConfig {
    /// `EVENTS_*` variables take precedence over the file.
    pub fn with_env_overrides(mut self) -> Self {
        if let Ok(url) = std::env::var("EVENTS_API_URL") {
            self.api_url = Some(url);
        }
        if let Ok(key) = std::env::var("EVENTS_API_KEY") {
            self.api_key = Some(key);
        }
        override_parsed("EVENTS_DEFAULT_RADIUS_KM", &mut self.default_radius_km);
        override_parsed("EVENTS_NEARBY_RADIUS_KM", &mut self.nearby_radius_km);
        override_parsed("EVENTS_PAGE_SIZE", &mut self.page_size);
        override_parsed("EVENTS_DISPLAY_INCREMENT", &mut self.display_increment);
        override_parsed("EVENTS_FETCH_LIMIT", &mut self.fetch_limit);
        override_parsed("EVENTS_TAXONOMY_TTL_SECS", &mut self.taxonomy_ttl_secs);
        override_parsed("EVENTS_GEOLOCATION_TIMEOUT_MS", &mut self.geolocation_timeout_ms);
        self
    }

    pub fn pipeline_options(&self, diversify: bool) -> PipelineOptions {
        PipelineOptions {
            nearby_radius_km: self.nearby_radius_km,
            diversify,
            diversify_cap: self.diversify_cap,
            diversify_relaxed_cap: self.diversify_relaxed_cap,
            diversify_target: self.page_size,
        }
    }
}

fn override_parsed<T: FromStr>(key: &str, slot: &mut T) {
    let Ok(raw) = std::env::var(key) else {
        return;
    };
    match raw.trim().parse::<T>() {
        Ok(value) => {
            info!("{key} set from environment");
            *slot = value;
        }
        Err(_) => warn!("ignoring invalid {key} value: {raw}"),
    }
}

pub struct ConfigStore {
    path: PathBuf,
    data: Mutex<AppConfig>,
}

impl ConfigStore {
    pub fn load() -> Self {
        Self::load_from(utils::config_path())
    }

    pub fn load_from(path: PathBuf) -> Self {
        let data = match read_config(&path) {
            Ok(config) => config,
            Err(err) => {
                warn!("unreadable config at {:?}, using defaults: {err}", path);
                AppConfig::default()
            }
        };
        Self {
            path,
            data: Mutex::new(data.with_env_overrides()),
        }
    }

    pub fn read(&self) -> AppConfig {
        match self.data.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        }
    }

    pub fn update<F>(&self, transform: F) -> Result<AppConfig, ConfigError>
    where
        F: FnOnce(&mut AppConfig),
    {
        let mut guard = self.data.lock().map_err(|_| ConfigError::Poisoned)?;
        transform(&mut guard);
        write_config(&self.path, &guard)?;
        Ok(guard.clone())
    }
}

fn read_config(path: &Path) -> Result<AppConfig, ConfigError> {
    if !path.exists() {
        return Ok(AppConfig::default());
    }
    let contents = fs::read_to_string(path)?;
    Ok(serde_json::from_str(&contents)?)
}

fn write_config(path: &Path, config: &AppConfig) -> Result<(), ConfigError> {
    utils::ensure_parent(path);
    let contents = serde_json::to_string_pretty(config)?;
    fs::write(path, contents)?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_file_gives_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let config = read_config(&dir.path().join("config.json")).expect("read");
        assert_eq!(config, AppConfig::default());
        assert_eq!(config.page_size, 120);
        assert_eq!(config.display_increment, 30);
        assert_eq!(config.taxonomy_ttl_secs, 300);
    }

    #[test]
    fn partial_file_keeps_other_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, r#"{"page_size": 60, "api_url": "https://db.example.ch"}"#)
            .expect("write");
        let config = read_config(&path).expect("read");
        assert_eq!(config.page_size, 60);
        assert_eq!(config.api_url.as_deref(), Some("https://db.example.ch"));
        assert_eq!(config.nearby_radius_km, NEARBY_RADIUS_KM);
    }

    #[test]
    fn update_persists_to_disk() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("nested").join("config.json");
        let store = ConfigStore::load_from(path.clone());
        let updated = store
            .update(|config| config.diversify_cap = 4)
            .expect("update");
        assert_eq!(updated.diversify_cap, 4);
        assert_eq!(read_config(&path).expect("reread").diversify_cap, 4);
        assert_eq!(store.read().diversify_cap, 4);
    }

    #[test]
    fn corrupted_file_falls_back_to_defaults() {
        let dir = tempfile::tempdir().expect("tempdir");
        let path = dir.path().join("config.json");
        fs::write(&path, "{{{").expect("write");
        assert!(matches!(read_config(&path), Err(ConfigError::Parse(_))));
        let store = ConfigStore::load_from(path);
        assert_eq!(store.read().page_size, AppConfig::default().page_size);
    }

    #[test]
    fn pipeline_options_follow_config() {
        let config = AppConfig {
            nearby_radius_km: 7.5,
            page_size: 60,
            ..AppConfig::default()
        };
        let options = config.pipeline_options(true);
        assert!(options.diversify);
        assert_eq!(options.nearby_radius_km, 7.5);
        assert_eq!(options.diversify_target, 60);
    }
}
