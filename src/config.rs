use crate::{app::APP_ID, env_flags, model::SortMode};
use anyhow::{anyhow, Context, Result};
use directories::BaseDirs;
use log::warn;
use serde::{Deserialize, Serialize};
use std::{
    collections::HashMap,
    fs,
    path::{Path, PathBuf},
    sync::{Arc, RwLock},
    time::Duration,
};

const SETTINGS_FILE: &str = "settings.json";
const DEFAULT_CATALOG_URL: &str = "https://script.google.com/macros/s/AKfycbzw69RTChLXyis4xY9o5sUHtPU32zaMeKaR2iEliyWBsJFvVbTbMvbLNfsB4rO4gLLzTQ/exec";
const DEFAULT_FALLBACK_IMAGE: &str = "https://raw.githubusercontent.com/01110010-00110101/01110010-00110101.github.io/main/system/images/404_blank.png";
const DEFAULT_FALLBACK_LINK: &str = "#";
pub const SORT_MODE_KEY: &str = "sortMode";

#[derive(Debug)]
pub struct ConfigStore {
    config_dir: PathBuf,
    state_dir: PathBuf,
    settings: RwLock<AppSettings>,
}

impl ConfigStore {
    pub fn new() -> Result<Self> {
        let base = BaseDirs::new()
            .ok_or_else(|| anyhow!("unable to resolve base directories for {APP_ID}"))?;
        Self::at(base.data_local_dir().join(APP_ID))
    }

    pub fn at(root_dir: impl AsRef<Path>) -> Result<Self> {
        let root_dir = root_dir.as_ref();
        let config_dir = root_dir.join("config");
        let state_dir = root_dir.join("state");

        fs::create_dir_all(&config_dir)
            .with_context(|| format!("failed to create config directory {config_dir:?}"))?;

        fs::create_dir_all(&state_dir)
            .with_context(|| format!("failed to create state directory {state_dir:?}"))?;

        let settings_path = config_dir.join(SETTINGS_FILE);
        let settings = if settings_path.exists() {
            let data = fs::read(&settings_path)
                .with_context(|| format!("failed to read settings file {settings_path:?}"))?;
            serde_json::from_slice(&data)
                .with_context(|| format!("failed to parse settings from {settings_path:?}"))?
        } else {
            AppSettings::default()
        };

        Ok(Self {
            config_dir,
            state_dir,
            settings: RwLock::new(settings),
        })
    }

    pub fn settings(&self) -> AppSettings {
        self.settings
            .read()
            .expect("settings lock poisoned")
            .clone()
    }

    pub fn update_settings<F>(&self, mutate: F) -> Result<AppSettings>
    where
        F: FnOnce(&mut AppSettings),
    {
        let mut guard = self
            .settings
            .write()
            .expect("settings lock poisoned for write");
        mutate(&mut guard);
        let snapshot = guard.clone();
        self.persist_locked(&snapshot)?;
        Ok(snapshot)
    }

    pub fn config_path(&self) -> PathBuf {
        self.config_dir.clone()
    }

    pub fn state_path(&self) -> PathBuf {
        self.state_dir.clone()
    }

    /// Local state (favorites, sort mode) living next to the settings file.
    pub fn local_state(&self) -> FileStore {
        FileStore::new(self.state_path())
    }

    fn persist_locked(&self, settings: &AppSettings) -> Result<()> {
        let path = self.config_path().join(SETTINGS_FILE);
        let data = serde_json::to_vec_pretty(settings)?;
        fs::write(&path, data).with_context(|| format!("failed to write settings to {path:?}"))?;
        Ok(())
    }
}

#[derive(Clone, Debug, Deserialize, Serialize)]
pub struct AppSettings {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub catalog_endpoint: Option<String>,
    #[serde(default = "default_fallback_image")]
    pub fallback_image: String,
    #[serde(default = "default_fallback_link")]
    pub fallback_link: String,
    #[serde(default = "default_fetch_attempts")]
    pub fetch_attempts: u32,
    #[serde(default = "default_retry_backoff_ms")]
    pub retry_backoff_ms: u64,
    #[serde(default = "default_probe_timeout_secs")]
    pub probe_timeout_secs: u64,
    #[serde(default = "default_hide_delay_ms")]
    pub preloader_hide_delay_ms: u64,
    #[serde(default)]
    pub page_warmup: bool,
    #[serde(default)]
    pub empty_catalog_is_error: bool,
}

impl AppSettings {
    /// Endpoint after applying the `GALLERY_CATALOG_URL` override.
    pub fn resolved_catalog_endpoint(&self) -> String {
        env_flags::catalog_url_override()
            .or_else(|| {
                self.catalog_endpoint
                    .as_deref()
                    .map(str::trim)
                    .filter(|url| !url.is_empty())
                    .map(str::to_string)
            })
            .unwrap_or_else(|| DEFAULT_CATALOG_URL.to_string())
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_millis(self.retry_backoff_ms)
    }

    pub fn probe_timeout(&self) -> Duration {
        Duration::from_secs(self.probe_timeout_secs.max(1))
    }

    pub fn hide_delay(&self) -> Duration {
        Duration::from_millis(self.preloader_hide_delay_ms)
    }

    pub fn page_warmup_enabled(&self) -> bool {
        env_flags::page_warmup().unwrap_or(self.page_warmup)
    }

    pub fn empty_is_error(&self) -> bool {
        env_flags::empty_catalog_is_error().unwrap_or(self.empty_catalog_is_error)
    }
}

impl Default for AppSettings {
    fn default() -> Self {
        Self {
            catalog_endpoint: Some(DEFAULT_CATALOG_URL.to_string()),
            fallback_image: default_fallback_image(),
            fallback_link: default_fallback_link(),
            fetch_attempts: default_fetch_attempts(),
            retry_backoff_ms: default_retry_backoff_ms(),
            probe_timeout_secs: default_probe_timeout_secs(),
            preloader_hide_delay_ms: default_hide_delay_ms(),
            page_warmup: false,
            empty_catalog_is_error: false,
        }
    }
}

fn default_fallback_image() -> String {
    DEFAULT_FALLBACK_IMAGE.to_string()
}

fn default_fallback_link() -> String {
    DEFAULT_FALLBACK_LINK.to_string()
}

fn default_fetch_attempts() -> u32 {
    2
}

fn default_retry_backoff_ms() -> u64 {
    2_000
}

fn default_probe_timeout_secs() -> u64 {
    8
}

fn default_hide_delay_ms() -> u64 {
    400
}

/// Minimal string key/value persistence, the shape of browser local storage.
pub trait KeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> Option<String>;
    fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// One file per key inside a state directory.
#[derive(Debug)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: PathBuf) -> Self {
        Self { dir }
    }

    fn path_for(&self, key: &str) -> PathBuf {
        let file: String = key
            .chars()
            .map(|c| if c.is_ascii_alphanumeric() || c == '-' || c == '_' { c } else { '_' })
            .collect();
        self.dir.join(format!("{file}.json"))
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Option<String> {
        let path = self.path_for(key);
        match fs::read_to_string(&path) {
            Ok(contents) => Some(contents),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                warn!("Failed to read local state {:?}: {err}", path);
                None
            }
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let path = self.path_for(key);
        fs::create_dir_all(&self.dir)
            .with_context(|| format!("failed to create state directory {:?}", self.dir))?;
        fs::write(&path, value).with_context(|| format!("failed to write local state {path:?}"))?;
        Ok(())
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: RwLock<HashMap<String, String>>,
}

impl KeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> Option<String> {
        self.entries
            .read()
            .expect("memory store poisoned")
            .get(key)
            .cloned()
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        self.entries
            .write()
            .expect("memory store poisoned for write")
            .insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Accessor for the persisted sort mode. Reads hit the store every time so
/// changes made elsewhere are picked up on the next render.
#[derive(Clone)]
pub struct SortModeSetting {
    store: Arc<dyn KeyValueStore>,
}

impl SortModeSetting {
    pub fn new(store: Arc<dyn KeyValueStore>) -> Self {
        Self { store }
    }

    pub fn current(&self) -> SortMode {
        self.store
            .get(SORT_MODE_KEY)
            .and_then(|raw| {
                serde_json::from_str::<SortMode>(&raw)
                    .ok()
                    .or_else(|| SortMode::from_token(&raw))
            })
            .unwrap_or_default()
    }

    /// Writes the bare token, e.g. `alphabetical`.
    pub fn store(&self, mode: SortMode) -> Result<()> {
        self.store
            .set(SORT_MODE_KEY, mode.token())
            .context("failed to persist sort mode")
    }
}

impl std::fmt::Debug for SortModeSetting {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SortModeSetting")
            .field("current", &self.current())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn settings_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let store = ConfigStore::at(dir.path()).unwrap();
        store
            .update_settings(|settings| settings.retry_backoff_ms = 25)
            .unwrap();

        let reopened = ConfigStore::at(dir.path()).unwrap();
        assert_eq!(reopened.settings().retry_backoff_ms, 25);
        assert_eq!(reopened.settings().fetch_attempts, 2);
    }

    #[test]
    fn partial_settings_file_gets_defaults() {
        let dir = tempfile::tempdir().unwrap();
        fs::create_dir_all(dir.path().join("config")).unwrap();
        fs::write(
            dir.path().join("config").join(SETTINGS_FILE),
            br#"{"fallback_link": "https://example.test"}"#,
        )
        .unwrap();

        let settings = ConfigStore::at(dir.path()).unwrap().settings();
        assert_eq!(settings.fallback_link, "https://example.test");
        assert_eq!(settings.fallback_image, DEFAULT_FALLBACK_IMAGE);
        assert_eq!(settings.preloader_hide_delay_ms, 400);
    }

    #[test]
    fn file_store_keeps_keys_apart() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path().to_path_buf());
        assert_eq!(store.get("favorites"), None);
        store.set("favorites", "[\"a\"]").unwrap();
        store.set("sortMode", "alphabetical").unwrap();
        assert_eq!(store.get("favorites").as_deref(), Some("[\"a\"]"));
        assert_eq!(store.get("sortMode").as_deref(), Some("alphabetical"));
    }

    #[test]
    fn sort_mode_round_trips_and_tolerates_raw_tokens() {
        let store = Arc::new(MemoryStore::default());
        let setting = SortModeSetting::new(store.clone());
        assert_eq!(setting.current(), SortMode::Sheet);

        setting.store(SortMode::Alphabetical).unwrap();
        assert_eq!(store.get(SORT_MODE_KEY).as_deref(), Some("alphabetical"));
        assert_eq!(setting.current(), SortMode::Alphabetical);

        store.set(SORT_MODE_KEY, "\"alphabetical\"").unwrap();
        assert_eq!(setting.current(), SortMode::Alphabetical);

        store.set(SORT_MODE_KEY, "sheet").unwrap();
        assert_eq!(setting.current(), SortMode::Sheet);

        store.set(SORT_MODE_KEY, "garbage").unwrap();
        assert_eq!(setting.current(), SortMode::Sheet);
    }
}
