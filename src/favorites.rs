use crate::{config::KeyValueStore, model::normalize_title};
use anyhow::{Context, Result};
use log::warn;
use std::{
    collections::BTreeSet,
    sync::{Arc, Mutex},
};

pub const FAVORITES_KEY: &str = "favorites";

/// Favorited titles, lowercased. Every toggle is persisted before the lock
/// is released, and the set only changes once the write has succeeded.
pub struct Favorites {
    store: Arc<dyn KeyValueStore>,
    titles: Mutex<BTreeSet<String>>,
}

impl Favorites {
    /// Loads the persisted list; unreadable data starts an empty set.
    pub fn load(store: Arc<dyn KeyValueStore>) -> Self {
        let titles = store
            .get(FAVORITES_KEY)
            .map(|raw| match serde_json::from_str::<Vec<serde_json::Value>>(&raw) {
                Ok(values) => values
                    .iter()
                    .map(|value| match value {
                        serde_json::Value::String(text) => normalize_title(text),
                        other => normalize_title(&other.to_string()),
                    })
                    .filter(|title| !title.is_empty())
                    .collect(),
                Err(err) => {
                    warn!("Ignoring unreadable favorites list: {err}");
                    BTreeSet::new()
                }
            })
            .unwrap_or_default();

        Self {
            store,
            titles: Mutex::new(titles),
        }
    }

    pub fn contains(&self, title: &str) -> bool {
        self.titles
            .lock()
            .expect("favorites poisoned")
            .contains(&normalize_title(title))
    }

    pub fn snapshot(&self) -> BTreeSet<String> {
        self.titles.lock().expect("favorites poisoned").clone()
    }

    pub fn len(&self) -> usize {
        self.titles.lock().expect("favorites poisoned").len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Removes the title if present, adds it otherwise, then persists the
    /// whole set. Returns whether the title is now a favorite.
    pub fn toggle(&self, title: &str) -> Result<bool> {
        let key = normalize_title(title);
        let mut titles = self.titles.lock().expect("favorites poisoned");
        let mut next = titles.clone();
        let now_favorite = if next.remove(&key) {
            false
        } else {
            next.insert(key);
            true
        };

        let data = serde_json::to_string(&next)?;
        self.store
            .set(FAVORITES_KEY, &data)
            .context("failed to persist favorites")?;
        *titles = next;
        Ok(now_favorite)
    }
}

impl std::fmt::Debug for Favorites {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Favorites")
            .field("titles", &self.snapshot())
            .finish()
    }
}
