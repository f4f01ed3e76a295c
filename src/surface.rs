use crate::model::{AssetCard, CardMarker, StatusBadge};
use std::sync::{
    atomic::{AtomicU64, Ordering},
    Mutex,
};

/// Where materialized cards end up. `replace_all` swaps the whole grid and
/// returns a generation; writes carrying an older generation are ignored.
pub trait RenderSurface: Send + Sync {
    fn replace_all(&self, cards: &[AssetCard]) -> u64;
    fn set_image(&self, generation: u64, index: usize, url: &str);
    fn set_favorite(&self, key: &str, favorite: bool);
}

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RenderedCard {
    pub title: String,
    pub key: String,
    pub author: String,
    pub image: Option<String>,
    pub link: String,
    pub page: u32,
    pub badges: Vec<StatusBadge>,
    pub markers: Vec<CardMarker>,
    pub favorite: bool,
}

impl RenderedCard {
    fn from_card(card: &AssetCard) -> Self {
        Self {
            title: card.title.clone(),
            key: card.key.clone(),
            author: card.author.clone(),
            image: card.image.resolved().map(str::to_string),
            link: card.link.clone(),
            page: card.page,
            badges: card.badges.clone(),
            markers: card.markers.clone(),
            favorite: card.favorite,
        }
    }
}

/// In-process grid, read back by pagers and tests.
#[derive(Debug, Default)]
pub struct MemorySurface {
    generation: AtomicU64,
    cards: Mutex<Vec<RenderedCard>>,
}

impl MemorySurface {
    pub fn snapshot(&self) -> Vec<RenderedCard> {
        self.cards.lock().expect("surface poisoned").clone()
    }

    pub fn generation(&self) -> u64 {
        self.generation.load(Ordering::SeqCst)
    }

    pub fn page_count(&self) -> u32 {
        self.cards
            .lock()
            .expect("surface poisoned")
            .iter()
            .map(|card| card.page)
            .max()
            .unwrap_or(1)
    }
}

impl RenderSurface for MemorySurface {
    fn replace_all(&self, cards: &[AssetCard]) -> u64 {
        let rendered: Vec<RenderedCard> = cards.iter().map(RenderedCard::from_card).collect();
        let mut guard = self.cards.lock().expect("surface poisoned");
        *guard = rendered;
        self.generation.fetch_add(1, Ordering::SeqCst) + 1
    }

    fn set_image(&self, generation: u64, index: usize, url: &str) {
        let mut guard = self.cards.lock().expect("surface poisoned");
        if generation != self.generation.load(Ordering::SeqCst) {
            return;
        }
        if let Some(card) = guard.get_mut(index) {
            card.image = Some(url.to_string());
        }
    }

    fn set_favorite(&self, key: &str, favorite: bool) {
        let mut guard = self.cards.lock().expect("surface poisoned");
        for card in guard.iter_mut().filter(|card| card.key == key) {
            card.favorite = favorite;
        }
    }
}
