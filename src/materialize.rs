use crate::{
    favorites::Favorites,
    model::{
        natural_cmp, normalize_title, status_decorations, AssetCard, AssetRecord, ImageSlot,
        SortMode,
    },
    probe::ImageProber,
    surface::RenderSurface,
};
use anyhow::Result;
use log::debug;
use std::sync::Arc;
use tokio::{runtime::Handle, task::JoinHandle};

/// Output of one render pass.
#[derive(Debug)]
pub struct Materialized {
    pub cards: Vec<AssetCard>,
    pub probes: Vec<JoinHandle<()>>,
    pub generation: u64,
}

pub struct CardMaterializer {
    runtime: Handle,
    prober: Arc<dyn ImageProber>,
    surface: Arc<dyn RenderSurface>,
    fallback_image: String,
    fallback_link: String,
}

impl CardMaterializer {
    pub fn new(
        runtime: Handle,
        prober: Arc<dyn ImageProber>,
        surface: Arc<dyn RenderSurface>,
        fallback_image: impl Into<String>,
        fallback_link: impl Into<String>,
    ) -> Self {
        Self {
            runtime,
            prober,
            surface,
            fallback_image: fallback_image.into(),
            fallback_link: fallback_link.into(),
        }
    }

    /// Sorts, builds one card per record, replaces the surface and launches
    /// one image probe per card.
    pub fn materialize(
        &self,
        records: &[AssetRecord],
        sort_mode: SortMode,
        favorites: &Favorites,
    ) -> Materialized {
        let cards: Vec<AssetCard> = sort_records(records, sort_mode)
            .into_iter()
            .map(|record| self.card_for(record, favorites))
            .collect();

        let generation = self.surface.replace_all(&cards);
        let probes = cards
            .iter()
            .enumerate()
            .map(|(index, card)| self.spawn_probe(generation, index, card))
            .collect();
        debug!(
            "Materialized {} cards ({sort_mode}) as generation {generation}",
            cards.len()
        );

        Materialized {
            cards,
            probes,
            generation,
        }
    }

    /// Flips one favorite, persists, and refreshes only that indicator.
    pub fn toggle_favorite(&self, favorites: &Favorites, title: &str) -> Result<bool> {
        let favorite = favorites.toggle(title)?;
        self.surface.set_favorite(&normalize_title(title), favorite);
        Ok(favorite)
    }

    fn card_for(&self, record: &AssetRecord, favorites: &Favorites) -> AssetCard {
        let (badges, markers) = status_decorations(&record.status);
        let link = if record.link.is_empty() {
            self.fallback_link.clone()
        } else {
            record.link.clone()
        };

        AssetCard {
            title: record.title.clone(),
            key: record.normalized_title(),
            author: record.author.clone(),
            image_candidate: record.image.clone(),
            image: ImageSlot::default(),
            link,
            page: record.page,
            status: record.status.to_lowercase(),
            badges,
            markers,
            favorite: favorites.contains(&record.title),
        }
    }

    fn spawn_probe(&self, generation: u64, index: usize, card: &AssetCard) -> JoinHandle<()> {
        let prober = self.prober.clone();
        let surface = self.surface.clone();
        let slot = card.image.clone();
        let candidate = card.image_candidate.clone();
        let fallback = self.fallback_image.clone();

        self.runtime.spawn(async move {
            let resolved = prober.probe(&candidate, &fallback).await;
            surface.set_image(generation, index, &resolved);
            slot.resolve(resolved);
        })
    }
}

/// Stable ordering of records for the given mode.
pub fn sort_records(records: &[AssetRecord], sort_mode: SortMode) -> Vec<&AssetRecord> {
    let mut ordered: Vec<&AssetRecord> = records.iter().collect();
    if sort_mode == SortMode::Alphabetical {
        let mut keyed: Vec<(String, &AssetRecord)> = ordered
            .into_iter()
            .map(|record| (record.normalized_title(), record))
            .collect();
        keyed.sort_by(|(left, _), (right, _)| natural_cmp(left, right));
        ordered = keyed.into_iter().map(|(_, record)| record).collect();
    }
    ordered
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;
    use crate::{config::MemoryStore, surface::MemorySurface};
    use futures::{future::BoxFuture, FutureExt};
    use serde_json::json;

    pub(crate) const FALLBACK: &str = "fallback.png";

    /// Resolves URLs containing "ok" to themselves, everything else to the
    /// fallback, after an optional per-URL delay in milliseconds.
    #[derive(Default)]
    pub(crate) struct FakeProber {
        pub delays: std::collections::HashMap<String, u64>,
    }

    impl ImageProber for FakeProber {
        fn probe<'a>(&'a self, candidate: &'a str, fallback: &'a str) -> BoxFuture<'a, String> {
            async move {
                if let Some(ms) = self.delays.get(candidate) {
                    tokio::time::sleep(std::time::Duration::from_millis(*ms)).await;
                }
                if candidate.contains("ok") {
                    candidate.to_string()
                } else {
                    fallback.to_string()
                }
            }
            .boxed()
        }
    }

    pub(crate) fn records(rows: serde_json::Value) -> Vec<AssetRecord> {
        crate::catalog::parse_catalog(rows.to_string().as_bytes()).unwrap()
    }

    fn materializer(surface: Arc<MemorySurface>) -> CardMaterializer {
        CardMaterializer::new(
            Handle::current(),
            Arc::new(FakeProber::default()),
            surface,
            FALLBACK,
            "#",
        )
    }

    fn favorites() -> Favorites {
        Favorites::load(Arc::new(MemoryStore::default()))
    }

    #[test]
    fn alphabetical_sort_is_stable_and_natural() {
        let rows = records(json!([
            {"title": "Item 10", "author": "a"},
            {"title": "item 2", "author": "b"},
            {"title": "ITEM 2", "author": "c"},
            {"title": " item 2 ", "author": "d"},
        ]));
        let authors: Vec<&str> = sort_records(&rows, SortMode::Alphabetical)
            .iter()
            .map(|record| record.author.as_str())
            .collect();
        assert_eq!(authors, vec!["b", "c", "d", "a"]);

        let sheet: Vec<&str> = sort_records(&rows, SortMode::Sheet)
            .iter()
            .map(|record| record.author.as_str())
            .collect();
        assert_eq!(sheet, vec!["a", "b", "c", "d"]);
    }

    #[tokio::test]
    async fn one_card_and_one_probe_per_record() {
        let surface = Arc::new(MemorySurface::default());
        let rows = records(json!([
            {"title": "a", "image": "ok-a"},
            {"title": "", "image": "", "link": ""},
            {"title": "b"},
            {"link": "https://x.test"},
        ]));
        let materialized =
            materializer(surface.clone()).materialize(&rows, SortMode::Sheet, &favorites());
        assert_eq!(materialized.cards.len(), 3);
        assert_eq!(materialized.probes.len(), 3);
        assert_eq!(surface.snapshot().len(), 3);
    }

    #[tokio::test]
    async fn probes_resolve_images_with_fallback() {
        let surface = Arc::new(MemorySurface::default());
        let rows = records(json!([
            {"title": "Zed", "image": "bad-url"},
            {"title": "alpha", "image": "ok-url"},
        ]));
        let materialized =
            materializer(surface.clone()).materialize(&rows, SortMode::Alphabetical, &favorites());
        let titles: Vec<&str> = materialized.cards.iter().map(|c| c.title.as_str()).collect();
        assert_eq!(titles, vec!["alpha", "Zed"]);

        for probe in materialized.probes {
            probe.await.unwrap();
        }
        assert_eq!(materialized.cards[0].image.resolved(), Some("ok-url"));
        assert_eq!(materialized.cards[1].image.resolved(), Some(FALLBACK));

        let rendered = surface.snapshot();
        assert_eq!(rendered[0].image.as_deref(), Some("ok-url"));
        assert_eq!(rendered[1].image.as_deref(), Some(FALLBACK));
    }

    #[tokio::test]
    async fn cards_carry_badges_links_and_favorites() {
        let surface = Arc::new(MemorySurface::default());
        let favorites = favorites();
        favorites.toggle("Starred").unwrap();
        let rows = records(json!([
            {"title": "Starred", "status": "Featured New", "page": "2", "link": "https://s.test"},
            {"title": "Later", "type": "soon"},
        ]));
        let materialized = materializer(surface).materialize(&rows, SortMode::Sheet, &favorites);

        let starred = &materialized.cards[0];
        assert!(starred.favorite);
        assert_eq!(starred.page, 2);
        assert_eq!(starred.status, "featured new");
        assert_eq!(starred.link, "https://s.test");
        assert_eq!(starred.badges.len(), 2);

        let later = &materialized.cards[1];
        assert!(!later.favorite);
        assert!(later.is_disabled());
        assert_eq!(later.link, "#");
    }

    #[tokio::test]
    async fn toggle_updates_only_the_indicator() {
        let surface = Arc::new(MemorySurface::default());
        let favorites = favorites();
        let materializer = materializer(surface.clone());
        let rows = records(json!([{"title": "One"}, {"title": "Two"}]));
        let materialized = materializer.materialize(&rows, SortMode::Sheet, &favorites);
        let generation = surface.generation();

        assert!(materializer.toggle_favorite(&favorites, "two").unwrap());
        let rendered = surface.snapshot();
        assert!(!rendered[0].favorite);
        assert!(rendered[1].favorite);
        assert_eq!(surface.generation(), generation);
        assert!(!materialized.cards[1].favorite);
        assert!(favorites.contains("Two"));
    }

    #[tokio::test]
    async fn stale_probes_do_not_touch_a_newer_grid() {
        let surface = Arc::new(MemorySurface::default());
        let mut prober = FakeProber::default();
        prober.delays.insert("ok-slow".into(), 30);
        let materializer = CardMaterializer::new(
            Handle::current(),
            Arc::new(prober),
            surface.clone(),
            FALLBACK,
            "#",
        );

        let first = materializer.materialize(
            &records(json!([{"title": "slow", "image": "ok-slow"}])),
            SortMode::Sheet,
            &favorites(),
        );
        let second = materializer.materialize(
            &records(json!([{"title": "other", "image": ""}])),
            SortMode::Sheet,
            &favorites(),
        );
        for probe in first.probes.into_iter().chain(second.probes) {
            probe.await.unwrap();
        }

        let rendered = surface.snapshot();
        assert_eq!(rendered.len(), 1);
        assert_eq!(rendered[0].title, "other");
        assert_eq!(rendered[0].image.as_deref(), Some(FALLBACK));
    }
}
