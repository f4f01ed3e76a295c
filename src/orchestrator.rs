use crate::{
    catalog::{CatalogError, CatalogSource},
    collaborators::Collaborators,
    config::SortModeSetting,
    favorites::Favorites,
    materialize::{CardMaterializer, Materialized},
    model::{AssetRecord, SortMode},
    progress::{LoadingIndicator, ProgressAggregator},
};
use anyhow::Result;
use log::{debug, info, warn};
use std::{
    sync::{Arc, Mutex},
    time::Duration,
};

const WARMUP_FORWARD_STEPS: usize = 8;
const WARMUP_FORWARD_DELAY: Duration = Duration::from_millis(300);
const WARMUP_BACKWARD_STEPS: usize = 8;
const WARMUP_BACKWARD_DELAY: Duration = Duration::from_millis(200);

type SortListener = Arc<dyn Fn(SortMode) + Send + Sync>;
type RecordPredicate = Arc<dyn Fn(&AssetRecord, &Favorites) -> bool + Send + Sync>;

#[derive(Clone, Copy, Debug, Eq, PartialEq)]
pub enum LoadState {
    Idle,
    Fetching,
    Filtering,
    Materializing,
    AwaitingImages,
    Ready,
    Error,
    Failed,
}

/// Which records the invoking page shows.
#[derive(Clone, Default)]
pub enum PageFilter {
    #[default]
    All,
    Favorites,
    Custom(RecordPredicate),
}

impl PageFilter {
    pub fn custom(
        predicate: impl Fn(&AssetRecord, &Favorites) -> bool + Send + Sync + 'static,
    ) -> Self {
        PageFilter::Custom(Arc::new(predicate))
    }

    fn keep(&self, record: &AssetRecord, favorites: &Favorites) -> bool {
        match self {
            PageFilter::All => true,
            PageFilter::Favorites => favorites.contains(&record.title),
            PageFilter::Custom(predicate) => predicate(record, favorites),
        }
    }
}

impl std::fmt::Debug for PageFilter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            PageFilter::All => f.write_str("All"),
            PageFilter::Favorites => f.write_str("Favorites"),
            PageFilter::Custom(_) => f.write_str("Custom"),
        }
    }
}

#[derive(Clone, Copy, Debug)]
pub struct RetryPolicy {
    pub attempts: u32,
    pub backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            attempts: 2,
            backoff: Duration::from_secs(2),
        }
    }
}

#[derive(Debug)]
pub enum FetchOutcome {
    Fetched {
        records: Vec<AssetRecord>,
        attempts: u32,
    },
    Exhausted {
        attempts: u32,
        error: CatalogError,
    },
}

#[derive(Clone, Debug, Eq, PartialEq)]
pub enum LoadOutcome {
    Ready { cards: usize },
    Failed { message: String },
}

/// Everything the pipeline shares with the rest of the UI.
#[derive(Clone)]
pub struct PipelineContext {
    pub favorites: Arc<Favorites>,
    pub sort_mode: SortModeSetting,
    pub collaborators: Collaborators,
    pub indicator: Arc<dyn LoadingIndicator>,
}

pub struct LoadOrchestrator {
    source: Arc<dyn CatalogSource>,
    materializer: CardMaterializer,
    progress: ProgressAggregator,
    context: PipelineContext,
    filter: PageFilter,
    retry: RetryPolicy,
    hide_delay: Duration,
    page_warmup: bool,
    state: Mutex<Vec<LoadState>>,
    records: Mutex<Option<Arc<Vec<AssetRecord>>>>,
    sort_listeners: Mutex<Vec<SortListener>>,
}

impl LoadOrchestrator {
    pub fn new(
        source: Arc<dyn CatalogSource>,
        materializer: CardMaterializer,
        context: PipelineContext,
    ) -> Self {
        let missing = context.collaborators.missing();
        if !missing.is_empty() {
            debug!("Collaborators not provided: {}", missing.join(", "));
        }

        Self {
            source,
            materializer,
            progress: ProgressAggregator::new(context.indicator.clone()),
            context,
            filter: PageFilter::All,
            retry: RetryPolicy::default(),
            hide_delay: Duration::ZERO,
            page_warmup: false,
            state: Mutex::new(vec![LoadState::Idle]),
            records: Mutex::new(None),
            sort_listeners: Mutex::new(Vec::new()),
        }
    }

    pub fn with_filter(mut self, filter: PageFilter) -> Self {
        self.filter = filter;
        self
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_hide_delay(mut self, delay: Duration) -> Self {
        self.hide_delay = delay;
        self
    }

    pub fn with_page_warmup(mut self, enabled: bool) -> Self {
        self.page_warmup = enabled;
        self
    }

    pub fn context(&self) -> &PipelineContext {
        &self.context
    }

    pub fn progress(&self) -> &ProgressAggregator {
        &self.progress
    }

    pub fn state(&self) -> LoadState {
        self.state
            .lock()
            .expect("state poisoned")
            .last()
            .copied()
            .unwrap_or(LoadState::Idle)
    }

    /// States entered during the latest load or refresh, oldest first.
    pub fn history(&self) -> Vec<LoadState> {
        self.state.lock().expect("state poisoned").clone()
    }

    pub fn sort_mode(&self) -> SortMode {
        self.context.sort_mode.current()
    }

    /// Runs the one-time startup hooks around the first load.
    pub async fn bootstrap(&self) -> LoadOutcome {
        let collaborators = &self.context.collaborators;
        collaborators.init_paging();
        collaborators.init_placeholders();
        collaborators.init_update_popup().await;
        let outcome = self.load().await;
        collaborators.init_quotes().await;
        outcome
    }

    /// One full load cycle: fetch, filter, materialize, wait for every image
    /// probe, then hand off to the pager.
    pub async fn load(&self) -> LoadOutcome {
        self.begin_cycle();
        self.progress.reset();
        let records = match self.fetch_with_retry().await {
            FetchOutcome::Fetched { records, attempts } => {
                info!("Catalog loaded after {attempts} attempt(s)");
                records
            }
            FetchOutcome::Exhausted { attempts, error } => {
                return self.fail(attempts, &error);
            }
        };

        let records = Arc::new(records);
        *self.records.lock().expect("records poisoned") = Some(records.clone());

        let materialized = self.render(&records);
        let cards = materialized.cards.len();

        self.enter(LoadState::AwaitingImages);
        self.progress.start(materialized.probes.len());
        if materialized.probes.is_empty() {
            self.progress.complete();
        }
        if self.page_warmup {
            self.spawn_page_warmup();
        }
        for probe in materialized.probes {
            if let Err(err) = probe.await {
                debug!("Image probe task ended abnormally: {err}");
            }
            self.progress.tick();
        }

        self.enter(LoadState::Ready);
        self.context.collaborators.render_page();
        if !self.hide_delay.is_zero() {
            tokio::time::sleep(self.hide_delay).await;
        }
        self.progress.finish();
        self.context.collaborators.go_to_page(1);
        info!("Gallery ready with {cards} cards");
        LoadOutcome::Ready { cards }
    }

    /// Fetches with the configured number of attempts. `Empty` is never
    /// retried.
    pub async fn fetch_with_retry(&self) -> FetchOutcome {
        let attempts = self.retry.attempts.max(1);
        let mut attempt = 1;
        loop {
            self.enter(LoadState::Fetching);
            match self.source.fetch_catalog().await {
                Ok(records) => {
                    return FetchOutcome::Fetched {
                        records,
                        attempts: attempt,
                    }
                }
                Err(error) if attempt >= attempts || !error.is_network() => {
                    return FetchOutcome::Exhausted {
                        attempts: attempt,
                        error,
                    }
                }
                Err(error) => {
                    self.enter(LoadState::Error);
                    warn!(
                        "Catalog fetch attempt {attempt}/{attempts} failed: {error}; retrying in {:?}",
                        self.retry.backoff
                    );
                    tokio::time::sleep(self.retry.backoff).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Re-renders the cached catalog without fetching and without touching
    /// the loading indicator. `None` until a load has succeeded or while a
    /// cycle is in flight.
    pub fn refresh(&self) -> Option<Materialized> {
        if !matches!(self.state(), LoadState::Ready | LoadState::Failed) {
            return None;
        }
        let records = self.records.lock().expect("records poisoned").clone()?;
        self.begin_cycle();
        let materialized = self.render(&records);
        self.enter(LoadState::Ready);
        self.context.collaborators.render_page();
        Some(materialized)
    }

    pub fn on_sort_mode_changed(&self, handler: impl Fn(SortMode) + Send + Sync + 'static) {
        self.sort_listeners
            .lock()
            .expect("listeners poisoned")
            .push(Arc::new(handler));
    }

    /// Persists the new mode, notifies subscribers and silently re-renders.
    pub fn change_sort_mode(&self, mode: SortMode) -> Result<Option<Materialized>> {
        self.context.sort_mode.store(mode)?;
        let listeners = self.sort_listeners.lock().expect("listeners poisoned").clone();
        for listener in listeners {
            listener(mode);
        }
        Ok(self.refresh())
    }

    pub fn toggle_favorite(&self, title: &str) -> Result<bool> {
        self.materializer
            .toggle_favorite(&self.context.favorites, title)
    }

    fn render(&self, records: &[AssetRecord]) -> Materialized {
        self.enter(LoadState::Filtering);
        let favorites = &self.context.favorites;
        let filtered: Vec<AssetRecord> = records
            .iter()
            .filter(|record| self.filter.keep(record, favorites))
            .cloned()
            .collect();
        debug!(
            "{:?} filter kept {} of {} records",
            self.filter,
            filtered.len(),
            records.len()
        );

        self.enter(LoadState::Materializing);
        self.materializer
            .materialize(&filtered, self.sort_mode(), favorites)
    }

    fn fail(&self, attempts: u32, error: &CatalogError) -> LoadOutcome {
        self.enter(LoadState::Failed);
        warn!("Giving up on catalog after {attempts} attempt(s): {error}");
        let message = format!("Failed to load assets: {error}");
        self.context.indicator.failure(&message);
        self.progress.finish();
        self.context.collaborators.go_to_page(1);
        LoadOutcome::Failed { message }
    }

    fn begin_cycle(&self) {
        self.state.lock().expect("state poisoned").clear();
    }

    fn enter(&self, state: LoadState) {
        debug!("Load state -> {state:?}");
        self.state.lock().expect("state poisoned").push(state);
    }

    fn spawn_page_warmup(&self) {
        let collaborators = self.context.collaborators.clone();
        if !collaborators.can_cycle_pages() {
            debug!("Page warm-up skipped; pager cannot step");
            return;
        }
        tokio::spawn(async move {
            for _ in 0..WARMUP_FORWARD_STEPS {
                collaborators.next_page();
                tokio::time::sleep(WARMUP_FORWARD_DELAY).await;
            }
            for _ in 0..WARMUP_BACKWARD_STEPS {
                collaborators.prev_page();
                tokio::time::sleep(WARMUP_BACKWARD_DELAY).await;
            }
        });
    }
}
