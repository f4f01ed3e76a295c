use crate::{
    catalog::HttpCatalog,
    config::{ConfigStore, KeyValueStore, SortModeSetting},
    favorites::Favorites,
    materialize::CardMaterializer,
    model::SortMode,
    orchestrator::{LoadOrchestrator, LoadOutcome, PageFilter, PipelineContext, RetryPolicy},
    probe::HttpImageProber,
    surface::MemorySurface,
    terminal::{TerminalIndicator, TerminalPager},
};
use anyhow::{anyhow, Context, Result};
use reqwest::Client;
use std::sync::Arc;
use tokio::runtime::{Builder, Runtime};

pub const APP_ID: &str = "dev.assetgallery.AssetGallery";

pub struct GalleryApp {
    runtime: Arc<Runtime>,
    pager: Arc<TerminalPager>,
    orchestrator: LoadOrchestrator,
}

impl GalleryApp {
    pub fn new(filter: PageFilter) -> Result<Self> {
        let runtime = Arc::new(
            Builder::new_multi_thread()
                .enable_all()
                .build()
                .map_err(|err| anyhow!("failed to create Tokio runtime: {err}"))?,
        );

        let config = ConfigStore::new()?;
        let settings = config.settings();
        let local_state: Arc<dyn KeyValueStore> = Arc::new(config.local_state());
        let client = make_http_client()?;

        let catalog = HttpCatalog::new(client.clone(), settings.resolved_catalog_endpoint())
            .empty_is_error(settings.empty_is_error());
        let prober = HttpImageProber::new(client, settings.probe_timeout());

        let surface = Arc::new(MemorySurface::default());
        let pager = Arc::new(TerminalPager::new(surface.clone()));
        let materializer = CardMaterializer::new(
            runtime.handle().clone(),
            Arc::new(prober),
            surface,
            settings.fallback_image.clone(),
            settings.fallback_link.clone(),
        );

        let context = PipelineContext {
            favorites: Arc::new(Favorites::load(local_state.clone())),
            sort_mode: SortModeSetting::new(local_state),
            collaborators: pager.collaborators(),
            indicator: Arc::new(TerminalIndicator::new()),
        };

        let orchestrator = LoadOrchestrator::new(Arc::new(catalog), materializer, context)
            .with_filter(filter)
            .with_retry(RetryPolicy {
                attempts: settings.fetch_attempts,
                backoff: settings.retry_backoff(),
            })
            .with_hide_delay(settings.hide_delay())
            .with_page_warmup(settings.page_warmup_enabled());

        Ok(Self {
            runtime,
            pager,
            orchestrator,
        })
    }

    /// Applies `sort` up front so the first load already renders in that
    /// order, runs the startup hooks plus the load, then jumps to `page`.
    pub fn show(&self, page: u32, sort: Option<SortMode>) -> Result<LoadOutcome> {
        if let Some(mode) = sort.filter(|mode| *mode != self.orchestrator.sort_mode()) {
            self.orchestrator
                .change_sort_mode(mode)
                .context("failed to apply sort mode")?;
        }

        let outcome = self.runtime.block_on(self.orchestrator.bootstrap());
        if let LoadOutcome::Failed { message } = &outcome {
            return Err(anyhow!("{message}"));
        }

        if self.pager.set_page(page) {
            self.pager.print();
        }
        Ok(outcome)
    }

    pub fn toggle_favorite(&self, title: &str) -> Result<bool> {
        self.orchestrator.toggle_favorite(title)
    }

    pub fn set_sort_mode(&self, mode: SortMode) -> Result<()> {
        self.orchestrator.change_sort_mode(mode)?;
        Ok(())
    }

    pub fn favorites(&self) -> Vec<String> {
        self.orchestrator
            .context()
            .favorites
            .snapshot()
            .into_iter()
            .collect()
    }
}

fn make_http_client() -> Result<Client> {
    Client::builder()
        .user_agent(format!(
            "AssetGallery/{} ({})",
            env!("CARGO_PKG_VERSION"),
            env!("CARGO_PKG_NAME")
        ))
        .tcp_nodelay(true)
        .pool_max_idle_per_host(8)
        .build()
        .context("failed to construct HTTP client")
}
