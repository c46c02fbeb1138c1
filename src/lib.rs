mod config;
mod db;
pub mod cache;
pub mod filter;
pub mod geo;
pub mod geolocate;
pub mod models;
pub mod paging;
pub mod query;
pub mod sequence;
pub mod service;
mod utils;

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use tracing::{debug, info, warn};
use tracing_subscriber::EnvFilter;

pub use cache::{CacheError, KeyValueStore, MemoryStore, Rating, RatingBook, TtlCache};
pub use config::{AppConfig, ConfigError, ConfigStore};
pub use db::Store;
pub use filter::{FilterCriteria, OverrideFilter, Pipeline, PipelineOptions, RouteCorridor, TimeWindow};
pub use geo::{Coordinate, Gazetteer, NamedPlace};
pub use geolocate::{Position, PositionSource};
pub use models::{Event, TaxonomyEntry};
pub use paging::{JumpOutcome, Pager, ScrollIntent};
pub use sequence::{RequestSequencer, Ticket};
pub use service::{DataService, EventQuery, RestDataService, ServiceError};

const FETCH_BATCH: usize = 100;

/// Installs a `tracing` subscriber honoring `RUST_LOG`. Safe to call twice.
pub fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let _ = tracing_subscriber::fmt().with_env_filter(filter).try_init();
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RefreshOutcome {
    Updated { fetched: usize, shown: usize },
    /// A newer refresh was issued while this one was in flight.
    Superseded,
}

#[derive(Debug, Default)]
struct ViewState {
    criteria: FilterCriteria,
    /// Server-side filter the current `events` were fetched with.
    loaded: Option<EventQuery>,
    events: Vec<Event>,
    results: Vec<Event>,
    pager: Pager,
}

/// Listing view controller: owns the current event collection, the ranked
/// results derived from it and the display window over those results.
pub struct Discovery {
    config: AppConfig,
    service: Arc<dyn DataService>,
    store: Arc<dyn KeyValueStore>,
    taxonomy_cache: TtlCache,
    pipeline: Pipeline,
    sequencer: RequestSequencer,
    state: Mutex<ViewState>,
}

impl Discovery {
    pub fn new(
        config: AppConfig,
        service: Arc<dyn DataService>,
        store: Arc<dyn KeyValueStore>,
        gazetteer: Arc<Gazetteer>,
        diversify: bool,
    ) -> Self {
        let taxonomy_cache = TtlCache::new(
            store.clone(),
            chrono::Duration::seconds(config.taxonomy_ttl_secs),
        );
        let pipeline = Pipeline::new(gazetteer, config.pipeline_options(diversify));
        let state = ViewState {
            criteria: FilterCriteria {
                radius_km: config.default_radius_km,
                ..FilterCriteria::default()
            },
            pager: Pager::new(config.page_size, config.display_increment),
            ..ViewState::default()
        };
        Self {
            config,
            service,
            store,
            taxonomy_cache,
            pipeline,
            sequencer: RequestSequencer::new(),
            state: Mutex::new(state),
        }
    }

    /// Config from the data dir, REST backend, SQLite storage, Swiss places.
    pub fn open_default(diversify: bool) -> anyhow::Result<Self> {
        let config = ConfigStore::load().read();
        let service = RestDataService::from_config(&config)?;
        let store = Store::open_default()?;
        Ok(Self::new(
            config,
            Arc::new(service),
            Arc::new(store),
            Gazetteer::swiss(),
            diversify,
        ))
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn pipeline(&self) -> &Pipeline {
        &self.pipeline
    }

    /// Taxonomy from the 5-minute cache, else from the service. Failures
    /// log and yield an empty list.
    pub async fn taxonomy(&self) -> Vec<TaxonomyEntry> {
        if let Some(cached) = self.taxonomy_cache.get::<Vec<TaxonomyEntry>>(cache::TAXONOMY_CACHE_KEY) {
            return cached;
        }
        match self.service.list_taxonomy().await {
            Ok(entries) => {
                if let Err(err) = self.taxonomy_cache.put(cache::TAXONOMY_CACHE_KEY, &entries) {
                    warn!("failed to cache taxonomy: {err}");
                }
                entries
            }
            Err(err) => {
                warn!("taxonomy fetch failed: {err}");
                Vec::new()
            }
        }
    }

    pub async fn criteria_from_link(&self, link: &str) -> FilterCriteria {
        let taxonomy = self.taxonomy().await;
        query::parse_criteria(link, &taxonomy, self.config.default_radius_km)
    }

    /// Fetches events for `criteria`, applies manual boosts and re-runs the
    /// pipeline. If another refresh was issued meanwhile, the result is
    /// dropped. On failure the previous results stay in place.
    pub async fn refresh(&self, criteria: FilterCriteria) -> Result<RefreshOutcome, ServiceError> {
        let ticket = self.sequencer.issue();
        let query = EventQuery::for_criteria(&criteria);

        let mut events = match self.fetch_events(&query).await {
            Ok(events) => events,
            Err(err) => {
                warn!(ticket = ticket.number(), "event fetch failed, keeping previous results: {err}");
                return Err(err);
            }
        };
        self.apply_boosts(&mut events).await;

        let fetched = events.len();
        let results = self.pipeline.run(&events, &criteria);
        let shown = results.len();

        let mut state = self.lock_state();
        if !self.sequencer.is_current(ticket) {
            info!(ticket = ticket.number(), "discarding superseded event fetch");
            return Ok(RefreshOutcome::Superseded);
        }
        state.loaded = Some(query);
        state.events = events;
        state.results = results;
        state.criteria = criteria;
        state.pager.reset();
        info!(fetched, shown, "event listing refreshed");
        Ok(RefreshOutcome::Updated { fetched, shown })
    }

    /// Re-filters the events already loaded, for changes that need no fetch.
    /// Returns `None` and leaves the view alone when those rows were fetched
    /// with a narrower server filter than `criteria` needs; use
    /// [`Discovery::refresh`] then. Supersedes any refresh still in flight.
    pub fn apply_criteria(&self, criteria: FilterCriteria) -> Option<usize> {
        let wanted = EventQuery::for_criteria(&criteria);
        let mut state = self.lock_state();
        if !state.loaded.as_ref().is_some_and(|loaded| loaded.covers(&wanted)) {
            debug!(?wanted, "loaded rows do not cover the new criteria");
            return None;
        }
        let ticket = self.sequencer.issue();
        let results = self.pipeline.run(&state.events, &criteria);
        let shown = results.len();
        state.results = results;
        state.criteria = criteria;
        state.pager.reset();
        debug!(ticket = ticket.number(), shown, "event listing re-filtered");
        Some(shown)
    }

    pub fn criteria(&self) -> FilterCriteria {
        self.lock_state().criteria.clone()
    }

    pub fn results(&self) -> Vec<Event> {
        self.lock_state().results.clone()
    }

    /// The slice of results currently rendered.
    pub fn visible(&self) -> Vec<Event> {
        let state = self.lock_state();
        state.pager.visible(&state.results).to_vec()
    }

    pub fn has_more(&self) -> bool {
        let state = self.lock_state();
        state.pager.has_more(state.results.len())
    }

    pub fn load_more(&self) -> bool {
        let mut state = self.lock_state();
        let total = state.results.len();
        state.pager.load_more(total)
    }

    pub fn go_to_page(&self, page: usize) -> ScrollIntent {
        let mut state = self.lock_state();
        let total = state.results.len();
        state.pager.go_to_page(page, total)
    }

    pub fn page(&self) -> usize {
        self.lock_state().pager.page()
    }

    pub fn jump_to_event(&self, event_id: &str) -> Option<JumpOutcome> {
        let mut state = self.lock_state();
        let ViewState { results, pager, .. } = &mut *state;
        pager.jump_to_event(results, event_id)
    }

    pub fn after_render<'a, I>(&self, rendered_ids: I) -> Option<ScrollIntent>
    where
        I: IntoIterator<Item = &'a str>,
    {
        self.lock_state().pager.after_render(rendered_ids)
    }

    /// Name of the closest known place, for map popups and cards.
    pub fn place_label(&self, event: &Event) -> Option<String> {
        let (lat, lng) = event.coordinates()?;
        self.pipeline
            .gazetteer()
            .nearest_place(lat, lng)
            .map(str::to_string)
    }

    pub async fn locate(&self, source: &dyn PositionSource) -> Position {
        let limit = Duration::from_millis(self.config.geolocation_timeout_ms);
        geolocate::locate_or_fallback(source, limit).await
    }

    pub fn ratings(&self) -> RatingBook {
        RatingBook::load(self.store.as_ref())
    }

    pub fn rate(&self, event_id: &str, rating: Rating) -> Result<(), CacheError> {
        let mut book = self.ratings();
        book.rate(event_id, rating);
        book.save(self.store.as_ref())
    }

    /// Swipe deck: current results the user has not rated yet.
    pub fn unrated(&self) -> Vec<Event> {
        let book = self.ratings();
        let state = self.lock_state();
        book.unrated(&state.results).into_iter().cloned().collect()
    }

    async fn fetch_events(&self, query: &EventQuery) -> Result<Vec<Event>, ServiceError> {
        let limit = self.config.fetch_limit.max(1);
        let mut events = Vec::new();
        let mut offset = 0;
        loop {
            let batch = FETCH_BATCH.min(limit - events.len());
            let page = self.service.list_events(query, offset, batch).await?;
            let returned = page.events.len();
            events.extend(page.events);
            if !page.pagination.has_more || returned == 0 || events.len() >= limit {
                break;
            }
            offset = page.pagination.next_offset;
        }
        Ok(events)
    }

    async fn apply_boosts(&self, events: &mut [Event]) {
        let mut external_ids: Vec<String> = events
            .iter()
            .filter_map(|event| event.external_id.clone())
            .collect();
        external_ids.sort();
        external_ids.dedup();
        if external_ids.is_empty() {
            return;
        }
        match self.service.list_overrides(&external_ids).await {
            Ok(overrides) => {
                let applied = models::apply_overrides(events, &overrides);
                info!(applied, "vibe overrides applied");
            }
            Err(err) => warn!("vibe overrides unavailable, ranking without boosts: {err}"),
        }
    }

    fn lock_state(&self) -> MutexGuard<'_, ViewState> {
        match self.state.lock() {
            Ok(guard) => guard,
            Err(poisoned) => poisoned.into_inner(),
        }
    }
}
