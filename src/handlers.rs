use std::sync::Arc;

use arc_swap::ArcSwapOption;
use serde::Serialize;
use tracing::{error, info, warn};

use crate::config::AdoConfig;
use crate::error::AdoError;
use crate::model::state_catalog::{StateCatalog, StateReasons};
use crate::services::{Connect, StateCatalogService, WorkItemService};

#[derive(Debug)]
pub enum Lifecycle<S> {
    Uninitialized,
    Ready(Arc<S>),
}

/// Owns one service and its `Uninitialized -> Ready` transition.
pub struct ServiceHandler<S> {
    state: Lifecycle<S>,
}

impl<S> Default for ServiceHandler<S> {
    fn default() -> Self {
        Self {
            state: Lifecycle::Uninitialized,
        }
    }
}

impl<S> ServiceHandler<S> {
    pub fn service(&self) -> Option<Arc<S>> {
        match &self.state {
            Lifecycle::Ready(service) => Some(service.clone()),
            Lifecycle::Uninitialized => None,
        }
    }

    pub fn is_ready(&self) -> bool {
        matches!(self.state, Lifecycle::Ready(_))
    }

    /// Move to `Ready`. A handler that is already ready keeps its service.
    pub fn install(&mut self, service: S) {
        if self.is_ready() {
            warn!("Service handler already initialized; ignoring");
            return;
        }
        self.state = Lifecycle::Ready(Arc::new(service));
    }
}

impl<S: Connect> ServiceHandler<S> {
    /// Build the service and its backend connection. Failures are not recovered here.
    pub fn initialize(&mut self, config: &AdoConfig) -> Result<(), AdoError> {
        match S::connect(config) {
            Ok(service) => {
                self.install(service);
                info!("{} initialized successfully", S::NAME);
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to initialize {}", S::NAME);
                Err(e)
            }
        }
    }
}

/// Answer to a states request: one type's states, or the whole catalog.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum StatesView {
    Type(StateReasons),
    All(StateCatalog),
}

/// State catalog handler plus the process-lifetime catalog snapshot.
#[derive(Default)]
pub struct StatesHandler {
    pub handler: ServiceHandler<StateCatalogService>,
    cache: ArcSwapOption<StateCatalog>,
}

impl StatesHandler {
    pub fn initialize(&mut self, config: &AdoConfig) -> Result<(), AdoError> {
        self.handler.initialize(config)
    }

    pub fn cached(&self) -> Option<Arc<StateCatalog>> {
        self.cache.load_full()
    }

    /// Best-effort: on failure the cache stays unset and startup continues.
    pub async fn preload_cache(&self) {
        let Some(service) = self.handler.service() else {
            error!("Cannot preload states - service not initialized");
            return;
        };

        info!("Preloading work item states...");
        match service.all_states().await {
            Ok(catalog) => {
                info!(
                    "Successfully loaded states for {} work item types",
                    catalog.len()
                );
                self.cache.store(Some(Arc::new(catalog)));
            }
            Err(e) => warn!(error = %e, "Failed to preload work item states"),
        }
    }

    /// Fetch the full catalog live and publish it as the new snapshot.
    pub async fn refresh(&self, service: &StateCatalogService) -> Result<Arc<StateCatalog>, AdoError> {
        let catalog = Arc::new(service.all_states().await?);
        self.cache.store(Some(catalog.clone()));
        Ok(catalog)
    }

    /// Serve from the snapshot when the request covers all types, else go live.
    pub async fn states(
        &self,
        service: &StateCatalogService,
        work_item_type: Option<&str>,
    ) -> Result<StatesView, AdoError> {
        match work_item_type {
            Some(t) => Ok(StatesView::Type(service.valid_states(t).await?)),
            None => {
                let catalog = match self.cached() {
                    Some(cached) => cached,
                    None => self.refresh(service).await?,
                };
                Ok(StatesView::All(catalog.as_ref().clone()))
            }
        }
    }
}

/// Both handlers, created uninitialized at process start.
#[derive(Default)]
pub struct Handlers {
    pub work_items: ServiceHandler<WorkItemService>,
    pub states: StatesHandler,
}

impl Handlers {
    pub fn initialize(&mut self, config: &AdoConfig) -> Result<(), AdoError> {
        self.work_items.initialize(config)?;
        self.states.initialize(config)?;
        Ok(())
    }
}
