pub mod states;
pub mod work_items;

use std::sync::Arc;

use crate::ado::{AdoClient, WorkItemTracking};
use crate::config::AdoConfig;
use crate::error::AdoError;

pub use states::StateCatalogService;
pub use work_items::WorkItemService;

/// A service that can be built from configuration by opening a backend connection.
pub trait Connect: Sized {
    const NAME: &'static str;

    fn with_backend(project: String, backend: Arc<dyn WorkItemTracking>) -> Self;

    fn connect(config: &AdoConfig) -> Result<Self, AdoError> {
        let client = AdoClient::connect(config)?;
        Ok(Self::with_backend(config.project.clone(), Arc::new(client)))
    }
}
