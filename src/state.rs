//! Shared application state handed to every handler (spec §5 "Shared mutable
//! state"): the library store, the tiered metadata service, and config. Each
//! handler builds a fresh [`Telemetry`] per request rather than reaching into
//! `AppState` for counters (spec §9 design notes).

use std::sync::Arc;

use crate::config::Config;
use crate::library::LibraryStore;
use crate::metadata_service::MetadataService;
use crate::orchestrator::LookupOrchestrator;

#[derive(Clone)]
pub struct AppState {
    pub library: Arc<LibraryStore>,
    pub metadata: Arc<MetadataService>,
    pub orchestrator: Arc<LookupOrchestrator>,
    pub config: Arc<Config>,
}

impl AppState {
    pub fn new(
        library: Arc<LibraryStore>,
        metadata: Arc<MetadataService>,
        orchestrator: Arc<LookupOrchestrator>,
        config: Config,
    ) -> Self {
        Self {
            library,
            metadata,
            orchestrator,
            config: Arc::new(config),
        }
    }
}
