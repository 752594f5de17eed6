use std::sync::Arc;
use std::time::Duration;

use crate::catalog::{EventCatalog, SpotRegistry};
use crate::reservation::ReservationEngine;
use crate::store::CatalogStore;

/// Services shared by every request handler.
#[derive(Clone)]
pub struct AppState {
    pub events: EventCatalog,
    pub spots: SpotRegistry,
    pub reservations: ReservationEngine,
}

impl AppState {
    pub fn new(store: Arc<dyn CatalogStore>, lock_timeout: Duration) -> Self {
        Self {
            events: EventCatalog::new(store.clone()),
            spots: SpotRegistry::new(store.clone()),
            reservations: ReservationEngine::new(store, lock_timeout),
        }
    }
}
