//! Catalog Store: durable home of events, spots and tickets.
//!
//! The HTTP layer and the reservation engine only ever see
//! `Arc<dyn CatalogStore>`; the backing implementation is picked at start-up.

use async_trait::async_trait;
use std::time::Duration;
use uuid::Uuid;

use crate::models::{Event, Spot, Ticket, TicketKind};

pub mod error;
pub mod memory;
pub mod postgres;

pub use error::{Result, StoreError};
pub use memory::MemoryStore;
pub use postgres::PgCatalogStore;

#[async_trait]
pub trait CatalogStore: Send + Sync {
    async fn insert_event(&self, event: Event) -> Result<Event>;

    /// Events ordered by creation time.
    async fn list_events(&self) -> Result<Vec<Event>>;

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>>;

    /// Replaces the stored event. Last writer wins.
    async fn update_event(&self, event: Event) -> Result<Event>;

    /// Removes the event and its spots. Refused while any spot is reserved.
    async fn delete_event(&self, event_id: Uuid) -> Result<()>;

    /// Fails with `DuplicateSpotName` if the name is taken within the event.
    async fn insert_spot(&self, spot: Spot) -> Result<Spot>;

    /// Spots of one event ordered by creation time.
    async fn list_spots(&self, event_id: Uuid) -> Result<Vec<Spot>>;

    async fn get_spot(&self, event_id: Uuid, spot_id: Uuid) -> Result<Option<Spot>>;

    async fn rename_spot(&self, event_id: Uuid, spot_id: Uuid, name: String) -> Result<Spot>;

    /// Refused with `SpotUnavailable` once the spot is reserved.
    async fn delete_spot(&self, event_id: Uuid, spot_id: Uuid) -> Result<()>;

    async fn list_tickets(&self, event_id: Uuid) -> Result<Vec<Ticket>>;

    /// Atomically moves every named spot of the event from available to
    /// reserved and issues one ticket per spot.
    ///
    /// `names` must be free of duplicates. Tickets come back in the order of
    /// `names`. On any failure nothing is written. Spot locks are taken in
    /// ascending spot id order; waiting longer than `lock_timeout` aborts with
    /// `LockTimeout`.
    async fn reserve_spots(
        &self,
        event_id: Uuid,
        names: &[String],
        kind: TicketKind,
        lock_timeout: Duration,
    ) -> Result<Vec<Ticket>>;
}
