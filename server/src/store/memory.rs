//! In-process Catalog Store.
//!
//! Every spot lives behind its own async mutex. Operations touching several
//! spots at once acquire their mutexes in ascending spot id order, so two
//! overlapping batches can never wait on each other in a cycle. Structural
//! changes (inserting, removing, renaming, committing a reservation) take the
//! catalog lock briefly and never hold it across an await point.

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::RwLock;
use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, OwnedMutexGuard};
use uuid::Uuid;

use crate::models::{Event, Spot, SpotStatus, Ticket, TicketKind};
use crate::reservation::DEFAULT_LOCK_TIMEOUT;
use crate::store::error::{Result, StoreError};
use crate::store::CatalogStore;

struct SpotSlot {
    spot: Spot,
    seq: u64,
    /// Set while holding the slot lock just before the spot leaves the catalog.
    removed: bool,
}

type SpotCell = Arc<Mutex<SpotSlot>>;
type SpotGuard = OwnedMutexGuard<SpotSlot>;

#[derive(Default)]
struct Catalog {
    events: HashMap<Uuid, Event>,
    event_order: Vec<Uuid>,
    spots: HashMap<Uuid, SpotCell>,
    /// Spot ids per event, iterated in lock order.
    event_spots: HashMap<Uuid, BTreeSet<Uuid>>,
    spot_names: HashMap<(Uuid, String), Uuid>,
    tickets: Vec<Ticket>,
    next_seq: u64,
}

impl Catalog {
    fn cells_of(&self, event_id: Uuid) -> Result<Vec<(Uuid, SpotCell)>> {
        let ids = self
            .event_spots
            .get(&event_id)
            .ok_or(StoreError::EventNotFound(event_id))?;

        Ok(ids
            .iter()
            .filter_map(|id| self.spots.get(id).map(|cell| (*id, cell.clone())))
            .collect())
    }

    fn cell(&self, event_id: Uuid, spot_id: Uuid) -> Option<SpotCell> {
        let owned = self
            .event_spots
            .get(&event_id)
            .is_some_and(|ids| ids.contains(&spot_id));
        if owned {
            self.spots.get(&spot_id).cloned()
        } else {
            None
        }
    }

    fn forget_spot(&mut self, spot: &Spot) {
        self.spots.remove(&spot.id);
        if let Some(ids) = self.event_spots.get_mut(&spot.event_id) {
            ids.remove(&spot.id);
        }
        self.spot_names.remove(&(spot.event_id, spot.name.clone()));
    }
}

/// A requested name and, when it resolved, the spot it pointed at.
struct Target {
    name: String,
    found: Option<(Uuid, SpotCell)>,
}

pub struct MemoryStore {
    catalog: RwLock<Catalog>,
    /// Bounds lock waits outside reservations, which bring their own timeout.
    lock_timeout: Duration,
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::with_lock_timeout(DEFAULT_LOCK_TIMEOUT)
    }
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_lock_timeout(lock_timeout: Duration) -> Self {
        Self {
            catalog: RwLock::new(Catalog::default()),
            lock_timeout,
        }
    }

    async fn lock_in_order(cells: impl IntoIterator<Item = SpotCell>) -> Vec<SpotGuard> {
        let mut guards = Vec::new();
        for cell in cells {
            guards.push(cell.lock_owned().await);
        }
        guards
    }

    async fn lock_within(
        cells: impl IntoIterator<Item = SpotCell>,
        timeout: Duration,
    ) -> Result<Vec<SpotGuard>> {
        tokio::time::timeout(timeout, Self::lock_in_order(cells))
            .await
            .map_err(|_| StoreError::LockTimeout)
    }

    /// Unknown names are kept unresolved so the caller can report failures
    /// in request order once the known spots are locked.
    fn resolve_targets(&self, event_id: Uuid, names: &[String]) -> Result<Vec<Target>> {
        let catalog = self.catalog.read();
        if !catalog.events.contains_key(&event_id) {
            return Err(StoreError::EventNotFound(event_id));
        }

        Ok(names
            .iter()
            .map(|name| Target {
                name: name.clone(),
                found: catalog
                    .spot_names
                    .get(&(event_id, name.clone()))
                    .and_then(|id| catalog.spots.get(id).map(|cell| (*id, cell.clone()))),
            })
            .collect())
    }
}

#[async_trait]
impl CatalogStore for MemoryStore {
    async fn insert_event(&self, event: Event) -> Result<Event> {
        let mut catalog = self.catalog.write();
        catalog.event_spots.entry(event.id).or_default();
        if catalog.events.insert(event.id, event.clone()).is_none() {
            catalog.event_order.push(event.id);
        }
        Ok(event)
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let catalog = self.catalog.read();
        Ok(catalog
            .event_order
            .iter()
            .filter_map(|id| catalog.events.get(id).cloned())
            .collect())
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>> {
        Ok(self.catalog.read().events.get(&event_id).cloned())
    }

    async fn update_event(&self, event: Event) -> Result<Event> {
        let mut catalog = self.catalog.write();
        match catalog.events.get_mut(&event.id) {
            Some(stored) => {
                *stored = event.clone();
                Ok(event)
            }
            None => Err(StoreError::EventNotFound(event.id)),
        }
    }

    async fn delete_event(&self, event_id: Uuid) -> Result<()> {
        let snapshot = self.catalog.read().cells_of(event_id)?;
        let locked: Vec<Uuid> = snapshot.iter().map(|(id, _)| *id).collect();
        let mut guards = Self::lock_within(
            snapshot.into_iter().map(|(_, cell)| cell),
            self.lock_timeout,
        )
        .await?;

        let mut catalog = self.catalog.write();
        if !catalog.events.contains_key(&event_id) {
            return Err(StoreError::EventNotFound(event_id));
        }

        // Spots created after the snapshot must be idle to be taken now.
        let late: Vec<SpotCell> = catalog
            .cells_of(event_id)?
            .into_iter()
            .filter(|(id, _)| !locked.contains(id))
            .map(|(_, cell)| cell)
            .collect();
        for cell in late {
            let guard = cell.try_lock_owned().map_err(|_| StoreError::LockTimeout)?;
            guards.push(guard);
        }

        let live = guards.iter().filter(|guard| !guard.removed);
        if live.clone().any(|guard| guard.spot.status == SpotStatus::Reserved) {
            return Err(StoreError::EventHasReservations(event_id));
        }

        let doomed: Vec<Spot> = live.map(|guard| guard.spot.clone()).collect();
        for guard in guards.iter_mut() {
            guard.removed = true;
        }
        for spot in &doomed {
            catalog.forget_spot(spot);
        }
        catalog.event_spots.remove(&event_id);
        catalog.events.remove(&event_id);
        catalog.event_order.retain(|id| *id != event_id);
        Ok(())
    }

    async fn insert_spot(&self, spot: Spot) -> Result<Spot> {
        let mut catalog = self.catalog.write();
        if !catalog.events.contains_key(&spot.event_id) {
            return Err(StoreError::EventNotFound(spot.event_id));
        }

        let key = (spot.event_id, spot.name.clone());
        if catalog.spot_names.contains_key(&key) {
            return Err(StoreError::DuplicateSpotName(spot.name));
        }

        catalog.next_seq += 1;
        let seq = catalog.next_seq;
        catalog.spot_names.insert(key, spot.id);
        catalog
            .event_spots
            .entry(spot.event_id)
            .or_default()
            .insert(spot.id);
        catalog.spots.insert(
            spot.id,
            Arc::new(Mutex::new(SpotSlot {
                spot: spot.clone(),
                seq,
                removed: false,
            })),
        );
        Ok(spot)
    }

    async fn list_spots(&self, event_id: Uuid) -> Result<Vec<Spot>> {
        let cells = self.catalog.read().cells_of(event_id)?;
        // Holding every lock at once gives a snapshot no batch commit can split.
        let guards =
            Self::lock_within(cells.into_iter().map(|(_, cell)| cell), self.lock_timeout).await?;

        let mut live: Vec<&SpotGuard> = guards.iter().filter(|guard| !guard.removed).collect();
        live.sort_by_key(|guard| guard.seq);
        Ok(live.into_iter().map(|guard| guard.spot.clone()).collect())
    }

    async fn get_spot(&self, event_id: Uuid, spot_id: Uuid) -> Result<Option<Spot>> {
        let cell = self.catalog.read().cell(event_id, spot_id);
        let Some(cell) = cell else {
            return Ok(None);
        };

        let slot = tokio::time::timeout(self.lock_timeout, cell.lock())
            .await
            .map_err(|_| StoreError::LockTimeout)?;
        Ok((!slot.removed).then(|| slot.spot.clone()))
    }

    async fn rename_spot(&self, event_id: Uuid, spot_id: Uuid, name: String) -> Result<Spot> {
        let cell = self
            .catalog
            .read()
            .cell(event_id, spot_id)
            .ok_or_else(|| StoreError::SpotNotFound(spot_id.to_string()))?;

        let mut slot = tokio::time::timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout)?;
        if slot.removed {
            return Err(StoreError::SpotNotFound(spot_id.to_string()));
        }
        if slot.spot.name == name {
            return Ok(slot.spot.clone());
        }

        let mut catalog = self.catalog.write();
        let new_key = (event_id, name.clone());
        if catalog.spot_names.contains_key(&new_key) {
            return Err(StoreError::DuplicateSpotName(name));
        }
        catalog.spot_names.remove(&(event_id, slot.spot.name.clone()));
        catalog.spot_names.insert(new_key, spot_id);

        slot.spot.name = name;
        slot.spot.updated_at = Utc::now();
        Ok(slot.spot.clone())
    }

    async fn delete_spot(&self, event_id: Uuid, spot_id: Uuid) -> Result<()> {
        let cell = self
            .catalog
            .read()
            .cell(event_id, spot_id)
            .ok_or_else(|| StoreError::SpotNotFound(spot_id.to_string()))?;

        let mut slot = tokio::time::timeout(self.lock_timeout, cell.lock_owned())
            .await
            .map_err(|_| StoreError::LockTimeout)?;
        if slot.removed {
            return Err(StoreError::SpotNotFound(spot_id.to_string()));
        }
        if slot.spot.status == SpotStatus::Reserved {
            return Err(StoreError::SpotUnavailable(slot.spot.name.clone()));
        }

        slot.removed = true;
        self.catalog.write().forget_spot(&slot.spot);
        Ok(())
    }

    async fn list_tickets(&self, event_id: Uuid) -> Result<Vec<Ticket>> {
        let catalog = self.catalog.read();
        if !catalog.events.contains_key(&event_id) {
            return Err(StoreError::EventNotFound(event_id));
        }
        Ok(catalog
            .tickets
            .iter()
            .filter(|ticket| ticket.event_id == event_id)
            .cloned()
            .collect())
    }

    async fn reserve_spots(
        &self,
        event_id: Uuid,
        names: &[String],
        kind: TicketKind,
        lock_timeout: Duration,
    ) -> Result<Vec<Ticket>> {
        let targets = self.resolve_targets(event_id, names)?;

        let mut found: Vec<(usize, Uuid, SpotCell)> = targets
            .iter()
            .enumerate()
            .filter_map(|(position, target)| {
                target
                    .found
                    .as_ref()
                    .map(|(id, cell)| (position, *id, cell.clone()))
            })
            .collect();
        found.sort_by_key(|(_, spot_id, _)| *spot_id);

        let positions: Vec<usize> = found.iter().map(|(position, _, _)| *position).collect();
        let guards =
            Self::lock_within(found.into_iter().map(|(_, _, cell)| cell), lock_timeout).await?;

        let mut slots: Vec<Option<SpotGuard>> = targets.iter().map(|_| None).collect();
        for (position, guard) in positions.into_iter().zip(guards) {
            slots[position] = Some(guard);
        }

        // First failing name in request order decides the error.
        for (target, slot) in targets.iter().zip(&slots) {
            match slot {
                Some(slot) if !slot.removed && slot.spot.name == target.name => {
                    if !slot.spot.is_available() {
                        return Err(StoreError::SpotUnavailable(target.name.clone()));
                    }
                }
                _ => return Err(StoreError::SpotNotFound(target.name.clone())),
            }
        }

        let mut catalog = self.catalog.write();
        if !catalog.events.contains_key(&event_id) {
            return Err(StoreError::EventNotFound(event_id));
        }

        let now = Utc::now();
        let tickets: Vec<Ticket> = slots
            .iter_mut()
            .flatten()
            .map(|slot| {
                slot.spot.status = SpotStatus::Reserved;
                slot.spot.updated_at = now;
                Ticket::issue(event_id, slot.spot.id, kind)
            })
            .collect();
        catalog.tickets.extend(tickets.iter().cloned());
        Ok(tickets)
    }
}
