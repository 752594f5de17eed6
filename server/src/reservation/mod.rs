//! Batch reservation of spots.
//!
//! A batch is deduplicated and sorted before the store is touched. The store
//! then either reserves every spot and records one ticket per spot, or writes
//! nothing at all.

use std::collections::BTreeSet;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::models::{Ticket, TicketKind};
use crate::store::CatalogStore;

pub mod error;

pub use error::ReservationError;

pub const DEFAULT_LOCK_TIMEOUT: Duration = Duration::from_secs(5);

/// Unique spot names of a batch in lexicographic order.
pub fn reservation_targets(spots: &[String]) -> Result<Vec<String>, ReservationError> {
    let targets: Vec<String> = spots
        .iter()
        .cloned()
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect();

    if targets.is_empty() {
        return Err(ReservationError::EmptyBatch);
    }
    Ok(targets)
}

#[derive(Clone)]
pub struct ReservationEngine {
    store: Arc<dyn CatalogStore>,
    lock_timeout: Duration,
}

impl ReservationEngine {
    pub fn new(store: Arc<dyn CatalogStore>, lock_timeout: Duration) -> Self {
        Self {
            store,
            lock_timeout,
        }
    }

    /// Reserves every named spot of `event_id` or none of them.
    ///
    /// Tickets are returned in the sorted order of the unique names. Repeating
    /// a name in `spots` targets that spot once.
    pub async fn reserve(
        &self,
        event_id: Uuid,
        spots: &[String],
        kind: TicketKind,
    ) -> Result<Vec<Ticket>, ReservationError> {
        let targets = reservation_targets(spots)?;
        if targets.len() != spots.len() {
            debug!(
                requested = spots.len(),
                unique = targets.len(),
                "Collapsed duplicate spot names"
            );
        }

        if self.store.get_event(event_id).await?.is_none() {
            return Err(ReservationError::EventNotFound(event_id));
        }

        match self
            .store
            .reserve_spots(event_id, &targets, kind, self.lock_timeout)
            .await
        {
            Ok(tickets) => {
                info!(
                    event_id = %event_id,
                    spots = tickets.len(),
                    kind = %kind,
                    "Reserved spots"
                );
                Ok(tickets)
            }
            Err(err) => {
                let err = ReservationError::from(err);
                if err.is_retryable() {
                    warn!(event_id = %event_id, error = %err, "Reservation lost a race");
                }
                Err(err)
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, NewEvent, Spot, SpotStatus};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use rust_decimal::Decimal;

    struct Fixture {
        store: Arc<MemoryStore>,
        engine: ReservationEngine,
        event_id: Uuid,
    }

    async fn fixture(spots: &[&str]) -> Fixture {
        let store = Arc::new(MemoryStore::new());
        let event = store
            .insert_event(Event::new(NewEvent {
                name: "Show".to_string(),
                description: "Evening show".to_string(),
                date: Utc::now(),
                price: Decimal::new(50, 0),
            }))
            .await
            .unwrap();
        for name in spots {
            store
                .insert_spot(Spot::new(event.id, name.to_string()))
                .await
                .unwrap();
        }
        let engine = ReservationEngine::new(store.clone(), DEFAULT_LOCK_TIMEOUT);
        Fixture {
            store,
            engine,
            event_id: event.id,
        }
    }

    fn names(raw: &[&str]) -> Vec<String> {
        raw.iter().map(|s| s.to_string()).collect()
    }

    async fn status_of(fixture: &Fixture, name: &str) -> SpotStatus {
        fixture
            .store
            .list_spots(fixture.event_id)
            .await
            .unwrap()
            .into_iter()
            .find(|spot| spot.name == name)
            .map(|spot| spot.status)
            .unwrap()
    }

    #[test]
    fn test_targets_are_unique_and_sorted() {
        let targets = reservation_targets(&names(&["B2", "A1", "B2", "A10"])).unwrap();
        assert_eq!(targets, names(&["A1", "A10", "B2"]));
    }

    #[test]
    fn test_empty_batch_is_rejected() {
        assert!(matches!(
            reservation_targets(&[]),
            Err(ReservationError::EmptyBatch)
        ));
    }

    #[tokio::test]
    async fn test_reserve_then_conflict_keeps_original_ticket() {
        let f = fixture(&["A1", "A2"]).await;

        let tickets = f
            .engine
            .reserve(f.event_id, &names(&["A1", "A2"]), TicketKind::Full)
            .await
            .unwrap();
        assert_eq!(tickets.len(), 2);
        assert_eq!(status_of(&f, "A1").await, SpotStatus::Reserved);
        assert_eq!(status_of(&f, "A2").await, SpotStatus::Reserved);

        let second = f
            .engine
            .reserve(f.event_id, &names(&["A1"]), TicketKind::Half)
            .await;
        assert!(matches!(second, Err(ReservationError::SpotUnavailable(ref s)) if s == "A1"));

        let recorded = f.store.list_tickets(f.event_id).await.unwrap();
        assert_eq!(recorded.len(), 2);
        assert!(recorded.iter().all(|t| t.kind == TicketKind::Full));
    }

    #[tokio::test]
    async fn test_tickets_follow_sorted_order() {
        let f = fixture(&["C3", "A1", "B2"]).await;
        let spots = f.store.list_spots(f.event_id).await.unwrap();

        let tickets = f
            .engine
            .reserve(f.event_id, &names(&["C3", "B2", "A1"]), TicketKind::Half)
            .await
            .unwrap();

        let ticket_names: Vec<&str> = tickets
            .iter()
            .map(|t| {
                spots
                    .iter()
                    .find(|s| s.id == t.spot_id)
                    .map(|s| s.name.as_str())
                    .unwrap()
            })
            .collect();
        assert_eq!(ticket_names, vec!["A1", "B2", "C3"]);
        assert!(tickets.iter().all(|t| t.event_id == f.event_id));
    }

    #[tokio::test]
    async fn test_duplicate_names_yield_one_ticket() {
        let f = fixture(&["A1"]).await;

        let tickets = f
            .engine
            .reserve(f.event_id, &names(&["A1", "A1", "A1"]), TicketKind::Full)
            .await
            .unwrap();

        assert_eq!(tickets.len(), 1);
        assert_eq!(f.store.list_tickets(f.event_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_batch_with_one_reserved_spot_reserves_nothing() {
        let f = fixture(&["A1", "A2", "A3"]).await;
        f.engine
            .reserve(f.event_id, &names(&["A2"]), TicketKind::Full)
            .await
            .unwrap();

        let result = f
            .engine
            .reserve(f.event_id, &names(&["A1", "A2", "A3"]), TicketKind::Full)
            .await;
        assert!(matches!(result, Err(ReservationError::SpotUnavailable(ref s)) if s == "A2"));

        assert_eq!(status_of(&f, "A1").await, SpotStatus::Available);
        assert_eq!(status_of(&f, "A3").await, SpotStatus::Available);
        assert_eq!(f.store.list_tickets(f.event_id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_unknown_spot_fails_whole_batch() {
        let f = fixture(&["A1"]).await;

        let result = f
            .engine
            .reserve(f.event_id, &names(&["A1", "B9"]), TicketKind::Full)
            .await;
        assert!(matches!(result, Err(ReservationError::SpotNotFound(ref s)) if s == "B9"));
        assert!(!result.unwrap_err().is_retryable());
        assert_eq!(status_of(&f, "A1").await, SpotStatus::Available);
    }

    #[tokio::test]
    async fn test_first_failing_name_in_sorted_order_wins() {
        let f = fixture(&["A1", "A2"]).await;
        f.engine
            .reserve(f.event_id, &names(&["A1"]), TicketKind::Full)
            .await
            .unwrap();

        let result = f
            .engine
            .reserve(f.event_id, &names(&["B9", "A1"]), TicketKind::Half)
            .await;
        assert!(matches!(result, Err(ReservationError::SpotUnavailable(ref s)) if s == "A1"));
        assert!(result.unwrap_err().is_retryable());

        let result = f
            .engine
            .reserve(f.event_id, &names(&["A2", "A0", "A1"]), TicketKind::Half)
            .await;
        assert!(matches!(result, Err(ReservationError::SpotNotFound(ref s)) if s == "A0"));
        assert_eq!(status_of(&f, "A2").await, SpotStatus::Available);
    }

    #[tokio::test]
    async fn test_unknown_event() {
        let f = fixture(&["A1"]).await;

        let result = f
            .engine
            .reserve(Uuid::new_v4(), &names(&["A1"]), TicketKind::Full)
            .await;
        assert!(matches!(result, Err(ReservationError::EventNotFound(_))));
    }

    #[tokio::test]
    async fn test_spot_of_another_event_is_not_found() {
        let f = fixture(&["A1"]).await;
        let other = f
            .store
            .insert_event(Event::new(NewEvent {
                name: "Matinee".to_string(),
                description: "Afternoon show".to_string(),
                date: Utc::now(),
                price: Decimal::ZERO,
            }))
            .await
            .unwrap();

        let result = f
            .engine
            .reserve(other.id, &names(&["A1"]), TicketKind::Full)
            .await;
        assert!(matches!(result, Err(ReservationError::SpotNotFound(_))));
    }

    #[tokio::test]
    async fn test_empty_request_touches_nothing() {
        let f = fixture(&["A1"]).await;

        let result = f.engine.reserve(f.event_id, &[], TicketKind::Full).await;
        assert!(matches!(result, Err(ReservationError::EmptyBatch)));
        assert!(f.store.list_tickets(f.event_id).await.unwrap().is_empty());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_racing_single_spot_has_exactly_one_winner() {
        for _ in 0..20 {
            let f = fixture(&["A1"]).await;

            let first = {
                let engine = f.engine.clone();
                let event_id = f.event_id;
                tokio::spawn(async move {
                    engine.reserve(event_id, &names(&["A1"]), TicketKind::Full).await
                })
            };
            let second = {
                let engine = f.engine.clone();
                let event_id = f.event_id;
                tokio::spawn(async move {
                    engine.reserve(event_id, &names(&["A1"]), TicketKind::Half).await
                })
            };

            let outcomes = [first.await.unwrap(), second.await.unwrap()];
            let wins = outcomes.iter().filter(|r| r.is_ok()).count();
            let conflicts = outcomes
                .iter()
                .filter(|r| matches!(r, Err(ReservationError::SpotUnavailable(_))))
                .count();

            assert_eq!((wins, conflicts), (1, 1));
            assert_eq!(f.store.list_tickets(f.event_id).await.unwrap().len(), 1);
        }
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_overlapping_batches_never_double_book() {
        let seats: Vec<String> = (0..12).map(|i| format!("S{i:02}")).collect();
        let seat_refs: Vec<&str> = seats.iter().map(String::as_str).collect();
        let f = fixture(&seat_refs).await;

        let mut handles = Vec::new();
        for worker in 0..16usize {
            let engine = f.engine.clone();
            let event_id = f.event_id;
            // Each batch overlaps its neighbours, listed in a worker-specific order.
            let mut batch: Vec<String> = (0..4)
                .map(|k| seats[(worker + k * 3) % seats.len()].clone())
                .collect();
            if worker % 2 == 1 {
                batch.reverse();
            }
            handles.push(tokio::spawn(async move {
                engine.reserve(event_id, &batch, TicketKind::Full).await
            }));
        }

        let mut issued = 0;
        for handle in handles {
            match handle.await.unwrap() {
                Ok(tickets) => issued += tickets.len(),
                Err(ReservationError::SpotUnavailable(_)) => {}
                Err(other) => panic!("unexpected failure {other:?}"),
            }
        }

        let tickets = f.store.list_tickets(f.event_id).await.unwrap();
        let spots = f.store.list_spots(f.event_id).await.unwrap();
        let reserved = spots
            .iter()
            .filter(|s| s.status == SpotStatus::Reserved)
            .count();

        assert_eq!(tickets.len(), issued);
        assert_eq!(reserved, issued);
        let mut spot_ids: Vec<Uuid> = tickets.iter().map(|t| t.spot_id).collect();
        spot_ids.sort();
        spot_ids.dedup();
        assert_eq!(spot_ids.len(), tickets.len());
    }
}
