use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::{Event, EventChanges, NewEvent, Ticket};
use crate::store::CatalogStore;
use crate::utils::error::AppError;

fn not_found(event_id: Uuid) -> AppError {
    AppError::NotFound(format!("Event with id '{}' was not found", event_id))
}

#[derive(Clone)]
pub struct EventCatalog {
    store: Arc<dyn CatalogStore>,
}

impl EventCatalog {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, fields: NewEvent) -> Result<Event, AppError> {
        let event = self.store.insert_event(Event::new(fields)).await?;
        info!(event_id = %event.id, name = %event.name, "Event created");
        Ok(event)
    }

    pub async fn find_all(&self) -> Result<Vec<Event>, AppError> {
        Ok(self.store.list_events().await?)
    }

    pub async fn find_one(&self, event_id: Uuid) -> Result<Event, AppError> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or_else(|| not_found(event_id))
    }

    pub async fn update(&self, event_id: Uuid, changes: EventChanges) -> Result<Event, AppError> {
        let mut event = self.find_one(event_id).await?;
        event.apply(changes);
        let event = self.store.update_event(event).await?;
        info!(event_id = %event.id, "Event updated");
        Ok(event)
    }

    /// Tickets issued for the event, oldest first.
    pub async fn tickets(&self, event_id: Uuid) -> Result<Vec<Ticket>, AppError> {
        Ok(self.store.list_tickets(event_id).await?)
    }

    pub async fn remove(&self, event_id: Uuid) -> Result<(), AppError> {
        self.store.delete_event(event_id).await?;
        info!(event_id = %event_id, "Event deleted");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::MemoryStore;
    use chrono::Utc;
    use rust_decimal::Decimal;

    fn catalog() -> EventCatalog {
        EventCatalog::new(Arc::new(MemoryStore::new()))
    }

    fn fields(name: &str) -> NewEvent {
        NewEvent {
            name: name.to_string(),
            description: "Somewhere downtown".to_string(),
            date: Utc::now(),
            price: Decimal::new(30, 0),
        }
    }

    #[tokio::test]
    async fn test_create_and_find() {
        let catalog = catalog();
        let first = catalog.create(fields("First")).await.unwrap();
        let second = catalog.create(fields("Second")).await.unwrap();

        assert_eq!(catalog.find_one(first.id).await.unwrap(), first);
        let all = catalog.find_all().await.unwrap();
        assert_eq!(all, vec![first, second]);
    }

    #[tokio::test]
    async fn test_update_merges_fields() {
        let catalog = catalog();
        let event = catalog.create(fields("Before")).await.unwrap();

        let updated = catalog
            .update(
                event.id,
                EventChanges {
                    name: Some("After".to_string()),
                    ..Default::default()
                },
            )
            .await
            .unwrap();

        assert_eq!(updated.name, "After");
        assert_eq!(updated.price, event.price);
        assert_eq!(catalog.find_one(event.id).await.unwrap().name, "After");
    }

    #[tokio::test]
    async fn test_missing_event_is_not_found() {
        let catalog = catalog();
        let id = Uuid::new_v4();

        assert!(matches!(catalog.find_one(id).await, Err(AppError::NotFound(_))));
        assert!(matches!(
            catalog.update(id, EventChanges::default()).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(catalog.remove(id).await, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_remove_is_final() {
        let catalog = catalog();
        let event = catalog.create(fields("Gone")).await.unwrap();

        catalog.remove(event.id).await.unwrap();
        assert!(matches!(catalog.remove(event.id).await, Err(AppError::NotFound(_))));
        assert!(catalog.find_all().await.unwrap().is_empty());
    }
}
