use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

use crate::models::Spot;
use crate::store::{CatalogStore, StoreError};
use crate::utils::error::AppError;

fn not_found(spot_id: Uuid) -> AppError {
    AppError::NotFound(format!("Spot with id '{}' was not found", spot_id))
}

/// Spots are always addressed through the event that owns them.
#[derive(Clone)]
pub struct SpotRegistry {
    store: Arc<dyn CatalogStore>,
}

impl SpotRegistry {
    pub fn new(store: Arc<dyn CatalogStore>) -> Self {
        Self { store }
    }

    pub async fn create(&self, event_id: Uuid, name: String) -> Result<Spot, AppError> {
        let spot = self.store.insert_spot(Spot::new(event_id, name)).await?;
        info!(event_id = %event_id, spot_id = %spot.id, name = %spot.name, "Spot created");
        Ok(spot)
    }

    pub async fn find_all(&self, event_id: Uuid) -> Result<Vec<Spot>, AppError> {
        Ok(self.store.list_spots(event_id).await?)
    }

    pub async fn find_one(&self, event_id: Uuid, spot_id: Uuid) -> Result<Spot, AppError> {
        self.store
            .get_spot(event_id, spot_id)
            .await?
            .ok_or_else(|| not_found(spot_id))
    }

    /// Without a new name the spot is returned unchanged.
    pub async fn update(
        &self,
        event_id: Uuid,
        spot_id: Uuid,
        name: Option<String>,
    ) -> Result<Spot, AppError> {
        match name {
            Some(name) => match self.store.rename_spot(event_id, spot_id, name).await {
                Ok(spot) => Ok(spot),
                Err(StoreError::SpotNotFound(_)) => Err(not_found(spot_id)),
                Err(err) => Err(err.into()),
            },
            None => self.find_one(event_id, spot_id).await,
        }
    }

    pub async fn remove(&self, event_id: Uuid, spot_id: Uuid) -> Result<(), AppError> {
        match self.store.delete_spot(event_id, spot_id).await {
            Ok(()) => {
                info!(event_id = %event_id, spot_id = %spot_id, "Spot deleted");
                Ok(())
            }
            Err(StoreError::SpotNotFound(_)) => Err(not_found(spot_id)),
            Err(err) => Err(err.into()),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{Event, NewEvent, SpotStatus};
    use crate::store::MemoryStore;
    use chrono::Utc;
    use rust_decimal::Decimal;

    async fn registry_with_event() -> (SpotRegistry, Uuid) {
        let store = Arc::new(MemoryStore::new());
        let event = store
            .insert_event(Event::new(NewEvent {
                name: "Play".to_string(),
                description: "Theatre".to_string(),
                date: Utc::now(),
                price: Decimal::new(40, 0),
            }))
            .await
            .unwrap();
        (SpotRegistry::new(store), event.id)
    }

    #[tokio::test]
    async fn test_new_spots_are_available() {
        let (registry, event_id) = registry_with_event().await;

        let spot = registry.create(event_id, "A1".to_string()).await.unwrap();
        assert_eq!(spot.status, SpotStatus::Available);
        assert_eq!(spot.event_id, event_id);
        assert_eq!(registry.find_one(event_id, spot.id).await.unwrap(), spot);
    }

    #[tokio::test]
    async fn test_create_under_unknown_event() {
        let (registry, _) = registry_with_event().await;

        let result = registry.create(Uuid::new_v4(), "A1".to_string()).await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_duplicate_name_conflicts() {
        let (registry, event_id) = registry_with_event().await;
        registry.create(event_id, "A1".to_string()).await.unwrap();

        let result = registry.create(event_id, "A1".to_string()).await;
        assert!(matches!(result, Err(AppError::Conflict { .. })));
    }

    #[tokio::test]
    async fn test_update_without_name_is_a_no_op() {
        let (registry, event_id) = registry_with_event().await;
        let spot = registry.create(event_id, "A1".to_string()).await.unwrap();

        let same = registry.update(event_id, spot.id, None).await.unwrap();
        assert_eq!(same, spot);

        let renamed = registry
            .update(event_id, spot.id, Some("B1".to_string()))
            .await
            .unwrap();
        assert_eq!(renamed.name, "B1");
        assert_eq!(renamed.status, SpotStatus::Available);
    }

    #[tokio::test]
    async fn test_unknown_spot_is_not_found() {
        let (registry, event_id) = registry_with_event().await;
        let missing = Uuid::new_v4();

        assert!(matches!(
            registry.find_one(event_id, missing).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            registry.update(event_id, missing, Some("X".to_string())).await,
            Err(AppError::NotFound(_))
        ));
        assert!(matches!(
            registry.remove(event_id, missing).await,
            Err(AppError::NotFound(_))
        ));
    }

    #[tokio::test]
    async fn test_find_all_for_unknown_event() {
        let (registry, _) = registry_with_event().await;
        assert!(matches!(
            registry.find_all(Uuid::new_v4()).await,
            Err(AppError::NotFound(_))
        ));
    }
}
