//! PostgreSQL Catalog Store.
//!
//! A reservation is a single transaction: the event row is share-locked so it
//! cannot be deleted underneath us, the targeted spot rows are locked
//! `FOR UPDATE` in ascending id order, and `lock_timeout` bounds every wait.

use async_trait::async_trait;
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use std::time::Duration;
use tracing::warn;
use uuid::Uuid;

use crate::models::{Event, Spot, SpotStatus, Ticket, TicketKind};
use crate::store::error::{Result, StoreError};
use crate::store::CatalogStore;

const UNIQUE_VIOLATION: &str = "23505";
const FOREIGN_KEY_VIOLATION: &str = "23503";
const LOCK_NOT_AVAILABLE: &str = "55P03";

const SPOT_COLUMNS: &str = "id, event_id, name, status, created_at, updated_at";
const EVENT_COLUMNS: &str = "id, name, description, date, price, created_at, updated_at";

#[derive(Clone)]
pub struct PgCatalogStore {
    pool: PgPool,
}

impl PgCatalogStore {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn sqlstate(err: &sqlx::Error) -> Option<String> {
    err.as_database_error()
        .and_then(|db| db.code())
        .map(|code| code.into_owned())
}

/// Lock waits surface as `LockTimeout`; everything else stays a database error.
fn lock_error(err: sqlx::Error) -> StoreError {
    match sqlstate(&err).as_deref() {
        Some(LOCK_NOT_AVAILABLE) => StoreError::LockTimeout,
        _ => StoreError::Database(err),
    }
}

/// Rolls back and reports `err`; a failed rollback is only logged since the
/// connection discards the transaction anyway.
async fn abort<T>(tx: Transaction<'_, Postgres>, err: StoreError) -> Result<T> {
    if let Err(rollback) = tx.rollback().await {
        warn!(error = ?rollback, "Rollback failed");
    }
    Err(err)
}

#[async_trait]
impl CatalogStore for PgCatalogStore {
    async fn insert_event(&self, event: Event) -> Result<Event> {
        let query = format!(
            "INSERT INTO events ({EVENT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7) \
             RETURNING {EVENT_COLUMNS}"
        );
        let stored = sqlx::query_as::<_, Event>(&query)
            .bind(event.id)
            .bind(&event.name)
            .bind(&event.description)
            .bind(event.date)
            .bind(event.price)
            .bind(event.created_at)
            .bind(event.updated_at)
            .fetch_one(&self.pool)
            .await?;
        Ok(stored)
    }

    async fn list_events(&self) -> Result<Vec<Event>> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM events ORDER BY created_at, id");
        Ok(sqlx::query_as::<_, Event>(&query)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_event(&self, event_id: Uuid) -> Result<Option<Event>> {
        let query = format!("SELECT {EVENT_COLUMNS} FROM events WHERE id = $1");
        Ok(sqlx::query_as::<_, Event>(&query)
            .bind(event_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn update_event(&self, event: Event) -> Result<Event> {
        let query = format!(
            "UPDATE events SET name = $2, description = $3, date = $4, price = $5, updated_at = $6 \
             WHERE id = $1 RETURNING {EVENT_COLUMNS}"
        );
        sqlx::query_as::<_, Event>(&query)
            .bind(event.id)
            .bind(&event.name)
            .bind(&event.description)
            .bind(event.date)
            .bind(event.price)
            .bind(event.updated_at)
            .fetch_optional(&self.pool)
            .await?
            .ok_or(StoreError::EventNotFound(event.id))
    }

    async fn delete_event(&self, event_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let found = sqlx::query_scalar::<_, Uuid>("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(lock_error)?;
        if found.is_none() {
            return abort(tx, StoreError::EventNotFound(event_id)).await;
        }

        let statuses = sqlx::query_scalar::<_, SpotStatus>(
            "SELECT status FROM spots WHERE event_id = $1 ORDER BY id FOR UPDATE",
        )
        .bind(event_id)
        .fetch_all(&mut *tx)
        .await
        .map_err(lock_error)?;
        if statuses.contains(&SpotStatus::Reserved) {
            return abort(tx, StoreError::EventHasReservations(event_id)).await;
        }

        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id)
            .execute(&mut *tx)
            .await?;
        tx.commit().await?;
        Ok(())
    }

    async fn insert_spot(&self, spot: Spot) -> Result<Spot> {
        let query = format!(
            "INSERT INTO spots ({SPOT_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6) \
             RETURNING {SPOT_COLUMNS}"
        );
        sqlx::query_as::<_, Spot>(&query)
            .bind(spot.id)
            .bind(spot.event_id)
            .bind(&spot.name)
            .bind(spot.status)
            .bind(spot.created_at)
            .bind(spot.updated_at)
            .fetch_one(&self.pool)
            .await
            .map_err(|err| match sqlstate(&err).as_deref() {
                Some(UNIQUE_VIOLATION) => StoreError::DuplicateSpotName(spot.name.clone()),
                Some(FOREIGN_KEY_VIOLATION) => StoreError::EventNotFound(spot.event_id),
                _ => StoreError::Database(err),
            })
    }

    async fn list_spots(&self, event_id: Uuid) -> Result<Vec<Spot>> {
        if self.get_event(event_id).await?.is_none() {
            return Err(StoreError::EventNotFound(event_id));
        }

        let query = format!(
            "SELECT {SPOT_COLUMNS} FROM spots WHERE event_id = $1 ORDER BY created_at, id"
        );
        Ok(sqlx::query_as::<_, Spot>(&query)
            .bind(event_id)
            .fetch_all(&self.pool)
            .await?)
    }

    async fn get_spot(&self, event_id: Uuid, spot_id: Uuid) -> Result<Option<Spot>> {
        let query = format!("SELECT {SPOT_COLUMNS} FROM spots WHERE event_id = $1 AND id = $2");
        Ok(sqlx::query_as::<_, Spot>(&query)
            .bind(event_id)
            .bind(spot_id)
            .fetch_optional(&self.pool)
            .await?)
    }

    async fn rename_spot(&self, event_id: Uuid, spot_id: Uuid, name: String) -> Result<Spot> {
        let query = format!(
            "UPDATE spots SET name = $3, updated_at = now() WHERE event_id = $1 AND id = $2 \
             RETURNING {SPOT_COLUMNS}"
        );
        sqlx::query_as::<_, Spot>(&query)
            .bind(event_id)
            .bind(spot_id)
            .bind(&name)
            .fetch_optional(&self.pool)
            .await
            .map_err(|err| match sqlstate(&err).as_deref() {
                Some(UNIQUE_VIOLATION) => StoreError::DuplicateSpotName(name.clone()),
                _ => StoreError::Database(err),
            })?
            .ok_or_else(|| StoreError::SpotNotFound(spot_id.to_string()))
    }

    async fn delete_spot(&self, event_id: Uuid, spot_id: Uuid) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let query = format!(
            "SELECT {SPOT_COLUMNS} FROM spots WHERE event_id = $1 AND id = $2 FOR UPDATE"
        );
        let spot = sqlx::query_as::<_, Spot>(&query)
            .bind(event_id)
            .bind(spot_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(lock_error)?;

        match spot {
            None => abort(tx, StoreError::SpotNotFound(spot_id.to_string())).await,
            Some(spot) if spot.status == SpotStatus::Reserved => {
                abort(tx, StoreError::SpotUnavailable(spot.name)).await
            }
            Some(_) => {
                sqlx::query("DELETE FROM spots WHERE id = $1")
                    .bind(spot_id)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;
                Ok(())
            }
        }
    }

    async fn list_tickets(&self, event_id: Uuid) -> Result<Vec<Ticket>> {
        if self.get_event(event_id).await?.is_none() {
            return Err(StoreError::EventNotFound(event_id));
        }

        Ok(sqlx::query_as::<_, Ticket>(
            "SELECT id, spot_id, event_id, kind, created_at FROM tickets \
             WHERE event_id = $1 ORDER BY created_at, id",
        )
        .bind(event_id)
        .fetch_all(&self.pool)
        .await?)
    }

    async fn reserve_spots(
        &self,
        event_id: Uuid,
        names: &[String],
        kind: TicketKind,
        lock_timeout: Duration,
    ) -> Result<Vec<Ticket>> {
        let mut tx = self.pool.begin().await?;

        sqlx::query("SELECT set_config('lock_timeout', $1, true)")
            .bind(format!("{}ms", lock_timeout.as_millis().max(1)))
            .execute(&mut *tx)
            .await?;

        let event = sqlx::query_scalar::<_, Uuid>("SELECT id FROM events WHERE id = $1 FOR SHARE")
            .bind(event_id)
            .fetch_optional(&mut *tx)
            .await
            .map_err(lock_error)?;
        if event.is_none() {
            return abort(tx, StoreError::EventNotFound(event_id)).await;
        }

        let query = format!(
            "SELECT {SPOT_COLUMNS} FROM spots WHERE event_id = $1 AND name = ANY($2) \
             ORDER BY id FOR UPDATE"
        );
        let locked = sqlx::query_as::<_, Spot>(&query)
            .bind(event_id)
            .bind(names.to_vec())
            .fetch_all(&mut *tx)
            .await
            .map_err(lock_error)?;

        let mut targets = Vec::with_capacity(names.len());
        for name in names {
            match locked.iter().find(|spot| &spot.name == name) {
                None => return abort(tx, StoreError::SpotNotFound(name.clone())).await,
                Some(spot) if !spot.is_available() => {
                    return abort(tx, StoreError::SpotUnavailable(name.clone())).await;
                }
                Some(spot) => targets.push(spot.id),
            }
        }

        sqlx::query("UPDATE spots SET status = 'reserved', updated_at = now() WHERE id = ANY($1)")
            .bind(&targets)
            .execute(&mut *tx)
            .await?;

        let mut tickets = Vec::with_capacity(targets.len());
        for spot_id in targets {
            let ticket = Ticket::issue(event_id, spot_id, kind);
            sqlx::query(
                "INSERT INTO tickets (id, spot_id, event_id, kind, created_at) \
                 VALUES ($1, $2, $3, $4, $5)",
            )
            .bind(ticket.id)
            .bind(ticket.spot_id)
            .bind(ticket.event_id)
            .bind(ticket.kind)
            .bind(ticket.created_at)
            .execute(&mut *tx)
            .await?;
            tickets.push(ticket);
        }

        tx.commit().await?;
        Ok(tickets)
    }
}
