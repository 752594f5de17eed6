use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;

use crate::handlers::parse_id;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, ok};
use crate::validation::{validate_reservation, ReserveSpotsRequest};

pub async fn reserve_spots(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    payload: Result<Json<ReserveSpotsRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let order = validate_reservation(&request)?;
    let event_id = parse_id(&event_id, "Event")?;

    let tickets = state
        .reservations
        .reserve(event_id, &order.spots, order.kind)
        .await?;
    Ok(created(tickets))
}

pub async fn list_tickets(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    Ok(ok(state.events.tickets(event_id).await?))
}
