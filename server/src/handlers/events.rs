use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;

use crate::handlers::parse_id;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, no_content, ok};
use crate::validation::{
    validate_event_changes, validate_new_event, CreateEventRequest, UpdateEventRequest,
};

pub async fn create_event(
    State(state): State<AppState>,
    payload: Result<Json<CreateEventRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let fields = validate_new_event(&request)?;
    Ok(created(state.events.create(fields).await?))
}

pub async fn list_events(State(state): State<AppState>) -> Result<Response, AppError> {
    Ok(ok(state.events.find_all().await?))
}

pub async fn get_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    Ok(ok(state.events.find_one(event_id).await?))
}

pub async fn update_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    payload: Result<Json<UpdateEventRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let changes = validate_event_changes(&request)?;
    let event_id = parse_id(&event_id, "Event")?;
    Ok(ok(state.events.update(event_id, changes).await?))
}

pub async fn delete_event(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    state.events.remove(event_id).await?;
    Ok(no_content())
}
