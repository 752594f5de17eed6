use axum::extract::rejection::JsonRejection;
use axum::extract::{Path, State};
use axum::response::Response;
use axum::Json;

use crate::handlers::parse_id;
use crate::state::AppState;
use crate::utils::error::AppError;
use crate::utils::response::{created, no_content, ok};
use crate::validation::{
    validate_spot_name, validate_spot_rename, CreateSpotRequest, UpdateSpotRequest,
};

pub async fn create_spot(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
    payload: Result<Json<CreateSpotRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let name = validate_spot_name(&request)?;
    let event_id = parse_id(&event_id, "Event")?;
    Ok(created(state.spots.create(event_id, name).await?))
}

pub async fn list_spots(
    State(state): State<AppState>,
    Path(event_id): Path<String>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    Ok(ok(state.spots.find_all(event_id).await?))
}

pub async fn get_spot(
    State(state): State<AppState>,
    Path((event_id, spot_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    let spot_id = parse_id(&spot_id, "Spot")?;
    Ok(ok(state.spots.find_one(event_id, spot_id).await?))
}

pub async fn update_spot(
    State(state): State<AppState>,
    Path((event_id, spot_id)): Path<(String, String)>,
    payload: Result<Json<UpdateSpotRequest>, JsonRejection>,
) -> Result<Response, AppError> {
    let Json(request) = payload?;
    let name = validate_spot_rename(&request)?;
    let event_id = parse_id(&event_id, "Event")?;
    let spot_id = parse_id(&spot_id, "Spot")?;
    Ok(ok(state.spots.update(event_id, spot_id, name).await?))
}

pub async fn delete_spot(
    State(state): State<AppState>,
    Path((event_id, spot_id)): Path<(String, String)>,
) -> Result<Response, AppError> {
    let event_id = parse_id(&event_id, "Event")?;
    let spot_id = parse_id(&spot_id, "Spot")?;
    state.spots.remove(event_id, spot_id).await?;
    Ok(no_content())
}
