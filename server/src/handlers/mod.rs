use axum::response::Response;
use serde::Serialize;
use uuid::Uuid;

use crate::utils::error::AppError;
use crate::utils::response::ok;

pub mod events;
pub mod reservations;
pub mod spots;

#[derive(Serialize)]
struct HealthPayload {
    status: &'static str,
    service: &'static str,
}

pub async fn health_check() -> Response {
    ok(HealthPayload {
        status: "ok",
        service: "eventspot-api",
    })
}

/// Ids that are not UUIDs cannot name anything stored, so they are reported
/// the same way as unknown ones.
pub(crate) fn parse_id(raw: &str, resource: &str) -> Result<Uuid, AppError> {
    Uuid::parse_str(raw)
        .map_err(|_| AppError::NotFound(format!("{} with id '{}' was not found", resource, raw)))
}
