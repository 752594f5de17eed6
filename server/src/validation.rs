//! Request bodies and the guards that turn them into validated domain input.
//!
//! Every guard runs before any store call and reports the first violated rule
//! as `AppError::ValidationError`.

use chrono::{DateTime, NaiveDateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::models::{EventChanges, NewEvent, TicketKind};
use crate::utils::error::AppError;

pub const MAX_TEXT_LENGTH: usize = 255;

const NAME_RULE: &str = "Name is required and must be less than 256 characters";
const DESCRIPTION_RULE: &str = "Description is required and must be less than 256 characters";
const DATE_RULE: &str = "Date is required and must be in ISO8601 format";
const PRICE_RULE: &str = "Price is required and must be greater than or equal to 0";
const SPOTS_RULE: &str = "Spots is required and must be a non-empty array of strings";
const TICKET_KIND_RULE: &str = "Ticket kind is required and must be full or half";

#[derive(Debug, Default, Deserialize)]
pub struct CreateEventRequest {
    pub name: Option<String>,
    pub description: Option<String>,
    pub date: Option<String>,
    pub price: Option<f64>,
}

/// Same fields as creation, all optional.
pub type UpdateEventRequest = CreateEventRequest;

#[derive(Debug, Default, Deserialize)]
pub struct CreateSpotRequest {
    pub name: Option<String>,
}

/// Only the name of a spot can be edited; its status belongs to reservations.
pub type UpdateSpotRequest = CreateSpotRequest;

#[derive(Debug, Default, Deserialize)]
pub struct ReserveSpotsRequest {
    pub spots: Option<Vec<String>>,
    pub ticket_kind: Option<String>,
}

/// A reservation request that passed the shape check.
#[derive(Debug, Clone, PartialEq)]
pub struct ReservationOrder {
    pub spots: Vec<String>,
    pub kind: TicketKind,
}

fn invalid(rule: &str) -> AppError {
    AppError::ValidationError(rule.to_string())
}

fn bounded_text(value: Option<&str>, rule: &str) -> Result<String, AppError> {
    match value {
        Some(text) if !text.is_empty() && text.chars().count() <= MAX_TEXT_LENGTH => {
            Ok(text.to_string())
        }
        _ => Err(invalid(rule)),
    }
}

/// Accepts `YYYY-MM-DDTHH:MM:SS[.fraction][Z|±HH:MM]`, case-insensitive.
/// A timestamp without an offset is taken as UTC.
pub fn parse_iso8601(raw: &str) -> Option<DateTime<Utc>> {
    let normalized = raw.to_ascii_uppercase();
    let bytes = normalized.as_bytes();
    let shaped = bytes.len() >= 19
        && [(4, b'-'), (7, b'-'), (10, b'T'), (13, b':'), (16, b':')]
            .iter()
            .all(|&(at, expected)| bytes[at] == expected);
    if !shaped {
        return None;
    }

    if let Ok(with_offset) = DateTime::parse_from_rfc3339(&normalized) {
        return Some(with_offset.with_timezone(&Utc));
    }
    NaiveDateTime::parse_from_str(&normalized, "%Y-%m-%dT%H:%M:%S%.f")
        .ok()
        .map(|naive| naive.and_utc())
}

fn date(value: Option<&str>) -> Result<DateTime<Utc>, AppError> {
    value.and_then(parse_iso8601).ok_or_else(|| invalid(DATE_RULE))
}

fn price(value: Option<f64>) -> Result<Decimal, AppError> {
    match value {
        Some(amount) if amount.is_finite() && amount >= 0.0 => {
            Decimal::try_from(amount).map_err(|_| invalid(PRICE_RULE))
        }
        _ => Err(invalid(PRICE_RULE)),
    }
}

pub fn validate_new_event(request: &CreateEventRequest) -> Result<NewEvent, AppError> {
    Ok(NewEvent {
        name: bounded_text(request.name.as_deref(), NAME_RULE)?,
        description: bounded_text(request.description.as_deref(), DESCRIPTION_RULE)?,
        date: date(request.date.as_deref())?,
        price: price(request.price)?,
    })
}

/// Provided fields follow the creation rules; absent fields stay unchanged.
pub fn validate_event_changes(request: &UpdateEventRequest) -> Result<EventChanges, AppError> {
    Ok(EventChanges {
        name: request
            .name
            .as_deref()
            .map(|name| bounded_text(Some(name), NAME_RULE))
            .transpose()?,
        description: request
            .description
            .as_deref()
            .map(|text| bounded_text(Some(text), DESCRIPTION_RULE))
            .transpose()?,
        date: request
            .date
            .as_deref()
            .map(|raw| date(Some(raw)))
            .transpose()?,
        price: request.price.map(|amount| price(Some(amount))).transpose()?,
    })
}

pub fn validate_spot_name(request: &CreateSpotRequest) -> Result<String, AppError> {
    bounded_text(request.name.as_deref(), NAME_RULE)
}

pub fn validate_spot_rename(request: &UpdateSpotRequest) -> Result<Option<String>, AppError> {
    request
        .name
        .as_deref()
        .map(|name| bounded_text(Some(name), NAME_RULE))
        .transpose()
}

pub fn validate_reservation(request: &ReserveSpotsRequest) -> Result<ReservationOrder, AppError> {
    let spots = match &request.spots {
        Some(spots) if !spots.is_empty() => spots.clone(),
        _ => return Err(invalid(SPOTS_RULE)),
    };

    let kind = request
        .ticket_kind
        .as_deref()
        .and_then(|raw| raw.parse::<TicketKind>().ok())
        .ok_or_else(|| invalid(TICKET_KIND_RULE))?;

    Ok(ReservationOrder { spots, kind })
}
