use axum::routing::{get, post};
use axum::Router;
use tower_http::trace::TraceLayer;

use crate::config::{create_cors_layer, create_security_headers_layer, Config};
use crate::handlers::{events, health_check, reservations, spots};
use crate::state::AppState;

pub fn create_routes(state: AppState, config: &Config) -> Router {
    Router::new()
        .route("/health", get(health_check))
        .route("/events", post(events::create_event).get(events::list_events))
        .route(
            "/events/:event_id",
            get(events::get_event)
                .patch(events::update_event)
                .delete(events::delete_event),
        )
        .route("/events/:event_id/reserve", post(reservations::reserve_spots))
        .route("/events/:event_id/tickets", get(reservations::list_tickets))
        .route(
            "/events/:event_id/spots",
            post(spots::create_spot).get(spots::list_spots),
        )
        .route(
            "/events/:event_id/spots/:spot_id",
            get(spots::get_spot)
                .patch(spots::update_spot)
                .delete(spots::delete_spot),
        )
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(create_security_headers_layer(config.production))
        .layer(create_cors_layer(&config.cors_allowed_origins))
}
