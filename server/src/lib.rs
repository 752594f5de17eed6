//! Events, their reservable spots, and all-or-nothing batch reservations
//! served over HTTP.

pub mod catalog;
pub mod config;
pub mod handlers;
pub mod models;
pub mod reservation;
pub mod routes;
pub mod state;
pub mod store;
pub mod utils;
pub mod validation;
