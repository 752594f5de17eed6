pub mod events;
pub mod spots;

pub use events::EventCatalog;
pub use spots::SpotRegistry;
