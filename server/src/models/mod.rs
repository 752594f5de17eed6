pub mod event;
pub mod spot;
pub mod ticket;

pub use event::{Event, EventChanges, NewEvent};
pub use spot::{Spot, SpotStatus};
pub use ticket::{Ticket, TicketKind, UnknownTicketKind};
