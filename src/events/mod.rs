//! The event-driven reaction core: idempotent, partial-failure-tolerant
//! handlers that run downstream of domain events.

pub mod error;
pub mod handlers;
pub mod types;

pub use error::ReactionReport;
pub use handlers::ReactionCore;
pub use types::{Event, HelpReceivedEvent, TaskCompletedEvent, XpChangedEvent};
