//! Community hub: upstream sync, job scheduling and event reactions for an
//! online learning platform's collaboration surface.

pub mod config;
pub mod domain;
pub mod events;
pub mod jobs;
pub mod notifications;
pub mod scheduler;
pub mod sync;

pub use config::HubConfig;
