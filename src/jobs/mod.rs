//! Scheduled jobs built on the reusable [`crate::scheduler::Job`] trait.

pub mod digest_job;
pub mod expiry_job;
pub mod leaderboard_job;
pub mod sync_job;

pub use digest_job::DigestJob;
pub use expiry_job::ExpirySweepJob;
pub use leaderboard_job::{LeaderboardCache, LeaderboardRebuildJob};
pub use sync_job::SyncJob;
