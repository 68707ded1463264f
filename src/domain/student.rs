//! Student identity, profile and online-state.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::{DomainError, DomainResult};

pub type StudentId = String;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum OnlineState {
    Online,
    Away,
    Offline,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum StudentStatus {
    Active,
    Inactive,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotificationPreferences {
    pub help_requests_enabled: bool,
    pub milestones_enabled: bool,
    pub digests_enabled: bool,
    /// Quiet hours as [start, end) in the student's local hour-of-day, e.g. (22, 7).
    pub quiet_hours: Option<(u8, u8)>,
}

impl Default for NotificationPreferences {
    fn default() -> Self {
        Self {
            help_requests_enabled: true,
            milestones_enabled: true,
            digests_enabled: true,
            quiet_hours: None,
        }
    }
}

impl NotificationPreferences {
    /// Whether `at` (UTC) falls inside the configured quiet-hours window.
    pub fn is_quiet_at(&self, at: DateTime<Utc>) -> bool {
        use chrono::Timelike;
        let Some((start, end)) = self.quiet_hours else {
            return false;
        };
        let hour = at.hour() as u8;
        if start <= end {
            hour >= start && hour < end
        } else {
            // Wraps midnight, e.g. (22, 7).
            hour >= start || hour < end
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Student {
    pub id: StudentId,
    pub login: String,
    pub display_name: String,
    /// Never synthesized from `login` — absence is surfaced, not papered
    /// over.
    pub email: Option<String>,
    pub xp: i64,
    pub cohort: String,
    pub status: StudentStatus,
    pub online_state: OnlineState,
    pub last_seen_at: DateTime<Utc>,
    pub preferences: NotificationPreferences,
    pub help_rating: f32,
    pub help_count: u32,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub last_synced_at: DateTime<Utc>,
}

impl Student {
    pub fn new(
        id: impl Into<String>,
        login: impl Into<String>,
        display_name: impl Into<String>,
        cohort: impl Into<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let id = id.into();
        let login = login.into();
        if id.is_empty() {
            return Err(DomainError::validation("student id must not be empty"));
        }
        if login.is_empty() {
            return Err(DomainError::validation("student login must not be empty"));
        }
        Ok(Self {
            id,
            login,
            display_name: display_name.into(),
            email: None,
            xp: 0,
            cohort: cohort.into(),
            status: StudentStatus::Active,
            online_state: OnlineState::Offline,
            last_seen_at: now,
            preferences: NotificationPreferences::default(),
            help_rating: 0.0,
            help_count: 0,
            created_at: now,
            updated_at: now,
            last_synced_at: now,
        })
    }

    pub fn set_xp(&mut self, xp: i64) -> DomainResult<()> {
        if xp < 0 {
            return Err(DomainError::validation("XP must be >= 0"));
        }
        self.xp = xp;
        Ok(())
    }

    pub fn set_help_rating(&mut self, rating: f32) -> DomainResult<()> {
        if !(0.0..=5.0).contains(&rating) {
            return Err(DomainError::validation("help rating must be in [0, 5]"));
        }
        self.help_rating = rating;
        Ok(())
    }

    pub fn set_online_state(&mut self, state: OnlineState, at: DateTime<Utc>) {
        self.online_state = state;
        self.last_seen_at = at;
    }
}
