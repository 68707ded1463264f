//! Ancillary per-day and per-milestone records the event reaction core writes.

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};

use super::student::StudentId;

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct DailyProgress {
    pub student_id: StudentId,
    pub date: NaiveDate,
    pub tasks_completed: u32,
    pub xp_earned: i64,
    pub help_given: u32,
    pub help_received: u32,
}

impl DailyProgress {
    pub fn new(student_id: impl Into<String>, date: NaiveDate) -> Self {
        Self {
            student_id: student_id.into(),
            date,
            ..Default::default()
        }
    }

    pub fn record_task(&mut self, xp_earned: i64, received_help: bool) {
        self.tasks_completed += 1;
        self.xp_earned += xp_earned;
        if received_help {
            self.help_received += 1;
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Achievement {
    pub student_id: StudentId,
    pub achievement_type: String,
    pub awarded_at: DateTime<Utc>,
}

impl Achievement {
    pub fn milestone(student_id: impl Into<String>, milestone: u64, now: DateTime<Utc>) -> Self {
        Self {
            student_id: student_id.into(),
            achievement_type: format!("tasks_{milestone}"),
            awarded_at: now,
        }
    }
}
