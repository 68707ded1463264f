//! Append-only XP change log, one entry per `XPChanged` event.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::student::StudentId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct XpHistoryEntry {
    pub student_id: StudentId,
    pub previous_xp: i64,
    pub new_xp: i64,
    pub delta: i64,
    pub reason: String,
    pub task_id: Option<String>,
    pub recorded_at: DateTime<Utc>,
}

impl XpHistoryEntry {
    pub fn new(
        student_id: impl Into<String>,
        previous_xp: i64,
        new_xp: i64,
        reason: impl Into<String>,
        task_id: Option<String>,
        recorded_at: DateTime<Utc>,
    ) -> Self {
        Self {
            student_id: student_id.into(),
            previous_xp,
            new_xp,
            delta: new_xp - previous_xp,
            reason: reason.into(),
            task_id,
            recorded_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn delta_is_new_minus_previous() {
        let entry = XpHistoryEntry::new("s1", 100, 150, "sync", None, Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap());
        assert_eq!(entry.delta, 50);
    }
}
