//! Per-student activity aggregate: session, streak and recent-tasks state.

use std::collections::VecDeque;

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{DomainError, DomainResult};
use super::student::StudentId;

const RECENT_TASKS_CAP: usize = 10;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum SessionStatus {
    Active,
    Ended,
    Expired,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub id: Uuid,
    pub student_id: StudentId,
    pub started_at: DateTime<Utc>,
    pub ended_at: Option<DateTime<Utc>>,
    pub status: SessionStatus,
    pub tasks_during_session: u32,
    pub xp_during_session: i64,
}

/// Clock tolerance for a session's `started_at`: at most this far in the future.
const CLOCK_TOLERANCE: chrono::Duration = chrono::Duration::minutes(1);

impl Session {
    pub fn start(
        student_id: impl Into<String>,
        started_at: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        if started_at > now + CLOCK_TOLERANCE {
            return Err(DomainError::validation(
                "session startedAt is too far in the future",
            ));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            student_id: student_id.into(),
            started_at,
            ended_at: None,
            status: SessionStatus::Active,
            tasks_during_session: 0,
            xp_during_session: 0,
        })
    }

    pub fn is_active(&self) -> bool {
        matches!(self.status, SessionStatus::Active) && self.ended_at.is_none()
    }

    pub fn end(&mut self, at: DateTime<Utc>, expired: bool) -> DomainResult<()> {
        if !self.is_active() {
            return Err(DomainError::conflict("session is not active"));
        }
        if at < self.started_at {
            return Err(DomainError::validation("endedAt precedes startedAt"));
        }
        self.ended_at = Some(at);
        self.status = if expired {
            SessionStatus::Expired
        } else {
            SessionStatus::Ended
        };
        Ok(())
    }

    fn record_task(&mut self, xp_earned: i64) {
        self.tasks_during_session += 1;
        self.xp_during_session += xp_earned;
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TaskCompletion {
    pub id: Uuid,
    pub student_id: StudentId,
    pub task_id: String,
    pub completed_at: DateTime<Utc>,
    pub xp_earned: i64,
    pub attempts: u32,
    pub time_spent: u32,
    pub received_help_from: Option<StudentId>,
    pub session_id: Option<Uuid>,
}

impl TaskCompletion {
    pub fn new(
        student_id: impl Into<String>,
        task_id: impl Into<String>,
        completed_at: DateTime<Utc>,
        xp_earned: i64,
        attempts: u32,
        time_spent: u32,
    ) -> DomainResult<Self> {
        if xp_earned < 0 {
            return Err(DomainError::validation("xpEarned must be >= 0"));
        }
        if attempts < 1 {
            return Err(DomainError::validation("attempts must be >= 1"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            student_id: student_id.into(),
            task_id: task_id.into(),
            completed_at,
            xp_earned,
            attempts,
            time_spent,
            received_help_from: None,
            session_id: None,
        })
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Streak {
    pub current: u32,
    pub longest: u32,
    pub last_active_day: Option<NaiveDate>,
}

impl Streak {
    /// Update for a completion on calendar day `day`.
    pub fn record_day(&mut self, day: NaiveDate) {
        match self.last_active_day {
            None => {
                self.current = 1;
                self.longest = self.longest.max(1);
            }
            Some(last) if last == day => {}
            Some(last) if day - last == chrono::Duration::days(1) => {
                self.current += 1;
                self.longest = self.longest.max(self.current);
            }
            Some(_) => {
                self.current = 1;
                self.longest = self.longest.max(1);
            }
        }
        self.last_active_day = Some(day);
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ActivityTotals {
    pub tasks_completed: u64,
    pub xp_earned: i64,
    pub session_time: i64,
    pub sessions: u64,
    pub help_given: u32,
    pub help_received: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActivityAggregate {
    pub student_id: StudentId,
    pub session: Option<Session>,
    pub totals: ActivityTotals,
    pub streak: Streak,
    recent_tasks: VecDeque<TaskCompletion>,
}

impl ActivityAggregate {
    pub fn new(student_id: impl Into<String>) -> Self {
        Self {
            student_id: student_id.into(),
            session: None,
            totals: ActivityTotals::default(),
            streak: Streak::default(),
            recent_tasks: VecDeque::with_capacity(RECENT_TASKS_CAP),
        }
    }

    pub fn recent_tasks(&self) -> impl Iterator<Item = &TaskCompletion> {
        self.recent_tasks.iter()
    }

    pub fn go_online(&mut self, session: Session, now: DateTime<Utc>) -> DomainResult<()> {
        if session.student_id != self.student_id {
            return Err(DomainError::validation(
                "session belongs to a different student",
            ));
        }
        self.session = Some(session);
        let _ = now;
        Ok(())
    }

    pub fn go_offline(&mut self, at: DateTime<Utc>) -> DomainResult<()> {
        let session = self
            .session
            .as_mut()
            .ok_or_else(|| DomainError::conflict("no active session"))?;
        session.end(at, false)?;
        self.totals.session_time += (at - session.started_at).num_seconds().max(0);
        self.totals.sessions += 1;
        Ok(())
    }

    pub fn record_task_completion(&mut self, tc: TaskCompletion) {
        self.totals.tasks_completed += 1;
        self.totals.xp_earned += tc.xp_earned;
        if tc.received_help_from.is_some() {
            self.totals.help_received += 1;
        }
        self.streak.record_day(tc.completed_at.date_naive());

        if let Some(session) = self.session.as_mut().filter(|s| s.is_active()) {
            session.record_task(tc.xp_earned);
        }

        if self.recent_tasks.len() == RECENT_TASKS_CAP {
            self.recent_tasks.pop_back();
        }
        self.recent_tasks.push_front(tc);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn day(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn streak_resets_on_gap() {
        let mut s = Streak::default();
        s.record_day(day(2025, 1, 1));
        s.record_day(day(2025, 1, 2));
        assert_eq!(s.current, 2);
        s.record_day(day(2025, 1, 5));
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 2);
    }

    #[test]
    fn streak_same_day_is_noop() {
        let mut s = Streak::default();
        s.record_day(day(2025, 1, 1));
        s.record_day(day(2025, 1, 1));
        assert_eq!(s.current, 1);
        assert_eq!(s.longest, 1);
    }

    #[test]
    fn recent_tasks_capped_at_ten_newest_first() {
        let mut agg = ActivityAggregate::new("s1");
        let base = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        for i in 0..15u32 {
            let tc = TaskCompletion::new(
                "s1",
                format!("task-{i}"),
                base + chrono::Duration::hours(i as i64),
                10,
                1,
                60,
            )
            .unwrap();
            agg.record_task_completion(tc);
        }
        let ids: Vec<_> = agg.recent_tasks().map(|t| t.task_id.clone()).collect();
        assert_eq!(ids.len(), 10);
        assert_eq!(ids[0], "task-14");
        assert_eq!(ids[9], "task-5");
    }

    #[test]
    fn session_cannot_start_too_far_in_future() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let started = now + chrono::Duration::minutes(5);
        assert!(Session::start("s1", started, now).is_err());
    }

    #[test]
    fn go_offline_accumulates_totals() {
        let now = Utc.with_ymd_and_hms(2025, 1, 1, 0, 0, 0).unwrap();
        let session = Session::start("s1", now, now).unwrap();
        let mut agg = ActivityAggregate::new("s1");
        agg.go_online(session, now).unwrap();
        agg.go_offline(now + chrono::Duration::minutes(30)).unwrap();
        assert_eq!(agg.totals.session_time, 1800);
        assert_eq!(agg.totals.sessions, 1);
        assert!(agg.session.as_ref().unwrap().ended_at.is_some());
    }
}
