//! Repository dependency inversion.
//!
//! Handlers and jobs depend only on these capability-surface traits; a real
//! adapter crate (PostgreSQL, Redis) implements them out of process. The
//! in-memory fakes below exercise the traits in tests without pulling in
//! `sqlx`.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use super::activity::TaskCompletion;
use super::connection::Connection;
use super::endorsement::Endorsement;
use super::error::DomainResult;
use super::help_request::HelpRequest;
use super::progress::{Achievement, DailyProgress};
use super::student::{Student, StudentId};
use super::xp_history::XpHistoryEntry;

#[async_trait]
pub trait StudentRepository: Send + Sync {
    async fn find_by_id(&self, id: &str) -> DomainResult<Option<Student>>;
    async fn save(&self, student: &Student) -> DomainResult<()>;
    /// Stale iff `now - last_seen_at > stale_after` AND the student isn't
    /// currently online.
    async fn find_stale(&self, stale_after: chrono::Duration, now: DateTime<Utc>) -> DomainResult<Vec<StudentId>>;
    async fn list_active(&self) -> DomainResult<Vec<Student>>;
}

#[async_trait]
pub trait TaskCompletionRepository: Send + Sync {
    /// Rejects a duplicate `id`.
    async fn save(&self, completion: &TaskCompletion) -> DomainResult<()>;
    async fn count_for_student(&self, student_id: &str) -> DomainResult<u64>;
}

#[async_trait]
pub trait DailyProgressRepository: Send + Sync {
    async fn upsert(&self, progress: &DailyProgress) -> DomainResult<()>;
    async fn for_student_on(
        &self,
        student_id: &str,
        date: chrono::NaiveDate,
    ) -> DomainResult<Option<DailyProgress>>;
}

#[async_trait]
pub trait AchievementRepository: Send + Sync {
    /// Dedupes by `(student_id, achievement_type)`; returns `false` if this
    /// achievement was already recorded.
    async fn insert_if_absent(&self, achievement: &Achievement) -> DomainResult<bool>;
}

#[async_trait]
pub trait ConnectionRepository: Send + Sync {
    async fn find_between(
        &self,
        initiator_id: &str,
        receiver_id: &str,
    ) -> DomainResult<Option<Connection>>;
    async fn save(&self, connection: &Connection) -> DomainResult<()>;
}

#[async_trait]
pub trait HelpRequestRepository: Send + Sync {
    async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<HelpRequest>>;
    async fn save(&self, request: &HelpRequest) -> DomainResult<()>;
    async fn find_open_expiring_before(&self, at: DateTime<Utc>) -> DomainResult<Vec<HelpRequest>>;
}

#[async_trait]
pub trait EndorsementRepository: Send + Sync {
    /// Unique per `help_request_id`.
    async fn save(&self, endorsement: &Endorsement) -> DomainResult<()>;
}

#[async_trait]
pub trait XpHistoryRepository: Send + Sync {
    /// Append-only: never updates or removes an entry.
    async fn append(&self, entry: &XpHistoryEntry) -> DomainResult<()>;
    async fn for_student(&self, student_id: &str) -> DomainResult<Vec<XpHistoryEntry>>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fakes {
    use std::collections::HashMap;
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct InMemoryStudents {
        inner: Mutex<HashMap<String, Student>>,
    }

    impl InMemoryStudents {
        pub fn with(students: impl IntoIterator<Item = Student>) -> Self {
            let inner = students.into_iter().map(|s| (s.id.clone(), s)).collect();
            Self {
                inner: Mutex::new(inner),
            }
        }
    }

    #[async_trait]
    impl StudentRepository for InMemoryStudents {
        async fn find_by_id(&self, id: &str) -> DomainResult<Option<Student>> {
            Ok(self.inner.lock().unwrap().get(id).cloned())
        }

        async fn save(&self, student: &Student) -> DomainResult<()> {
            self.inner
                .lock()
                .unwrap()
                .insert(student.id.clone(), student.clone());
            Ok(())
        }

        async fn find_stale(
            &self,
            stale_after: chrono::Duration,
            now: DateTime<Utc>,
        ) -> DomainResult<Vec<StudentId>> {
            use super::super::student::OnlineState;
            Ok(self
                .inner
                .lock()
                .unwrap()
                .values()
                .filter(|s| {
                    s.online_state != OnlineState::Online && now - s.last_seen_at > stale_after
                })
                .map(|s| s.id.clone())
                .collect())
        }

        async fn list_active(&self) -> DomainResult<Vec<Student>> {
            use super::super::student::StudentStatus;
            Ok(self
                .inner
                .lock()
                .unwrap()
                .values()
                .filter(|s| s.status == StudentStatus::Active)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub struct InMemoryTaskCompletions {
        inner: Mutex<HashMap<Uuid, TaskCompletion>>,
        counts: Mutex<HashMap<String, u64>>,
    }

    #[async_trait]
    impl TaskCompletionRepository for InMemoryTaskCompletions {
        async fn save(&self, completion: &TaskCompletion) -> DomainResult<()> {
            let mut inner = self.inner.lock().unwrap();
            if inner.contains_key(&completion.id) {
                return Err(super::super::error::DomainError::conflict(
                    "task completion id already exists",
                ));
            }
            inner.insert(completion.id, completion.clone());
            *self
                .counts
                .lock()
                .unwrap()
                .entry(completion.student_id.clone())
                .or_default() += 1;
            Ok(())
        }

        async fn count_for_student(&self, student_id: &str) -> DomainResult<u64> {
            Ok(*self.counts.lock().unwrap().get(student_id).unwrap_or(&0))
        }
    }

    #[derive(Default)]
    pub struct InMemoryDailyProgress {
        inner: Mutex<HashMap<(String, chrono::NaiveDate), DailyProgress>>,
    }

    #[async_trait]
    impl DailyProgressRepository for InMemoryDailyProgress {
        async fn upsert(&self, progress: &DailyProgress) -> DomainResult<()> {
            self.inner.lock().unwrap().insert(
                (progress.student_id.clone(), progress.date),
                progress.clone(),
            );
            Ok(())
        }

        async fn for_student_on(
            &self,
            student_id: &str,
            date: chrono::NaiveDate,
        ) -> DomainResult<Option<DailyProgress>> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .get(&(student_id.to_string(), date))
                .cloned())
        }
    }

    #[derive(Default)]
    pub struct InMemoryAchievements {
        inner: Mutex<std::collections::HashSet<(String, String)>>,
    }

    #[async_trait]
    impl AchievementRepository for InMemoryAchievements {
        async fn insert_if_absent(&self, achievement: &Achievement) -> DomainResult<bool> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .insert((achievement.student_id.clone(), achievement.achievement_type.clone())))
        }
    }

    #[derive(Default)]
    pub struct InMemoryConnections {
        inner: Mutex<Vec<Connection>>,
    }

    #[async_trait]
    impl ConnectionRepository for InMemoryConnections {
        async fn find_between(
            &self,
            initiator_id: &str,
            receiver_id: &str,
        ) -> DomainResult<Option<Connection>> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .iter()
                .find(|c| {
                    (c.initiator_id == initiator_id && c.receiver_id == receiver_id)
                        || (c.initiator_id == receiver_id && c.receiver_id == initiator_id)
                })
                .cloned())
        }

        async fn save(&self, connection: &Connection) -> DomainResult<()> {
            let mut inner = self.inner.lock().unwrap();
            if let Some(existing) = inner.iter_mut().find(|c| c.id == connection.id) {
                *existing = connection.clone();
            } else {
                inner.push(connection.clone());
            }
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryHelpRequests {
        inner: Mutex<HashMap<Uuid, HelpRequest>>,
    }

    #[async_trait]
    impl HelpRequestRepository for InMemoryHelpRequests {
        async fn find_by_id(&self, id: Uuid) -> DomainResult<Option<HelpRequest>> {
            Ok(self.inner.lock().unwrap().get(&id).cloned())
        }

        async fn save(&self, request: &HelpRequest) -> DomainResult<()> {
            self.inner.lock().unwrap().insert(request.id, request.clone());
            Ok(())
        }

        async fn find_open_expiring_before(&self, at: DateTime<Utc>) -> DomainResult<Vec<HelpRequest>> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .values()
                .filter(|r| !r.status.is_terminal() && r.expires_at <= at)
                .cloned()
                .collect())
        }
    }

    #[derive(Default)]
    pub struct InMemoryEndorsements {
        inner: Mutex<HashMap<Uuid, Endorsement>>,
    }

    #[async_trait]
    impl EndorsementRepository for InMemoryEndorsements {
        async fn save(&self, endorsement: &Endorsement) -> DomainResult<()> {
            let mut inner = self.inner.lock().unwrap();
            if inner.contains_key(&endorsement.help_request_id) {
                return Err(super::super::error::DomainError::conflict(
                    "endorsement already exists for this help request",
                ));
            }
            inner.insert(endorsement.help_request_id, endorsement.clone());
            Ok(())
        }
    }

    #[derive(Default)]
    pub struct InMemoryXpHistory {
        inner: Mutex<Vec<XpHistoryEntry>>,
    }

    #[async_trait]
    impl XpHistoryRepository for InMemoryXpHistory {
        async fn append(&self, entry: &XpHistoryEntry) -> DomainResult<()> {
            self.inner.lock().unwrap().push(entry.clone());
            Ok(())
        }

        async fn for_student(&self, student_id: &str) -> DomainResult<Vec<XpHistoryEntry>> {
            Ok(self
                .inner
                .lock()
                .unwrap()
                .iter()
                .filter(|e| e.student_id == student_id)
                .cloned()
                .collect())
        }
    }
}
