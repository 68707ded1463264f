//! The events the reaction core listens for.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::domain::{StudentId, TaskCompletion};

#[derive(Debug, Clone)]
pub enum Event {
    TaskCompleted(TaskCompletedEvent),
    XpChanged(XpChangedEvent),
    StudentWentOnline { student_id: StudentId, at: DateTime<Utc> },
    StudentWentOffline { student_id: StudentId, at: DateTime<Utc> },
    HelpReceived(HelpReceivedEvent),
}

#[derive(Debug, Clone)]
pub struct TaskCompletedEvent {
    pub completion: TaskCompletion,
}

#[derive(Debug, Clone)]
pub struct XpChangedEvent {
    pub student_id: StudentId,
    pub previous_xp: i64,
    pub new_xp: i64,
    /// Why the XP moved, e.g. `"sync"` or `"task_completion"`.
    pub reason: String,
    pub task_id: Option<String>,
    pub at: DateTime<Utc>,
}

#[derive(Debug, Clone)]
pub struct HelpReceivedEvent {
    pub help_request_id: Uuid,
    pub requester_id: StudentId,
    pub helper_id: StudentId,
    pub at: DateTime<Utc>,
}
