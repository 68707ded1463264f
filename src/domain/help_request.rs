//! Help requests: a student-initiated request for peer help.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{DomainError, DomainResult};
use super::student::StudentId;

const DEFAULT_LIFETIME: Duration = Duration::hours(24);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Priority {
    Low,
    Normal,
    High,
    Urgent,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum HelpRequestStatus {
    Open,
    Matched,
    InProgress,
    Resolved,
    Cancelled,
    Expired,
}

impl HelpRequestStatus {
    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            HelpRequestStatus::Resolved | HelpRequestStatus::Cancelled | HelpRequestStatus::Expired
        )
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HelpRequest {
    pub id: Uuid,
    pub requester_id: StudentId,
    pub task_id: String,
    pub priority: Priority,
    pub status: HelpRequestStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub deadline_at: Option<DateTime<Utc>>,
    pub matched_helpers: Vec<StudentId>,
    pub helper_id: Option<StudentId>,
    pub resolution: Option<String>,
}

impl HelpRequest {
    pub fn new(
        requester_id: impl Into<String>,
        task_id: impl Into<String>,
        priority: Priority,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let requester_id = requester_id.into();
        if requester_id.is_empty() {
            return Err(DomainError::validation("requester id must not be empty"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            requester_id,
            task_id: task_id.into(),
            priority,
            status: HelpRequestStatus::Open,
            created_at: now,
            expires_at: now + DEFAULT_LIFETIME,
            deadline_at: None,
            matched_helpers: Vec::new(),
            helper_id: None,
            resolution: None,
        })
    }

    fn ensure_open(&self) -> DomainResult<()> {
        if self.status.is_terminal() {
            return Err(DomainError::conflict("help request is already closed"));
        }
        Ok(())
    }

    pub fn add_matched_helper(&mut self, helper_id: impl Into<String>) -> DomainResult<()> {
        self.ensure_open()?;
        let helper_id = helper_id.into();
        if helper_id == self.requester_id {
            return Err(DomainError::validation(
                "requester cannot be their own matched helper",
            ));
        }
        if !self.matched_helpers.contains(&helper_id) {
            self.matched_helpers.push(helper_id);
        }
        if self.status == HelpRequestStatus::Open {
            self.status = HelpRequestStatus::Matched;
        }
        Ok(())
    }

    pub fn assign_helper(&mut self, helper_id: impl Into<String>) -> DomainResult<()> {
        self.ensure_open()?;
        if self.helper_id.is_some() {
            return Err(DomainError::conflict("help request already has an assigned helper"));
        }
        let helper_id = helper_id.into();
        if helper_id == self.requester_id {
            return Err(DomainError::validation(
                "requester cannot be their own helper",
            ));
        }
        self.helper_id = Some(helper_id);
        self.status = HelpRequestStatus::InProgress;
        Ok(())
    }

    pub fn resolve(&mut self, resolution: impl Into<String>) -> DomainResult<()> {
        self.ensure_open()?;
        self.status = HelpRequestStatus::Resolved;
        self.resolution = Some(resolution.into());
        Ok(())
    }

    pub fn cancel(&mut self) -> DomainResult<()> {
        self.ensure_open()?;
        self.status = HelpRequestStatus::Cancelled;
        Ok(())
    }

    pub fn expire_if_due(&mut self, now: DateTime<Utc>) -> bool {
        if !self.status.is_terminal() && now >= self.expires_at {
            self.status = HelpRequestStatus::Expired;
            true
        } else {
            false
        }
    }
}
