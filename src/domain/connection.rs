//! Social-graph edges: connections between students.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{DomainError, DomainResult};
use super::student::StudentId;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionType {
    StudyBuddy,
    Mentor,
    Helper,
    Coworker,
}

impl ConnectionType {
    /// StudyBuddy and Coworker require symmetric acceptance elsewhere
    /// (out-of-scope social command handlers); Helper auto-accepts here.
    pub fn is_bidirectional(self) -> bool {
        matches!(self, ConnectionType::StudyBuddy | ConnectionType::Coworker)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum ConnectionStatus {
    Pending,
    Active,
    Declined,
    Ended,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ConnectionStats {
    pub interactions: u32,
    pub last_interaction_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Connection {
    pub id: Uuid,
    pub initiator_id: StudentId,
    pub receiver_id: StudentId,
    pub connection_type: ConnectionType,
    pub status: ConnectionStatus,
    pub context: Option<String>,
    pub stats: ConnectionStats,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Connection {
    pub fn new(
        initiator_id: impl Into<String>,
        receiver_id: impl Into<String>,
        connection_type: ConnectionType,
        context: Option<String>,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let initiator_id = initiator_id.into();
        let receiver_id = receiver_id.into();
        if initiator_id == receiver_id {
            return Err(DomainError::validation(
                "connection initiator and receiver must differ",
            ));
        }
        let status = if connection_type == ConnectionType::Helper {
            ConnectionStatus::Active
        } else {
            ConnectionStatus::Pending
        };
        Ok(Self {
            id: Uuid::new_v4(),
            initiator_id,
            receiver_id,
            connection_type,
            status,
            context,
            stats: ConnectionStats::default(),
            created_at: now,
            updated_at: now,
        })
    }

    pub fn record_interaction(&mut self, at: DateTime<Utc>) {
        self.stats.interactions += 1;
        self.stats.last_interaction_at = Some(at);
        self.updated_at = at;
    }

    pub fn transition(&mut self, to: ConnectionStatus, at: DateTime<Utc>) -> DomainResult<()> {
        let allowed = matches!(
            (self.status, to),
            (ConnectionStatus::Pending, ConnectionStatus::Active)
                | (ConnectionStatus::Pending, ConnectionStatus::Declined)
                | (ConnectionStatus::Active, ConnectionStatus::Ended)
        );
        if !allowed {
            return Err(DomainError::conflict(format!(
                "cannot transition connection from {:?} to {:?}",
                self.status, to
            )));
        }
        self.status = to;
        self.updated_at = at;
        Ok(())
    }
}
