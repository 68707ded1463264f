//! Endorsements: a rating left on a resolved help exchange.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::error::{DomainError, DomainResult};
use super::student::StudentId;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Endorsement {
    pub id: Uuid,
    pub giver_id: StudentId,
    pub receiver_id: StudentId,
    pub help_request_id: Uuid,
    pub task_id: String,
    pub endorsement_type: String,
    pub rating: u8,
    pub comment: Option<String>,
    pub is_public: bool,
    pub created_at: DateTime<Utc>,
}

impl Endorsement {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        giver_id: impl Into<String>,
        receiver_id: impl Into<String>,
        help_request_id: Uuid,
        task_id: impl Into<String>,
        endorsement_type: impl Into<String>,
        rating: u8,
        comment: Option<String>,
        is_public: bool,
        now: DateTime<Utc>,
    ) -> DomainResult<Self> {
        let giver_id = giver_id.into();
        let receiver_id = receiver_id.into();
        if giver_id == receiver_id {
            return Err(DomainError::validation(
                "endorsement giver and receiver must differ",
            ));
        }
        if !(1..=5).contains(&rating) {
            return Err(DomainError::validation("rating must be in [1, 5]"));
        }
        Ok(Self {
            id: Uuid::new_v4(),
            giver_id,
            receiver_id,
            help_request_id,
            task_id: task_id.into(),
            endorsement_type: endorsement_type.into(),
            rating,
            comment,
            is_public,
            created_at: now,
        })
    }
}
