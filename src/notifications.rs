//! Notification queue interface. The concrete messaging transport (push,
//! email, in-app feed) is a declared collaborator implemented elsewhere.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::domain::{DomainResult, StudentId};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum NotificationPriority {
    Low,
    Normal,
    High,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    pub recipient_id: StudentId,
    pub priority: NotificationPriority,
    pub title: String,
    pub body: String,
}

impl Notification {
    pub fn new(
        recipient_id: impl Into<String>,
        priority: NotificationPriority,
        title: impl Into<String>,
        body: impl Into<String>,
    ) -> Self {
        Self {
            recipient_id: recipient_id.into(),
            priority,
            title: title.into(),
            body: body.into(),
        }
    }
}

#[async_trait]
pub trait NotificationSender: Send + Sync {
    async fn send(&self, notification: Notification) -> DomainResult<()>;
}

#[cfg(any(test, feature = "test-support"))]
pub mod fakes {
    use std::sync::Mutex;

    use super::*;

    #[derive(Default)]
    pub struct RecordingSender {
        pub sent: Mutex<Vec<Notification>>,
    }

    #[async_trait]
    impl NotificationSender for RecordingSender {
        async fn send(&self, notification: Notification) -> DomainResult<()> {
            self.sent.lock().unwrap().push(notification);
            Ok(())
        }
    }
}
