//! Daily digest: one notification per opted-in student summarizing yesterday.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::warn;

use crate::domain::repo::{DailyProgressRepository, StudentRepository};
use crate::notifications::{Notification, NotificationPriority, NotificationSender};
use crate::scheduler::Job;

pub struct DigestJob {
    students: Arc<dyn StudentRepository>,
    daily_progress: Arc<dyn DailyProgressRepository>,
    notifications: Arc<dyn NotificationSender>,
}

impl DigestJob {
    pub fn new(
        students: Arc<dyn StudentRepository>,
        daily_progress: Arc<dyn DailyProgressRepository>,
        notifications: Arc<dyn NotificationSender>,
    ) -> Self {
        Self {
            students,
            daily_progress,
            notifications,
        }
    }
}

#[async_trait]
impl Job for DigestJob {
    async fn run(&self) -> anyhow::Result<()> {
        let yesterday = (Utc::now() - chrono::Duration::days(1)).date_naive();
        let students = self.students.list_active().await?;

        for student in students {
            if !student.preferences.digests_enabled {
                continue;
            }
            let progress = self.daily_progress.for_student_on(&student.id, yesterday).await?;
            let Some(progress) = progress.filter(|p| p.tasks_completed > 0) else {
                continue;
            };

            let body = format!(
                "Yesterday: {} tasks, {} XP, helped {} time(s).",
                progress.tasks_completed, progress.xp_earned, progress.help_given
            );
            let notification = Notification::new(student.id.clone(), NotificationPriority::Low, "Your daily digest", body);
            if let Err(err) = self.notifications.send(notification).await {
                warn!(student_id = %student.id, error = %err, "digest send failed");
            }
        }
        Ok(())
    }
}
