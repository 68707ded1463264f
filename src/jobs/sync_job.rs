//! Periodic upstream sync: pulls a delta, maps it, and persists it.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::domain::repo::{StudentRepository, TaskCompletionRepository};
use crate::scheduler::Job;
use crate::sync::{map_sync_delta, HttpClient};

pub struct SyncJob {
    client: Arc<HttpClient>,
    students: Arc<dyn StudentRepository>,
    task_completions: Arc<dyn TaskCompletionRepository>,
    sync_token: Mutex<Option<String>>,
}

impl SyncJob {
    pub fn new(
        client: Arc<HttpClient>,
        students: Arc<dyn StudentRepository>,
        task_completions: Arc<dyn TaskCompletionRepository>,
    ) -> Self {
        Self {
            client,
            students,
            task_completions,
            sync_token: Mutex::new(None),
        }
    }
}

#[async_trait]
impl Job for SyncJob {
    async fn run(&self) -> anyhow::Result<()> {
        let token = self.sync_token.lock().await.clone();
        let delta = self.client.get_sync_delta(token.as_deref()).await?;

        let mut previous = HashMap::new();
        for dto in &delta.students {
            if let Some(student) = self.students.find_by_id(&dto.id).await? {
                previous.insert(student.id.clone(), student);
            }
        }

        let now = Utc::now();
        let mapped = map_sync_delta(&delta, &previous, now);
        for err in &mapped.errors {
            warn!(entity = %err.entity, message = %err.message, "sync record skipped");
        }

        for student in &mapped.students {
            self.students.save(student).await?;
        }
        for completion in &mapped.task_completions {
            self.task_completions.save(completion).await?;
        }

        info!(
            students = mapped.students.len(),
            task_completions = mapped.task_completions.len(),
            errors = mapped.errors.len(),
            "upstream sync complete"
        );

        *self.sync_token.lock().await = Some(mapped.next_sync_token);
        Ok(())
    }
}
