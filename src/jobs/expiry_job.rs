//! Expiry sweep: closes help requests whose lifetime has elapsed.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use tracing::{info, warn};

use crate::domain::repo::HelpRequestRepository;
use crate::scheduler::Job;

pub struct ExpirySweepJob {
    help_requests: Arc<dyn HelpRequestRepository>,
}

impl ExpirySweepJob {
    pub fn new(help_requests: Arc<dyn HelpRequestRepository>) -> Self {
        Self { help_requests }
    }
}

#[async_trait]
impl Job for ExpirySweepJob {
    async fn run(&self) -> anyhow::Result<()> {
        let now = Utc::now();
        let due = self.help_requests.find_open_expiring_before(now).await?;
        let mut expired = 0;
        for mut request in due {
            if request.expire_if_due(now) {
                if let Err(err) = self.help_requests.save(&request).await {
                    warn!(help_request_id = %request.id, error = %err, "failed to save expired help request");
                    continue;
                }
                expired += 1;
            }
        }
        info!(expired, "expiry sweep complete");
        Ok(())
    }
}
