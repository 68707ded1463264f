//! Periodic leaderboard rebuild: refreshes the in-memory ranking cache from
//! the upstream snapshot.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::scheduler::Job;
use crate::sync::HttpClient;
use crate::sync::dto::LeaderboardEntryDto;

#[derive(Default)]
pub struct LeaderboardCache {
    entries: RwLock<Vec<LeaderboardEntryDto>>,
}

impl LeaderboardCache {
    pub async fn entries(&self) -> Vec<LeaderboardEntryDto> {
        self.entries.read().await.clone()
    }

    async fn replace(&self, entries: Vec<LeaderboardEntryDto>) {
        *self.entries.write().await = entries;
    }
}

pub struct LeaderboardRebuildJob {
    client: Arc<HttpClient>,
    cache: Arc<LeaderboardCache>,
    page_size: u32,
}

impl LeaderboardRebuildJob {
    pub fn new(client: Arc<HttpClient>, cache: Arc<LeaderboardCache>) -> Self {
        Self {
            client,
            cache,
            page_size: 100,
        }
    }
}

#[async_trait]
impl Job for LeaderboardRebuildJob {
    async fn run(&self) -> anyhow::Result<()> {
        let entries = self.client.get_leaderboard(None, self.page_size, 0).await?;
        self.cache.replace(entries).await;
        Ok(())
    }
}
