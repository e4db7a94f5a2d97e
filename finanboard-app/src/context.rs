//! Shared state handed to every screen service.

use chrono::Utc;
use finanboard_core::{AppConfig, FinanResult, QueryKey, RecordSet};
use finanboard_mutation::{CoordinatorConfig, MutationCoordinator, Notifier};
use finanboard_storage::{CacheConfig, QueryCache, RemoteStore, StoreFetcher};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::debug;

/// One cache and one coordinator per signed-in session.
pub struct AppContext {
    config: AppConfig,
    cache: Arc<QueryCache>,
    coordinator: MutationCoordinator,
}

impl AppContext {
    pub fn new(config: AppConfig, store: Arc<dyn RemoteStore>, notifier: Arc<dyn Notifier>) -> Self {
        let fetcher = Arc::new(StoreFetcher::new(Arc::clone(&store)));
        let cache = Arc::new(QueryCache::new(fetcher, CacheConfig::from(&config)));
        let coordinator = MutationCoordinator::with_config(
            Arc::clone(&cache),
            store,
            notifier,
            CoordinatorConfig::from(&config),
        );
        Self {
            config,
            cache,
            coordinator,
        }
    }

    pub fn config(&self) -> &AppConfig {
        &self.config
    }

    pub fn cache(&self) -> &Arc<QueryCache> {
        &self.cache
    }

    pub fn coordinator(&self) -> &MutationCoordinator {
        &self.coordinator
    }

    /// Read a query, honouring the configured stale time.
    pub async fn read(&self, key: &QueryKey) -> FinanResult<RecordSet> {
        self.cache.query(key).await.map(|read| read.into_value())
    }

    /// Drop cache entries idle past the retention period.
    pub fn evict_idle(&self) -> Vec<QueryKey> {
        self.cache.evict_expired(Utc::now())
    }

    /// Evict idle entries every `period` until the handle is aborted.
    pub fn spawn_janitor(self: &Arc<Self>, period: Duration) -> JoinHandle<()> {
        let context = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticks = tokio::time::interval(period);
            loop {
                ticks.tick().await;
                let evicted = context.evict_idle();
                if !evicted.is_empty() {
                    debug!(count = evicted.len(), "janitor evicted idle queries");
                }
            }
        })
    }
}
