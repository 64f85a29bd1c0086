use std::sync::Arc;
use tokio::task::JoinHandle;

mod api;
pub use api::Api;

mod config;
pub use config::ServerConfig;
mod metrics;
pub use metrics::{HttpMetricsSnapshot, LatencySnapshot};
pub mod store;
pub use store::{ClaimOutcome, CleanupReport, Store, StoreError, StoreStats};
mod sweeper;

use metrics::HttpMetrics;

pub struct Server {
    config: ServerConfig,
    store: Arc<Store>,
    http_metrics: HttpMetrics,
}

impl Server {
    pub fn new() -> Self {
        Self::new_with_config(ServerConfig::default())
    }

    pub fn new_with_config(config: ServerConfig) -> Self {
        let store = match config.deterministic_seed {
            Some(seed) => {
                tracing::warn!(seed, "Using deterministic seed for room ids and rewards");
                Store::with_seed(seed)
            }
            None => Store::new(),
        };
        Self {
            config,
            store: Arc::new(store),
            http_metrics: HttpMetrics::default(),
        }
    }

    pub fn config(&self) -> &ServerConfig {
        &self.config
    }

    pub fn store(&self) -> &Store {
        &self.store
    }

    /// Start the cleanup sweep if an interval is configured.
    pub fn start_sweeper(&self) -> Option<JoinHandle<()>> {
        let interval = self.config.cleanup_interval()?;
        let max_age = self.config.room_max_age();
        tracing::info!(
            interval_secs = interval.as_secs(),
            max_age_secs = max_age.as_secs(),
            "Starting cleanup sweeper"
        );
        Some(sweeper::spawn(Arc::clone(&self.store), interval, max_age))
    }

    pub(crate) fn http_metrics(&self) -> &HttpMetrics {
        &self.http_metrics
    }

    pub fn http_metrics_snapshot(&self) -> HttpMetricsSnapshot {
        self.http_metrics.snapshot()
    }
}

impl Default for Server {
    fn default() -> Self {
        Self::new()
    }
}
