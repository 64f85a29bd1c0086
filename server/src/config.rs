use serde::Serialize;
use std::time::Duration;

use crate::store::DEFAULT_ROOM_MAX_AGE;

const DEFAULT_HTTP_BODY_LIMIT_BYTES: usize = 16 * 1024;

#[derive(Clone, Debug, Serialize)]
pub struct ServerConfig {
    pub http_body_limit_bytes: Option<usize>,
    /// Seed for identifiers and rewards (entropy when unset).
    pub deterministic_seed: Option<u64>,
    /// How often the cleanup sweep runs (disabled when unset).
    pub cleanup_interval_secs: Option<u64>,
    pub room_max_age_secs: Option<u64>,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_body_limit_bytes: Some(DEFAULT_HTTP_BODY_LIMIT_BYTES),
            deterministic_seed: None,
            cleanup_interval_secs: None,
            room_max_age_secs: Some(DEFAULT_ROOM_MAX_AGE.as_secs()),
        }
    }
}

impl ServerConfig {
    pub fn cleanup_interval(&self) -> Option<Duration> {
        self.cleanup_interval_secs
            .filter(|secs| *secs > 0)
            .map(Duration::from_secs)
    }

    pub fn room_max_age(&self) -> Duration {
        self.room_max_age_secs
            .map(Duration::from_secs)
            .unwrap_or(DEFAULT_ROOM_MAX_AGE)
    }
}
