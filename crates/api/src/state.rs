//! Application state shared across handlers.

use std::sync::Arc;

use stride_engine::Engine;

use crate::config::ApiConfig;
use crate::db::PgStore;

/// Application state shared across all handlers.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ApiConfig,
    engine: Engine<PgStore>,
}

impl AppState {
    /// Build state from loaded configuration and a ready engine.
    #[must_use]
    pub fn new(config: ApiConfig, engine: Engine<PgStore>) -> Self {
        Self {
            inner: Arc::new(AppStateInner { config, engine }),
        }
    }

    /// Application configuration.
    #[must_use]
    pub fn config(&self) -> &ApiConfig {
        &self.inner.config
    }

    /// The ledger engine.
    #[must_use]
    pub fn engine(&self) -> &Engine<PgStore> {
        &self.inner.engine
    }
}
