//! Shared application state.

use std::sync::Arc;

use anyhow::Result;

use rentcal_core::store::JsonStore;

use crate::config::Config;
use crate::fetch::{FeedFetcher, HttpFetcher};
use crate::scheduler::{FileGate, SyncGate};

#[derive(Clone)]
pub struct AppState {
    pub config: Config,
    pub store: Arc<JsonStore>,
    pub fetcher: Arc<dyn FeedFetcher>,
    pub gate: Arc<dyn SyncGate>,
}

impl AppState {
    pub fn new(config: Config) -> Result<Self> {
        let store = Arc::new(JsonStore::open(&config.data_dir)?);
        let fetcher = Arc::new(HttpFetcher::new(config.fetch_timeout_secs)?);
        // The gate lives in the data directory so every process sharing
        // the store shares the run state.
        let gate = Arc::new(FileGate::new(config.data_dir.join("run"))?);

        Ok(AppState {
            config,
            store,
            fetcher,
            gate,
        })
    }
}
