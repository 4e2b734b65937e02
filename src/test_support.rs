use crate::clock::{Clock, FixedClock};
use crate::config::AppConfig;
use crate::state::AppState;
use crate::stats::MemoryStatsStore;
use crate::store::{Listen, ListenStore, ListenWindow, MemoryListenStore, TrackMetadata};
use crate::users::MemoryUserDirectory;
use anyhow::Result;
use async_trait::async_trait;
use std::sync::{Arc, Mutex};

/// Wall-clock anchor the route and store tests pin the injected clock to.
pub const TEST_EPOCH: i64 = 1_520_946_608;

pub fn test_config() -> AppConfig {
    AppConfig {
        database_url: String::new(),
        demo_mode: true,
        enable_stats_jobs: false,
        stats_cooldown_days: 7,
        stats_poll_interval_seconds: 3600,
        warehouse_credentials_var: "LISTEND_WAREHOUSE_CREDENTIALS".to_string(),
    }
}

pub fn test_clock() -> Arc<dyn Clock> {
    Arc::new(FixedClock::at_epoch(TEST_EPOCH))
}

pub fn test_state_with_store(store: Arc<dyn ListenStore>) -> AppState {
    let clock = test_clock();
    AppState {
        config: test_config(),
        clock: clock.clone(),
        store,
        users: Arc::new(MemoryUserDirectory::new()),
        stats: Arc::new(MemoryStatsStore::new(clock)),
    }
}

pub fn test_state() -> AppState {
    test_state_with_store(Arc::new(MemoryListenStore::new(test_clock())))
}

pub fn sample_listen(user_name: &str, listened_at: i64) -> Listen {
    Listen {
        user_name: user_name.to_string(),
        listened_at,
        track_metadata: TrackMetadata {
            artist_name: "Kishore Kumar".to_string(),
            track_name: format!("Track at {listened_at}"),
            release_name: Some("Greatest Hits".to_string()),
            additional_info: serde_json::json!({}),
        },
    }
}

/// Listen store that records every fetch window before delegating to an
/// in-memory store, so handler tests can assert exactly what the HTTP
/// boundary asked for.
pub struct RecordingListenStore {
    inner: MemoryListenStore,
    windows: Mutex<Vec<ListenWindow>>,
}

impl RecordingListenStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryListenStore::new(test_clock()),
            windows: Mutex::new(Vec::new()),
        }
    }

    pub fn fetched_windows(&self) -> Vec<ListenWindow> {
        self.windows.lock().expect("windows lock").clone()
    }

    pub fn fetch_count(&self) -> usize {
        self.windows.lock().expect("windows lock").len()
    }
}

#[async_trait]
impl ListenStore for RecordingListenStore {
    async fn insert(&self, listens: &[Listen]) -> Result<()> {
        self.inner.insert(listens).await
    }

    async fn fetch_listens(&self, user_name: &str, window: ListenWindow) -> Result<Vec<Listen>> {
        self.windows.lock().expect("windows lock").push(window);
        self.inner.fetch_listens(user_name, window).await
    }
}
