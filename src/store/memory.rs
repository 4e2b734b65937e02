use super::{Listen, ListenStore, ListenWindow, ResolvedWindow};
use crate::clock::Clock;
use anyhow::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;

/// In-memory listen store, keyed by lowercased user name. Backs demo mode
/// and tests; query semantics match the Postgres store exactly.
pub struct MemoryListenStore {
    clock: Arc<dyn Clock>,
    listens: RwLock<HashMap<String, Vec<Listen>>>,
}

impl MemoryListenStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            clock,
            listens: RwLock::new(HashMap::new()),
        }
    }
}

#[async_trait]
impl ListenStore for MemoryListenStore {
    async fn insert(&self, listens: &[Listen]) -> Result<()> {
        let mut all = self.listens.write().await;
        for listen in listens {
            all.entry(listen.user_name.to_lowercase())
                .or_default()
                .push(listen.clone());
        }
        Ok(())
    }

    async fn fetch_listens(&self, user_name: &str, window: ListenWindow) -> Result<Vec<Listen>> {
        let all = self.listens.read().await;
        let Some(listens) = all.get(&user_name.to_lowercase()) else {
            return Ok(Vec::new());
        };

        let selected: Vec<Listen> = match window.resolve(self.clock.as_ref()) {
            ResolvedWindow::Before { to_ts } => {
                let mut matching: Vec<Listen> = listens
                    .iter()
                    .filter(|listen| listen.listened_at < to_ts)
                    .cloned()
                    .collect();
                matching.sort_by(|a, b| b.listened_at.cmp(&a.listened_at));
                matching.truncate(window.limit);
                matching
            }
            ResolvedWindow::After { from_ts } => {
                // The oldest listens above the bound, so a caller paging
                // forward in time sees the ones adjacent to from_ts.
                let mut matching: Vec<Listen> = listens
                    .iter()
                    .filter(|listen| listen.listened_at > from_ts)
                    .cloned()
                    .collect();
                matching.sort_by(|a, b| a.listened_at.cmp(&b.listened_at));
                matching.truncate(window.limit);
                matching.reverse();
                matching
            }
        };

        Ok(selected)
    }
}
