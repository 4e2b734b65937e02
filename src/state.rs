use crate::clock::Clock;
use crate::config::AppConfig;
use crate::stats::StatsStore;
use crate::store::ListenStore;
use crate::users::UserDirectory;
use std::sync::Arc;

/// Capabilities behind the HTTP handlers. Every collaborator sits behind a
/// trait so construction time decides between Postgres and in-memory
/// implementations.
#[derive(Clone)]
pub struct AppState {
    pub config: AppConfig,
    pub clock: Arc<dyn Clock>,
    pub store: Arc<dyn ListenStore>,
    pub users: Arc<dyn UserDirectory>,
    pub stats: Arc<dyn StatsStore>,
}
