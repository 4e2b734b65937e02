use super::store::StatsStore;
use super::types::StatsUser;
use super::warehouse::ListenWarehouse;
use crate::clock::Clock;
use crate::config::AppConfig;
use crate::users::UserDirectory;
use anyhow::Result;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

/// Periodically recomputes per-user listen statistics. Cooldown state is the
/// `last_updated` stamp of the persisted stats row; there is no separate
/// scheduler bookkeeping.
pub struct StatsJobService {
    users: Arc<dyn UserDirectory>,
    stats: Arc<dyn StatsStore>,
    warehouse: Arc<dyn ListenWarehouse>,
    clock: Arc<dyn Clock>,
    cooldown: chrono::Duration,
    poll_interval: Duration,
}

impl StatsJobService {
    pub fn new(
        users: Arc<dyn UserDirectory>,
        stats: Arc<dyn StatsStore>,
        warehouse: Arc<dyn ListenWarehouse>,
        clock: Arc<dyn Clock>,
        config: &AppConfig,
    ) -> Self {
        Self {
            users,
            stats,
            warehouse,
            clock,
            cooldown: chrono::Duration::days(config.stats_cooldown_days),
            poll_interval: Duration::from_secs(config.stats_poll_interval_seconds),
        }
    }

    /// Recompute stats for one user.
    ///
    /// Returns `Ok(false)` for the expected no-op outcomes: an incomplete
    /// user identity, or a stats row refreshed within the cooldown window.
    /// `Ok(true)` means aggregates were fetched and the row was written.
    /// Errors are warehouse/store failures only.
    pub async fn calculate_stats_for_user(&self, user: &StatsUser) -> Result<bool> {
        let (Some(user_id), Some(musicbrainz_id)) = (user.id, user.musicbrainz_id.as_deref())
        else {
            tracing::warn!("incomplete user identity passed to stats calculation, skipping");
            return Ok(false);
        };

        if let Some(last) = self.stats.last_calculated(user_id).await? {
            if self.clock.now() - last < self.cooldown {
                tracing::debug!(user = %musicbrainz_id, "stats are fresh, skipping recomputation");
                return Ok(false);
            }
        }

        tracing::info!(user = %musicbrainz_id, "calculating stats");
        let artists = self.warehouse.top_artists(musicbrainz_id).await?;
        let recordings = self.warehouse.top_recordings(musicbrainz_id).await?;
        let releases = self.warehouse.top_releases(musicbrainz_id).await?;
        let artist_count = self.warehouse.artist_count(musicbrainz_id).await?;

        self.stats
            .insert_user_stats(user_id, artists, recordings, releases, artist_count)
            .await?;
        Ok(true)
    }

    /// Sweep every registered user once. Per-user failures are logged and do
    /// not stop the sweep.
    pub async fn sweep(&self) -> Result<()> {
        let users = self.users.list().await?;
        let total = users.len();
        let mut calculated = 0usize;
        for user in &users {
            match self.calculate_stats_for_user(&StatsUser::from(user)).await {
                Ok(true) => calculated += 1,
                Ok(false) => {}
                Err(err) => {
                    tracing::warn!(user = %user.musicbrainz_id, error = %err, "stats calculation failed");
                }
            }
        }
        tracing::info!(total, calculated, "stats sweep finished");
        Ok(())
    }

    pub fn start(self: Arc<Self>, cancel: CancellationToken) {
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = tokio::time::sleep(self.poll_interval) => {}
                }

                if let Err(err) = self.sweep().await {
                    tracing::warn!(error = %err, "stats sweep failed");
                }
            }
        });
    }
}
