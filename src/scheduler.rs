//! Background loops: the periodic report refresh and the mission sweep.

use crate::channel::ChannelDirectory;
use crate::db::Database;
use crate::mission::MissionService;
use crate::report::{RefreshSummary, ReportReconciler};
use chrono::Utc;
use std::sync::Arc;
use tokio::time::{interval, sleep, Duration};
use tracing::{debug, error, info};

pub struct ReportLoop {
    db: Database,
    reconciler: ReportReconciler,
    directory: Arc<dyn ChannelDirectory>,
    default_interval_minutes: u64,
}

impl ReportLoop {
    pub fn new(
        db: Database,
        directory: Arc<dyn ChannelDirectory>,
        default_interval_minutes: u64,
    ) -> Self {
        Self {
            reconciler: ReportReconciler::new(db.clone()),
            db,
            directory,
            default_interval_minutes: default_interval_minutes.max(1),
        }
    }

    /// Refresh, then sleep for whatever interval is configured at that moment.
    pub async fn run(self) {
        loop {
            if let Err(e) = self.tick().await {
                error!("Report refresh cycle failed: {:#}", e);
            }
            let period = self.current_interval().await;
            debug!("Next report refresh in {:?}", period);
            sleep(period).await;
        }
    }

    /// One refresh of the configured report channel. `Ok(None)` when no
    /// channel is configured or it cannot be resolved.
    pub async fn tick(&self) -> anyhow::Result<Option<RefreshSummary>> {
        let Some(channel_id) = self.db.run_blocking(|db| db.report_channel()).await? else {
            debug!("No report channel configured, skipping refresh");
            return Ok(None);
        };
        let Some(channel) = self.directory.resolve(channel_id).await else {
            info!("Report channel {} is unavailable, skipping refresh", channel_id);
            return Ok(None);
        };
        let summary = self.reconciler.refresh(channel.as_ref()).await?;
        Ok(Some(summary))
    }

    pub async fn current_interval(&self) -> Duration {
        let stored = match self.db.run_blocking(|db| db.report_interval_minutes()).await {
            Ok(stored) => stored,
            Err(e) => {
                error!("Failed to read report interval: {:#}", e);
                None
            }
        };
        Duration::from_secs(stored.unwrap_or(self.default_interval_minutes) * 60)
    }
}

pub struct MissionSweeper {
    service: MissionService,
    period: Duration,
}

impl MissionSweeper {
    pub fn new(service: MissionService, period_secs: u64) -> Self {
        Self {
            service,
            period: Duration::from_secs(period_secs.max(1)),
        }
    }

    pub async fn run(self) {
        let mut ticker = interval(self.period);
        loop {
            ticker.tick().await;
            if let Err(e) = self.service.sweep_expired(Utc::now()).await {
                error!("Mission sweep cycle failed: {:#}", e);
            }
        }
    }
}
