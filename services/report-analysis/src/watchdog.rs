//! Lease Watchdog
//!
//! Reclaims leases whose holder stopped making progress: any report still
//! `analyzing` after the lease timeout is forced to `failed` with the
//! fallback summary.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinHandle;
use tracing::{error, info, warn};
use uuid::Uuid;

use healthmate_database::ReportStore;
use healthmate_models::BilingualSummary;

use crate::metrics::AnalysisMetrics;

pub struct LeaseWatchdog {
    store: Arc<dyn ReportStore>,
    lease_timeout: Duration,
    interval: Duration,
    metrics: AnalysisMetrics,
}

impl LeaseWatchdog {
    pub fn new(
        store: Arc<dyn ReportStore>,
        lease_timeout: Duration,
        interval: Duration,
        metrics: AnalysisMetrics,
    ) -> Self {
        Self {
            store,
            lease_timeout,
            interval,
            metrics,
        }
    }

    /// Reports whose lease started before this instant are stale.
    pub fn cutoff(&self, now: DateTime<Utc>) -> Result<DateTime<Utc>> {
        let timeout = chrono::Duration::from_std(self.lease_timeout).context("lease timeout out of range")?;
        Ok(now - timeout)
    }

    pub async fn sweep_once(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let cutoff = self.cutoff(now)?;
        let reclaimed = self
            .store
            .fail_stale_analyses(cutoff, &BilingualSummary::fallback())
            .await
            .context("failed to sweep stale analyses")?;

        if !reclaimed.is_empty() {
            for id in &reclaimed {
                warn!(report_id = %id, "Reclaimed stale analysis lease");
            }
            self.metrics.record_reclaimed(reclaimed.len());
        }

        Ok(reclaimed)
    }

    /// Sweep on a fixed interval for the life of the process.
    pub fn spawn(self) -> JoinHandle<()> {
        tokio::spawn(async move {
            info!(
                lease_timeout_secs = self.lease_timeout.as_secs(),
                interval_secs = self.interval.as_secs(),
                "Lease watchdog started"
            );

            let mut ticker = tokio::time::interval(self.interval);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

            loop {
                ticker.tick().await;
                if let Err(e) = self.sweep_once(Utc::now()).await {
                    error!(error = %format!("{:#}", e), "Lease watchdog sweep failed");
                }
            }
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use healthmate_database::InMemoryReportStore;
    use healthmate_models::{AnalysisStatus, FileKind, Report};

    fn watchdog(store: InMemoryReportStore, metrics: AnalysisMetrics) -> LeaseWatchdog {
        LeaseWatchdog::new(Arc::new(store), Duration::from_secs(300), Duration::from_secs(60), metrics)
    }

    #[tokio::test]
    async fn test_sweep_reclaims_only_stale_leases() {
        let store = InMemoryReportStore::new();
        let owner = Uuid::new_v4();

        let mut stale = Report::new(owner, "old.pdf".into(), FileKind::Pdf, "ref-old".into());
        stale.status = AnalysisStatus::Analyzing;
        stale.updated_at = Utc::now() - chrono::Duration::minutes(10);
        store.create(stale.clone()).await.unwrap();

        let mut fresh = Report::new(owner, "new.pdf".into(), FileKind::Pdf, "ref-new".into());
        fresh.status = AnalysisStatus::Analyzing;
        store.create(fresh.clone()).await.unwrap();

        let metrics = AnalysisMetrics::new().unwrap();
        let reclaimed = watchdog(store.clone(), metrics.clone()).sweep_once(Utc::now()).await.unwrap();

        assert_eq!(reclaimed, vec![stale.id]);
        assert_eq!(metrics.reclaimed_count(), 1);

        let stale = store.find_by_id(stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, AnalysisStatus::Failed);
        assert!(stale.summary().unwrap().is_fallback());

        let fresh = store.find_by_id(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, AnalysisStatus::Analyzing);
    }

    #[tokio::test]
    async fn test_sweep_ignores_pending_reports() {
        let store = InMemoryReportStore::new();
        let mut pending = Report::new(Uuid::new_v4(), "a.png".into(), FileKind::Image, "ref".into());
        pending.updated_at = Utc::now() - chrono::Duration::hours(2);
        store.create(pending.clone()).await.unwrap();

        let reclaimed = watchdog(store, AnalysisMetrics::new().unwrap())
            .sweep_once(Utc::now())
            .await
            .unwrap();

        assert!(reclaimed.is_empty());
    }
}
