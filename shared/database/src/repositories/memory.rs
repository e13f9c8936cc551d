//! In-memory report store.
//!
//! Mirrors the Postgres repository's conditional-update semantics under a
//! single write lock, so lease behaviour can be exercised without a database.

use anyhow::{bail, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use uuid::Uuid;

use healthmate_models::{AnalysisStatus, BilingualSummary, Report, ReportFilter, ReportPage};

use super::ReportStore;

#[derive(Clone, Default)]
pub struct InMemoryReportStore {
    reports: Arc<RwLock<HashMap<Uuid, Report>>>,
}

impl InMemoryReportStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ReportStore for InMemoryReportStore {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>> {
        let reports = self.reports.read().await;
        Ok(reports.get(&id).cloned())
    }

    async fn create(&self, report: Report) -> Result<Report> {
        let mut reports = self.reports.write().await;
        if reports.contains_key(&report.id) {
            bail!("Report {} already exists", report.id);
        }
        reports.insert(report.id, report.clone());
        Ok(report)
    }

    async fn acquire_lease(&self, id: Uuid, expected: AnalysisStatus, lease: Uuid) -> Result<bool> {
        let mut reports = self.reports.write().await;
        match reports.get_mut(&id) {
            Some(report) if report.status == expected => {
                report.status = AnalysisStatus::Analyzing;
                report.analysis_lease = Some(lease);
                report.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn commit_analysis(
        &self,
        id: Uuid,
        lease: Uuid,
        status: AnalysisStatus,
        summary: &BilingualSummary,
    ) -> Result<bool> {
        if !status.is_terminal() {
            bail!("cannot commit non-terminal status {}", status);
        }

        let mut reports = self.reports.write().await;
        match reports.get_mut(&id) {
            Some(report) if report.status == AnalysisStatus::Analyzing && report.analysis_lease == Some(lease) => {
                report.status = status;
                report.summary_en = Some(summary.english.clone());
                report.summary_ur = Some(summary.urdu.clone());
                report.analysis_lease = None;
                report.updated_at = Utc::now();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn find_recent_completed(&self, owner: Uuid, limit: u32) -> Result<Vec<Report>> {
        let reports = self.reports.read().await;
        let mut completed: Vec<Report> = reports
            .values()
            .filter(|r| r.owner == owner && r.status == AnalysisStatus::Completed && !r.archived)
            .cloned()
            .collect();

        completed.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        completed.truncate(limit as usize);
        Ok(completed)
    }

    async fn list_for_owner(&self, owner: Uuid, filter: &ReportFilter) -> Result<ReportPage> {
        let reports = self.reports.read().await;
        let mut matching: Vec<Report> = reports
            .values()
            .filter(|r| r.owner == owner && filter.matches(r))
            .cloned()
            .collect();

        matching.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        let total = matching.len() as u64;
        let data = matching
            .into_iter()
            .skip(filter.offset() as usize)
            .take(filter.limit() as usize)
            .collect();

        Ok(ReportPage::new(data, filter, total))
    }

    async fn fail_stale_analyses(&self, cutoff: DateTime<Utc>, summary: &BilingualSummary) -> Result<Vec<Uuid>> {
        let mut reports = self.reports.write().await;
        let now = Utc::now();
        let mut reclaimed = Vec::new();

        for report in reports.values_mut() {
            if report.status == AnalysisStatus::Analyzing && report.updated_at < cutoff {
                report.status = AnalysisStatus::Failed;
                report.summary_en = Some(summary.english.clone());
                report.summary_ur = Some(summary.urdu.clone());
                report.analysis_lease = None;
                report.updated_at = now;
                reclaimed.push(report.id);
            }
        }

        Ok(reclaimed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;
    use healthmate_models::FileKind;

    fn report_for(owner: Uuid) -> Report {
        Report::new(owner, "cbc.pdf".to_string(), FileKind::Pdf, "https://files.example.com/cbc.pdf".to_string())
    }

    #[tokio::test]
    async fn test_acquire_lease_is_conditional() {
        let store = InMemoryReportStore::new();
        let report = store.create(report_for(Uuid::new_v4())).await.unwrap();

        assert!(store.acquire_lease(report.id, AnalysisStatus::Pending, Uuid::new_v4()).await.unwrap());
        assert!(!store.acquire_lease(report.id, AnalysisStatus::Pending, Uuid::new_v4()).await.unwrap());
        assert!(!store.acquire_lease(Uuid::new_v4(), AnalysisStatus::Pending, Uuid::new_v4()).await.unwrap());

        let stored = store.find_by_id(report.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Analyzing);
        assert!(stored.analysis_lease.is_some());
    }

    #[tokio::test]
    async fn test_commit_requires_lease() {
        let store = InMemoryReportStore::new();
        let report = store.create(report_for(Uuid::new_v4())).await.unwrap();
        let summary = BilingualSummary::new("Hemoglobin is low", "Hemoglobin kam hai");
        let lease = Uuid::new_v4();

        assert!(!store.commit_analysis(report.id, lease, AnalysisStatus::Completed, &summary).await.unwrap());

        store.acquire_lease(report.id, AnalysisStatus::Pending, lease).await.unwrap();
        assert!(!store.commit_analysis(report.id, Uuid::new_v4(), AnalysisStatus::Completed, &summary).await.unwrap());
        assert!(store.commit_analysis(report.id, lease, AnalysisStatus::Completed, &summary).await.unwrap());

        let stored = store.find_by_id(report.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Completed);
        assert_eq!(stored.summary(), Some(summary));
        assert_eq!(stored.analysis_lease, None);
    }

    #[tokio::test]
    async fn test_reclaimed_lease_cannot_commit_over_new_holder() {
        let store = InMemoryReportStore::new();
        let report = store.create(report_for(Uuid::new_v4())).await.unwrap();
        let (first, second) = (Uuid::new_v4(), Uuid::new_v4());

        store.acquire_lease(report.id, AnalysisStatus::Pending, first).await.unwrap();
        store
            .fail_stale_analyses(Utc::now() + Duration::minutes(1), &BilingualSummary::fallback())
            .await
            .unwrap();
        assert!(store.acquire_lease(report.id, AnalysisStatus::Failed, second).await.unwrap());

        let late = BilingualSummary::new("stale", "purana");
        assert!(!store.commit_analysis(report.id, first, AnalysisStatus::Completed, &late).await.unwrap());

        let stored = store.find_by_id(report.id).await.unwrap().unwrap();
        assert_eq!(stored.status, AnalysisStatus::Analyzing);
        assert_eq!(stored.analysis_lease, Some(second));
    }

    #[tokio::test]
    async fn test_commit_rejects_non_terminal_status() {
        let store = InMemoryReportStore::new();
        let report = store.create(report_for(Uuid::new_v4())).await.unwrap();
        let lease = Uuid::new_v4();
        store.acquire_lease(report.id, AnalysisStatus::Pending, lease).await.unwrap();

        let result = store
            .commit_analysis(report.id, lease, AnalysisStatus::Pending, &BilingualSummary::fallback())
            .await;
        assert!(result.is_err());
    }

    #[tokio::test]
    async fn test_recent_completed_skips_archived_and_orders_newest_first() {
        let store = InMemoryReportStore::new();
        let owner = Uuid::new_v4();
        let base = Utc::now();

        for i in 0..7 {
            let mut report = report_for(owner);
            report.status = AnalysisStatus::Completed;
            report.summary_en = Some(format!("summary {}", i));
            report.summary_ur = Some(format!("khulasa {}", i));
            report.created_at = base - Duration::days(i);
            report.archived = i == 0;
            store.create(report).await.unwrap();
        }

        let recent = store.find_recent_completed(owner, 5).await.unwrap();
        assert_eq!(recent.len(), 5);
        assert_eq!(recent[0].summary_en.as_deref(), Some("summary 1"));
        assert!(recent.windows(2).all(|w| w[0].created_at >= w[1].created_at));
    }

    #[tokio::test]
    async fn test_fail_stale_only_touches_old_leases() {
        let store = InMemoryReportStore::new();
        let owner = Uuid::new_v4();

        let mut stale = report_for(owner);
        stale.status = AnalysisStatus::Analyzing;
        stale.updated_at = Utc::now() - Duration::minutes(10);
        let stale = store.create(stale).await.unwrap();

        let mut fresh = report_for(owner);
        fresh.status = AnalysisStatus::Analyzing;
        let fresh = store.create(fresh).await.unwrap();

        let reclaimed = store
            .fail_stale_analyses(Utc::now() - Duration::minutes(5), &BilingualSummary::fallback())
            .await
            .unwrap();

        assert_eq!(reclaimed, vec![stale.id]);
        let stale = store.find_by_id(stale.id).await.unwrap().unwrap();
        assert_eq!(stale.status, AnalysisStatus::Failed);
        assert!(stale.summary().unwrap().is_fallback());
        let fresh = store.find_by_id(fresh.id).await.unwrap().unwrap();
        assert_eq!(fresh.status, AnalysisStatus::Analyzing);
    }

    #[tokio::test]
    async fn test_listing_filters_and_paginates() {
        let store = InMemoryReportStore::new();
        let owner = Uuid::new_v4();

        for i in 0..12 {
            let mut report = report_for(owner);
            report.file_kind = if i % 3 == 0 { FileKind::Image } else { FileKind::Pdf };
            report.created_at = Utc::now() - Duration::hours(i);
            store.create(report).await.unwrap();
        }
        store.create(report_for(Uuid::new_v4())).await.unwrap();

        let filter = ReportFilter { page: Some(2), limit: Some(5), ..Default::default() };
        let page = store.list_for_owner(owner, &filter).await.unwrap();
        assert_eq!(page.pagination.total, 12);
        assert_eq!(page.pagination.pages, 3);
        assert_eq!(page.data.len(), 5);

        let images = ReportFilter { file_kind: Some(FileKind::Image), ..Default::default() };
        let page = store.list_for_owner(owner, &images).await.unwrap();
        assert_eq!(page.pagination.total, 4);
        assert!(page.data.iter().all(|r| r.file_kind == FileKind::Image));
    }
}
