//! Insights Aggregator
//!
//! Reads only terminal `completed` reports, so it needs no lease.

use std::sync::Arc;
use tracing::{info, warn};
use uuid::Uuid;

use healthmate_database::ReportStore;
use healthmate_models::HealthInsights;
use healthmate_utils::{HealthMateError, HealthMateResult};

use crate::ai_client::{AiAdapter, RetryPolicy};
use crate::prompt::build_insights_prompt;

pub struct InsightsAggregator {
    store: Arc<dyn ReportStore>,
    adapter: Arc<AiAdapter>,
    retry: RetryPolicy,
    limit: u32,
}

impl InsightsAggregator {
    pub fn new(store: Arc<dyn ReportStore>, adapter: Arc<AiAdapter>, retry: RetryPolicy, limit: u32) -> Self {
        Self {
            store,
            adapter,
            retry,
            limit,
        }
    }

    pub async fn get_insights(&self, user_id: Uuid) -> HealthMateResult<HealthInsights> {
        let reports = self
            .store
            .find_recent_completed(user_id, self.limit)
            .await
            .map_err(|e| HealthMateError::persistence(format!("{:#}", e)))?;

        if reports.is_empty() {
            return Ok(HealthInsights::empty());
        }

        let prompt = build_insights_prompt(&reports);
        let insights = self
            .retry
            .run(|| self.adapter.invoke(&prompt, None))
            .await
            .map_err(|e| {
                warn!(user_id = %user_id, kind = e.kind.as_str(), error = %e, "Insights generation failed");
                HealthMateError::upstream("generative-ai", e.to_string())
            })?;

        info!(user_id = %user_id, report_count = reports.len(), "Generated health insights");

        Ok(HealthInsights::new(
            insights.trim().to_string(),
            reports.len(),
            reports.first().map(|r| r.created_at),
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use healthmate_database::InMemoryReportStore;
    use healthmate_models::{AnalysisStatus, FileKind, Report, NO_REPORTS_INSIGHT};

    use crate::ai_client::ServiceError;
    use crate::metrics::AnalysisMetrics;
    use crate::test_support::{adapter, fast_retry, ScriptedService};

    fn aggregator(store: InMemoryReportStore, service: Arc<ScriptedService>) -> InsightsAggregator {
        InsightsAggregator::new(
            Arc::new(store),
            adapter(service, AnalysisMetrics::new().unwrap()),
            fast_retry(),
            5,
        )
    }

    async fn completed(store: &InMemoryReportStore, owner: Uuid, days_ago: i64, summary: &str) -> Report {
        let mut report = Report::new(owner, "cbc.pdf".into(), FileKind::Pdf, "ref".into());
        report.status = AnalysisStatus::Completed;
        report.summary_en = Some(summary.to_string());
        report.summary_ur = Some("kuch".to_string());
        report.created_at = Utc::now() - Duration::days(days_ago);
        store.create(report).await.unwrap()
    }

    #[tokio::test]
    async fn test_no_reports_returns_static_message() {
        let service = ScriptedService::replying(vec![]);
        let insights = aggregator(InMemoryReportStore::new(), service.clone())
            .get_insights(Uuid::new_v4())
            .await
            .unwrap();

        assert_eq!(insights.total_reports, 0);
        assert_eq!(insights.insights, NO_REPORTS_INSIGHT);
        assert!(insights.last_analyzed.is_none());
        assert!(service.requests().is_empty());
    }

    #[tokio::test]
    async fn test_limits_to_five_newest() {
        let store = InMemoryReportStore::new();
        let owner = Uuid::new_v4();
        for day in 0..7 {
            completed(&store, owner, day, &format!("summary from day {}", day)).await;
        }
        let service = ScriptedService::replying(vec![Ok(" Your iron levels are improving. ".into())]);

        let insights = aggregator(store, service.clone()).get_insights(owner).await.unwrap();

        assert_eq!(insights.total_reports, 5);
        assert_eq!(insights.insights, "Your iron levels are improving.");
        let requests = service.requests();
        let prompt = &requests[0].prompt;
        assert!(prompt.contains("summary from day 4"));
        assert!(!prompt.contains("summary from day 5"));
        assert!(prompt.find("day 0").unwrap() < prompt.find("day 4").unwrap());
    }

    #[tokio::test]
    async fn test_last_analyzed_is_newest_report() {
        let store = InMemoryReportStore::new();
        let owner = Uuid::new_v4();
        let newest = completed(&store, owner, 1, "newest").await;
        completed(&store, owner, 9, "older").await;
        let service = ScriptedService::replying(vec![Ok("Stable.".into())]);

        let insights = aggregator(store, service).get_insights(owner).await.unwrap();

        assert_eq!(insights.last_analyzed, Some(newest.created_at));
    }

    #[tokio::test]
    async fn test_invocation_failure_is_upstream_error() {
        let store = InMemoryReportStore::new();
        let owner = Uuid::new_v4();
        completed(&store, owner, 0, "Hemoglobin is low.").await;
        let service = ScriptedService::replying(vec![
            Err(ServiceError::Status { status: 500, message: "boom".into() }),
            Err(ServiceError::Status { status: 500, message: "boom".into() }),
        ]);

        let err = aggregator(store, service.clone()).get_insights(owner).await.unwrap_err();

        assert_eq!(err.error_code(), "UPSTREAM_FAILURE");
        assert_eq!(service.requests().len(), 2);
    }
}
