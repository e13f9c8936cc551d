//! Report Analysis Pipeline
//!
//! One attempt: take the lease, extract, prompt, invoke, parse, commit.

use serde::Serialize;
use std::sync::Arc;
use tracing::{debug, info, info_span, warn, Instrument};
use uuid::Uuid;

use healthmate_database::ReportStore;
use healthmate_models::{AnalysisStatus, BilingualSummary, Report};

use crate::ai_client::{AiAdapter, RetryPolicy};
use crate::extractor::TextExtractor;
use crate::metrics::AnalysisMetrics;
use crate::parser::{parse_summary, ParsedSummary};
use crate::prompt::{build_analysis_prompt, AnalysisPrompt};
use crate::state_machine::{AnalysisError, AttemptOutcome, FailureCause, LeaseManager};

/// Terminal state of one analysis request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct AnalysisResult {
    pub report_id: Uuid,
    pub summary_en: String,
    pub summary_ur: String,
    pub status: AnalysisStatus,
}

impl AnalysisResult {
    fn from_committed(report: &Report) -> Self {
        let summary = report.summary().unwrap_or_else(BilingualSummary::fallback);
        Self {
            report_id: report.id,
            summary_en: summary.english,
            summary_ur: summary.urdu,
            status: report.status,
        }
    }
}

/// Working state of one pipeline execution. Logged, never persisted.
#[derive(Debug, Default)]
struct AnalysisAttempt {
    extracted_text: String,
    extraction_note: Option<String>,
    prompt: Option<AnalysisPrompt>,
    raw_response: Option<String>,
    parsed: Option<ParsedSummary>,
}

pub struct AnalysisService {
    leases: LeaseManager,
    extractor: TextExtractor,
    adapter: Arc<AiAdapter>,
    retry: RetryPolicy,
    metrics: AnalysisMetrics,
}

impl AnalysisService {
    pub fn new(
        store: Arc<dyn ReportStore>,
        extractor: TextExtractor,
        adapter: Arc<AiAdapter>,
        retry: RetryPolicy,
        metrics: AnalysisMetrics,
    ) -> Self {
        Self {
            leases: LeaseManager::new(store),
            extractor,
            adapter,
            retry,
            metrics,
        }
    }

    /// Run one full analysis attempt for `report_id`.
    ///
    /// Extraction and invocation failures end in a committed `failed` report,
    /// not an error. Errors are reserved for lease and persistence outcomes.
    pub async fn analyze_report(&self, report_id: Uuid, requester: Uuid) -> Result<AnalysisResult, AnalysisError> {
        let span = info_span!("analysis_attempt", report_id = %report_id, lease = tracing::field::Empty);

        let result = async {
            let lease = self.leases.start_analysis(report_id, requester).await?;
            tracing::Span::current().record("lease", tracing::field::display(lease.token()));
            let outcome = self.run_attempt(lease.report()).await;
            let committed = self.leases.commit(lease, outcome).await?;
            Ok::<_, AnalysisError>(AnalysisResult::from_committed(&committed))
        }
        .instrument(span)
        .await;

        match &result {
            Ok(done) => self.metrics.record_analysis(done.status.as_str()),
            Err(e) => self.metrics.record_analysis(e.outcome_label()),
        }

        result
    }

    async fn run_attempt(&self, report: &Report) -> AttemptOutcome {
        let mut attempt = AnalysisAttempt::default();

        let document = match self.extractor.extract(&report.file_ref, report.file_kind).await {
            Ok(document) => document,
            Err(e) => {
                warn!(status = ?e.status, error = %e, "Artifact fetch failed");
                return AttemptOutcome::Failed(FailureCause::Fetch(e));
            }
        };
        attempt.extracted_text = document.text.clone();
        attempt.extraction_note = document.note.clone();

        if !document.has_text() {
            debug!(
                mime_type = ?document.attachment.as_ref().map(|a| a.mime_type.as_str()),
                "No extractable text, attaching the artifact"
            );
        }

        let prompt = build_analysis_prompt(&document.text, report.file_kind);
        let combined = prompt.combined();
        attempt.prompt = Some(prompt);

        let binary = document.attachment.as_ref().map(|a| a.as_inline());
        let raw = match self.retry.run(|| self.adapter.invoke(&combined, binary)).await {
            Ok(raw) => raw,
            Err(e) => {
                warn!(kind = e.kind.as_str(), status = ?e.status, error = %e, "AI invocation failed");
                return AttemptOutcome::Failed(FailureCause::Invocation(e));
            }
        };

        let parsed = parse_summary(&raw);
        attempt.raw_response = Some(raw);
        attempt.parsed = Some(parsed.clone());

        debug!(
            text_len = attempt.extracted_text.len(),
            note = ?attempt.extraction_note,
            prompt_len = attempt.prompt.as_ref().map(|p| p.combined().len()),
            response_len = attempt.raw_response.as_ref().map(String::len),
            source = ?attempt.parsed.as_ref().map(|p| p.source),
            "Analysis attempt finished"
        );

        if parsed.is_fallback() {
            info!("Model output unusable, committing fallback as failed");
            AttemptOutcome::Failed(FailureCause::ParseFallback)
        } else {
            AttemptOutcome::Completed(parsed.summary)
        }
    }
}
