//! Analysis State Machine
//!
//! Owns report status transitions. The persisted `analyzing` status is the
//! lease: it is taken with a compare-and-set that records a fresh token, and
//! only a commit carrying that token may leave `analyzing`.

use std::sync::Arc;
use thiserror::Error;
use tracing::{error, info, warn};
use uuid::Uuid;

use healthmate_database::ReportStore;
use healthmate_models::{AnalysisStatus, BilingualSummary, Report};
use healthmate_utils::HealthMateError;

use crate::ai_client::AiInvocationError;
use crate::storage::FetchError;

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("report {0} not found")]
    NotFound(Uuid),

    #[error("report {0} is already being analyzed")]
    Busy(Uuid),

    #[error("persistence failure: {0}")]
    Persistence(String),
}

impl AnalysisError {
    pub fn outcome_label(&self) -> &'static str {
        match self {
            AnalysisError::NotFound(_) => "not_found",
            AnalysisError::Busy(_) => "busy",
            AnalysisError::Persistence(_) => "error",
        }
    }
}

impl From<AnalysisError> for HealthMateError {
    fn from(error: AnalysisError) -> Self {
        match error {
            AnalysisError::NotFound(id) => HealthMateError::not_found(format!("report {}", id)),
            AnalysisError::Busy(id) => HealthMateError::busy(format!("report {} is already being analyzed", id)),
            AnalysisError::Persistence(message) => HealthMateError::persistence(message),
        }
    }
}

/// Proof that the caller moved a report into `analyzing`.
#[derive(Debug)]
pub struct AnalysisLease {
    report: Report,
    token: Uuid,
}

impl AnalysisLease {
    pub fn token(&self) -> Uuid {
        self.token
    }

    pub fn report(&self) -> &Report {
        &self.report
    }

    pub fn report_id(&self) -> Uuid {
        self.report.id
    }
}

/// Why an attempt ends in `failed`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FailureCause {
    Fetch(FetchError),
    Invocation(AiInvocationError),
    /// The model answered but not with a usable summary.
    ParseFallback,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AttemptOutcome {
    Completed(BilingualSummary),
    Failed(FailureCause),
}

impl AttemptOutcome {
    fn terminal(&self) -> (AnalysisStatus, BilingualSummary) {
        match self {
            AttemptOutcome::Completed(summary) => (AnalysisStatus::Completed, summary.clone()),
            AttemptOutcome::Failed(_) => (AnalysisStatus::Failed, BilingualSummary::fallback()),
        }
    }
}

pub struct LeaseManager {
    store: Arc<dyn ReportStore>,
}

impl LeaseManager {
    pub fn new(store: Arc<dyn ReportStore>) -> Self {
        Self { store }
    }

    /// Acquire the analysis lease for `report_id` on behalf of `requester`.
    ///
    /// Reports owned by someone else are indistinguishable from missing ones.
    pub async fn start_analysis(&self, report_id: Uuid, requester: Uuid) -> Result<AnalysisLease, AnalysisError> {
        let report = self
            .store
            .find_by_id(report_id)
            .await
            .map_err(|e| AnalysisError::Persistence(format!("{:#}", e)))?
            .filter(|r| r.is_owned_by(requester))
            .ok_or(AnalysisError::NotFound(report_id))?;

        if !report.status.can_transition_to(AnalysisStatus::Analyzing) {
            return Err(AnalysisError::Busy(report_id));
        }

        let token = Uuid::new_v4();
        let acquired = self
            .store
            .acquire_lease(report_id, report.status, token)
            .await
            .map_err(|e| AnalysisError::Persistence(format!("{:#}", e)))?;

        if !acquired {
            return Err(AnalysisError::Busy(report_id));
        }

        info!(report_id = %report_id, previous_status = %report.status, "Analysis lease acquired");

        Ok(AnalysisLease {
            report: Report {
                status: AnalysisStatus::Analyzing,
                analysis_lease: Some(token),
                ..report
            },
            token,
        })
    }

    /// Persist the terminal result and give up the lease.
    ///
    /// Returns `Busy` without writing if the lease was reclaimed in the meantime,
    /// even when a newer attempt has since taken the report back to `analyzing`.
    pub async fn commit(&self, lease: AnalysisLease, outcome: AttemptOutcome) -> Result<Report, AnalysisError> {
        let report_id = lease.report_id();
        let (status, summary) = outcome.terminal();

        match self.store.commit_analysis(report_id, lease.token, status, &summary).await {
            Ok(true) => {
                if let AttemptOutcome::Failed(cause) = &outcome {
                    warn!(report_id = %report_id, cause = ?cause, "Analysis committed as failed");
                } else {
                    info!(report_id = %report_id, status = %status, "Analysis committed");
                }

                Ok(Report {
                    status,
                    summary_en: Some(summary.english),
                    summary_ur: Some(summary.urdu),
                    analysis_lease: None,
                    ..lease.report
                })
            }
            Ok(false) => {
                warn!(report_id = %report_id, "Analysis lease lost before commit, result discarded");
                Err(AnalysisError::Busy(report_id))
            }
            Err(e) => {
                error!(report_id = %report_id, error = %format!("{:#}", e), "Failed to commit analysis");
                self.release_after_failed_commit(report_id, lease.token, status).await;
                Err(AnalysisError::Persistence(format!("{:#}", e)))
            }
        }
    }

    /// Best-effort release of a lease whose commit failed. If this write fails
    /// too the report stays `analyzing` until the watchdog reclaims it.
    async fn release_after_failed_commit(&self, report_id: Uuid, token: Uuid, attempted: AnalysisStatus) {
        if attempted == AnalysisStatus::Failed {
            return;
        }

        if let Err(e) = self
            .store
            .commit_analysis(report_id, token, AnalysisStatus::Failed, &BilingualSummary::fallback())
            .await
        {
            warn!(report_id = %report_id, error = %e, "Lease release failed, leaving it to the watchdog");
        }
    }
}
