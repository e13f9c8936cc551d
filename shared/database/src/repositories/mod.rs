//! Repository module for report persistence
//!
//! `ReportStore` is the seam the analysis pipeline depends on. The Postgres
//! repository backs production; the in-memory store backs tests and local runs.

pub mod report;
pub mod memory;

pub use report::ReportRepository;
pub use memory::InMemoryReportStore;

use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use healthmate_models::{AnalysisStatus, BilingualSummary, Report, ReportFilter, ReportPage};

#[async_trait]
pub trait ReportStore: Send + Sync {
    /// Find report by ID
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>>;

    async fn create(&self, report: Report) -> Result<Report>;

    /// Compare-and-set from `expected` into `analyzing`, recording `lease` as
    /// the holder. Returns whether `expected` held. Also stamps `updated_at`.
    async fn acquire_lease(&self, id: Uuid, expected: AnalysisStatus, lease: Uuid) -> Result<bool>;

    /// Write a terminal status and both summaries, only while `lease` still
    /// holds the report. Returns false if the lease was lost or superseded.
    async fn commit_analysis(
        &self,
        id: Uuid,
        lease: Uuid,
        status: AnalysisStatus,
        summary: &BilingualSummary,
    ) -> Result<bool>;

    /// Most recent non-archived completed reports, newest first.
    async fn find_recent_completed(&self, owner: Uuid, limit: u32) -> Result<Vec<Report>>;

    async fn list_for_owner(&self, owner: Uuid, filter: &ReportFilter) -> Result<ReportPage>;

    /// Force every `analyzing` report last touched before `cutoff` to `failed`
    /// with the given summary, voiding its lease. Returns the reclaimed IDs.
    async fn fail_stale_analyses(&self, cutoff: DateTime<Utc>, summary: &BilingualSummary) -> Result<Vec<Uuid>>;
}
