//! Report Repository
//!
//! Postgres persistence for reports, including the conditional status
//! updates that implement the analysis lease.

use anyhow::{Context, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::{FromRow, PgPool};
use uuid::Uuid;

use healthmate_models::{AnalysisStatus, BilingualSummary, Report, ReportFilter, ReportPage};

use super::ReportStore;

const REPORT_COLUMNS: &str = "id, owner_id, file_name, file_kind, file_ref, report_type, status, \
     summary_en, summary_ur, archived, created_at, updated_at, analysis_lease";

pub struct ReportRepository {
    pool: PgPool,
}

impl ReportRepository {
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

#[async_trait]
impl ReportStore for ReportRepository {
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Report>> {
        let row: Option<ReportRow> = sqlx::query_as(&format!(
            "SELECT {REPORT_COLUMNS} FROM reports WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await
        .context("Failed to fetch report by ID")?;

        row.map(Report::try_from).transpose()
    }

    async fn create(&self, report: Report) -> Result<Report> {
        let row: ReportRow = sqlx::query_as(&format!(
            r#"
            INSERT INTO reports
                (id, owner_id, file_name, file_kind, file_ref, report_type, status,
                 summary_en, summary_ur, archived, created_at, updated_at, analysis_lease)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13)
            RETURNING {REPORT_COLUMNS}
            "#
        ))
        .bind(report.id)
        .bind(report.owner)
        .bind(&report.file_name)
        .bind(report.file_kind.as_str())
        .bind(&report.file_ref)
        .bind(report.report_type.as_str())
        .bind(report.status.as_str())
        .bind(&report.summary_en)
        .bind(&report.summary_ur)
        .bind(report.archived)
        .bind(report.created_at)
        .bind(report.updated_at)
        .bind(report.analysis_lease)
        .fetch_one(&self.pool)
        .await
        .context("Failed to create report")?;

        row.try_into()
    }

    async fn acquire_lease(&self, id: Uuid, expected: AnalysisStatus, lease: Uuid) -> Result<bool> {
        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = 'analyzing', analysis_lease = $3, updated_at = $4
            WHERE id = $1 AND status = $2
            "#
        )
        .bind(id)
        .bind(expected.as_str())
        .bind(lease)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to acquire analysis lease")?;

        Ok(result.rows_affected() > 0)
    }

    async fn commit_analysis(
        &self,
        id: Uuid,
        lease: Uuid,
        status: AnalysisStatus,
        summary: &BilingualSummary,
    ) -> Result<bool> {
        anyhow::ensure!(status.is_terminal(), "cannot commit non-terminal status {}", status);

        let result = sqlx::query(
            r#"
            UPDATE reports
            SET status = $3, summary_en = $4, summary_ur = $5, updated_at = $6, analysis_lease = NULL
            WHERE id = $1 AND status = 'analyzing' AND analysis_lease = $2
            "#
        )
        .bind(id)
        .bind(lease)
        .bind(status.as_str())
        .bind(&summary.english)
        .bind(&summary.urdu)
        .bind(Utc::now())
        .execute(&self.pool)
        .await
        .context("Failed to commit report analysis")?;

        Ok(result.rows_affected() > 0)
    }

    async fn find_recent_completed(&self, owner: Uuid, limit: u32) -> Result<Vec<Report>> {
        let rows: Vec<ReportRow> = sqlx::query_as(&format!(
            r#"
            SELECT {REPORT_COLUMNS}
            FROM reports
            WHERE owner_id = $1 AND status = 'completed' AND archived = FALSE
            ORDER BY created_at DESC
            LIMIT $2
            "#
        ))
        .bind(owner)
        .bind(i64::from(limit))
        .fetch_all(&self.pool)
        .await
        .context("Failed to fetch recent completed reports")?;

        rows.into_iter().map(Report::try_from).collect()
    }

    async fn list_for_owner(&self, owner: Uuid, filter: &ReportFilter) -> Result<ReportPage> {
        let status = filter.status.map(|s| s.as_str());
        let file_kind = filter.file_kind.map(|k| k.as_str());

        let rows: Vec<ReportRow> = sqlx::query_as(&format!(
            r#"
            SELECT {REPORT_COLUMNS}
            FROM reports
            WHERE owner_id = $1 AND archived = FALSE
              AND ($2::VARCHAR IS NULL OR status = $2)
              AND ($3::VARCHAR IS NULL OR file_kind = $3)
            ORDER BY created_at DESC
            LIMIT $4 OFFSET $5
            "#
        ))
        .bind(owner)
        .bind(status)
        .bind(file_kind)
        .bind(i64::from(filter.limit()))
        .bind(i64::from(filter.offset()))
        .fetch_all(&self.pool)
        .await
        .context("Failed to list reports")?;

        let total: i64 = sqlx::query_scalar(
            r#"
            SELECT COUNT(*)
            FROM reports
            WHERE owner_id = $1 AND archived = FALSE
              AND ($2::VARCHAR IS NULL OR status = $2)
              AND ($3::VARCHAR IS NULL OR file_kind = $3)
            "#
        )
        .bind(owner)
        .bind(status)
        .bind(file_kind)
        .fetch_one(&self.pool)
        .await
        .context("Failed to count reports")?;

        let reports = rows.into_iter().map(Report::try_from).collect::<Result<Vec<_>>>()?;
        Ok(ReportPage::new(reports, filter, total.max(0) as u64))
    }

    async fn fail_stale_analyses(&self, cutoff: DateTime<Utc>, summary: &BilingualSummary) -> Result<Vec<Uuid>> {
        let ids: Vec<Uuid> = sqlx::query_scalar(
            r#"
            UPDATE reports
            SET status = 'failed', summary_en = $2, summary_ur = $3, updated_at = $4, analysis_lease = NULL
            WHERE status = 'analyzing' AND updated_at < $1
            RETURNING id
            "#
        )
        .bind(cutoff)
        .bind(&summary.english)
        .bind(&summary.urdu)
        .bind(Utc::now())
        .fetch_all(&self.pool)
        .await
        .context("Failed to reclaim stale analyses")?;

        Ok(ids)
    }
}

#[derive(Debug, FromRow)]
struct ReportRow {
    id: Uuid,
    owner_id: Uuid,
    file_name: String,
    file_kind: String,
    file_ref: String,
    report_type: String,
    status: String,
    summary_en: Option<String>,
    summary_ur: Option<String>,
    archived: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    analysis_lease: Option<Uuid>,
}

impl TryFrom<ReportRow> for Report {
    type Error = anyhow::Error;

    fn try_from(row: ReportRow) -> Result<Self> {
        Ok(Self {
            id: row.id,
            owner: row.owner_id,
            file_name: row.file_name,
            file_kind: row.file_kind.parse()?,
            file_ref: row.file_ref,
            report_type: row.report_type.parse()?,
            status: row.status.parse()?,
            summary_en: row.summary_en,
            summary_ur: row.summary_ur,
            archived: row.archived,
            created_at: row.created_at,
            updated_at: row.updated_at,
            analysis_lease: row.analysis_lease,
        })
    }
}
