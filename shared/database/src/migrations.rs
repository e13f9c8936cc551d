use anyhow::Result;
use sqlx::PgPool;

pub async fn run_postgres_migrations(pool: &PgPool) -> Result<()> {
    tracing::info!("Running PostgreSQL migrations");

    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS reports (
            id UUID PRIMARY KEY DEFAULT gen_random_uuid(),
            owner_id UUID NOT NULL,
            file_name VARCHAR NOT NULL,
            file_kind VARCHAR NOT NULL CHECK (file_kind IN ('pdf', 'image')),
            file_ref TEXT NOT NULL,
            report_type VARCHAR NOT NULL DEFAULT 'general',
            status VARCHAR NOT NULL DEFAULT 'pending'
                CHECK (status IN ('pending', 'analyzing', 'completed', 'failed')),
            summary_en TEXT,
            summary_ur TEXT,
            archived BOOLEAN NOT NULL DEFAULT FALSE,
            created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
            analysis_lease UUID,
            CONSTRAINT terminal_reports_have_summaries CHECK (
                status NOT IN ('completed', 'failed')
                OR (summary_en IS NOT NULL AND summary_ur IS NOT NULL)
            )
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("ALTER TABLE reports ADD COLUMN IF NOT EXISTS analysis_lease UUID")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_owner_created ON reports(owner_id, created_at DESC)")
        .execute(pool)
        .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS idx_reports_status ON reports(status)")
        .execute(pool)
        .await?;

    tracing::info!("PostgreSQL migrations completed");
    Ok(())
}
