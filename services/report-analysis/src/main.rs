//! HealthMate Report Analysis Service

use anyhow::{Context, Result};
use axum::{
    extract::DefaultBodyLimit,
    http::{header, HeaderName, HeaderValue, Method},
};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;
use tokio::net::TcpListener;
use tower::ServiceBuilder;
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};
use tracing::info;

use healthmate_database::{initialize_database, DatabaseConfig, ReportRepository, ReportStore};
use healthmate_report_analysis::{
    chat::ChatAssistant, extractor::TextExtractor, gemini::GeminiClient, insights::InsightsAggregator,
    metrics::AnalysisMetrics, storage::HttpArtifactFetcher, watchdog::LeaseWatchdog, AiAdapter, AnalysisService,
    AppState, RetryPolicy,
};
use healthmate_report_analysis::api::USER_ID_HEADER;
use healthmate_utils::{init_logging, AppConfig};

#[tokio::main]
async fn main() -> Result<()> {
    let config = AppConfig::load().unwrap_or_else(|e| {
        eprintln!("Failed to load configuration ({}), using defaults", e);
        AppConfig::default()
    });

    init_logging(&config.logging)?;
    info!("Starting HealthMate Report Analysis Service");

    let db_config = DatabaseConfig {
        postgres_url: config.database.postgres_url.clone(),
        max_connections: config.database.max_connections,
        connection_timeout: Duration::from_secs(config.database.connection_timeout_seconds),
    };
    let pool = initialize_database(&db_config).await?;
    info!("Database connection established");

    let store: Arc<dyn ReportStore> = Arc::new(ReportRepository::new(pool));
    let metrics = AnalysisMetrics::new().context("failed to register metrics")?;

    let fetcher = HttpArtifactFetcher::new(&config.storage).context("failed to build storage client")?;
    let gemini = GeminiClient::new(&config.ai).context("failed to build Gemini client")?;
    let adapter = Arc::new(AiAdapter::from_config(Arc::new(gemini), &config.ai, metrics.clone()));
    let retry = RetryPolicy::new(Duration::from_millis(config.ai.retry_backoff_ms));

    LeaseWatchdog::new(
        store.clone(),
        Duration::from_secs(config.analysis.lease_timeout_seconds),
        Duration::from_secs(config.analysis.watchdog_interval_seconds),
        metrics.clone(),
    )
    .spawn();

    let state = AppState {
        analysis: Arc::new(AnalysisService::new(
            store.clone(),
            TextExtractor::new(Arc::new(fetcher))
                .with_decode_timeout(Duration::from_secs(config.analysis.pdf_decode_timeout_seconds)),
            adapter.clone(),
            retry,
            metrics.clone(),
        )),
        insights: Arc::new(InsightsAggregator::new(
            store.clone(),
            adapter.clone(),
            retry,
            config.analysis.insights_report_limit,
        )),
        chat: Arc::new(ChatAssistant::new(adapter, retry)),
        store,
        metrics,
    };

    let app = healthmate_report_analysis::router(state).layer(
        ServiceBuilder::new()
            .layer(TraceLayer::new_for_http())
            .layer(cors_layer(&config)?)
            .layer(TimeoutLayer::new(Duration::from_secs(config.server.timeout_seconds)))
            .layer(DefaultBodyLimit::max(config.server.max_request_size)),
    );

    let addr: SocketAddr = format!("{}:{}", config.server.host, config.server.port)
        .parse()
        .context("invalid server address")?;
    let listener = TcpListener::bind(&addr).await?;
    info!("Report Analysis Service listening on {}", addr);

    axum::serve(listener, app).await?;

    Ok(())
}

fn cors_layer(config: &AppConfig) -> Result<CorsLayer> {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([
            header::CONTENT_TYPE,
            header::AUTHORIZATION,
            HeaderName::from_static(USER_ID_HEADER),
        ]);

    Ok(match &config.server.allowed_origin {
        Some(origin) => cors.allow_origin(
            origin
                .parse::<HeaderValue>()
                .context("invalid allowed origin")?,
        ),
        None => cors.allow_origin(Any),
    })
}
