//! Prometheus counters for the analysis service, held in an injected registry.

use prometheus::{IntCounter, IntCounterVec, Opts, Registry, TextEncoder};

#[derive(Clone)]
pub struct AnalysisMetrics {
    registry: Registry,
    analyses: IntCounterVec,
    ai_invocations: IntCounterVec,
    leases_reclaimed: IntCounter,
}

impl AnalysisMetrics {
    pub fn new() -> prometheus::Result<Self> {
        let registry = Registry::new_custom(Some("healthmate".to_string()), None)?;

        let analyses = IntCounterVec::new(
            Opts::new("analyses_total", "Report analysis requests by outcome"),
            &["outcome"],
        )?;
        let ai_invocations = IntCounterVec::new(
            Opts::new("ai_invocations_total", "Generative service calls by model kind and result"),
            &["model", "result"],
        )?;
        let leases_reclaimed = IntCounter::new(
            "leases_reclaimed_total",
            "Stale analyzing reports forced to failed by the watchdog",
        )?;

        registry.register(Box::new(analyses.clone()))?;
        registry.register(Box::new(ai_invocations.clone()))?;
        registry.register(Box::new(leases_reclaimed.clone()))?;

        Ok(Self {
            registry,
            analyses,
            ai_invocations,
            leases_reclaimed,
        })
    }

    /// `outcome` is one of completed, failed, busy, not_found, error.
    pub fn record_analysis(&self, outcome: &str) {
        self.analyses.with_label_values(&[outcome]).inc();
    }

    pub fn record_invocation(&self, model: &str, result: &str) {
        self.ai_invocations.with_label_values(&[model, result]).inc();
    }

    pub fn record_reclaimed(&self, count: usize) {
        self.leases_reclaimed.inc_by(count as u64);
    }

    pub fn analysis_count(&self, outcome: &str) -> u64 {
        self.analyses.with_label_values(&[outcome]).get()
    }

    pub fn invocation_count(&self, model: &str, result: &str) -> u64 {
        self.ai_invocations.with_label_values(&[model, result]).get()
    }

    pub fn reclaimed_count(&self) -> u64 {
        self.leases_reclaimed.get()
    }

    /// Text exposition format for `/metrics`.
    pub fn encode(&self) -> prometheus::Result<String> {
        TextEncoder::new().encode_to_string(&self.registry.gather())
    }
}
