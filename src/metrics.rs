//! Prometheus metrics for the project sync pipeline.
//!
//! Exposed on `/metrics`. Each recorder owns its registry, so several app
//! instances (tests) can coexist in one process.

use prometheus::{
    histogram_opts, opts, CounterVec, Encoder, HistogramVec, IntCounter, Registry, TextEncoder,
};

pub struct SyncMetrics {
    registry: Registry,

    // Counters
    attempts_total: CounterVec,
    credentials_disabled_total: IntCounter,
    projects_upserted_total: IntCounter,
    runs_total: CounterVec,

    // Histograms
    run_duration_seconds: HistogramVec,
}

impl SyncMetrics {
    pub fn new() -> anyhow::Result<Self> {
        let registry = Registry::new();

        let attempts_total = CounterVec::new(
            opts!("folio_github_attempts_total", "GitHub API attempts by outcome"),
            &["outcome"],
        )?;
        let credentials_disabled_total = IntCounter::with_opts(opts!(
            "folio_github_credentials_disabled_total",
            "Credentials disabled after GitHub rejected them"
        ))?;
        let projects_upserted_total = IntCounter::with_opts(opts!(
            "folio_projects_upserted_total",
            "Project rows inserted or refreshed by sync"
        ))?;
        let runs_total = CounterVec::new(
            opts!("folio_sync_runs_total", "Sync runs by result"),
            &["result"],
        )?;
        let run_duration_seconds = HistogramVec::new(
            histogram_opts!(
                "folio_sync_duration_seconds",
                "Wall-clock duration of a sync run",
                vec![0.1, 0.25, 0.5, 1.0, 2.5, 5.0, 10.0, 30.0, 60.0, 120.0]
            ),
            &["result"],
        )?;

        registry.register(Box::new(attempts_total.clone()))?;
        registry.register(Box::new(credentials_disabled_total.clone()))?;
        registry.register(Box::new(projects_upserted_total.clone()))?;
        registry.register(Box::new(runs_total.clone()))?;
        registry.register(Box::new(run_duration_seconds.clone()))?;

        Ok(Self {
            registry,
            attempts_total,
            credentials_disabled_total,
            projects_upserted_total,
            runs_total,
            run_duration_seconds,
        })
    }

    /// `outcome` is one of: success, auth_rejected, rate_limited,
    /// transport_error, fallback.
    pub fn record_attempt(&self, outcome: &str) {
        self.attempts_total.with_label_values(&[outcome]).inc();
    }

    pub fn record_disabled(&self) {
        self.credentials_disabled_total.inc();
    }

    pub fn record_upserted(&self, count: usize) {
        self.projects_upserted_total.inc_by(count as u64);
    }

    /// `result` is "ok" or an `AppError::code()`.
    pub fn record_run(&self, result: &str, duration_secs: f64) {
        self.runs_total.with_label_values(&[result]).inc();
        self.run_duration_seconds
            .with_label_values(&[result])
            .observe(duration_secs);
    }

    pub fn attempts(&self, outcome: &str) -> f64 {
        self.attempts_total.with_label_values(&[outcome]).get()
    }

    /// Encode all metrics as Prometheus text format.
    pub fn encode(&self) -> String {
        let encoder = TextEncoder::new();
        let metric_families = self.registry.gather();
        let mut buffer = Vec::new();
        encoder.encode(&metric_families, &mut buffer).unwrap_or_default();
        String::from_utf8(buffer).unwrap_or_default()
    }
}

// ── Tests ─────────────────────────────────────────────────────
