use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Observability (OpenTelemetry) configuration
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Optional OTLP trace export layered on top of the JSON log output.
///
/// With no `otlp_endpoint` only structured JSON logs are written.  With an
/// endpoint, every `tracing` span is also forwarded to the collector:
/// the HTTP request span, plus the `enrichment` and `primary` spans that
/// wrap each request's background tasks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservabilityConfig {
    /// OTLP gRPC endpoint (e.g. `http://localhost:4317`).
    #[serde(default)]
    pub otlp_endpoint: Option<String>,

    /// `service.name` resource attribute.
    #[serde(default = "d_service_name")]
    pub service_name: String,

    /// `TraceIdRatioBased` sampling rate, `0.0..=1.0`.
    #[serde(default = "d_sample_rate")]
    pub sample_rate: f64,
}

impl Default for ObservabilityConfig {
    fn default() -> Self {
        Self {
            otlp_endpoint: None,
            service_name: d_service_name(),
            sample_rate: d_sample_rate(),
        }
    }
}

fn d_service_name() -> String {
    "parallel-search".into()
}

fn d_sample_rate() -> f64 {
    1.0
}
