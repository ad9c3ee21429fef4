use std::path::PathBuf;
use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Search lifecycle
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lifetime and timing knobs for request records.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Record lifetime, measured from creation.
    #[serde(default = "d_ttl_ms")]
    pub ttl_ms: u64,
    /// Budget for the enrichment provider call, including the single
    /// empty-result retry.
    #[serde(default = "d_enrichment_timeout_ms")]
    pub enrichment_timeout_ms: u64,
    /// How often the background sweeper reconciles expiry.
    #[serde(default = "d_sweep_interval_ms")]
    pub sweep_interval_ms: u64,
    /// How long an expired record stays readable (as `expired`) before
    /// the sweeper drops it.
    #[serde(default = "d_retain_expired_ms")]
    pub retain_expired_ms: u64,
    /// Optional JSONL file receiving a snapshot of every committed record.
    /// Write-only; never read back.
    #[serde(default)]
    pub mirror_path: Option<PathBuf>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            ttl_ms: d_ttl_ms(),
            enrichment_timeout_ms: d_enrichment_timeout_ms(),
            sweep_interval_ms: d_sweep_interval_ms(),
            retain_expired_ms: d_retain_expired_ms(),
            mirror_path: None,
        }
    }
}

impl SearchConfig {
    pub fn ttl(&self) -> Duration {
        Duration::from_millis(self.ttl_ms)
    }

    pub fn enrichment_timeout(&self) -> Duration {
        Duration::from_millis(self.enrichment_timeout_ms)
    }

    pub fn sweep_interval(&self) -> Duration {
        Duration::from_millis(self.sweep_interval_ms)
    }

    pub fn retain_expired(&self) -> Duration {
        Duration::from_millis(self.retain_expired_ms)
    }
}

fn d_ttl_ms() -> u64 {
    10 * 60 * 1000
}
fn d_enrichment_timeout_ms() -> u64 {
    8000
}
fn d_sweep_interval_ms() -> u64 {
    30_000
}
fn d_retain_expired_ms() -> u64 {
    60 * 60 * 1000
}
