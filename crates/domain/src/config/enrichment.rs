use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Enrichment (knowledge source) provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum EnrichmentSource {
    #[default]
    Namuwiki,
    Wikipedia,
    Mock,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EnrichmentConfig {
    #[serde(default)]
    pub source: EnrichmentSource,
    /// Forces the mock source regardless of `source`.
    #[serde(default)]
    pub use_mock: bool,
    /// Simulated latency of the mock source.
    #[serde(default = "d_mock_delay_ms")]
    pub mock_delay_ms: u64,
    /// Site root; each source has its own default when unset.
    #[serde(default)]
    pub base_url: Option<String>,
    #[serde(default = "d_user_agent")]
    pub user_agent: String,
    /// Per-HTTP-request timeout inside the adapters.  The orchestrator's
    /// enrichment timeout still bounds the whole lookup.
    #[serde(default = "d_request_timeout_ms")]
    pub request_timeout_ms: u64,
}

impl Default for EnrichmentConfig {
    fn default() -> Self {
        Self {
            source: EnrichmentSource::default(),
            use_mock: false,
            mock_delay_ms: d_mock_delay_ms(),
            base_url: None,
            user_agent: d_user_agent(),
            request_timeout_ms: d_request_timeout_ms(),
        }
    }
}

impl EnrichmentConfig {
    pub fn effective_source(&self) -> EnrichmentSource {
        if self.use_mock {
            EnrichmentSource::Mock
        } else {
            self.source
        }
    }

    pub fn mock_delay(&self) -> Duration {
        Duration::from_millis(self.mock_delay_ms)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }
}

fn d_mock_delay_ms() -> u64 {
    2500
}
fn d_user_agent() -> String {
    "parallel-tool-calling/0.1".into()
}
fn d_request_timeout_ms() -> u64 {
    10_000
}
