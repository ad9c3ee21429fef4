//! Per-request orchestration.
//!
//! A search fans out into two independent paths keyed by the same request
//! id: the [`primary`] answer, which the HTTP call waits on, and the
//! [`enrichment`] lookup, which runs in the background behind the tool-call
//! [`gate`].

pub mod enrichment;
pub mod gate;
pub mod primary;

pub use enrichment::{EnrichmentOrchestrator, EnrichmentOutcome};
pub use gate::{ToolDecision, ToolGate};
pub use primary::{PrimaryEvent, PrimaryOrchestrator};

/// Identity of one accepted search, shared by both paths.
#[derive(Debug, Clone)]
pub struct SearchJob {
    pub request_id: String,
    pub user_id: String,
    /// Trimmed query text.
    pub query: String,
}
