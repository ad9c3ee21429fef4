use std::sync::Arc;

use ps_domain::config::Config;
use ps_providers::ProviderRegistry;
use ps_requests::{PreviousContextStore, RequestStore};

use crate::runtime::{EnrichmentOrchestrator, PrimaryOrchestrator};

/// Shared application state passed to all API handlers.
///
/// Fields are grouped by concern:
/// - **Core services**: config, providers
/// - **Request lifecycle**: record store, previous-context entries
/// - **Runtime**: the two per-request orchestrators
/// - **Security**: startup-computed token hash
#[derive(Clone)]
pub struct AppState {
    // ── Core services ─────────────────────────────────────────────────
    pub config: Arc<Config>,
    pub providers: Arc<ProviderRegistry>,

    // ── Request lifecycle ─────────────────────────────────────────────
    pub store: Arc<RequestStore>,
    pub contexts: Arc<PreviousContextStore>,

    // ── Runtime ───────────────────────────────────────────────────────
    pub primary: PrimaryOrchestrator,
    pub enrichment: Arc<EnrichmentOrchestrator>,

    // ── Security (startup-computed) ───────────────────────────────────
    /// SHA-256 hash of the admin bearer token (read once at startup).
    /// `None` = admin endpoints accessible without auth.
    pub admin_token_hash: Option<Vec<u8>>,
}
