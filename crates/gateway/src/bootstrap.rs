//! AppState construction and background-task spawning extracted from `main.rs`.
//!
//! The integration tests boot the same state through these functions, so
//! the server binary and the tests wire things identically.

use std::sync::Arc;

use anyhow::Context;
use sha2::{Digest, Sha256};

use ps_domain::config::{Config, ConfigSeverity};
use ps_providers::ProviderRegistry;
use ps_requests::{Clock, NotificationHub, PreviousContextStore, RecordMirror, RequestStore, SystemClock};

use crate::runtime::{EnrichmentOrchestrator, PrimaryOrchestrator, ToolGate};
use crate::state::AppState;

/// Validate config, build the configured providers and return a
/// fully-wired [`AppState`].
pub fn build_app_state(config: Arc<Config>) -> anyhow::Result<AppState> {
    check_config(&config)?;
    let providers = ProviderRegistry::from_config(&config).context("initializing providers")?;
    build_app_state_with(config, providers, Arc::new(SystemClock))
}

/// Same as [`build_app_state`] with explicit providers and clock.
pub fn build_app_state_with(
    config: Arc<Config>,
    providers: ProviderRegistry,
    clock: Arc<dyn Clock>,
) -> anyhow::Result<AppState> {
    // ── Request store ────────────────────────────────────────────────
    let hub = Arc::new(NotificationHub::new());
    let mut store = RequestStore::new(config.search.ttl(), clock.clone(), hub);
    if let Some(ref path) = config.search.mirror_path {
        let mirror = RecordMirror::new(path)
            .with_context(|| format!("opening record mirror {}", path.display()))?;
        store = store.with_mirror(mirror);
    }
    let store = Arc::new(store);
    let contexts = Arc::new(PreviousContextStore::new(clock));
    tracing::info!(ttl_ms = config.search.ttl_ms, "request store ready");

    // ── Orchestrators ────────────────────────────────────────────────
    let providers = Arc::new(providers);
    let gate = ToolGate::from_config(&config.gate, providers.decision());
    let enrichment = Arc::new(EnrichmentOrchestrator::new(
        store.clone(),
        contexts.clone(),
        gate,
        providers.enrichment(),
        config.search.enrichment_timeout(),
    ));
    let primary = PrimaryOrchestrator::new(store.clone(), contexts.clone(), providers.answer());
    tracing::info!(
        gate_mode = ?config.gate.mode,
        enrichment_timeout_ms = config.search.enrichment_timeout_ms,
        "orchestrators ready"
    );

    // ── Admin token (read once, hash for constant-time comparison) ──
    let admin_token_hash = {
        let env_var = &config.admin.token_env;
        match std::env::var(env_var).ok().filter(|t| !t.is_empty()) {
            Some(token) => {
                tracing::info!(source = %format!("env:{env_var}"), "admin bearer-token auth enabled");
                Some(Sha256::digest(token.as_bytes()).to_vec())
            }
            None => {
                tracing::warn!(
                    env_var = %env_var,
                    "admin token not set, /admin endpoints are open"
                );
                None
            }
        }
    };

    Ok(AppState {
        config,
        providers,
        store,
        contexts,
        primary,
        enrichment,
        admin_token_hash,
    })
}

/// Log every config issue and refuse to boot on errors.
fn check_config(config: &Config) -> anyhow::Result<()> {
    let issues = config.validate();
    for issue in &issues {
        match issue.severity {
            ConfigSeverity::Warning => tracing::warn!("config: {issue}"),
            ConfigSeverity::Error => tracing::error!("config: {issue}"),
        }
    }
    let errors = issues
        .iter()
        .filter(|i| i.severity == ConfigSeverity::Error)
        .count();
    if errors > 0 {
        anyhow::bail!("config validation failed with {errors} error(s)");
    }
    Ok(())
}

/// Spawn the long-running background tasks.
///
/// Currently the request sweeper: on every tick it reconciles expiry for
/// all records (waking subscribers with `expired`) and purges records that
/// expired longer than `retain_expired_ms` ago.
pub fn spawn_background_tasks(state: &AppState) -> tokio::task::JoinHandle<()> {
    let store = state.store.clone();
    let every = state.config.search.sweep_interval();
    let retain = state.config.search.retain_expired();
    let handle = tokio::spawn(async move {
        let mut interval = tokio::time::interval(every);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            interval.tick().await;
            let report = store.sweep(retain);
            if report.purged > 0 {
                tracing::info!(
                    expired = report.expired,
                    purged = report.purged,
                    remaining = store.len(),
                    "swept request records"
                );
            }
        }
    });
    tracing::info!(interval_ms = every.as_millis() as u64, "background tasks spawned");
    handle
}
