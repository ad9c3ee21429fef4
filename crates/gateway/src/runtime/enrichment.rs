//! Enrichment orchestrator.
//!
//! Runs the tool-call gate, then races the knowledge-source lookup against
//! the enrichment timeout.  The lookup runs on its own task: when the
//! timeout wins, the task is left to finish on its own and whatever it
//! returns is dropped.  Every outcome is folded into the request record as
//! `ready` or `failed`.

use std::sync::Arc;
use std::time::{Duration, Instant};

use tracing::Instrument;

use ps_domain::error::{Error, Result};
use ps_domain::record::EnrichmentPayload;
use ps_providers::EnrichmentProvider;
use ps_requests::{PreviousContextStore, RequestStore};

use super::gate::ToolGate;
use super::SearchJob;

/// How one enrichment run ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EnrichmentOutcome {
    Ready,
    /// The gate declined; the provider was never called.
    Skipped,
    Failed(String),
    /// A result arrived but the record had already left `pending`.
    Discarded,
}

pub struct EnrichmentOrchestrator {
    store: Arc<RequestStore>,
    contexts: Arc<PreviousContextStore>,
    gate: ToolGate,
    provider: Arc<dyn EnrichmentProvider>,
    timeout: Duration,
}

impl EnrichmentOrchestrator {
    pub fn new(
        store: Arc<RequestStore>,
        contexts: Arc<PreviousContextStore>,
        gate: ToolGate,
        provider: Arc<dyn EnrichmentProvider>,
        timeout: Duration,
    ) -> Self {
        Self {
            store,
            contexts,
            gate,
            provider,
            timeout,
        }
    }

    /// Run in the background.  The caller never waits on enrichment.
    pub fn spawn(self: &Arc<Self>, job: SearchJob) -> tokio::task::JoinHandle<EnrichmentOutcome> {
        let this = Arc::clone(self);
        let span = tracing::info_span!(
            "enrichment",
            request_id = %job.request_id,
            user_id = %job.user_id
        );
        tokio::spawn(async move { this.run(job).await }.instrument(span))
    }

    pub async fn run(&self, job: SearchJob) -> EnrichmentOutcome {
        let started = Instant::now();
        let decision = self.gate.decide(&job.query, Some(&job.user_id)).await;

        if !decision.should_call {
            if self.store.set_failed(&job.request_id) {
                tracing::info!(
                    request_id = %job.request_id,
                    duration_ms = elapsed_ms(started),
                    reason = "tool_not_needed",
                    "enrichment skipped"
                );
            } else {
                self.log_discarded(&job, started, "skip after request left pending");
            }
            return EnrichmentOutcome::Skipped;
        }

        let term = match decision.keyword.trim() {
            "" => job.query.clone(),
            keyword => keyword.to_owned(),
        };
        tracing::debug!(request_id = %job.request_id, term = %term, "enrichment lookup started");

        match self.race(term, job.query.clone()).await {
            Ok(payload) => self.commit_ready(&job, payload, started),
            Err(e) => self.commit_failed(&job, e, started),
        }
    }

    /// Lookup (with its retry) on a separate task, bounded by the timeout.
    async fn race(&self, term: String, query: String) -> Result<EnrichmentPayload> {
        let provider = Arc::clone(&self.provider);
        let lookup = tokio::spawn(
            async move { lookup_with_retry(provider.as_ref(), &term, &query).await }.in_current_span(),
        );

        match tokio::time::timeout(self.timeout, lookup).await {
            Ok(Ok(result)) => result,
            Ok(Err(join_err)) => Err(Error::Other(format!("enrichment task failed: {join_err}"))),
            // Dropping the JoinHandle detaches the task.
            Err(_) => Err(Error::Timeout(format!(
                "enrichment exceeded {} ms",
                self.timeout.as_millis()
            ))),
        }
    }

    fn commit_ready(&self, job: &SearchJob, payload: EnrichmentPayload, started: Instant) -> EnrichmentOutcome {
        let summary = payload.compact_summary();
        let source = payload.source.clone();
        if !self.store.set_enrichment_result(&job.request_id, payload) {
            self.log_discarded(job, started, "result after request left pending");
            return EnrichmentOutcome::Discarded;
        }

        if let Some(summary) = summary {
            self.contexts.record_summary(&job.user_id, &job.query, summary);
        }
        tracing::info!(
            request_id = %job.request_id,
            duration_ms = elapsed_ms(started),
            source = %source,
            "enrichment ready"
        );
        EnrichmentOutcome::Ready
    }

    fn commit_failed(&self, job: &SearchJob, error: Error, started: Instant) -> EnrichmentOutcome {
        let reason = error.to_string();
        if !self.store.set_failed(&job.request_id) {
            self.log_discarded(job, started, &reason);
            return EnrichmentOutcome::Discarded;
        }
        tracing::info!(
            request_id = %job.request_id,
            duration_ms = elapsed_ms(started),
            reason = %reason,
            "enrichment failed"
        );
        EnrichmentOutcome::Failed(reason)
    }

    fn log_discarded(&self, job: &SearchJob, started: Instant, reason: &str) {
        tracing::debug!(
            request_id = %job.request_id,
            duration_ms = elapsed_ms(started),
            reason = %reason,
            "enrichment discarded"
        );
    }
}

/// One lookup, plus a single retry with the raw query when the source had
/// nothing for a narrower keyword.
async fn lookup_with_retry(
    provider: &dyn EnrichmentProvider,
    term: &str,
    query: &str,
) -> Result<EnrichmentPayload> {
    match provider.lookup(term).await {
        Err(e) if e.is_empty_result() && term != query => {
            tracing::debug!(term = %term, "empty enrichment result, retrying with full query");
            provider.lookup(query).await
        }
        other => other,
    }
}

fn elapsed_ms(started: Instant) -> u64 {
    started.elapsed().as_millis() as u64
}
