//! Primary answer orchestrator.
//!
//! Drives the configured [`AnswerProvider`] for one request, in one of two
//! delivery modes:
//!
//! - **buffered** -- collect every fragment, commit, return the payload.
//! - **incremental** -- a background task forwards [`PrimaryEvent`]s over an
//!   mpsc channel while the provider streams, then commits.
//!
//! On success both modes store `results.normal` and update the user's
//! previous-context entry.  A failure leaves `results.normal` unset; the
//! enrichment side never depends on this path.

use std::sync::Arc;
use std::time::Instant;

use futures_util::StreamExt;
use serde::Serialize;
use tokio::sync::mpsc;
use tracing::Instrument;

use ps_domain::error::Result;
use ps_domain::record::NormalPayload;
use ps_providers::{AnswerProvider, AnswerRequest};
use ps_requests::{PreviousContextStore, RequestStore};

use super::SearchJob;

/// Error code reported to callers when the primary answer fails.
pub const NORMAL_SEARCH_FAILED: &str = "normal_search_failed";

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// PrimaryEvent: the incremental delivery event type
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum PrimaryEvent {
    Start {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Chunk {
        delta: String,
    },
    Done {
        #[serde(rename = "requestId")]
        request_id: String,
    },
    Error {
        #[serde(rename = "requestId")]
        request_id: String,
        message: String,
    },
}

impl PrimaryEvent {
    pub fn event_name(&self) -> &'static str {
        match self {
            Self::Start { .. } => "normal-start",
            Self::Chunk { .. } => "normal-chunk",
            Self::Done { .. } => "normal-done",
            Self::Error { .. } => "normal-error",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Done { .. } | Self::Error { .. })
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Orchestrator
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct PrimaryOrchestrator {
    store: Arc<RequestStore>,
    contexts: Arc<PreviousContextStore>,
    provider: Arc<dyn AnswerProvider>,
}

impl PrimaryOrchestrator {
    pub fn new(
        store: Arc<RequestStore>,
        contexts: Arc<PreviousContextStore>,
        provider: Arc<dyn AnswerProvider>,
    ) -> Self {
        Self {
            store,
            contexts,
            provider,
        }
    }

    /// Buffered delivery: the whole answer, committed, or the provider's
    /// error.
    pub async fn answer(&self, job: &SearchJob) -> Result<NormalPayload> {
        let started = Instant::now();
        let mut fragments = self.provider.stream_answer(self.answer_request(job)).await?;

        let mut answer = String::new();
        while let Some(fragment) = fragments.next().await {
            answer.push_str(&fragment?);
        }

        let payload = self.commit(job, answer, started);
        Ok(payload)
    }

    /// Incremental delivery.  The returned receiver yields `normal-start`,
    /// one `normal-chunk` per fragment, then `normal-done` or
    /// `normal-error`.  The task keeps going if the receiver is dropped so
    /// a disconnected client still gets its answer committed.
    pub fn spawn_incremental(&self, job: SearchJob) -> mpsc::Receiver<PrimaryEvent> {
        let (tx, rx) = mpsc::channel(64);
        let this = self.clone();
        let span = tracing::info_span!(
            "primary",
            request_id = %job.request_id,
            user_id = %job.user_id
        );
        tokio::spawn(async move { this.drive(job, tx).await }.instrument(span));
        rx
    }

    async fn drive(&self, job: SearchJob, tx: mpsc::Sender<PrimaryEvent>) {
        let started = Instant::now();
        let _ = tx
            .send(PrimaryEvent::Start {
                request_id: job.request_id.clone(),
            })
            .await;

        let mut fragments = match self.provider.stream_answer(self.answer_request(&job)).await {
            Ok(f) => f,
            Err(e) => {
                self.fail(&job, &tx, e, started).await;
                return;
            }
        };

        let mut answer = String::new();
        while let Some(fragment) = fragments.next().await {
            match fragment {
                Ok(delta) => {
                    answer.push_str(&delta);
                    let _ = tx.send(PrimaryEvent::Chunk { delta }).await;
                }
                Err(e) => {
                    self.fail(&job, &tx, e, started).await;
                    return;
                }
            }
        }

        self.commit(&job, answer, started);
        let _ = tx
            .send(PrimaryEvent::Done {
                request_id: job.request_id.clone(),
            })
            .await;
    }

    async fn fail(
        &self,
        job: &SearchJob,
        tx: &mpsc::Sender<PrimaryEvent>,
        error: ps_domain::error::Error,
        started: Instant,
    ) {
        tracing::warn!(
            request_id = %job.request_id,
            provider = self.provider.provider_id(),
            duration_ms = started.elapsed().as_millis() as u64,
            error = %error,
            "primary answer failed"
        );
        let _ = tx
            .send(PrimaryEvent::Error {
                request_id: job.request_id.clone(),
                message: NORMAL_SEARCH_FAILED.into(),
            })
            .await;
    }

    fn answer_request(&self, job: &SearchJob) -> AnswerRequest {
        AnswerRequest {
            query: job.query.clone(),
            user_id: job.user_id.clone(),
            previous: self.contexts.get(&job.user_id),
        }
    }

    fn commit(&self, job: &SearchJob, answer: String, started: Instant) -> NormalPayload {
        let payload = NormalPayload::from_answer(answer).with_meta(serde_json::json!({
            "query": job.query,
            "userId": job.user_id,
        }));

        if !self.store.set_normal_result(&job.request_id, payload.clone()) {
            tracing::debug!(request_id = %job.request_id, "primary answer not stored, record expired or already set");
        }
        self.contexts
            .record_answer(&job.user_id, &job.query, payload.first_answer());

        tracing::info!(
            request_id = %job.request_id,
            provider = self.provider.provider_id(),
            duration_ms = started.elapsed().as_millis() as u64,
            "primary answer ready"
        );
        payload
    }
}
