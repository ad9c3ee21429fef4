//! Provider registry.
//!
//! Instantiates the configured backends once at startup: one answer
//! provider, one enrichment provider, and the gate's delegate when the gate
//! runs in `delegate` mode.

use std::sync::Arc;

use ps_domain::config::{Config, DelegateKind, EnrichmentSource, GateMode, LlmProviderKind};
use ps_domain::error::Result;

use crate::codex::CodexCliProvider;
use crate::mock::{MockAnswerProvider, MockEnrichmentProvider};
use crate::namuwiki::NamuWikiProvider;
use crate::openai_compat::OpenAiCompatProvider;
use crate::traits::{AnswerProvider, DecisionProvider, EnrichmentProvider};
use crate::wikipedia::WikipediaProvider;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ProviderRegistry
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct ProviderRegistry {
    answer: Arc<dyn AnswerProvider>,
    decision: Option<Arc<dyn DecisionProvider>>,
    enrichment: Arc<dyn EnrichmentProvider>,
}

impl ProviderRegistry {
    pub fn new(
        answer: Arc<dyn AnswerProvider>,
        decision: Option<Arc<dyn DecisionProvider>>,
        enrichment: Arc<dyn EnrichmentProvider>,
    ) -> Self {
        Self {
            answer,
            decision,
            enrichment,
        }
    }

    /// Build every backend from the application config.
    ///
    /// A broken answer or enrichment backend aborts startup.  A broken
    /// delegate only logs: the gate then runs on its heuristic alone.
    pub fn from_config(config: &Config) -> Result<Self> {
        let answer: Arc<dyn AnswerProvider> = match config.llm.effective_provider() {
            LlmProviderKind::Mock => Arc::new(MockAnswerProvider::new(
                std::time::Duration::from_millis(config.llm.mock_chunk_delay_ms),
            )),
            LlmProviderKind::OpenaiCompat => Arc::new(OpenAiCompatProvider::from_config(&config.llm)?),
            LlmProviderKind::Codex => Arc::new(CodexCliProvider::from_config(&config.llm)),
        };

        let decision: Option<Arc<dyn DecisionProvider>> = match config.gate.mode {
            GateMode::Heuristic => None,
            GateMode::Delegate => match config.gate.delegate {
                DelegateKind::Codex => Some(Arc::new(CodexCliProvider::from_config(&config.llm))),
                DelegateKind::OpenaiCompat => match OpenAiCompatProvider::from_config(&config.llm) {
                    Ok(p) => Some(Arc::new(p)),
                    Err(e) => {
                        tracing::warn!(
                            error = %e,
                            "failed to initialize decision delegate, gate falls back to heuristic"
                        );
                        None
                    }
                },
            },
        };

        let enrichment: Arc<dyn EnrichmentProvider> = match config.enrichment.effective_source() {
            EnrichmentSource::Mock => Arc::new(MockEnrichmentProvider::new(config.enrichment.mock_delay())),
            EnrichmentSource::Wikipedia => Arc::new(WikipediaProvider::from_config(&config.enrichment)?),
            EnrichmentSource::Namuwiki => Arc::new(NamuWikiProvider::from_config(&config.enrichment)?),
        };

        tracing::info!(
            answer = answer.provider_id(),
            decision = decision.as_ref().map(|d| d.provider_id()).unwrap_or("none"),
            enrichment = enrichment.provider_id(),
            "providers registered"
        );

        Ok(Self::new(answer, decision, enrichment))
    }

    pub fn answer(&self) -> Arc<dyn AnswerProvider> {
        Arc::clone(&self.answer)
    }

    pub fn decision(&self) -> Option<Arc<dyn DecisionProvider>> {
        self.decision.clone()
    }

    pub fn enrichment(&self) -> Arc<dyn EnrichmentProvider> {
        Arc::clone(&self.enrichment)
    }
}
