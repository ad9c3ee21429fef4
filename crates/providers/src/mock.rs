//! Deterministic in-process backends for local runs and tests.

use std::time::Duration;

use ps_domain::error::Result;
use ps_domain::record::{EnrichmentHit, EnrichmentPayload};
use ps_domain::stream::FragmentStream;

use crate::traits::{AnswerProvider, AnswerRequest, EnrichmentProvider};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Answer
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Streams a canned sentence word by word.
pub struct MockAnswerProvider {
    chunk_delay: Duration,
}

impl MockAnswerProvider {
    pub fn new(chunk_delay: Duration) -> Self {
        Self { chunk_delay }
    }

    pub fn answer_text(query: &str) -> String {
        format!("LLM mock answer for \"{}\". This is a placeholder streaming response.", query.trim())
    }
}

#[async_trait::async_trait]
impl AnswerProvider for MockAnswerProvider {
    async fn stream_answer(&self, req: AnswerRequest) -> Result<FragmentStream> {
        let text = Self::answer_text(&req.query);
        let delay = self.chunk_delay;
        let stream = async_stream::stream! {
            for word in text.split(' ') {
                if !delay.is_zero() {
                    tokio::time::sleep(delay).await;
                }
                yield Ok(format!("{word} "));
            }
        };
        Ok(Box::pin(stream))
    }

    fn provider_id(&self) -> &str {
        "mock"
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Enrichment
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Returns two placeholder hits after a simulated delay.
pub struct MockEnrichmentProvider {
    delay: Duration,
}

impl MockEnrichmentProvider {
    pub fn new(delay: Duration) -> Self {
        Self { delay }
    }
}

#[async_trait::async_trait]
impl EnrichmentProvider for MockEnrichmentProvider {
    async fn lookup(&self, term: &str) -> Result<EnrichmentPayload> {
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        let term = term.trim();
        let mut payload = EnrichmentPayload::new("mock", term);
        payload.results = vec![
            EnrichmentHit {
                title: format!("MCP expanded insight for \"{term}\""),
                url: "https://mcp.example.com/insights".into(),
                snippet: "Parallel MCP result placeholder. Replace with MCP integration output.".into(),
            },
            EnrichmentHit {
                title: "MCP supplemental dataset".into(),
                url: "https://mcp.example.com/datasets".into(),
                snippet: "Additional context returned by MCP sources.".into(),
            },
        ];
        Ok(payload)
    }

    fn provider_id(&self) -> &str {
        "mock"
    }
}
