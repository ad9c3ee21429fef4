use ps_domain::context::PreviousContext;
use ps_domain::error::Result;
use ps_domain::record::EnrichmentPayload;
use ps_domain::stream::FragmentStream;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Request types
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Everything a primary-answer backend needs for one query.
#[derive(Debug, Clone, Default)]
pub struct AnswerRequest {
    /// Trimmed user query.
    pub query: String,
    pub user_id: String,
    /// The user's carry-forward entry at request time, if any.
    pub previous: Option<PreviousContext>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Capability traits
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Produces the primary answer as a lazy sequence of text fragments.
///
/// The returned stream either ends cleanly or yields one `Err` and ends.
/// Failing before the first fragment (bad credentials, spawn failure) is
/// reported through the outer `Result`.
#[async_trait::async_trait]
pub trait AnswerProvider: Send + Sync {
    async fn stream_answer(&self, req: AnswerRequest) -> Result<FragmentStream>;

    fn provider_id(&self) -> &str;
}

/// Backend the tool-call gate delegates to.  Returns the model's raw text;
/// the gate does the parsing and falls back on anything malformed.
#[async_trait::async_trait]
pub trait DecisionProvider: Send + Sync {
    async fn decide(&self, prompt: &str) -> Result<String>;

    fn provider_id(&self) -> &str;
}

/// External knowledge source.
///
/// `Error::EmptyResult` means the source answered but had nothing for the
/// term; callers may retry with a broader term.
#[async_trait::async_trait]
pub trait EnrichmentProvider: Send + Sync {
    async fn lookup(&self, term: &str) -> Result<EnrichmentPayload>;

    fn provider_id(&self) -> &str;
}
