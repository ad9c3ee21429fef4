//! Backends for parallel-search: primary-answer generators, the tool-call
//! delegate, and external knowledge sources.

pub mod codex;
pub mod mock;
pub mod namuwiki;
pub mod openai_compat;
pub mod prompt;
pub mod registry;
pub mod traits;
pub mod wikipedia;
pub(crate) mod sse;
pub(crate) mod util;

// Re-exports for convenience.
pub use registry::ProviderRegistry;
pub use traits::{AnswerProvider, AnswerRequest, DecisionProvider, EnrichmentProvider};
pub use util::resolve_api_key;
