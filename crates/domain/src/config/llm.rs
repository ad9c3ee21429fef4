use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Primary-answer provider
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Which backend produces the primary answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum LlmProviderKind {
    Mock,
    OpenaiCompat,
    /// Local `codex` CLI, driven as a subprocess.
    #[default]
    Codex,
}

impl LlmProviderKind {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "mock" => Some(Self::Mock),
            "openai" | "openai_compat" | "openai-compat" => Some(Self::OpenaiCompat),
            "codex" => Some(Self::Codex),
            _ => None,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmConfig {
    #[serde(default)]
    pub provider: LlmProviderKind,
    /// Forces the mock provider regardless of `provider`.
    #[serde(default)]
    pub use_mock: bool,
    /// Full chat-completions endpoint for `openai_compat`.
    #[serde(default = "d_base_url")]
    pub base_url: String,
    /// Model name.  `openai_compat` falls back to `gpt-4o-mini`; `codex`
    /// omits `-m` when unset.
    #[serde(default)]
    pub model: Option<String>,
    /// Environment variable holding the API key for `openai_compat`.
    #[serde(default = "d_api_key_env")]
    pub api_key_env: String,
    #[serde(default = "d_codex_bin")]
    pub codex_bin: String,
    /// Hard deadline for one provider call (the codex child is killed
    /// when it passes).
    #[serde(default = "d_timeout_ms")]
    pub timeout_ms: u64,
    /// Characters per re-chunked fragment for non-streaming backends.
    #[serde(default = "d_chunk_size")]
    pub chunk_size: usize,
    #[serde(default = "d_chunk_delay_ms")]
    pub chunk_delay_ms: u64,
    #[serde(default = "d_chunk_delay_ms")]
    pub mock_chunk_delay_ms: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            provider: LlmProviderKind::default(),
            use_mock: false,
            base_url: d_base_url(),
            model: None,
            api_key_env: d_api_key_env(),
            codex_bin: d_codex_bin(),
            timeout_ms: d_timeout_ms(),
            chunk_size: d_chunk_size(),
            chunk_delay_ms: d_chunk_delay_ms(),
            mock_chunk_delay_ms: d_chunk_delay_ms(),
        }
    }
}

impl LlmConfig {
    /// The provider actually used once `use_mock` is taken into account.
    pub fn effective_provider(&self) -> LlmProviderKind {
        if self.use_mock {
            LlmProviderKind::Mock
        } else {
            self.provider
        }
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

fn d_base_url() -> String {
    "https://api.openai.com/v1/chat/completions".into()
}
fn d_api_key_env() -> String {
    "LLM_API_KEY".into()
}
fn d_codex_bin() -> String {
    "codex".into()
}
fn d_timeout_ms() -> u64 {
    20_000
}
fn d_chunk_size() -> usize {
    24
}
fn d_chunk_delay_ms() -> u64 {
    30
}
