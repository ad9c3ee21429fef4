use std::time::Duration;

use serde::{Deserialize, Serialize};

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tool-call decision gate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum GateMode {
    /// Pattern match only.
    Heuristic,
    /// Ask a decision provider, OR-ed with the heuristic.
    #[default]
    Delegate,
}

impl GateMode {
    pub fn parse(s: &str) -> Option<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "heuristic" | "simple" => Some(Self::Heuristic),
            "delegate" | "llm" => Some(Self::Delegate),
            _ => None,
        }
    }
}

/// Backend consulted in `delegate` mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum DelegateKind {
    #[default]
    Codex,
    OpenaiCompat,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct GateConfig {
    #[serde(default)]
    pub mode: GateMode,
    #[serde(default = "d_decision_timeout_ms")]
    pub decision_timeout_ms: u64,
    #[serde(default)]
    pub delegate: DelegateKind,
}

impl Default for GateConfig {
    fn default() -> Self {
        Self {
            mode: GateMode::default(),
            decision_timeout_ms: d_decision_timeout_ms(),
            delegate: DelegateKind::default(),
        }
    }
}

impl GateConfig {
    pub fn decision_timeout(&self) -> Duration {
        Duration::from_millis(self.decision_timeout_ms)
    }
}

fn d_decision_timeout_ms() -> u64 {
    3000
}
