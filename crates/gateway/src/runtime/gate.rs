//! Tool-call decision gate.
//!
//! Decides whether a query should trigger an enrichment lookup, and with
//! which keyword.  The heuristic always runs.  In `delegate` mode a
//! [`DecisionProvider`] is asked as well, and the two verdicts are unioned:
//! the delegate can widen the heuristic's answer but never veto it.  The
//! gate itself never fails.

use std::sync::{Arc, LazyLock};
use std::time::Duration;

use regex::Regex;
use serde_json::Value;

use ps_domain::config::{GateConfig, GateMode};
use ps_providers::prompt::decision_prompt;
use ps_providers::DecisionProvider;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Heuristic
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

static HEURISTIC_PATTERNS: LazyLock<Vec<Regex>> = LazyLock::new(|| {
    [
        // ASCII word boundaries, so "what이야" still counts.
        r"(?i)(?-u:\b)(what|who|where|when|why|how)(?-u:\b)",
        r"설명|요약|정의|배경|역사|원리|구조|연구|논문|문헌|개요|소개",
        r"누구|무엇|뭐|어떤",
        r"위키|백과|정보",
        r"커넥텀|커넥톰",
        r"(?i)예쁜꼬마선충|선충|C\.?\s*elegans",
    ]
    .iter()
    .filter_map(|p| Regex::new(p).ok())
    .collect()
});

static HANGUL_RUN: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"[가-힣]{2,}").ok());

/// Terms that win keyword derivation outright, checked in order.
const KNOWN_TERMS: [&str; 6] = ["예쁜꼬마선충", "커넥텀", "커넥톰", "선충", "C. elegans", "C elegans"];

/// Outcome of the gate.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolDecision {
    pub should_call: bool,
    /// Lookup term.  Empty when `should_call` is false.
    pub keyword: String,
}

impl ToolDecision {
    fn skip() -> Self {
        Self {
            should_call: false,
            keyword: String::new(),
        }
    }
}

pub fn heuristic_matches(query: &str) -> bool {
    HEURISTIC_PATTERNS.iter().any(|p| p.is_match(query))
}

/// Best lookup term for `query`: a known term, else the first run of two
/// or more Hangul syllables, else the first token, else the whole query.
pub fn derive_keyword(query: &str) -> String {
    if let Some(term) = KNOWN_TERMS.iter().find(|t| query.contains(*t)) {
        return (*term).to_owned();
    }
    if let Some(m) = HANGUL_RUN.as_ref().and_then(|re| re.find(query)) {
        return m.as_str().to_owned();
    }
    query
        .split_whitespace()
        .next()
        .map(str::to_owned)
        .unwrap_or_else(|| query.to_owned())
}

pub fn heuristic(query: &str) -> ToolDecision {
    if heuristic_matches(query) {
        ToolDecision {
            should_call: true,
            keyword: derive_keyword(query),
        }
    } else {
        ToolDecision::skip()
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Delegate response parsing
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// What a delegate said, once its JSON was found and validated.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DelegateVerdict {
    pub should_call: bool,
    pub keyword: Option<String>,
}

/// Parse `{"shouldCallTool": bool, "keyword": "..."}` out of a delegate
/// reply.  The object may sit inside prose or a fenced code block.
/// Returns `None` when no object is found or `shouldCallTool` is not a
/// boolean.
pub fn parse_delegate_response(raw: &str) -> Option<DelegateVerdict> {
    let value = extract_json_object(raw)?;
    let should_call = value.get("shouldCallTool")?.as_bool()?;
    let keyword = value
        .get("keyword")
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_owned);
    Some(DelegateVerdict {
        should_call,
        keyword,
    })
}

fn extract_json_object(raw: &str) -> Option<Value> {
    let trimmed = raw.trim();
    if let Ok(v @ Value::Object(_)) = serde_json::from_str::<Value>(trimmed) {
        return Some(v);
    }
    // Outermost braces; covers ```json fences and leading prose.
    let start = trimmed.find('{')?;
    let end = trimmed.rfind('}')?;
    if end <= start {
        return None;
    }
    match serde_json::from_str::<Value>(&trimmed[start..=end]) {
        Ok(v @ Value::Object(_)) => Some(v),
        _ => None,
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// ToolGate
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Clone)]
pub struct ToolGate {
    mode: GateMode,
    timeout: Duration,
    delegate: Option<Arc<dyn DecisionProvider>>,
}

impl ToolGate {
    pub fn new(mode: GateMode, timeout: Duration, delegate: Option<Arc<dyn DecisionProvider>>) -> Self {
        Self {
            mode,
            timeout,
            delegate,
        }
    }

    pub fn from_config(cfg: &GateConfig, delegate: Option<Arc<dyn DecisionProvider>>) -> Self {
        Self::new(cfg.mode, cfg.decision_timeout(), delegate)
    }

    pub async fn decide(&self, query: &str, user_id: Option<&str>) -> ToolDecision {
        let query = query.trim();
        let fallback = heuristic(query);

        let delegate = match (self.mode, &self.delegate) {
            (GateMode::Delegate, Some(d)) => d,
            _ => return fallback,
        };

        let prompt = decision_prompt(query, user_id);
        let raw = match tokio::time::timeout(self.timeout, delegate.decide(&prompt)).await {
            Ok(Ok(raw)) => raw,
            Ok(Err(e)) => {
                tracing::debug!(error = %e, delegate = delegate.provider_id(), "gate delegate failed");
                return fallback;
            }
            Err(_) => {
                tracing::debug!(
                    timeout_ms = self.timeout.as_millis() as u64,
                    delegate = delegate.provider_id(),
                    "gate delegate timed out"
                );
                return fallback;
            }
        };

        let Some(verdict) = parse_delegate_response(&raw) else {
            tracing::debug!(delegate = delegate.provider_id(), "gate delegate reply malformed");
            return fallback;
        };

        if !(fallback.should_call || verdict.should_call) {
            return ToolDecision::skip();
        }
        ToolDecision {
            should_call: true,
            keyword: verdict.keyword.unwrap_or_else(|| derive_keyword(query)),
        }
    }
}
