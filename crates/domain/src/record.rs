//! Request records, the per-query entity shared by the primary and
//! enrichment channels.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Status
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// Lifecycle of a request's enrichment channel.
///
/// `Pending` is the only non-terminal state. `Ready` and `Failed` are only
/// reachable from `Pending`; `Expired` overrides everything once the TTL
/// has elapsed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RequestStatus {
    Pending,
    Ready,
    Failed,
    Expired,
}

impl RequestStatus {
    pub fn is_terminal(self) -> bool {
        !matches!(self, Self::Pending)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Ready => "ready",
            Self::Failed => "failed",
            Self::Expired => "expired",
        }
    }
}

impl std::fmt::Display for RequestStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Payloads
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One item of the primary answer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AnswerItem {
    #[serde(rename = "type")]
    pub kind: String,
    pub answer: String,
    pub source: String,
}

impl AnswerItem {
    pub fn llm(answer: impl Into<String>) -> Self {
        Self {
            kind: "llm".into(),
            answer: answer.into(),
            source: "llm".into(),
        }
    }
}

/// Structured payload of the primary answer (`results.normal`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NormalPayload {
    pub results: Vec<AnswerItem>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub meta: Option<Value>,
}

impl NormalPayload {
    /// Wrap a completed answer the way both delivery modes commit it.
    pub fn from_answer(answer: impl Into<String>) -> Self {
        Self {
            results: vec![AnswerItem::llm(answer)],
            meta: None,
        }
    }

    pub fn with_meta(mut self, meta: Value) -> Self {
        self.meta = Some(meta);
        self
    }

    /// Text of the first answer item, or `""`.
    pub fn first_answer(&self) -> &str {
        self.results
            .first()
            .map(|item| item.answer.as_str())
            .unwrap_or("")
    }
}

/// A single hit returned by list-style knowledge sources.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentHit {
    pub title: String,
    pub url: String,
    pub snippet: String,
}

/// Structured payload of the enrichment lookup (`results.mcp`).
///
/// Different knowledge sources fill different optional parts: the mock
/// source returns `results`, NamuWiki returns `content`, Wikipedia returns
/// the raw `search` response plus the page `summary`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentPayload {
    pub source: String,
    pub query: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub results: Vec<EnrichmentHit>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub content: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub summary: Option<Value>,
}

impl EnrichmentPayload {
    pub fn new(source: impl Into<String>, query: impl Into<String>) -> Self {
        Self {
            source: source.into(),
            query: query.into(),
            results: Vec::new(),
            content: None,
            search: None,
            summary: None,
        }
    }

    /// Compact summary carried into the next prompt for the same user.
    ///
    /// Only payloads with a `summary` object produce one. `extract` falls
    /// back to `description`; the image comes from `originalimage.source`.
    pub fn compact_summary(&self) -> Option<EnrichmentSummary> {
        let summary = self.summary.as_ref()?.as_object()?;
        let text = |key: &str| {
            summary
                .get(key)
                .and_then(|v| v.as_str())
                .filter(|s| !s.is_empty())
                .map(str::to_owned)
        };

        Some(EnrichmentSummary {
            title: text("title").unwrap_or_default(),
            extract: text("extract")
                .or_else(|| text("description"))
                .unwrap_or_default(),
            image: summary
                .get("originalimage")
                .and_then(|img| img.get("source"))
                .and_then(|s| s.as_str())
                .map(str::to_owned),
        })
    }
}

/// Title/extract/image triple derived from an enrichment payload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EnrichmentSummary {
    pub title: String,
    pub extract: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Record
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RequestResults {
    pub normal: Option<NormalPayload>,
    pub mcp: Option<EnrichmentPayload>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RequestRecord {
    pub request_id: String,
    pub user_id: String,
    pub query: String,
    pub status: RequestStatus,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub results: RequestResults,
}

impl RequestRecord {
    pub fn new(
        request_id: impl Into<String>,
        user_id: impl Into<String>,
        query: impl Into<String>,
        now: DateTime<Utc>,
        ttl: Duration,
    ) -> Self {
        Self {
            request_id: request_id.into(),
            user_id: user_id.into(),
            query: query.into(),
            status: RequestStatus::Pending,
            created_at: now,
            expires_at: now.checked_add_signed(ttl).unwrap_or(DateTime::<Utc>::MAX_UTC),
            results: RequestResults::default(),
        }
    }

    /// Strictly after `expires_at`; a read at exactly the deadline is still live.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now > self.expires_at
    }

    /// Time left until expiry, clamped at zero.
    pub fn remaining(&self, now: DateTime<Utc>) -> std::time::Duration {
        (self.expires_at - now)
            .to_std()
            .unwrap_or(std::time::Duration::ZERO)
    }
}

/// Generate a fresh opaque request identifier.
pub fn new_request_id() -> String {
    uuid::Uuid::new_v4().to_string()
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
