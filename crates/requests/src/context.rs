//! Per-user previous-context entries.
//!
//! Both orchestrators write here for the same user, possibly concurrently.
//! Writes merge: an answer update keeps the enrichment summary already
//! stored, and a summary update keeps the stored query and answer.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::RwLock;

use ps_domain::context::PreviousContext;
use ps_domain::record::EnrichmentSummary;

use crate::clock::Clock;

pub struct PreviousContextStore {
    entries: RwLock<HashMap<String, PreviousContext>>,
    clock: Arc<dyn Clock>,
}

impl PreviousContextStore {
    pub fn new(clock: Arc<dyn Clock>) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            clock,
        }
    }

    pub fn get(&self, user_id: &str) -> Option<PreviousContext> {
        self.entries.read().get(user_id).cloned()
    }

    /// Record a completed primary answer, keeping any stored summary.
    pub fn record_answer(&self, user_id: &str, query: &str, answer: &str) {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let mcp_summary = entries.get(user_id).and_then(|e| e.mcp_summary.clone());
        entries.insert(
            user_id.to_owned(),
            PreviousContext {
                query: query.to_owned(),
                answer: answer.to_owned(),
                mcp_summary,
                updated_at: now,
            },
        );
    }

    /// Record an enrichment summary.  Without a stored entry the new one
    /// takes `fallback_query` and an empty answer.
    pub fn record_summary(&self, user_id: &str, fallback_query: &str, summary: EnrichmentSummary) {
        let now = self.clock.now();
        let mut entries = self.entries.write();
        let entry = entries
            .entry(user_id.to_owned())
            .or_insert_with(|| PreviousContext {
                query: fallback_query.to_owned(),
                answer: String::new(),
                mcp_summary: None,
                updated_at: now,
            });
        entry.mcp_summary = Some(summary);
        entry.updated_at = now;
    }

    /// Remove one user's entry.  Returns whether one existed.
    pub fn clear_user(&self, user_id: &str) -> bool {
        self.entries.write().remove(user_id).is_some()
    }

    pub fn clear_all(&self) {
        self.entries.write().clear();
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}
