//! In-memory request-record store.
//!
//! Every read reconciles expiry lazily: a record observed past its
//! `expires_at` is flipped to `expired` before anything else is returned.
//! Terminal-state notifications go to the hub only after the write lock is
//! released, so an observer woken by the hub always reads the new state.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use chrono::{DateTime, Utc};
use parking_lot::RwLock;

use ps_domain::error::{Error, Result};
use ps_domain::record::{EnrichmentPayload, NormalPayload, RequestRecord, RequestStatus};

use crate::clock::Clock;
use crate::hub::{NotificationHub, TerminalEvent};
use crate::mirror::RecordMirror;

/// Result of an owner-scoped lookup.
#[derive(Debug, Clone, PartialEq)]
pub enum Lookup {
    Found(RequestRecord),
    NotFound,
    Forbidden,
}

/// Counts from one sweeper pass.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: usize,
    pub purged: usize,
}

pub struct RequestStore {
    records: RwLock<HashMap<String, RequestRecord>>,
    ttl: chrono::Duration,
    clock: Arc<dyn Clock>,
    hub: Arc<NotificationHub>,
    mirror: Option<RecordMirror>,
}

impl RequestStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>, hub: Arc<NotificationHub>) -> Self {
        Self {
            records: RwLock::new(HashMap::new()),
            ttl: to_chrono(ttl),
            clock,
            hub,
            mirror: None,
        }
    }

    pub fn with_mirror(mut self, mirror: RecordMirror) -> Self {
        self.mirror = Some(mirror);
        self
    }

    pub fn hub(&self) -> &Arc<NotificationHub> {
        &self.hub
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Wait until every snapshot committed so far has reached the mirror.
    /// A no-op without one.
    pub async fn flush_mirror(&self) {
        if let Some(ref mirror) = self.mirror {
            mirror.flush().await;
        }
    }

    pub fn ttl(&self) -> Duration {
        self.ttl.to_std().unwrap_or(Duration::ZERO)
    }

    // ── Creation ─────────────────────────────────────────────────────

    /// Insert a new `pending` record with the store's default TTL.
    pub fn create(&self, request_id: &str, user_id: &str, query: &str) -> Result<RequestRecord> {
        self.create_with_ttl(request_id, user_id, query, self.ttl())
    }

    pub fn create_with_ttl(
        &self,
        request_id: &str,
        user_id: &str,
        query: &str,
        ttl: Duration,
    ) -> Result<RequestRecord> {
        let record = RequestRecord::new(request_id, user_id, query, self.now(), to_chrono(ttl));
        {
            let mut records = self.records.write();
            if records.contains_key(request_id) {
                return Err(Error::DuplicateRequest(request_id.to_owned()));
            }
            records.insert(request_id.to_owned(), record.clone());
        }
        self.committed(&record, None);
        Ok(record)
    }

    // ── Reads ────────────────────────────────────────────────────────

    /// Fetch a record, reconciling expiry first.
    ///
    /// Live records are served under a shared read lock; the write lock is
    /// taken only when the record is due to expire.
    pub fn get(&self, request_id: &str) -> Option<RequestRecord> {
        let now = self.now();
        {
            let records = self.records.read();
            let record = records.get(request_id)?;
            if !needs_expiry(record, now) {
                return Some(record.clone());
            }
        }

        let (snapshot, flipped) = {
            let mut records = self.records.write();
            let record = records.get_mut(request_id)?;
            // Another reader may have flipped it between the two locks.
            let flipped = expire_if_due(record, now);
            (record.clone(), flipped)
        };

        if flipped {
            self.committed(&snapshot, Some(TerminalEvent::Expired));
        }
        Some(snapshot)
    }

    /// Fetch a record on behalf of `user_id`.  Ownership is checked before
    /// expiry is reconciled, so another user's record is never touched.
    pub fn get_for_owner(&self, request_id: &str, user_id: &str) -> Lookup {
        {
            let records = self.records.read();
            match records.get(request_id) {
                None => return Lookup::NotFound,
                Some(r) if r.user_id != user_id => return Lookup::Forbidden,
                Some(_) => {}
            }
        }
        // The sweeper may purge between the two locks.
        match self.get(request_id) {
            Some(record) => Lookup::Found(record),
            None => Lookup::NotFound,
        }
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    // ── Mutations ────────────────────────────────────────────────────

    /// Store the primary answer.  Written at most once and refused once the
    /// record has expired.  Returns whether the write happened.
    pub fn set_normal_result(&self, request_id: &str, payload: NormalPayload) -> bool {
        self.mutate(request_id, |record| {
            if record.status == RequestStatus::Expired || record.results.normal.is_some() {
                return (false, None);
            }
            record.results.normal = Some(payload);
            (true, None)
        })
    }

    /// Store the enrichment payload and move `pending` to `ready`.  Refused
    /// from any other state, including a record that has just expired.
    pub fn set_enrichment_result(&self, request_id: &str, payload: EnrichmentPayload) -> bool {
        self.mutate(request_id, |record| {
            if record.status != RequestStatus::Pending {
                return (false, None);
            }
            record.results.mcp = Some(payload);
            record.status = RequestStatus::Ready;
            (true, Some(TerminalEvent::Ready))
        })
    }

    /// Move `pending` to `failed`.  An expired record stays expired.
    pub fn set_failed(&self, request_id: &str) -> bool {
        self.mutate(request_id, |record| {
            if record.status != RequestStatus::Pending {
                return (false, None);
            }
            record.status = RequestStatus::Failed;
            (true, Some(TerminalEvent::Failed))
        })
    }

    /// Reconcile expiry on every record and drop those that expired more
    /// than `retain` ago.
    pub fn sweep(&self, retain: Duration) -> SweepReport {
        let now = self.now();
        let retain = to_chrono(retain);
        let mut expired = Vec::new();
        let purged;
        {
            let mut records = self.records.write();
            for record in records.values_mut() {
                if expire_if_due(record, now) {
                    expired.push(record.clone());
                }
            }
            let before = records.len();
            records.retain(|_, r| {
                r.expires_at
                    .checked_add_signed(retain)
                    .map_or(true, |purge_at| now <= purge_at)
            });
            purged = before - records.len();
        }

        for snapshot in &expired {
            self.committed(snapshot, Some(TerminalEvent::Expired));
        }

        let report = SweepReport {
            expired: expired.len(),
            purged,
        };
        if report != SweepReport::default() {
            tracing::debug!(
                expired = report.expired,
                purged = report.purged,
                "request sweep"
            );
        }
        report
    }

    // ── Private helpers ──────────────────────────────────────────────

    /// Run `f` on the record under the write lock after reconciling
    /// expiry.  `f` returns whether it wrote and which event to emit.
    fn mutate<F>(&self, request_id: &str, f: F) -> bool
    where
        F: FnOnce(&mut RequestRecord) -> (bool, Option<TerminalEvent>),
    {
        let now = self.now();
        let (expired_snapshot, outcome) = {
            let mut records = self.records.write();
            let Some(record) = records.get_mut(request_id) else {
                return false;
            };
            let flipped = expire_if_due(record, now);
            let expired_snapshot = flipped.then(|| record.clone());
            let (written, event) = f(record);
            let outcome = written.then(|| (record.clone(), event));
            (expired_snapshot, outcome)
        };

        if let Some(snapshot) = expired_snapshot {
            self.committed(&snapshot, Some(TerminalEvent::Expired));
        }
        match outcome {
            Some((snapshot, event)) => {
                self.committed(&snapshot, event);
                true
            }
            None => false,
        }
    }

    /// Post-commit side effects: mirror the snapshot, then wake observers.
    fn committed(&self, snapshot: &RequestRecord, event: Option<TerminalEvent>) {
        if let Some(ref mirror) = self.mirror {
            mirror.append(snapshot);
        }
        if let Some(event) = event {
            self.hub.emit(&snapshot.request_id, event);
        }
    }
}

fn needs_expiry(record: &RequestRecord, now: DateTime<Utc>) -> bool {
    record.status != RequestStatus::Expired && record.is_expired_at(now)
}

fn expire_if_due(record: &mut RequestRecord, now: DateTime<Utc>) -> bool {
    if needs_expiry(record, now) {
        record.status = RequestStatus::Expired;
        true
    } else {
        false
    }
}

fn to_chrono(d: Duration) -> chrono::Duration {
    chrono::Duration::from_std(d).unwrap_or(chrono::Duration::MAX)
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Tests
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
