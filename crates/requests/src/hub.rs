//! Per-request fan-out of terminal enrichment events.
//!
//! Each observer registers a one-shot handle under a request id.  An emit
//! drains every handle for that id, so each observer sees at most one event
//! and a second emit for the same id reaches nobody.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::Mutex;
use tokio::sync::oneshot;

use ps_domain::record::RequestStatus;

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Terminal events
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TerminalEvent {
    Ready,
    Failed,
    Expired,
}

impl TerminalEvent {
    /// Event-stream name for this event.
    pub fn event_name(self) -> &'static str {
        match self {
            Self::Ready => "enrichment-ready",
            Self::Failed => "enrichment-failed",
            Self::Expired => "enrichment-expired",
        }
    }

    /// The event a record in `status` would have produced, if terminal.
    pub fn from_status(status: RequestStatus) -> Option<Self> {
        match status {
            RequestStatus::Pending => None,
            RequestStatus::Ready => Some(Self::Ready),
            RequestStatus::Failed => Some(Self::Failed),
            RequestStatus::Expired => Some(Self::Expired),
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Hub
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

type Handle = (u64, oneshot::Sender<TerminalEvent>);

#[derive(Default)]
pub struct NotificationHub {
    waiters: Mutex<HashMap<String, Vec<Handle>>>,
    next_id: AtomicU64,
}

impl NotificationHub {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an observer for `request_id`.  The returned subscription
    /// unregisters itself when dropped.
    pub fn register(self: &Arc<Self>, request_id: &str) -> Subscription {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let (tx, rx) = oneshot::channel();
        self.waiters
            .lock()
            .entry(request_id.to_owned())
            .or_default()
            .push((id, tx));

        Subscription {
            hub: Arc::clone(self),
            request_id: request_id.to_owned(),
            id,
            rx,
        }
    }

    /// Deliver `event` to every observer currently registered for
    /// `request_id` and forget them.  Returns how many received it.
    pub fn emit(&self, request_id: &str, event: TerminalEvent) -> usize {
        let handles = self.waiters.lock().remove(request_id).unwrap_or_default();
        let delivered = handles
            .into_iter()
            .filter(|(_, tx)| !tx.is_closed())
            .map(|(_, tx)| tx.send(event))
            .filter(Result::is_ok)
            .count();

        if delivered > 0 {
            tracing::debug!(
                request_id,
                event = event.event_name(),
                delivered,
                "hub emitted terminal event"
            );
        }
        delivered
    }

    /// Number of live registrations for `request_id`.
    pub fn observer_count(&self, request_id: &str) -> usize {
        self.waiters
            .lock()
            .get(request_id)
            .map(Vec::len)
            .unwrap_or(0)
    }

    fn unregister(&self, request_id: &str, id: u64) {
        let mut waiters = self.waiters.lock();
        if let Some(handles) = waiters.get_mut(request_id) {
            handles.retain(|(hid, _)| *hid != id);
            if handles.is_empty() {
                waiters.remove(request_id);
            }
        }
    }
}

// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━
// Subscription
// ━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━━

/// One observer's registration.  Dropping it unregisters.
pub struct Subscription {
    hub: Arc<NotificationHub>,
    request_id: String,
    id: u64,
    rx: oneshot::Receiver<TerminalEvent>,
}

impl Subscription {
    pub fn request_id(&self) -> &str {
        &self.request_id
    }

    /// Wait for the terminal event.  `None` if the hub dropped the handle
    /// without sending.
    pub async fn recv(&mut self) -> Option<TerminalEvent> {
        (&mut self.rx).await.ok()
    }

    /// Non-blocking check, used right after registering.
    pub fn try_recv(&mut self) -> Option<TerminalEvent> {
        self.rx.try_recv().ok()
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.hub.unregister(&self.request_id, self.id);
    }
}
