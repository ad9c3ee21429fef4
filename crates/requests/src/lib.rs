//! Request lifecycle state for parallel-search.
//!
//! Owns the request-record map and its TTL state machine, the per-request
//! notification hub used by push subscribers, and the per-user
//! previous-context entries that bias the next prompt.

pub mod clock;
pub mod context;
pub mod hub;
pub mod mirror;
pub mod store;

pub use clock::{Clock, ManualClock, SystemClock};
pub use context::PreviousContextStore;
pub use hub::{NotificationHub, Subscription, TerminalEvent};
pub use mirror::RecordMirror;
pub use store::{Lookup, RequestStore, SweepReport};
