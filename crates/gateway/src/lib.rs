//! parallel-search gateway: HTTP delivery, per-request orchestration and
//! process bootstrap.

pub mod api;
pub mod bootstrap;
pub mod cli;
pub mod runtime;
pub mod state;
