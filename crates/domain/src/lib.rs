pub mod config;
pub mod context;
pub mod error;
pub mod record;
pub mod stream;
