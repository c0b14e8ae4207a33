//! Core types for calwatch.
//!
//! This crate holds everything that decides whether a watched calendar
//! changed, and how:
//! - `event` and `snapshot` for parsed calendar state
//! - `filter` for blacklist filtering of fetched documents
//! - `diff` for the change detection pipeline and its reports
//! - `store` and `config` for the state kept between runs

pub mod config;
pub mod diff;
pub mod error;
pub mod event;
pub mod filter;
pub mod ics;
pub mod snapshot;
pub mod store;

// Re-export the event types at crate root for convenience
pub use event::*;
