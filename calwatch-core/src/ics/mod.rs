//! ICS document parsing.
//!
//! This module turns RFC 5545 text into [`Event`](crate::event::Event) records.

mod parse;

pub use parse::{parse_events, unescape_text};
