//! Blacklist filtering of fetched documents.
//!
//! Filtering works on the raw text: blacklisted VEVENT blocks are cut out and
//! every other byte of the document is kept as fetched. The filtered text is
//! what gets stored, mirrored and compared on the next run, so it must not
//! pick up any noise from re-serialization.

use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{WatchError, WatchResult};
use crate::event::{Event, EventKey};
use crate::ics::parse_events;

/// Description-prefix tokens. An event is dropped when the first line of its
/// description equals one of them.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Blacklist(HashSet<String>);

impl Blacklist {
    pub fn new<I, S>(tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Blacklist(
            tokens
                .into_iter()
                .map(|t| t.as_ref().trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        )
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn matches(&self, event: &Event) -> bool {
        event
            .description_head()
            .is_some_and(|head| self.0.contains(head.trim()))
    }
}

/// Result of filtering one document.
#[derive(Debug, Clone)]
pub struct Filtered {
    pub text: String,
    pub dropped: Vec<EventKey>,
}

/// Remove blacklisted events from a raw ICS document.
pub fn apply(raw: &str, blacklist: &Blacklist) -> WatchResult<Filtered> {
    if blacklist.is_empty() {
        return Ok(Filtered {
            text: raw.to_string(),
            dropped: Vec::new(),
        });
    }

    let mut text = String::with_capacity(raw.len());
    let mut dropped = Vec::new();
    let mut block: Option<String> = None;

    for line in raw.split_inclusive('\n') {
        let content = line.trim_end_matches(['\r', '\n']);

        match block.as_mut() {
            None if content.eq_ignore_ascii_case("BEGIN:VEVENT") => {
                block = Some(line.to_string());
            }
            None => text.push_str(line),
            Some(buf) => {
                buf.push_str(line);
                if content.eq_ignore_ascii_case("END:VEVENT") {
                    let finished = block.take().unwrap_or_default();
                    let event = parse_block(&finished)?;
                    if blacklist.matches(&event) {
                        debug!(uid = %event.uid, "dropping blacklisted event");
                        dropped.push(event.key());
                    } else {
                        text.push_str(&finished);
                    }
                }
            }
        }
    }

    if block.is_some() {
        return Err(WatchError::Parse("unterminated VEVENT block".to_string()));
    }

    Ok(Filtered { text, dropped })
}

fn parse_block(block: &str) -> WatchResult<Event> {
    let separator = if block.ends_with('\n') { "" } else { "\r\n" };
    let wrapped =
        format!("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:calwatch\r\n{block}{separator}END:VCALENDAR\r\n");

    parse_events(&wrapped)?
        .into_iter()
        .next()
        .ok_or_else(|| WatchError::Parse("empty VEVENT block".to_string()))
}
