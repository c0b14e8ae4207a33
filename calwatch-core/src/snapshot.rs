//! Parsed calendar state at one point in time.

use std::collections::HashMap;

use crate::error::{WatchError, WatchResult};
use crate::event::{Event, EventKey};
use crate::ics::parse_events;

/// An immutable, ordered set of events plus the text they were parsed from.
#[derive(Debug, Clone)]
pub struct CalendarSnapshot {
    raw: String,
    events: Vec<Event>,
    index: HashMap<EventKey, usize>,
}

impl CalendarSnapshot {
    /// Parse an ICS document. Fails if the document is malformed or two
    /// events share a key.
    pub fn parse(raw: impl Into<String>) -> WatchResult<Self> {
        let raw = raw.into();
        let events = parse_events(&raw)?;
        Self::from_events(raw, events)
    }

    pub fn from_events(raw: impl Into<String>, events: Vec<Event>) -> WatchResult<Self> {
        let mut index = HashMap::with_capacity(events.len());
        for (position, event) in events.iter().enumerate() {
            let key = event.key();
            if index.insert(key.clone(), position).is_some() {
                return Err(WatchError::DuplicateEvent(key.to_string()));
            }
        }

        Ok(CalendarSnapshot {
            raw: raw.into(),
            events,
            index,
        })
    }

    pub fn raw(&self) -> &str {
        &self.raw
    }

    pub fn events(&self) -> &[Event] {
        &self.events
    }

    pub fn get(&self, key: &EventKey) -> Option<&Event> {
        self.index.get(key).map(|&i| &self.events[i])
    }

    pub fn contains(&self, key: &EventKey) -> bool {
        self.index.contains_key(key)
    }

    /// Event keys in document order
    pub fn keys(&self) -> impl Iterator<Item = EventKey> + '_ {
        self.events.iter().map(Event::key)
    }

    pub fn len(&self) -> usize {
        self.events.len()
    }

    pub fn is_empty(&self) -> bool {
        self.events.is_empty()
    }
}
