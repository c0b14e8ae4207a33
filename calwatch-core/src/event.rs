//! Calendar event types.
//!
//! Events are parsed out of fetched ICS documents. Comparison never looks at
//! the struct as a whole: it walks the static [`EventField`] schema, so which
//! fields count as a change is spelled out in one place.

use std::fmt;

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// A calendar event (one VEVENT block)
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Event {
    pub uid: String,
    /// Set on overrides of a single instance of a recurring event (RECURRENCE-ID)
    pub recurrence_id: Option<EventTime>,
    pub summary: Option<String>,
    pub description: Option<String>,
    pub location: Option<String>,
    pub start: Option<EventTime>,
    pub end: Option<EventTime>,
    pub priority: Option<IntValue>,
    pub status: Option<EventStatus>,
    pub url: Option<String>,

    // Bookkeeping, rewritten by most servers on every export
    /// CREATED
    pub created: Option<String>,
    /// DTSTAMP
    pub stamp: Option<String>,
    /// LAST-MODIFIED
    pub last_modified: Option<String>,
    /// SEQUENCE
    pub sequence: Option<IntValue>,

    /// Every other property (RRULE, CATEGORIES, ATTENDEE, X-...), kept verbatim.
    /// Compared through the list fields and [`EventField::Other`].
    pub properties: Vec<EventProperty>,
}

impl Event {
    /// Create an event with only a uid set.
    pub fn new(uid: impl Into<String>) -> Self {
        Event {
            uid: uid.into(),
            recurrence_id: None,
            summary: None,
            description: None,
            location: None,
            start: None,
            end: None,
            priority: None,
            status: None,
            url: None,
            created: None,
            stamp: None,
            last_modified: None,
            sequence: None,
            properties: Vec::new(),
        }
    }

    /// Identity of this event within a calendar: (uid, formatted recurrence_id)
    pub fn key(&self) -> EventKey {
        EventKey {
            uid: self.uid.clone(),
            recurrence_id: self.recurrence_id.as_ref().map(|t| t.to_ics_string()),
        }
    }

    /// Read one field of the schema as a comparable value.
    pub fn field(&self, field: EventField) -> Option<FieldValue> {
        match field {
            EventField::Summary => self.summary.clone().map(FieldValue::Text),
            EventField::Description => self.description.clone().map(FieldValue::Text),
            EventField::Location => self.location.clone().map(FieldValue::Text),
            EventField::Start => self.start.clone().map(FieldValue::Time),
            EventField::End => self.end.clone().map(FieldValue::Time),
            EventField::Priority => self.priority.as_ref().map(IntValue::to_field_value),
            EventField::Status => self
                .status
                .as_ref()
                .map(|s| FieldValue::Text(s.as_ics_str().to_string())),
            EventField::Url => self.url.clone().map(FieldValue::Text),
            EventField::Rrule => self.list_field("RRULE", false),
            EventField::Rdate => self.list_field("RDATE", true),
            EventField::Exdate => self.list_field("EXDATE", true),
            EventField::Categories => self.list_field("CATEGORIES", true),
            EventField::Organizer => self.line_field(|name| name == "ORGANIZER"),
            EventField::Attendees => self.line_field(|name| name == "ATTENDEE"),
            EventField::Other => {
                self.line_field(|name| !LIST_FIELD_PROPERTIES.contains(&name))
            }
            EventField::Created => self.created.clone().map(FieldValue::Text),
            EventField::Stamp => self.stamp.clone().map(FieldValue::Text),
            EventField::LastModified => self.last_modified.clone().map(FieldValue::Text),
            EventField::Sequence => self.sequence.as_ref().map(IntValue::to_field_value),
        }
    }

    /// Values of every `name` property, sorted so reordering is not a change.
    /// With `split`, comma-separated lists count item by item.
    fn list_field(&self, name: &str, split: bool) -> Option<FieldValue> {
        let mut values: Vec<&str> = self
            .properties
            .iter()
            .filter(|p| p.name == name)
            .flat_map(|p| {
                if split {
                    p.value.split(',').map(str::trim).collect::<Vec<_>>()
                } else {
                    vec![p.value.as_str()]
                }
            })
            .collect();
        values.sort_unstable();
        (!values.is_empty()).then(|| FieldValue::Text(values.join(", ")))
    }

    /// Whole content lines, parameters included, as a sorted multiset.
    fn line_field(&self, include: impl Fn(&str) -> bool) -> Option<FieldValue> {
        let mut lines: Vec<String> = self
            .properties
            .iter()
            .filter(|p| include(p.name.as_str()))
            .map(EventProperty::to_content_line)
            .collect();
        lines.sort_unstable();
        (!lines.is_empty()).then(|| FieldValue::Text(lines.join("\n")))
    }

    /// First line of the description, used by blacklist filtering.
    pub fn description_head(&self) -> Option<&str> {
        self.description.as_deref().and_then(|d| d.lines().next())
    }
}

impl fmt::Display for Event {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.summary.as_deref().unwrap_or("(No title)"))
    }
}

/// Identity of an event within one calendar.
///
/// Plain events are identified by their UID alone. Overrides of a recurring
/// event share the master's UID and are told apart by RECURRENCE-ID.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct EventKey {
    pub uid: String,
    pub recurrence_id: Option<String>,
}

impl EventKey {
    pub fn uid(uid: impl Into<String>) -> Self {
        EventKey {
            uid: uid.into(),
            recurrence_id: None,
        }
    }
}

impl fmt::Display for EventKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.recurrence_id {
            Some(rid) => write!(f, "{} ({})", self.uid, rid),
            None => write!(f, "{}", self.uid),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum EventTime {
    Date(NaiveDate),
    DateTimeUtc(DateTime<Utc>),
    DateTimeFloating(NaiveDateTime),
    DateTimeZoned { datetime: NaiveDateTime, tzid: String },
}

impl EventTime {
    /// Format as the ICS property value (without parameters)
    pub fn to_ics_string(&self) -> String {
        match self {
            EventTime::Date(d) => d.format("%Y%m%d").to_string(),
            EventTime::DateTimeUtc(dt) => dt.format("%Y%m%dT%H%M%SZ").to_string(),
            EventTime::DateTimeFloating(dt) => dt.format("%Y%m%dT%H%M%S").to_string(),
            EventTime::DateTimeZoned { datetime, .. } => {
                datetime.format("%Y%m%dT%H%M%S").to_string()
            }
        }
    }
}

impl fmt::Display for EventTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            EventTime::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
            EventTime::DateTimeUtc(dt) => write!(f, "{} UTC", dt.format("%Y-%m-%d %H:%M")),
            EventTime::DateTimeFloating(dt) => write!(f, "{}", dt.format("%Y-%m-%d %H:%M")),
            EventTime::DateTimeZoned { datetime, tzid } => {
                write!(f, "{} ({})", datetime.format("%Y-%m-%d %H:%M"), tzid)
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventStatus {
    Confirmed,
    Tentative,
    Cancelled,
    /// Anything else, kept as written
    Other(String),
}

impl EventStatus {
    pub fn from_ics_str(s: &str) -> Self {
        match s {
            "CONFIRMED" => EventStatus::Confirmed,
            "TENTATIVE" => EventStatus::Tentative,
            "CANCELLED" => EventStatus::Cancelled,
            other => EventStatus::Other(other.to_string()),
        }
    }

    pub fn as_ics_str(&self) -> &str {
        match self {
            EventStatus::Confirmed => "CONFIRMED",
            EventStatus::Tentative => "TENTATIVE",
            EventStatus::Cancelled => "CANCELLED",
            EventStatus::Other(s) => s,
        }
    }
}

/// Integer property such as PRIORITY or SEQUENCE. Text that is not a number
/// is kept, so a change between two such values still shows up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum IntValue {
    Number(i64),
    Raw(String),
}

impl IntValue {
    pub fn parse(s: &str) -> Self {
        let s = s.trim();
        s.parse()
            .map(IntValue::Number)
            .unwrap_or_else(|_| IntValue::Raw(s.to_string()))
    }

    pub fn to_field_value(&self) -> FieldValue {
        match self {
            IntValue::Number(n) => FieldValue::Integer(*n),
            IntValue::Raw(s) => FieldValue::Text(s.clone()),
        }
    }
}

/// A property without a dedicated field, as it appeared in the document.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventProperty {
    pub name: String,
    pub params: Vec<(String, Option<String>)>,
    pub value: String,
}

impl EventProperty {
    pub fn new(name: impl Into<String>, value: impl Into<String>) -> Self {
        EventProperty {
            name: name.into(),
            params: Vec::new(),
            value: value.into(),
        }
    }

    /// `NAME;KEY=VAL:value`, unfolded.
    pub fn to_content_line(&self) -> String {
        let mut line = self.name.clone();
        for (key, val) in &self.params {
            line.push(';');
            line.push_str(key);
            if let Some(val) = val {
                line.push('=');
                line.push_str(val);
            }
        }
        line.push(':');
        line.push_str(&self.value);
        line
    }
}

/// Properties compared through their own list fields rather than [`EventField::Other`].
const LIST_FIELD_PROPERTIES: &[&str] =
    &["RRULE", "RDATE", "EXDATE", "CATEGORIES", "ORGANIZER", "ATTENDEE"];

/// The fields of an [`Event`] that take part in comparison.
///
/// Declaration order is the order deltas are reported in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventField {
    Summary,
    Description,
    Location,
    Start,
    End,
    Priority,
    Status,
    Url,
    Rrule,
    Rdate,
    Exdate,
    Categories,
    Organizer,
    Attendees,
    /// Every remaining property, compared as a whole
    Other,
    Created,
    Stamp,
    LastModified,
    Sequence,
}

impl EventField {
    pub const ALL: [EventField; 19] = [
        EventField::Summary,
        EventField::Description,
        EventField::Location,
        EventField::Start,
        EventField::End,
        EventField::Priority,
        EventField::Status,
        EventField::Url,
        EventField::Rrule,
        EventField::Rdate,
        EventField::Exdate,
        EventField::Categories,
        EventField::Organizer,
        EventField::Attendees,
        EventField::Other,
        EventField::Created,
        EventField::Stamp,
        EventField::LastModified,
        EventField::Sequence,
    ];

    pub fn name(self) -> &'static str {
        match self {
            EventField::Summary => "summary",
            EventField::Description => "description",
            EventField::Location => "location",
            EventField::Start => "start",
            EventField::End => "end",
            EventField::Priority => "priority",
            EventField::Status => "status",
            EventField::Url => "url",
            EventField::Rrule => "rrule",
            EventField::Rdate => "rdate",
            EventField::Exdate => "exdate",
            EventField::Categories => "categories",
            EventField::Organizer => "organizer",
            EventField::Attendees => "attendees",
            EventField::Other => "other",
            EventField::Created => "created",
            EventField::Stamp => "stamp",
            EventField::LastModified => "last_modified",
            EventField::Sequence => "sequence",
        }
    }
}

impl fmt::Display for EventField {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A single comparable field value.
///
/// Values of different variants never compare equal.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum FieldValue {
    Text(String),
    Time(EventTime),
    Integer(i64),
}

impl fmt::Display for FieldValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            FieldValue::Text(s) => f.write_str(s),
            FieldValue::Time(t) => write!(f, "{t}"),
            FieldValue::Integer(n) => write!(f, "{n}"),
        }
    }
}
