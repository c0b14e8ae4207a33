//! ICS parsing using the icalendar crate's parser.

use crate::error::{WatchError, WatchResult};
use crate::event::{Event, EventProperty, EventStatus, EventTime, IntValue};
use icalendar::{
    DatePerhapsTime,
    parser::{Component, Property, read_calendar, unfold},
};

/// Properties mapped onto dedicated `Event` fields. Everything else lands in
/// `Event::properties`.
const KNOWN_PROPERTIES: &[&str] = &[
    "UID",
    "RECURRENCE-ID",
    "SUMMARY",
    "DESCRIPTION",
    "LOCATION",
    "DTSTART",
    "DTEND",
    "PRIORITY",
    "STATUS",
    "URL",
    "CREATED",
    "DTSTAMP",
    "LAST-MODIFIED",
    "SEQUENCE",
];

/// Parse every VEVENT in an ICS document, in document order.
pub fn parse_events(content: &str) -> WatchResult<Vec<Event>> {
    let unfolded = unfold(content);
    let calendar = read_calendar(&unfolded).map_err(|e| WatchError::Parse(e.to_string()))?;

    let mut vevents = Vec::new();
    for component in &calendar.components {
        collect_vevents(component, &mut vevents);
    }

    vevents
        .into_iter()
        .enumerate()
        .map(|(position, vevent)| event_from_component(vevent, position))
        .collect()
}

/// VEVENTs are normally direct children of VCALENDAR, but tolerate feeds
/// that nest them one level deeper.
fn collect_vevents<'a, 'b>(component: &'b Component<'a>, out: &mut Vec<&'b Component<'a>>) {
    if component.name == "VEVENT" {
        out.push(component);
        return;
    }
    for child in &component.components {
        collect_vevents(child, out);
    }
}

fn event_from_component(vevent: &Component, position: usize) -> WatchResult<Event> {
    let uid = vevent
        .find_prop("UID")
        .map(|p| p.val.to_string())
        .filter(|uid| !uid.trim().is_empty())
        .ok_or(WatchError::MissingUid(position))?;

    let recurrence_id = optional_time(vevent, "RECURRENCE-ID", &uid)?;
    let start = optional_time(vevent, "DTSTART", &uid)?;
    let end = optional_time(vevent, "DTEND", &uid)?;

    let summary = text_prop(vevent, "SUMMARY");
    let description = text_prop(vevent, "DESCRIPTION");
    let location = text_prop(vevent, "LOCATION");
    let url = vevent.find_prop("URL").map(|p| p.val.to_string());

    let priority = vevent
        .find_prop("PRIORITY")
        .map(|p| IntValue::parse(p.val.as_ref()));
    let status = vevent
        .find_prop("STATUS")
        .map(|p| EventStatus::from_ics_str(p.val.as_ref().trim()));

    let created = vevent.find_prop("CREATED").map(|p| p.val.to_string());
    let stamp = vevent.find_prop("DTSTAMP").map(|p| p.val.to_string());
    let last_modified = vevent.find_prop("LAST-MODIFIED").map(|p| p.val.to_string());
    let sequence = vevent
        .find_prop("SEQUENCE")
        .map(|p| IntValue::parse(p.val.as_ref()));

    let properties: Vec<EventProperty> = vevent
        .properties
        .iter()
        .filter(|p| !KNOWN_PROPERTIES.contains(&p.name.as_ref()))
        .map(to_event_property)
        .collect();

    Ok(Event {
        uid,
        recurrence_id,
        summary,
        description,
        location,
        start,
        end,
        priority,
        status,
        url,
        created,
        stamp,
        last_modified,
        sequence,
        properties,
    })
}

fn to_event_property(prop: &Property) -> EventProperty {
    EventProperty {
        name: prop.name.as_ref().to_ascii_uppercase(),
        params: prop
            .params
            .iter()
            .map(|p| {
                (
                    p.key.as_ref().to_string(),
                    p.val.as_ref().map(|v| v.as_ref().to_string()),
                )
            })
            .collect(),
        value: prop.val.to_string(),
    }
}

fn text_prop(vevent: &Component, name: &str) -> Option<String> {
    vevent.find_prop(name).map(|p| unescape_text(p.val.as_ref()))
}

/// A date property that is present but unreadable is an error, not a missing value.
fn optional_time(vevent: &Component, name: &str, uid: &str) -> WatchResult<Option<EventTime>> {
    let Some(prop) = vevent.find_prop(name) else {
        return Ok(None);
    };
    let dpt = DatePerhapsTime::try_from(prop).map_err(|_| invalid_time(prop, uid))?;
    Ok(Some(to_event_time(dpt)))
}

fn invalid_time(prop: &Property, uid: &str) -> WatchError {
    WatchError::Parse(format!(
        "invalid {} value '{}' in event '{}'",
        prop.name.as_ref(),
        prop.val.as_ref(),
        uid
    ))
}

/// Convert icalendar's DatePerhapsTime to our EventTime, preserving timezone info
fn to_event_time(dpt: DatePerhapsTime) -> EventTime {
    match dpt {
        DatePerhapsTime::Date(d) => EventTime::Date(d),
        DatePerhapsTime::DateTime(cal_dt) => match cal_dt {
            icalendar::CalendarDateTime::Utc(dt) => EventTime::DateTimeUtc(dt),
            icalendar::CalendarDateTime::Floating(naive) => EventTime::DateTimeFloating(naive),
            icalendar::CalendarDateTime::WithTimezone { date_time, tzid } => {
                EventTime::DateTimeZoned {
                    datetime: date_time,
                    tzid,
                }
            }
        },
    }
}

/// Undo RFC 5545 TEXT escaping (`\n`, `\,`, `\;`, `\\`).
pub fn unescape_text(value: &str) -> String {
    let mut out = String::with_capacity(value.len());
    let mut chars = value.chars();
    while let Some(c) = chars.next() {
        if c != '\\' {
            out.push(c);
            continue;
        }
        match chars.next() {
            Some('n') | Some('N') => out.push('\n'),
            Some(other) => out.push(other),
            None => out.push('\\'),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    const TWO_EVENTS: &str = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:uid1\r\n\
DTSTAMP:20250101T080000Z\r\n\
SUMMARY:Algorithms\r\n\
DESCRIPTION:Lecture\\nRoom 1\\, east wing\r\n\
LOCATION:HS 1\r\n\
DTSTART:20250320T150000Z\r\n\
DTEND:20250320T160000Z\r\n\
PRIORITY:5\r\n\
CATEGORIES:LECTURE\r\n\
END:VEVENT\r\n\
BEGIN:VEVENT\r\n\
UID:uid2\r\n\
SUMMARY:Databases\r\n\
STATUS:CANCELLED\r\n\
DTSTART;VALUE=DATE:20250321\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

    #[test]
    fn test_parse_events_in_document_order() {
        let events = parse_events(TWO_EVENTS).expect("Should parse");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].uid, "uid1");
        assert_eq!(events[1].uid, "uid2");
    }

    #[test]
    fn test_parse_maps_known_fields() {
        let events = parse_events(TWO_EVENTS).expect("Should parse");
        let first = &events[0];

        assert_eq!(first.summary.as_deref(), Some("Algorithms"));
        assert_eq!(first.description.as_deref(), Some("Lecture\nRoom 1, east wing"));
        assert_eq!(first.location.as_deref(), Some("HS 1"));
        assert_eq!(first.priority, Some(IntValue::Number(5)));
        assert_eq!(first.stamp.as_deref(), Some("20250101T080000Z"));
        assert_eq!(
            first.start,
            Some(EventTime::DateTimeUtc(
                Utc.with_ymd_and_hms(2025, 3, 20, 15, 0, 0).unwrap()
            ))
        );
        assert_eq!(
            first.properties,
            vec![EventProperty::new("CATEGORIES", "LECTURE")]
        );

        let second = &events[1];
        assert_eq!(second.status, Some(EventStatus::Cancelled));
        assert!(matches!(second.start, Some(EventTime::Date(_))));
        assert_eq!(second.end, None);
    }

    #[test]
    fn test_parse_line_folding_preserves_whitespace() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:test-123\r\n\
SUMMARY:Test\r\n\
DTSTART:20240101T100000Z\r\n\
DTEND:20240101T110000Z\r\n\
DESCRIPTION:Hello \r\n world and \r\n more text\r\n\
END:VEVENT\r\n\
END:VCALENDAR";

        let events = parse_events(ics).expect("Should parse");

        let desc = events[0].description.clone().expect("Should have description");
        assert_eq!(
            desc, "Hello world and more text",
            "Line folding should preserve the space before 'world'"
        );
    }

    #[test]
    fn test_parse_recurrence_id() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
UID:weekly
SUMMARY:Standup
DTSTART:20240101T100000Z
RRULE:FREQ=WEEKLY
END:VEVENT
BEGIN:VEVENT
UID:weekly
RECURRENCE-ID:20240108T100000Z
SUMMARY:Standup (moved)
DTSTART:20240108T140000Z
END:VEVENT
END:VCALENDAR"#;

        let events = parse_events(ics).expect("Should parse");

        assert_eq!(events.len(), 2);
        assert_eq!(events[0].recurrence_id, None);
        assert_eq!(
            events[1].key().recurrence_id.as_deref(),
            Some("20240108T100000Z")
        );
    }

    #[test]
    fn test_parse_keeps_unrecognized_values() {
        let ics = "BEGIN:VCALENDAR\r\n\
VERSION:2.0\r\n\
PRODID:TEST\r\n\
BEGIN:VEVENT\r\n\
UID:odd\r\n\
PRIORITY:high\r\n\
STATUS:POSTPONED\r\n\
ATTENDEE;CN=Ada;PARTSTAT=ACCEPTED:mailto:ada@example.com\r\n\
END:VEVENT\r\n\
END:VCALENDAR\r\n";

        let events = parse_events(ics).expect("Should parse");
        let event = &events[0];

        assert_eq!(event.priority, Some(IntValue::Raw("high".to_string())));
        assert_eq!(event.status, Some(EventStatus::Other("POSTPONED".to_string())));
        assert_eq!(
            event.properties[0].to_content_line(),
            "ATTENDEE;CN=Ada;PARTSTAT=ACCEPTED:mailto:ada@example.com"
        );
    }

    #[test]
    fn test_parse_missing_uid_is_error() {
        let ics = r#"BEGIN:VCALENDAR
VERSION:2.0
PRODID:TEST
BEGIN:VEVENT
SUMMARY:No identity
END:VEVENT
END:VCALENDAR"#;

        let err = parse_events(ics).unwrap_err();
        assert!(matches!(err, WatchError::MissingUid(0)), "got {err:?}");
    }

    #[test]
    fn test_parse_empty_calendar() {
        let ics = "BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:TEST\r\nEND:VCALENDAR\r\n";
        assert!(parse_events(ics).expect("Should parse").is_empty());
    }

    #[test]
    fn test_unescape_text() {
        assert_eq!(unescape_text(r"a\, b\; c"), "a, b; c");
        assert_eq!(unescape_text(r"line1\nline2\Nline3"), "line1\nline2\nline3");
        assert_eq!(unescape_text(r"back\\slash"), r"back\slash");
        assert_eq!(unescape_text(r"trailing\"), r"trailing\");
    }
}
