//! Field-by-field comparison of two versions of one event.

use serde::{Deserialize, Serialize};

use crate::event::{Event, EventField, FieldValue};

/// Fields servers rewrite between fetches even when nothing visible changed.
pub const DEFAULT_IGNORED_FIELDS: &[EventField] = &[
    EventField::Created,
    EventField::Stamp,
    EventField::LastModified,
    EventField::Sequence,
];

/// One changed field. `None` means the field is absent on that side.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FieldDelta {
    pub field: EventField,
    pub old: Option<FieldValue>,
    pub new: Option<FieldValue>,
}

/// Compares events over the static field schema minus a denylist.
#[derive(Debug, Clone)]
pub struct FieldDiffer {
    ignored: Vec<EventField>,
}

impl Default for FieldDiffer {
    fn default() -> Self {
        FieldDiffer {
            ignored: DEFAULT_IGNORED_FIELDS.to_vec(),
        }
    }
}

impl FieldDiffer {
    /// Default denylist plus `extra`.
    pub fn with_ignored(extra: impl IntoIterator<Item = EventField>) -> Self {
        let mut differ = FieldDiffer::default();
        for field in extra {
            if !differ.ignored.contains(&field) {
                differ.ignored.push(field);
            }
        }
        differ
    }

    pub fn is_ignored(&self, field: EventField) -> bool {
        self.ignored.contains(&field)
    }

    /// Deltas between two events sharing a key, in schema order.
    ///
    /// Both directions are reported: a field that appears only on the new
    /// event yields a delta with `old: None`.
    pub fn diff(&self, old: &Event, new: &Event) -> Vec<FieldDelta> {
        EventField::ALL
            .iter()
            .copied()
            .filter(|field| !self.is_ignored(*field))
            .filter_map(|field| {
                let (old_value, new_value) = (old.field(field), new.field(field));
                (old_value != new_value).then_some(FieldDelta {
                    field,
                    old: old_value,
                    new: new_value,
                })
            })
            .collect()
    }
}
