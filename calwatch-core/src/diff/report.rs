//! Change reports for one calendar source.

use std::ops::AddAssign;

use serde::{Deserialize, Serialize};

use crate::diff::field_diff::{FieldDelta, FieldDiffer};
use crate::diff::reconcile::Reconciliation;
use crate::event::Event;
use crate::snapshot::CalendarSnapshot;

/// Old and new version of an event that changed, with the changed fields.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EventChange {
    pub old: Event,
    pub new: Event,
    pub deltas: Vec<FieldDelta>,
}

/// Everything that changed in one source between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ChangeReport {
    pub added: Vec<Event>,
    pub removed: Vec<Event>,
    pub modified: Vec<EventChange>,
}

impl ChangeReport {
    /// Resolve a reconciliation against its snapshots. Common events whose
    /// field deltas come out empty are left out.
    pub fn build(
        old: &CalendarSnapshot,
        new: &CalendarSnapshot,
        reconciliation: &Reconciliation,
        differ: &FieldDiffer,
    ) -> Self {
        let added = reconciliation
            .added
            .iter()
            .filter_map(|key| new.get(key).cloned())
            .collect();

        let removed = reconciliation
            .removed
            .iter()
            .filter_map(|key| old.get(key).cloned())
            .collect();

        let modified = reconciliation
            .common
            .iter()
            .filter_map(|key| {
                let (old_event, new_event) = (old.get(key)?, new.get(key)?);
                let deltas = differ.diff(old_event, new_event);
                (!deltas.is_empty()).then(|| EventChange {
                    old: old_event.clone(),
                    new: new_event.clone(),
                    deltas,
                })
            })
            .collect();

        ChangeReport {
            added,
            removed,
            modified,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.modified.is_empty()
    }

    pub fn counts(&self) -> ChangeCounts {
        ChangeCounts {
            added: self.added.len(),
            modified: self.modified.len(),
            removed: self.removed.len(),
        }
    }
}

/// Per-kind totals, summed across sources for the run summary.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ChangeCounts {
    pub added: usize,
    pub modified: usize,
    pub removed: usize,
}

impl ChangeCounts {
    pub fn total(&self) -> usize {
        self.added + self.modified + self.removed
    }
}

impl AddAssign for ChangeCounts {
    fn add_assign(&mut self, other: Self) {
        self.added += other.added;
        self.modified += other.modified;
        self.removed += other.removed;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::diff::reconcile::reconcile;

    fn event(uid: &str, description: &str) -> Event {
        let mut event = Event::new(uid);
        event.description = Some(description.to_string());
        event
    }

    fn snapshot(events: Vec<Event>) -> CalendarSnapshot {
        CalendarSnapshot::from_events("", events).unwrap()
    }

    #[test]
    fn test_build_resolves_events() {
        let old = snapshot(vec![event("uid1", "a"), event("uid2", "Lecture")]);
        let new = snapshot(vec![
            event("uid2", "Lecture (cancelled)"),
            event("uid3", "c"),
        ]);

        let report =
            ChangeReport::build(&old, &new, &reconcile(&old, &new), &FieldDiffer::default());

        assert_eq!(report.added, vec![event("uid3", "c")]);
        assert_eq!(report.removed, vec![event("uid1", "a")]);
        assert_eq!(report.modified.len(), 1);
        assert_eq!(report.modified[0].old.uid, "uid2");
        assert_eq!(report.modified[0].new.uid, "uid2");
        assert_eq!(
            report.counts(),
            ChangeCounts {
                added: 1,
                modified: 1,
                removed: 1
            }
        );
    }

    #[test]
    fn test_unchanged_common_events_are_dropped() {
        let old = snapshot(vec![event("uid1", "a")]);
        let new = snapshot(vec![event("uid1", "a")]);

        let report =
            ChangeReport::build(&old, &new, &reconcile(&old, &new), &FieldDiffer::default());

        assert!(report.is_empty());
        assert_eq!(report.counts().total(), 0);
    }

    #[test]
    fn test_json_names_fields() {
        let old = snapshot(vec![event("uid1", "Lecture")]);
        let new = snapshot(vec![event("uid1", "Seminar")]);

        let report =
            ChangeReport::build(&old, &new, &reconcile(&old, &new), &FieldDiffer::default());
        let json = serde_json::to_value(&report).unwrap();

        let delta = &json["modified"][0]["deltas"][0];
        assert_eq!(delta["field"], "description");
        assert_eq!(delta["old"]["Text"], "Lecture");
        assert_eq!(delta["new"]["Text"], "Seminar");
    }

    #[test]
    fn test_counts_add_up() {
        let mut total = ChangeCounts::default();
        total += ChangeCounts {
            added: 1,
            modified: 2,
            removed: 0,
        };
        total += ChangeCounts {
            added: 0,
            modified: 1,
            removed: 4,
        };
        assert_eq!(total.total(), 8);
        assert_eq!(total.modified, 3);
    }
}
