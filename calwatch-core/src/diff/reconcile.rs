//! Partitioning of event keys between two snapshots.

use crate::event::EventKey;
use crate::snapshot::CalendarSnapshot;

/// Keys only in the new snapshot, only in the old one, and in both.
///
/// `added` follows new-snapshot order, `removed` and `common` follow
/// old-snapshot order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Reconciliation {
    pub added: Vec<EventKey>,
    pub removed: Vec<EventKey>,
    pub common: Vec<EventKey>,
}

pub fn reconcile(old: &CalendarSnapshot, new: &CalendarSnapshot) -> Reconciliation {
    let mut reconciliation = Reconciliation::default();

    for key in old.keys() {
        if new.contains(&key) {
            reconciliation.common.push(key);
        } else {
            reconciliation.removed.push(key);
        }
    }

    reconciliation.added = new.keys().filter(|key| !old.contains(key)).collect();

    reconciliation
}
