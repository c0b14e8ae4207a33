//! Change detection between two versions of a calendar document.
//!
//! A run goes normalize → gate → (unchanged) or parse → reconcile → field
//! diff → report. Everything here is synchronous and free of shared state, so
//! separate sources can be checked in parallel.

mod change_kind;
mod field_diff;
mod gate;
mod normalize;
mod reconcile;
mod report;

pub use change_kind::ChangeKind;
pub use field_diff::{DEFAULT_IGNORED_FIELDS, FieldDelta, FieldDiffer};
pub use gate::{LineDelta, compare_lines};
pub use normalize::{DEFAULT_VOLATILE_PROPERTIES, Normalizer};
pub use reconcile::{Reconciliation, reconcile};
pub use report::{ChangeCounts, ChangeReport, EventChange};

use tracing::debug;

use crate::error::WatchResult;
use crate::snapshot::CalendarSnapshot;

/// Outcome of one detection run.
#[derive(Debug, Clone, PartialEq)]
pub enum Detection {
    /// The gate found no line differences. Nothing was parsed.
    Unchanged,
    /// The gate fired. `report` may still be empty when only non-semantic
    /// lines moved, so check it before notifying anyone.
    Changed {
        lines: LineDelta,
        report: ChangeReport,
    },
}

impl Detection {
    pub fn is_changed(&self) -> bool {
        matches!(self, Detection::Changed { .. })
    }

    pub fn report(&self) -> Option<&ChangeReport> {
        match self {
            Detection::Unchanged => None,
            Detection::Changed { report, .. } => Some(report),
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct Detector {
    normalizer: Normalizer,
    differ: FieldDiffer,
}

impl Detector {
    pub fn new(normalizer: Normalizer, differ: FieldDiffer) -> Self {
        Detector { normalizer, differ }
    }

    /// Compare two already-filtered documents.
    pub fn detect(&self, old: &str, new: &str) -> WatchResult<Detection> {
        let lines = compare_lines(
            &self.normalizer.normalize(old),
            &self.normalizer.normalize(new),
        );

        if !lines.changed() {
            debug!("gate: no line changes");
            return Ok(Detection::Unchanged);
        }

        debug!(
            insertions = lines.insertions.len(),
            deletions = lines.deletions.len(),
            "gate: lines changed"
        );

        let old = CalendarSnapshot::parse(old)?;
        let new = CalendarSnapshot::parse(new)?;
        let report = self.compare(&old, &new);

        Ok(Detection::Changed { lines, report })
    }

    /// Semantic comparison of two parsed snapshots, without the gate.
    pub fn compare(&self, old: &CalendarSnapshot, new: &CalendarSnapshot) -> ChangeReport {
        let reconciliation = reconcile(old, new);
        debug!(
            added = reconciliation.added.len(),
            removed = reconciliation.removed.len(),
            common = reconciliation.common.len(),
            "reconciled"
        );
        ChangeReport::build(old, new, &reconciliation, &self.differ)
    }
}
