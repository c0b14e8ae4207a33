//! Colored terminal rendering for calwatch types.

use calwatch_core::diff::{ChangeKind, ChangeReport, EventChange, FieldDelta};
use calwatch_core::event::{Event, FieldValue};
use owo_colors::OwoColorize;

use crate::pipeline::{SourceOutcome, SourceResult};

pub trait Render {
    fn render(&self) -> String;
}

impl Render for ChangeKind {
    fn render(&self) -> String {
        let symbol = self.to_string();
        colorize(*self, &symbol)
    }
}

fn colorize(kind: ChangeKind, text: &str) -> String {
    match kind {
        ChangeKind::Added => text.green().to_string(),
        ChangeKind::Modified => text.yellow().to_string(),
        ChangeKind::Removed => text.red().to_string(),
    }
}

fn render_event(kind: ChangeKind, event: &Event) -> String {
    let summary = colorize(kind, &event.to_string());
    let time = event
        .start
        .as_ref()
        .map(|start| start.to_string())
        .unwrap_or_default();

    format!("{} {} {}", kind.render(), summary, time.dimmed())
}

fn render_delta(delta: &FieldDelta) -> String {
    let show = |value: &Option<FieldValue>| match value {
        Some(v) => v.to_string(),
        None => "(none)".to_string(),
    };
    format!(
        "{}: {} → {}",
        delta.field.dimmed(),
        show(&delta.old).red(),
        show(&delta.new).green()
    )
}

/// Above this many events, show counts unless verbose
const COMPACT_THRESHOLD: usize = 5;

fn pluralize(count: usize) -> &'static str {
    if count == 1 { "event" } else { "events" }
}

pub trait ReportRender {
    fn render(&self, verbose: bool) -> String;
}

impl ReportRender for ChangeReport {
    fn render(&self, verbose: bool) -> String {
        if self.is_empty() {
            return "   No event changes".dimmed().to_string();
        }

        let total = self.counts().total();
        let mut lines = Vec::new();

        if verbose || total <= COMPACT_THRESHOLD {
            for event in &self.added {
                lines.push(format!("   {}", render_event(ChangeKind::Added, event)));
            }
            for event in &self.removed {
                lines.push(format!("   {}", render_event(ChangeKind::Removed, event)));
            }
            for EventChange { new, deltas, .. } in &self.modified {
                lines.push(format!("   {}", render_event(ChangeKind::Modified, new)));
                lines.extend(deltas.iter().map(|d| format!("      {}", render_delta(d))));
            }
        } else {
            let counts = self.counts();
            for (kind, count, label) in [
                (ChangeKind::Added, counts.added, "new"),
                (ChangeKind::Modified, counts.modified, "changed"),
                (ChangeKind::Removed, counts.removed, "removed"),
            ] {
                if count > 0 {
                    let text = format!("({count} {label} {})", pluralize(count));
                    lines.push(format!("   {} {}", kind.render(), colorize(kind, &text)));
                }
            }
        }

        lines.join("\n")
    }
}

impl Render for SourceResult {
    fn render(&self) -> String {
        let header = self.name.bold().to_string();

        let status = match &self.outcome {
            SourceOutcome::Initialized { .. } => "   Stored first version".dimmed().to_string(),
            SourceOutcome::Unchanged => "   No changes".dimmed().to_string(),
            // Detail comes from the report, rendered separately
            SourceOutcome::Changed { .. } => return header,
            SourceOutcome::Failed(e) => format!("   {}", format!("{e:#}").red()),
        };

        format!("{header}\n{status}")
    }
}
