use std::path::Path;

use anyhow::{Context, Result};
use calwatch_core::diff::{ChangeReport, Detection, Detector, LineDelta};
use calwatch_core::filter::{self, Blacklist};
use serde::Serialize;

use crate::render::ReportRender;

#[derive(Serialize)]
struct DiffOutput<'a> {
    changed: bool,
    insertions: usize,
    deletions: usize,
    report: Option<&'a ChangeReport>,
}

impl<'a> DiffOutput<'a> {
    fn new(detection: &'a Detection) -> Self {
        let (lines, report) = match detection {
            Detection::Unchanged => (None, None),
            Detection::Changed { lines, report } => (Some(lines), Some(report)),
        };
        let count = |f: fn(&LineDelta) -> usize| lines.map(f).unwrap_or(0);

        DiffOutput {
            changed: detection.is_changed(),
            insertions: count(|l| l.insertions.len()),
            deletions: count(|l| l.deletions.len()),
            report,
        }
    }
}

/// Compare two local calendar files, filtered the same way a run would.
pub fn run(old: &Path, new: &Path, blacklist: &[String], json: bool, verbose: bool) -> Result<()> {
    let blacklist = Blacklist::new(blacklist);

    let read = |path: &Path| -> Result<String> {
        let raw = std::fs::read_to_string(path)
            .with_context(|| format!("Could not read {}", path.display()))?;
        let filtered = filter::apply(&raw, &blacklist)
            .with_context(|| format!("Could not filter {}", path.display()))?;
        Ok(filtered.text)
    };

    let detection = Detector::default().detect(&read(old)?, &read(new)?)?;

    if json {
        println!("{}", serde_json::to_string_pretty(&DiffOutput::new(&detection))?);
        return Ok(());
    }

    match detection.report() {
        None => println!("No changes"),
        Some(report) => println!("{}", report.render(verbose)),
    }

    Ok(())
}
