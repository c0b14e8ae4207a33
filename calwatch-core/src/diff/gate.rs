//! Cheap textual pre-check.
//!
//! Runs an in-process Myers diff over the lines of two normalized documents.
//! It only answers whether anything changed; which events changed is decided
//! by the reconciler on parsed snapshots.

use similar::{Algorithm, ChangeTag, TextDiff};

/// Lines only in the new document and lines only in the old one.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LineDelta {
    pub insertions: Vec<String>,
    pub deletions: Vec<String>,
}

impl LineDelta {
    pub fn changed(&self) -> bool {
        !self.insertions.is_empty() || !self.deletions.is_empty()
    }
}

/// Compare two documents line by line with exact line equality.
pub fn compare_lines(old: &str, new: &str) -> LineDelta {
    let old_lines: Vec<&str> = old.lines().collect();
    let new_lines: Vec<&str> = new.lines().collect();

    let diff = TextDiff::configure()
        .algorithm(Algorithm::Myers)
        .diff_slices(old_lines.as_slice(), new_lines.as_slice());

    let mut delta = LineDelta::default();
    for change in diff.iter_all_changes() {
        match change.tag() {
            ChangeTag::Insert => delta.insertions.push(change.value().to_string()),
            ChangeTag::Delete => delta.deletions.push(change.value().to_string()),
            ChangeTag::Equal => {}
        }
    }
    delta
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_identical_documents_are_unchanged() {
        let doc = "BEGIN:VCALENDAR\nUID:a\nEND:VCALENDAR\n";
        let delta = compare_lines(doc, doc);
        assert!(!delta.changed());
    }

    #[test]
    fn test_reports_insertions_and_deletions() {
        let old = "UID:a\nSUMMARY:Lecture\nEND:VEVENT\n";
        let new = "UID:a\nSUMMARY:Lecture (cancelled)\nEND:VEVENT\n";

        let delta = compare_lines(old, new);

        assert!(delta.changed());
        assert_eq!(delta.insertions, vec!["SUMMARY:Lecture (cancelled)"]);
        assert_eq!(delta.deletions, vec!["SUMMARY:Lecture"]);
    }

    #[test]
    fn test_insertion_only() {
        let delta = compare_lines("a\nb\n", "a\nb\nc\n");
        assert_eq!(delta.insertions, vec!["c"]);
        assert!(delta.deletions.is_empty());
    }

    #[test]
    fn test_moved_line_is_a_change() {
        let delta = compare_lines("a\nb\nc\n", "b\nc\na\n");
        assert!(delta.changed());
    }

    #[test]
    fn test_line_endings_do_not_count() {
        let delta = compare_lines("a\r\nb\r\n", "a\nb\n");
        assert!(!delta.changed());
    }

    #[test]
    fn test_empty_documents() {
        assert!(!compare_lines("", "").changed());
        assert_eq!(compare_lines("", "x\n").insertions, vec!["x"]);
    }
}
