//! Removal of volatile lines before the text gate.

/// Properties regenerated on every export without any change to the event.
pub const DEFAULT_VOLATILE_PROPERTIES: &[&str] = &["DTSTAMP"];

/// Drops lines whose property name is one of a fixed set of volatile markers.
#[derive(Debug, Clone)]
pub struct Normalizer {
    volatile: Vec<String>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Normalizer::new(DEFAULT_VOLATILE_PROPERTIES)
    }
}

impl Normalizer {
    pub fn new<I, S>(properties: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        Normalizer {
            volatile: properties
                .into_iter()
                .map(|p| p.as_ref().trim().to_ascii_uppercase())
                .filter(|p| !p.is_empty())
                .collect(),
        }
    }

    /// Return `text` without its volatile lines. Line endings of the kept
    /// lines are untouched, so a document without volatile lines comes back
    /// byte for byte.
    pub fn normalize(&self, text: &str) -> String {
        text.split_inclusive('\n')
            .filter(|line| !self.is_volatile(line))
            .collect()
    }

    fn is_volatile(&self, line: &str) -> bool {
        property_name(line).is_some_and(|name| {
            self.volatile
                .iter()
                .any(|v| v.eq_ignore_ascii_case(name))
        })
    }
}

/// Name part of a content line (`NAME;PARAMS:VALUE`). Continuation lines of a
/// folded property have no name of their own.
fn property_name(line: &str) -> Option<&str> {
    if line.starts_with([' ', '\t']) {
        return None;
    }
    let end = line.find([':', ';'])?;
    Some(&line[..end])
}
