//! One watch run: fetch, filter, compare and store every source.
//!
//! Sources are independent. A failure in one is recorded in its result and
//! never stops the others.

use std::sync::Arc;

use anyhow::{Context, Result, anyhow};
use calwatch_core::config::SourceConfig;
use calwatch_core::diff::{ChangeReport, Detection, Detector};
use calwatch_core::filter::{self, Blacklist};
use calwatch_core::snapshot::CalendarSnapshot;
use calwatch_core::store::SnapshotStore;
use tokio::sync::Semaphore;
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};
use url::Url;

use crate::fetch::Fetch;

#[derive(Debug, Clone)]
pub struct Source {
    pub name: String,
    pub url: Url,
    pub blacklist: Blacklist,
}

impl Source {
    pub fn from_config(config: &SourceConfig) -> Result<Self> {
        Ok(Source {
            name: config.name()?,
            url: config.url.clone(),
            blacklist: config.blacklist(),
        })
    }
}

#[derive(Debug)]
pub enum SourceOutcome {
    /// No previous version existed. The filtered document is the new baseline.
    Initialized { filtered: String },
    Unchanged,
    /// The gate fired. `report` is empty when only non-semantic lines moved.
    Changed {
        filtered: String,
        report: ChangeReport,
    },
    Failed(anyhow::Error),
}

impl SourceOutcome {
    /// Filtered text to publish, if this run produced a new version.
    pub fn published(&self) -> Option<&str> {
        match self {
            SourceOutcome::Initialized { filtered } | SourceOutcome::Changed { filtered, .. } => {
                Some(filtered)
            }
            SourceOutcome::Unchanged | SourceOutcome::Failed(_) => None,
        }
    }

    pub fn report(&self) -> Option<&ChangeReport> {
        match self {
            SourceOutcome::Changed { report, .. } => Some(report),
            _ => None,
        }
    }
}

#[derive(Debug)]
pub struct SourceResult {
    pub name: String,
    pub outcome: SourceOutcome,
}

pub struct Pipeline<F, S> {
    fetcher: Arc<F>,
    store: Arc<S>,
    detector: Arc<Detector>,
    concurrency: usize,
    dry_run: bool,
}

impl<F, S> Clone for Pipeline<F, S> {
    fn clone(&self) -> Self {
        Pipeline {
            fetcher: Arc::clone(&self.fetcher),
            store: Arc::clone(&self.store),
            detector: Arc::clone(&self.detector),
            concurrency: self.concurrency,
            dry_run: self.dry_run,
        }
    }
}

impl<F, S> Pipeline<F, S>
where
    F: Fetch,
    S: SnapshotStore + 'static,
{
    pub fn new(fetcher: F, store: S, detector: Detector, concurrency: usize) -> Self {
        Pipeline {
            fetcher: Arc::new(fetcher),
            store: Arc::new(store),
            detector: Arc::new(detector),
            concurrency: concurrency.max(1),
            dry_run: false,
        }
    }

    /// Compare and report, but leave the stored versions untouched.
    pub fn dry_run(mut self, dry_run: bool) -> Self {
        self.dry_run = dry_run;
        self
    }

    /// Check all sources, at most `concurrency` at a time. Results come back
    /// in the order the sources were given.
    pub async fn run(&self, sources: Vec<Source>) -> Vec<SourceResult> {
        let semaphore = Arc::new(Semaphore::new(self.concurrency));
        let mut tasks = JoinSet::new();

        for (index, source) in sources.into_iter().enumerate() {
            let pipeline = self.clone();
            let semaphore = Arc::clone(&semaphore);

            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let name = source.name.clone();

                // Own task, so a panic while checking still yields a result under this name
                let checked = tokio::spawn(async move { pipeline.check(source).await }).await;
                let outcome = match checked {
                    Ok(Ok(outcome)) => outcome,
                    Ok(Err(e)) => {
                        warn!(source = %name, "{e:#}");
                        SourceOutcome::Failed(e)
                    }
                    Err(e) => {
                        error!(source = %name, "check panicked: {e}");
                        SourceOutcome::Failed(anyhow!("check panicked: {e}"))
                    }
                };

                (index, SourceResult { name, outcome })
            });
        }

        let mut results = Vec::new();
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(e) => error!("source task panicked: {e}"),
            }
        }

        results.sort_by_key(|(index, _)| *index);
        results.into_iter().map(|(_, result)| result).collect()
    }

    async fn check(&self, source: Source) -> Result<SourceOutcome> {
        debug!(source = %source.name, url = %source.url, "fetching");
        let raw = self.fetcher.fetch(&source.url).await?;

        // Parsing and diffing are CPU work; keep them off the async workers
        let pipeline = self.clone();
        tokio::task::spawn_blocking(move || pipeline.process(&source, &raw))
            .await
            .context("Comparison task failed")?
    }

    fn process(&self, source: &Source, raw: &str) -> Result<SourceOutcome> {
        let filtered = filter::apply(raw, &source.blacklist)
            .with_context(|| format!("Could not filter '{}'", source.name))?;

        if !filtered.dropped.is_empty() {
            debug!(
                source = %source.name,
                dropped = filtered.dropped.len(),
                "blacklist applied"
            );
        }

        let previous = self.store.load(&source.name)?;

        let outcome = match previous {
            None => {
                // Never store a baseline that would fail to parse next time
                CalendarSnapshot::parse(&filtered.text)
                    .with_context(|| format!("Invalid calendar from '{}'", source.name))?;
                info!(source = %source.name, "no previous version, new baseline");
                SourceOutcome::Initialized {
                    filtered: filtered.text,
                }
            }
            Some(old) => match self
                .detector
                .detect(&old, &filtered.text)
                .with_context(|| format!("Could not compare '{}'", source.name))?
            {
                Detection::Unchanged => SourceOutcome::Unchanged,
                Detection::Changed { report, .. } => SourceOutcome::Changed {
                    filtered: filtered.text,
                    report,
                },
            },
        };

        if let Some(text) = outcome.published() {
            if self.dry_run {
                debug!(source = %source.name, "dry run, not storing");
            } else {
                self.store.save(&source.name, text)?;
            }
        }

        Ok(outcome)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashMap;

    use calwatch_core::store::FileStore;

    use super::*;

    struct StaticFetcher(HashMap<String, String>);

    impl Fetch for StaticFetcher {
        async fn fetch(&self, url: &Url) -> Result<String> {
            if url.path().ends_with("/broken.ics") {
                panic!("fetcher bug");
            }
            self.0
                .get(url.as_str())
                .cloned()
                .ok_or_else(|| anyhow!("404 for {url}"))
        }
    }

    fn calendar(events: &[(&str, &str, &str)]) -> String {
        let mut doc = String::from("BEGIN:VCALENDAR\r\nVERSION:2.0\r\nPRODID:test\r\n");
        for (uid, summary, description) in events {
            doc.push_str(&format!(
                "BEGIN:VEVENT\r\nUID:{uid}\r\nDTSTAMP:20250301T080000Z\r\n\
                 DTSTART:20250310T090000Z\r\nSUMMARY:{summary}\r\n\
                 DESCRIPTION:{description}\r\nEND:VEVENT\r\n"
            ));
        }
        doc.push_str("END:VCALENDAR\r\n");
        doc
    }

    fn source(name: &str, blacklist: &[&str]) -> Source {
        Source {
            name: name.to_string(),
            url: Url::parse(&format!("https://example.com/{name}.ics")).unwrap(),
            blacklist: Blacklist::new(blacklist),
        }
    }

    fn pipeline(
        docs: &[(&str, String)],
        store: FileStore,
    ) -> Pipeline<StaticFetcher, FileStore> {
        let docs = docs
            .iter()
            .map(|(name, doc)| (format!("https://example.com/{name}.ics"), doc.clone()))
            .collect();
        Pipeline::new(StaticFetcher(docs), store, Detector::default(), 2)
    }

    #[tokio::test]
    async fn test_first_run_stores_baseline() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let doc = calendar(&[("a", "Algebra", "Lecture")]);

        let results = pipeline(&[("plan", doc.clone())], store.clone())
            .run(vec![source("plan", &[])])
            .await;

        assert!(matches!(
            results[0].outcome,
            SourceOutcome::Initialized { .. }
        ));
        assert_eq!(store.load("plan").unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_second_run_reports_changes() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        store
            .save("plan", &calendar(&[("a", "Algebra", "Lecture")]))
            .unwrap();

        let new = calendar(&[("a", "Linear Algebra", "Lecture"), ("b", "Physics", "Lecture")]);
        let results = pipeline(&[("plan", new.clone())], store.clone())
            .run(vec![source("plan", &[])])
            .await;

        let report = results[0].outcome.report().expect("changed");
        assert_eq!(report.added.len(), 1);
        assert_eq!(report.modified.len(), 1);
        assert!(report.removed.is_empty());
        assert_eq!(store.load("plan").unwrap(), Some(new));
    }

    #[tokio::test]
    async fn test_unchanged_source() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let doc = calendar(&[("a", "Algebra", "Lecture")]);
        store.save("plan", &doc).unwrap();

        // Only the volatile stamp moved
        let refetched = doc.replace("DTSTAMP:20250301T080000Z", "DTSTAMP:20250302T080000Z");
        let results = pipeline(&[("plan", refetched)], store.clone())
            .run(vec![source("plan", &[])])
            .await;

        assert!(matches!(results[0].outcome, SourceOutcome::Unchanged));
        assert_eq!(store.load("plan").unwrap(), Some(doc));
    }

    #[tokio::test]
    async fn test_blacklisted_events_are_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let doc = calendar(&[("a", "Algebra", "Lecture"), ("b", "Algebra", "Tutorial")]);

        pipeline(&[("plan", doc)], store.clone())
            .run(vec![source("plan", &["Tutorial"])])
            .await;

        let stored = store.load("plan").unwrap().unwrap();
        assert!(stored.contains("UID:a"));
        assert!(!stored.contains("UID:b"));
    }

    #[tokio::test]
    async fn test_failed_source_does_not_stop_others() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let doc = calendar(&[("a", "Algebra", "Lecture")]);

        let results = pipeline(&[("good", doc)], store.clone())
            .run(vec![source("missing", &[]), source("good", &[])])
            .await;

        assert_eq!(results[0].name, "missing");
        assert!(matches!(results[0].outcome, SourceOutcome::Failed(_)));
        assert_eq!(results[1].name, "good");
        assert!(matches!(
            results[1].outcome,
            SourceOutcome::Initialized { .. }
        ));
        assert!(store.load("missing").unwrap().is_none());
    }

    #[tokio::test]
    async fn test_panicking_source_is_reported_by_name() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let doc = calendar(&[("a", "Algebra", "Lecture")]);

        let results = pipeline(&[("good", doc)], store.clone())
            .run(vec![source("broken", &[]), source("good", &[])])
            .await;

        assert_eq!(results.len(), 2);
        assert_eq!(results[0].name, "broken");
        assert!(matches!(results[0].outcome, SourceOutcome::Failed(_)));
        assert!(matches!(
            results[1].outcome,
            SourceOutcome::Initialized { .. }
        ));
    }

    #[tokio::test]
    async fn test_dry_run_leaves_store_untouched() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let old = calendar(&[("a", "Algebra", "Lecture")]);
        store.save("plan", &old).unwrap();

        let new = calendar(&[("a", "Algebra", "Lecture"), ("b", "Physics", "Lecture")]);
        let results = pipeline(&[("plan", new)], store.clone())
            .dry_run(true)
            .run(vec![source("plan", &[])])
            .await;

        assert_eq!(results[0].outcome.report().unwrap().added.len(), 1);
        assert_eq!(store.load("plan").unwrap(), Some(old));
    }

    #[tokio::test]
    async fn test_invalid_first_document_is_not_stored() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileStore::new(dir.path());
        let doc = calendar(&[("a", "Algebra", "Lecture"), ("a", "Physics", "Lecture")]);

        let results = pipeline(&[("plan", doc)], store.clone())
            .run(vec![source("plan", &[])])
            .await;

        assert!(matches!(results[0].outcome, SourceOutcome::Failed(_)));
        assert!(store.load("plan").unwrap().is_none());
    }
}
