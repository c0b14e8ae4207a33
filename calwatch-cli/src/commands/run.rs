use std::path::Path;
use std::time::Duration;

use anyhow::Result;
use calwatch_core::config::WatchConfig;
use calwatch_core::diff::ChangeCounts;
use calwatch_core::store::FileStore;
use owo_colors::OwoColorize;
use tracing::{info, warn};

use crate::fetch::HttpFetcher;
use crate::mirror::{self, Mirror};
use crate::notify::{self, Notifier};
use crate::pipeline::{Pipeline, Source, SourceOutcome};
use crate::render::{Render, ReportRender};
use crate::utils::tui::create_spinner;

pub async fn run(config_path: Option<&Path>, dry_run: bool, verbose: bool) -> Result<()> {
    let config = WatchConfig::load(config_path)?;

    if config.sources.is_empty() {
        anyhow::bail!(
            "No sources configured.\n\n\
            Add one to your config file:\n  \
            [[sources]]\n  \
            url = \"https://example.com/calendar.ics\""
        );
    }

    let sources = config
        .sources
        .iter()
        .map(Source::from_config)
        .collect::<Result<Vec<_>>>()?;

    let fetcher = HttpFetcher::new(Duration::from_secs(config.fetch_timeout_secs))?;
    let store = FileStore::new(config.state_dir());
    let pipeline =
        Pipeline::new(fetcher, store, config.detector(), config.concurrency).dry_run(dry_run);

    let spinner = create_spinner(format!("Checking {} sources", sources.len()));
    let results = pipeline.run(sources).await;
    spinner.finish_and_clear();

    let mut totals = ChangeCounts::default();
    let mut failed = 0;

    for (i, result) in results.iter().enumerate() {
        println!("{}", result.render());
        if let Some(report) = result.outcome.report() {
            println!("{}", report.render(verbose));
            totals += report.counts();
        }
        if matches!(result.outcome, SourceOutcome::Failed(_)) {
            failed += 1;
        }

        if i < results.len() - 1 {
            println!();
        }
    }

    println!();
    println!(
        "{} added, {} modified, {} removed{}",
        totals.added.green(),
        totals.modified.yellow(),
        totals.removed.red(),
        if failed > 0 {
            format!(", {failed} failed").red().to_string()
        } else {
            String::new()
        }
    );

    if dry_run {
        println!("{}", "Dry run: nothing stored, mirrored or sent".dimmed());
        return Ok(());
    }

    let published: Vec<(&str, &str)> = results
        .iter()
        .filter_map(|r| r.outcome.published().map(|text| (r.name.as_str(), text)))
        .collect();

    if !published.is_empty() {
        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S").to_string();

        if let Some(dir) = config.serving_dir() {
            match mirror::export(&dir, &published).await {
                Ok(written) => {
                    info!(dir = %dir.display(), count = written.len(), "serving directory updated")
                }
                Err(e) => warn!("Could not update serving directory: {e:#}"),
            }
        }

        if let Some(mirror_config) = config.mirror.clone() {
            // The sources are already stored; a mirror failure must not hide that
            if let Err(e) = Mirror::new(mirror_config).sync(&published, &timestamp).await {
                warn!("Mirror update failed: {e:#}");
            }
        }
    }

    let notifier = Notifier::new(config.notifications.as_ref());
    for result in &results {
        if let Some(report) = result.outcome.report() {
            notifier.send(&notify::messages(&result.name, report)).await;
        }
    }

    Ok(())
}
