//! Publishing filtered calendars: the serving directory and the git mirror.

use std::path::{Path, PathBuf};
use std::process::{Output, Stdio};

use anyhow::{Context, Result, bail};
use calwatch_core::config::MirrorConfig;
use tokio::process::Command as TokioCommand;
use tracing::{debug, info};

/// Write `<dir>/<name>.ics` for each document. Returns the written paths.
pub async fn export(dir: &Path, documents: &[(&str, &str)]) -> Result<Vec<PathBuf>> {
    tokio::fs::create_dir_all(dir)
        .await
        .with_context(|| format!("Could not create {}", dir.display()))?;

    let mut written = Vec::with_capacity(documents.len());
    for (name, contents) in documents {
        let path = dir.join(format!("{name}.ics"));
        tokio::fs::write(&path, contents)
            .await
            .with_context(|| format!("Could not write {}", path.display()))?;
        debug!(path = %path.display(), "exported");
        written.push(path);
    }

    Ok(written)
}

pub struct Mirror {
    config: MirrorConfig,
}

impl Mirror {
    pub fn new(config: MirrorConfig) -> Self {
        Mirror { config }
    }

    pub fn dir(&self) -> PathBuf {
        self.config.dir()
    }

    /// Write the documents into the mirror and, if enabled, commit and push.
    pub async fn sync(&self, documents: &[(&str, &str)], timestamp: &str) -> Result<()> {
        if documents.is_empty() {
            return Ok(());
        }

        let dir = self.dir();
        let written = export(&dir, documents).await?;

        if !self.config.git {
            return Ok(());
        }

        if !dir.join(".git").exists() {
            info!(dir = %dir.display(), "initializing git mirror");
            self.git(&["init"]).await?;
        }

        let mut add = vec!["add", "--"];
        let files: Vec<String> = written
            .iter()
            .filter_map(|p| p.file_name())
            .map(|f| f.to_string_lossy().into_owned())
            .collect();
        add.extend(files.iter().map(String::as_str));
        self.git(&add).await?;

        if !self.has_staged_changes().await? {
            debug!("mirror already up to date");
            return Ok(());
        }

        let message = format!("{} ({timestamp})", self.config.commit_message);
        self.git_with(&self.identity_args(), &["commit", "--quiet", "-m", &message])
            .await?;
        info!(files = files.len(), "committed to mirror");

        if self.config.push {
            self.git(&["push", "--quiet"]).await?;
            info!("pushed mirror");
        }

        Ok(())
    }

    /// `-c user.name=… -c user.email=…` for whichever parts are configured.
    fn identity_args(&self) -> Vec<String> {
        [
            ("user.name", &self.config.author_name),
            ("user.email", &self.config.author_email),
        ]
        .into_iter()
        .filter_map(|(key, value)| value.as_ref().map(|v| format!("{key}={v}")))
        .flat_map(|setting| ["-c".to_string(), setting])
        .collect()
    }

    async fn has_staged_changes(&self) -> Result<bool> {
        let status = TokioCommand::new("git")
            .args(["diff", "--cached", "--quiet"])
            .current_dir(self.dir())
            .stdout(Stdio::null())
            .stderr(Stdio::null())
            .status()
            .await
            .context("Failed to run git")?;

        // --quiet exits 1 when there are differences
        match status.code() {
            Some(0) => Ok(false),
            Some(1) => Ok(true),
            _ => bail!("git diff exited with {status}"),
        }
    }

    async fn git(&self, args: &[&str]) -> Result<Output> {
        self.git_with(&[], args).await
    }

    /// Run git with `-c` style options placed before the subcommand.
    async fn git_with(&self, options: &[String], args: &[&str]) -> Result<Output> {
        let output = TokioCommand::new("git")
            .args(options)
            .args(args)
            .current_dir(self.dir())
            .stdin(Stdio::null())
            .output()
            .await
            .context("Failed to run git")?;

        if !output.status.success() {
            bail!(
                "git {} failed: {}",
                args.first().copied().unwrap_or_default(),
                String::from_utf8_lossy(&output.stderr).trim()
            );
        }

        Ok(output)
    }
}
