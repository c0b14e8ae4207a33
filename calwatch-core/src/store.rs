//! Persistence of the last filtered document per source.

use std::path::{Path, PathBuf};

use crate::error::{WatchError, WatchResult};

/// Where the previous version of each source lives between runs.
pub trait SnapshotStore: Send + Sync {
    /// Previous document for `name`, or `None` on the first run.
    fn load(&self, name: &str) -> WatchResult<Option<String>>;

    /// Replace the stored document for `name`. Readers see either the old or
    /// the new content, never a partial write.
    fn save(&self, name: &str, contents: &str) -> WatchResult<()>;
}

/// Stores each source as `<dir>/<name>.ics`.
#[derive(Debug, Clone)]
pub struct FileStore {
    dir: PathBuf,
}

impl FileStore {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        FileStore { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, name: &str) -> WatchResult<PathBuf> {
        if name.is_empty() || name.starts_with('.') || name.contains(['/', '\\']) {
            return Err(WatchError::Store(format!("invalid source name '{name}'")));
        }
        Ok(self.dir.join(format!("{name}.ics")))
    }
}

impl SnapshotStore for FileStore {
    fn load(&self, name: &str) -> WatchResult<Option<String>> {
        let path = self.path_for(name)?;

        match std::fs::read_to_string(&path) {
            Ok(content) => Ok(Some(content)),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(WatchError::Store(format!(
                "could not read {}: {e}",
                path.display()
            ))),
        }
    }

    fn save(&self, name: &str, contents: &str) -> WatchResult<()> {
        let path = self.path_for(name)?;
        std::fs::create_dir_all(&self.dir)?;

        // Unique per call so concurrent saves never share a scratch file
        let temp = self
            .dir
            .join(format!(".{name}.{}.tmp", uuid::Uuid::new_v4()));

        std::fs::write(&temp, contents)?;
        if let Err(e) = std::fs::rename(&temp, &path) {
            let _ = std::fs::remove_file(&temp);
            return Err(e.into());
        }
        Ok(())
    }
}
