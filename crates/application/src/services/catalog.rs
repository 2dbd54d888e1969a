//! File catalog - Enumerates and orders the text files of a run

use std::collections::BTreeMap;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use domain::{WorkItem, WorkItemId};
use tracing::{debug, instrument, warn};

use crate::error::ApplicationError;

/// Where work is found and where its output goes
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CatalogConfig {
    /// Directory holding the source texts
    pub input_dir: PathBuf,
    /// Directory receiving the audio files
    pub output_dir: PathBuf,
    /// Extension of source texts, without the dot
    pub text_extension: String,
    /// Extension of produced audio, without the dot
    pub audio_extension: String,
}

/// Lists source texts in natural order
#[derive(Debug, Clone)]
pub struct FileCatalog {
    config: CatalogConfig,
}

impl FileCatalog {
    /// Create a catalog
    pub const fn new(config: CatalogConfig) -> Self {
        Self { config }
    }

    /// Catalog settings
    pub const fn config(&self) -> &CatalogConfig {
        &self.config
    }

    /// Enumerate the work items
    ///
    /// Regular, non-hidden files whose extension matches (ignoring case) are
    /// kept and ordered naturally by id.
    #[instrument(skip(self), fields(input_dir = %self.config.input_dir.display()))]
    pub async fn scan(&self) -> Result<Vec<WorkItem>, ApplicationError> {
        let dir = &self.config.input_dir;

        let mut entries = match tokio::fs::read_dir(dir).await {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(ApplicationError::MissingInput(dir.clone()));
            },
            Err(e) if e.kind() == ErrorKind::NotADirectory => {
                return Err(ApplicationError::Configuration(format!(
                    "input path is not a directory: {}",
                    dir.display()
                )));
            },
            Err(e) => return Err(ApplicationError::filesystem(dir, &e)),
        };

        let mut found: BTreeMap<WorkItemId, PathBuf> = BTreeMap::new();

        while let Some(entry) = entries
            .next_entry()
            .await
            .map_err(|e| ApplicationError::filesystem(dir, &e))?
        {
            let path = entry.path();
            if !self.is_candidate(&path).await {
                continue;
            }

            let id = match WorkItemId::from_path(&path) {
                Ok(id) => id,
                Err(e) => {
                    warn!(path = %path.display(), error = %e, "Skipping file with unusable name");
                    continue;
                },
            };
            if let Some(existing) = found.get(&id) {
                return Err(ApplicationError::Configuration(format!(
                    "{} and {} both map to output '{id}'",
                    existing.display(),
                    path.display()
                )));
            }
            found.insert(id, path);
        }

        if found.is_empty() {
            return Err(ApplicationError::EmptyCatalog(dir.clone()));
        }

        debug!(count = found.len(), "Catalog scanned");

        found
            .into_values()
            .map(|path| {
                WorkItem::new(path, &self.config.output_dir, &self.config.audio_extension)
                    .map_err(ApplicationError::from)
            })
            .collect()
    }

    async fn is_candidate(&self, path: &Path) -> bool {
        let Some(name) = path.file_name().and_then(|n| n.to_str()) else {
            warn!(path = %path.display(), "Skipping file with non UTF-8 name");
            return false;
        };
        if name.starts_with('.') {
            return false;
        }

        let extension_matches = path
            .extension()
            .and_then(|ext| ext.to_str())
            .is_some_and(|ext| ext.eq_ignore_ascii_case(&self.config.text_extension));
        if !extension_matches {
            return false;
        }

        // Follows symlinks, so a link to a regular file counts.
        tokio::fs::metadata(path)
            .await
            .map(|meta| meta.is_file())
            .unwrap_or(false)
    }
}
