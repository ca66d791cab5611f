//! File existence checks against the configured image root.

use std::io::ErrorKind;
use std::path::{Component, Path, PathBuf};

use async_trait::async_trait;

/// Answers whether an image file is present.
///
/// Total by contract: any failure to determine existence is reported as
/// "not present" and never surfaced to the caller.
#[async_trait]
pub trait ExistenceProbe: Send + Sync {
    async fn exists(&self, relative_path: &str) -> bool;
}

/// Probe backed by the local filesystem.
#[derive(Debug, Clone)]
pub struct FsProbe {
    root: PathBuf,
}

impl FsProbe {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Join a catalog path onto the root.
    ///
    /// Leading separators are stripped so an absolute-looking catalog value
    /// resolves inside the root. Returns `None` for an empty path or one with
    /// a `..` component, so no catalog value can point outside the root.
    pub fn resolve(&self, relative_path: &str) -> Option<PathBuf> {
        let trimmed = relative_path.trim_start_matches(['/', '\\']);
        if trimmed.is_empty() {
            return None;
        }
        let relative = Path::new(trimmed);
        if relative
            .components()
            .any(|c| !matches!(c, Component::Normal(_) | Component::CurDir))
        {
            return None;
        }
        Some(self.root.join(relative))
    }
}

#[async_trait]
impl ExistenceProbe for FsProbe {
    async fn exists(&self, relative_path: &str) -> bool {
        let Some(path) = self.resolve(relative_path) else {
            return false;
        };

        match tokio::fs::metadata(&path).await {
            Ok(metadata) => metadata.is_file(),
            Err(e) if e.kind() == ErrorKind::NotFound => false,
            Err(e) => {
                tracing::debug!(
                    path = %path.display(),
                    error = %e,
                    "Failed to check file existence, assuming missing"
                );
                false
            }
        }
    }
}

/// In-memory probe for tests. Records every path it is asked about.
#[cfg(test)]
#[derive(Debug, Default)]
pub(crate) struct SetProbe {
    present: std::sync::Mutex<std::collections::HashSet<String>>,
    probed: std::sync::Mutex<Vec<String>>,
}

#[cfg(test)]
impl SetProbe {
    pub(crate) fn with_files<'a>(files: impl IntoIterator<Item = &'a str>) -> Self {
        let probe = Self::default();
        for file in files {
            probe.add(file);
        }
        probe
    }

    pub(crate) fn add(&self, path: &str) {
        self.present.lock().unwrap().insert(path.to_string());
    }

    pub(crate) fn remove(&self, path: &str) {
        self.present.lock().unwrap().remove(path);
    }

    pub(crate) fn probed(&self) -> Vec<String> {
        self.probed.lock().unwrap().clone()
    }

    pub(crate) fn clear_probed(&self) {
        self.probed.lock().unwrap().clear();
    }
}

#[cfg(test)]
#[async_trait]
impl ExistenceProbe for SetProbe {
    async fn exists(&self, relative_path: &str) -> bool {
        self.probed.lock().unwrap().push(relative_path.to_string());
        self.present.lock().unwrap().contains(relative_path)
    }
}
