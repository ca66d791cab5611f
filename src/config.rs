use crate::cli::Cli;
use crate::store::StatusLayout;
use crate::types::LogLevel;
use std::path::{Path, PathBuf};

/// Application configuration, resolved from the command line and environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub database: PathBuf,
    pub image_root: Option<PathBuf>,
    pub probe_concurrency: usize,
    pub layout: StatusLayout,
    pub log_level: LogLevel,
    pub no_progress_bar: bool,
}

fn expand_tilde(path: &str) -> PathBuf {
    if let Some(stripped) = path.strip_prefix("~/") {
        if let Some(home) = dirs::home_dir() {
            return home.join(stripped);
        }
    }
    PathBuf::from(path)
}

impl Config {
    pub fn from_cli(cli: &Cli) -> anyhow::Result<Self> {
        if cli.probe_concurrency == 0 {
            anyhow::bail!("--probe-concurrency must be at least 1");
        }

        Ok(Self {
            database: expand_tilde(&cli.database),
            image_root: cli.image_root.as_deref().map(expand_tilde),
            probe_concurrency: cli.probe_concurrency,
            layout: cli.strategy.into(),
            log_level: cli.log_level,
            no_progress_bar: cli.no_progress_bar,
        })
    }

    /// The image root, which scans cannot run without.
    pub fn require_image_root(&self) -> anyhow::Result<&Path> {
        let Some(root) = self.image_root.as_deref() else {
            anyhow::bail!("--image-root (or IMGSCAN_IMAGE_ROOT) is required for scanning");
        };
        if !root.is_dir() {
            anyhow::bail!("Image root is not a directory: {}", root.display());
        }
        Ok(root)
    }
}
