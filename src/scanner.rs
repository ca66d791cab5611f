//! Reconciliation engine: probes catalog paths and persists what is missing.
//!
//! Every scan runs in three phases: load candidate records from the store,
//! probe the relevant files with bounded concurrency, then hand the complete
//! batch of [`StatusDelta`]s to the status strategy in a single write. Nothing
//! is written until every probe has finished, so a failed or cancelled scan
//! leaves the previously persisted status as it was.

use std::io::IsTerminal;
use std::sync::Arc;
use std::time::{Duration, Instant};

use futures_util::stream::{self, StreamExt};
use indicatif::{ProgressBar, ProgressStyle};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use crate::probe::ExistenceProbe;
use crate::status::StatusStrategy;
use crate::store::{Dimension, ImageRecord, ScanKind, ScanRunStats, StatusDelta, StoreError};

/// Default number of records probed concurrently.
pub const DEFAULT_PROBE_CONCURRENCY: usize = 8;

#[derive(Debug, Error)]
pub enum ScanError {
    #[error(transparent)]
    Store(#[from] StoreError),

    #[error("Scan cancelled before status was written")]
    Cancelled,
}

/// Which dimensions a full scan probes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ScanScope {
    All,
    Large,
    Small,
}

impl ScanScope {
    pub fn dimensions(&self) -> &'static [Dimension] {
        match self {
            Self::All => &Dimension::ALL,
            Self::Large => &[Dimension::Large],
            Self::Small => &[Dimension::Small],
        }
    }

    fn kind(&self) -> ScanKind {
        match self {
            Self::All => ScanKind::All,
            Self::Large => ScanKind::Large,
            Self::Small => ScanKind::Small,
        }
    }
}

/// Outcome of one completed scan.
#[derive(Debug, Clone)]
pub struct ScanReport {
    pub kind: ScanKind,
    pub records_scanned: u64,
    /// Number of individual file checks performed.
    pub probes: u64,
    /// Large files found missing among the scanned records.
    pub missing_large: u64,
    /// Small files found missing among the scanned records.
    pub missing_small: u64,
    pub rows_written: u64,
    pub elapsed: Duration,
}

/// One record to probe. `delta` starts out holding any carried-forward
/// values; `probe` lists the dimensions still to check.
struct ProbeJob {
    record: ImageRecord,
    probe: Vec<Dimension>,
    delta: StatusDelta,
}

pub struct Scanner {
    strategy: Arc<dyn StatusStrategy>,
    probe: Arc<dyn ExistenceProbe>,
    concurrency: usize,
    no_progress_bar: bool,
}

impl Scanner {
    pub fn new(strategy: Arc<dyn StatusStrategy>, probe: Arc<dyn ExistenceProbe>) -> Self {
        Self {
            strategy,
            probe,
            concurrency: DEFAULT_PROBE_CONCURRENCY,
            no_progress_bar: true,
        }
    }

    /// Number of records probed at once. Clamped to at least 1.
    pub fn with_concurrency(mut self, concurrency: usize) -> Self {
        self.concurrency = concurrency.max(1);
        self
    }

    pub fn with_progress_bar(mut self, show: bool) -> Self {
        self.no_progress_bar = !show;
        self
    }

    /// Probe every catalog record in the dimensions of `scope`.
    ///
    /// Authoritative for the scanned dimensions: prior status there is
    /// overwritten regardless of what it was.
    pub async fn scan(
        &self,
        scope: ScanScope,
        shutdown: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let kind = scope.kind();
        let run_id = self.start_run(kind).await?;

        let result = async {
            let records = self.strategy.store().list_images().await?;
            let jobs = records
                .into_iter()
                .map(|record| ProbeJob {
                    delta: StatusDelta::new(record.id),
                    probe: scope.dimensions().to_vec(),
                    record,
                })
                .collect();
            self.execute(kind, jobs, shutdown).await
        }
        .await;

        self.finish_run(run_id, &result).await;
        result
    }

    /// Re-probe only records currently recorded as missing something.
    ///
    /// A dimension already recorded as loaded is carried forward without
    /// being checked again, so a file deleted since it was last seen stays
    /// reported as loaded until the next full scan.
    pub async fn scan_missing_only(
        &self,
        shutdown: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let kind = ScanKind::MissingOnly;
        let run_id = self.start_run(kind).await?;

        let result = async {
            let candidates = self.strategy.load_missing().await?;
            let jobs = candidates
                .into_iter()
                .map(|candidate| {
                    let mut delta = StatusDelta::new(candidate.record.id);
                    let mut probe = Vec::new();
                    for dimension in Dimension::ALL {
                        if candidate.status.loaded(dimension) {
                            delta.set(dimension, true);
                        } else {
                            probe.push(dimension);
                        }
                    }
                    ProbeJob {
                        record: candidate.record,
                        probe,
                        delta,
                    }
                })
                .collect();
            self.execute(kind, jobs, shutdown).await
        }
        .await;

        self.finish_run(run_id, &result).await;
        result
    }

    async fn start_run(&self, kind: ScanKind) -> Result<i64, ScanError> {
        let run_id = self
            .strategy
            .store()
            .start_scan_run(kind, self.strategy.layout())
            .await?;
        Ok(run_id)
    }

    async fn finish_run(&self, run_id: i64, result: &Result<ScanReport, ScanError>) {
        let stats = match result {
            Ok(report) => ScanRunStats {
                records_scanned: report.records_scanned,
                missing_large: report.missing_large,
                missing_small: report.missing_small,
                interrupted: false,
            },
            Err(_) => ScanRunStats {
                interrupted: true,
                ..ScanRunStats::default()
            },
        };
        if let Err(e) = self
            .strategy
            .store()
            .complete_scan_run(run_id, &stats)
            .await
        {
            tracing::warn!(run_id, error = %e, "Failed to record scan run completion");
        }
    }

    async fn execute(
        &self,
        kind: ScanKind,
        jobs: Vec<ProbeJob>,
        shutdown: &CancellationToken,
    ) -> Result<ScanReport, ScanError> {
        let started = Instant::now();
        let total = jobs.len();
        tracing::info!(
            kind = kind.as_str(),
            layout = self.strategy.layout().as_str(),
            records = total,
            "Starting scan"
        );

        let pb = create_progress_bar(self.no_progress_bar, total as u64);
        let probe = &self.probe;

        let results = stream::iter(jobs)
            .map(|job| async move {
                let ProbeJob {
                    record,
                    probe: dimensions,
                    mut delta,
                } = job;
                // Each dimension is checked on its own; one result never
                // decides the other.
                for &dimension in &dimensions {
                    let path = record.path(dimension);
                    let loaded = probe.exists(path).await;
                    if !loaded {
                        tracing::debug!(
                            id = record.id,
                            dimension = dimension.as_str(),
                            path = %path,
                            "Image file missing"
                        );
                    }
                    delta.set(dimension, loaded);
                }
                (delta, dimensions.len() as u64)
            })
            .buffer_unordered(self.concurrency);

        tokio::pin!(results);

        let mut deltas = Vec::with_capacity(total);
        let mut probes = 0u64;
        while let Some((delta, probed)) = results.next().await {
            if shutdown.is_cancelled() {
                pb.finish_and_clear();
                tracing::info!(kind = kind.as_str(), "Shutdown requested, discarding scan");
                return Err(ScanError::Cancelled);
            }
            probes += probed;
            deltas.push(delta);
            pb.inc(1);
        }
        pb.finish_and_clear();

        if shutdown.is_cancelled() {
            return Err(ScanError::Cancelled);
        }

        let missing = |dimension: Dimension| {
            deltas
                .iter()
                .filter(|d| d.get(dimension) == Some(false))
                .count() as u64
        };
        let missing_large = missing(Dimension::Large);
        let missing_small = missing(Dimension::Small);

        let rows_written = self.strategy.persist(&deltas).await?;

        let report = ScanReport {
            kind,
            records_scanned: deltas.len() as u64,
            probes,
            missing_large,
            missing_small,
            rows_written,
            elapsed: started.elapsed(),
        };
        tracing::info!(
            kind = kind.as_str(),
            records = report.records_scanned,
            probes = report.probes,
            missing_large = report.missing_large,
            missing_small = report.missing_small,
            rows_written = report.rows_written,
            elapsed_ms = report.elapsed.as_millis() as u64,
            "Scan complete"
        );
        Ok(report)
    }
}

/// Create a progress bar with a consistent template.
///
/// Hidden when the user passed `--no-progress-bar` or stdout is not a TTY.
fn create_progress_bar(no_progress_bar: bool, total: u64) -> ProgressBar {
    if no_progress_bar || !std::io::stdout().is_terminal() {
        return ProgressBar::hidden();
    }
    let pb = ProgressBar::new(total);
    if let Ok(style) =
        ProgressStyle::with_template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} ({eta})")
    {
        pb.set_style(style.progress_chars("=> "));
    }
    pb
}
