//! Status persistence strategies and the read-only queries over them.
//!
//! The scanner computes [`StatusDelta`]s; a [`StatusStrategy`] decides how
//! they are written and answers "which images are missing" from whatever it
//! last wrote. Both strategies share one [`RecordStore`] and differ only in
//! [`StatusLayout`] and in their write path.

mod detached;
mod embedded;

use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;

pub use detached::DetachedStatus;
pub use embedded::EmbeddedStatus;

use crate::store::{
    Dimension, MissingEntry, MissingImage, RecordStore, ScanCandidate, ScanRun, StatusDelta,
    StatusLayout, StoreError,
};

#[async_trait]
pub trait StatusStrategy: Send + Sync {
    fn layout(&self) -> StatusLayout;

    fn store(&self) -> &dyn RecordStore;

    /// Records with at least one dimension not recorded as loaded, with
    /// their stored status.
    async fn load_missing(&self) -> Result<Vec<ScanCandidate>, StoreError> {
        self.store().list_flagged(self.layout()).await
    }

    /// Write the outcome of one scan. All-or-nothing. Returns the number of
    /// rows written.
    async fn persist(&self, deltas: &[StatusDelta]) -> Result<u64, StoreError>;

    async fn count_missing(&self, dimension: Dimension) -> Result<u64, StoreError> {
        self.store().count_missing(self.layout(), dimension).await
    }

    /// Order is whatever the store returns; do not rely on it across scans.
    async fn list_missing(&self, dimension: Dimension) -> Result<Vec<MissingImage>, StoreError> {
        self.store().list_missing(self.layout(), dimension).await
    }

    /// Every record missing either dimension, once each.
    async fn list_all_missing(&self) -> Result<Vec<MissingEntry>, StoreError> {
        self.store().list_missing_entries(self.layout()).await
    }
}

/// Build the strategy for `layout` over `store`.
pub fn strategy_for(layout: StatusLayout, store: Arc<dyn RecordStore>) -> Arc<dyn StatusStrategy> {
    match layout {
        StatusLayout::Embedded => Arc::new(EmbeddedStatus::new(store)),
        StatusLayout::Detached => Arc::new(DetachedStatus::new(store)),
    }
}

/// Snapshot of persisted status for reporting.
#[derive(Debug, Clone, Serialize)]
pub struct StatusSummary {
    pub layout: StatusLayout,
    pub total_images: u64,
    pub missing_large: u64,
    pub missing_small: u64,
    pub missing_any: u64,
    pub last_scan: Option<ScanRun>,
}

pub async fn summarize(strategy: &dyn StatusStrategy) -> Result<StatusSummary, StoreError> {
    let store = strategy.store();
    Ok(StatusSummary {
        layout: strategy.layout(),
        total_images: store.count_images().await?,
        missing_large: strategy.count_missing(Dimension::Large).await?,
        missing_small: strategy.count_missing(Dimension::Small).await?,
        missing_any: strategy.list_all_missing().await?.len() as u64,
        last_scan: store.last_scan_run().await?,
    })
}
