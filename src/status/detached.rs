//! Status kept in a separate table holding only incomplete records.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;

use super::StatusStrategy;
use crate::store::{RecordStore, StatusDelta, StatusEntry, StatusLayout, StoreError};

/// Rewrites `images_status` wholesale on every scan.
///
/// A record has a row if and only if at least one of its files is believed
/// missing; absence means fully loaded. When a scan only probed one
/// dimension, the other dimension's previous value is carried over from the
/// current table so a single-dimension scan never erases what an earlier
/// scan found about the other dimension.
pub struct DetachedStatus {
    store: Arc<dyn RecordStore>,
}

impl DetachedStatus {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StatusStrategy for DetachedStatus {
    fn layout(&self) -> StatusLayout {
        StatusLayout::Detached
    }

    fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    async fn persist(&self, deltas: &[StatusDelta]) -> Result<u64, StoreError> {
        let partial = deltas
            .iter()
            .any(|d| d.large_loaded.is_none() || d.small_loaded.is_none());

        let prior: HashMap<i64, StatusEntry> = if partial {
            self.store
                .list_status(StatusLayout::Detached)
                .await?
                .into_iter()
                .map(|entry| (entry.id, entry))
                .collect()
        } else {
            HashMap::new()
        };

        let entries: Vec<StatusEntry> = deltas
            .iter()
            .map(|delta| delta.resolve(prior.get(&delta.id)))
            .filter(|entry| !entry.is_fully_loaded())
            .collect();

        tracing::debug!(
            scanned = deltas.len(),
            rows = entries.len(),
            "Replacing detached status table"
        );
        self.store.replace_status_table(&entries).await
    }
}
