//! Status kept as flag columns on the catalog rows.

use std::sync::Arc;

use async_trait::async_trait;

use super::StatusStrategy;
use crate::store::{RecordStore, StatusDelta, StatusLayout, StoreError};

/// Updates `images.is_loaded_big` / `images.is_loaded_small` in place.
///
/// Only the dimensions a scan probed are written; an unscanned dimension
/// keeps its stored value.
pub struct EmbeddedStatus {
    store: Arc<dyn RecordStore>,
}

impl EmbeddedStatus {
    pub fn new(store: Arc<dyn RecordStore>) -> Self {
        Self { store }
    }
}

#[async_trait]
impl StatusStrategy for EmbeddedStatus {
    fn layout(&self) -> StatusLayout {
        StatusLayout::Embedded
    }

    fn store(&self) -> &dyn RecordStore {
        self.store.as_ref()
    }

    async fn persist(&self, deltas: &[StatusDelta]) -> Result<u64, StoreError> {
        self.store.update_status_batch(deltas).await
    }
}
