use std::{collections::HashMap, future::Future, sync::Arc};

use parking_lot::Mutex;
use tokio::sync::OnceCell;

use tessera_core::RepresentationId;

use crate::{error::PipelineResult, parser::ParsedInit};

/// Per-content cache of parsed initialization segments.
///
/// At most one initialization fetch runs per representation: concurrent
/// callers share the same `OnceCell` and await the in-flight initializer. A
/// failed fetch leaves the cell empty, so the next caller retries.
#[derive(Clone, Debug, Default)]
pub struct InitCache {
    inner: Arc<Mutex<HashMap<RepresentationId, Arc<OnceCell<ParsedInit>>>>>,
}

impl InitCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Return the cached init segment for `repr`, fetching it with `fetch` if
    /// absent. Concurrent callers for the same representation await the same
    /// fetch.
    pub async fn get_or_fetch<F, Fut>(
        &self,
        repr: &RepresentationId,
        fetch: F,
    ) -> PipelineResult<ParsedInit>
    where
        F: FnOnce() -> Fut,
        Fut: Future<Output = PipelineResult<ParsedInit>>,
    {
        let cell = {
            let mut map = self.inner.lock();
            map.entry(repr.clone()).or_default().clone()
        };
        cell.get_or_try_init(fetch).await.cloned()
    }

    /// Peek without fetching.
    pub fn get(&self, repr: &RepresentationId) -> Option<ParsedInit> {
        let map = self.inner.lock();
        map.get(repr).and_then(|cell| cell.get().cloned())
    }

    pub fn contains(&self, repr: &RepresentationId) -> bool {
        self.get(repr).is_some()
    }

    /// Evict everything (content stop).
    pub fn clear(&self) {
        self.inner.lock().clear();
    }
}
