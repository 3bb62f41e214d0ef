//! In-process store.
//!
//! Keeps every series and batch in memory. Failures can be injected per
//! series or for writes, which is how the pipeline tests exercise the
//! per-column and per-file failure paths.

use super::{NewSeries, SeriesInfo, SeriesStore, StoreError};
use crate::batcher::Batch;
use async_trait::async_trait;
use parking_lot::Mutex;
use sluice_core::SeriesId;
use std::collections::{BTreeMap, HashSet};

#[derive(Debug, Default)]
struct State {
    series: BTreeMap<SeriesId, String>,
    created: Vec<NewSeries>,
    batches: Vec<Batch>,
    fail_create: HashSet<SeriesId>,
    fail_writes: bool,
    failing_listings: u32,
    listing_calls: u32,
}

/// Store that lives entirely in memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Pre-populate the store with existing series.
    pub fn with_series<I, S>(series: I) -> Self
    where
        I: IntoIterator<Item = (SeriesId, S)>,
        S: Into<String>,
    {
        let store = Self::new();
        store
            .state
            .lock()
            .series
            .extend(series.into_iter().map(|(id, name)| (id, name.into())));
        store
    }

    /// Make creation of `id` fail.
    pub fn fail_create_for(&self, id: SeriesId) {
        self.state.lock().fail_create.insert(id);
    }

    /// Make every write fail (or succeed again).
    pub fn fail_writes(&self, fail: bool) {
        self.state.lock().fail_writes = fail;
    }

    /// Make the next `count` listings fail.
    pub fn fail_next_listings(&self, count: u32) {
        self.state.lock().failing_listings = count;
    }

    /// Series created through this store, in call order.
    pub fn created(&self) -> Vec<NewSeries> {
        self.state.lock().created.clone()
    }

    /// Batches written, in call order.
    pub fn batches(&self) -> Vec<Batch> {
        self.state.lock().batches.clone()
    }

    /// Total points written across all batches.
    pub fn points_written(&self) -> usize {
        self.state.lock().batches.iter().map(Batch::point_count).sum()
    }

    /// Number of listing attempts seen.
    pub fn listing_calls(&self) -> u32 {
        self.state.lock().listing_calls
    }
}

#[async_trait]
impl SeriesStore for MemoryStore {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn list_series(&self) -> Result<Vec<SeriesInfo>, StoreError> {
        let mut state = self.state.lock();
        state.listing_calls += 1;
        if state.failing_listings > 0 {
            state.failing_listings -= 1;
            return Err(StoreError::Unavailable("listing refused".to_string()));
        }

        Ok(state
            .series
            .iter()
            .map(|(id, name)| SeriesInfo {
                id: id.clone(),
                name: name.clone(),
            })
            .collect())
    }

    async fn create_series(&self, series: &NewSeries) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.fail_create.contains(&series.id) {
            return Err(StoreError::Status {
                status: 400,
                message: format!("cannot create {}", series.id),
            });
        }

        state.created.push(series.clone());
        state
            .series
            .entry(series.id.clone())
            .or_insert_with(|| series.name.clone());
        Ok(())
    }

    async fn write_batch(&self, batch: &Batch) -> Result<(), StoreError> {
        let mut state = self.state.lock();
        if state.fail_writes {
            return Err(StoreError::Unavailable("writes refused".to_string()));
        }
        state.batches.push(batch.clone());
        Ok(())
    }
}
