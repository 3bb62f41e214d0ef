//! Column header to series resolution, with on-demand series creation.
//!
//! The [`SeriesCache`] holds every series known to exist remotely. It is
//! filled once from the startup listing and then grows as the extractor
//! creates series. Claiming an id (check-and-insert) happens under a single
//! lock, so at most one column in the whole process issues a create for a
//! given id.

use crate::store::{NewSeries, SeriesInfo, SeriesStore};
use crate::{Error, Mode};
use parking_lot::Mutex;
use sluice_core::metrics::{self, SERIES_CREATED_TOTAL};
use sluice_core::{AUTO_SERIES_DESCRIPTION, SeriesHeader, SeriesId};
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, warn};

/// Process-wide set of series known to exist in the remote store.
#[derive(Debug, Default)]
pub struct SeriesCache {
    known: Mutex<HashMap<SeriesId, String>>,
}

impl SeriesCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// Build the cache from a store listing.
    pub fn from_listing(listing: impl IntoIterator<Item = SeriesInfo>) -> Self {
        let known = listing.into_iter().map(|s| (s.id, s.name)).collect();
        Self {
            known: Mutex::new(known),
        }
    }

    /// Record `id` as known. Returns `true` if the caller is the first to
    /// claim it and must therefore create it.
    pub fn claim(&self, id: &SeriesId, name: &str) -> bool {
        let mut known = self.known.lock();
        if known.contains_key(id) {
            return false;
        }
        known.insert(id.clone(), name.to_string());
        true
    }

    /// Drop `id` so that a later file tries to create it again.
    pub fn forget(&self, id: &SeriesId) {
        self.known.lock().remove(id);
    }

    pub fn contains(&self, id: &str) -> bool {
        self.known.lock().contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.known.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.known.lock().is_empty()
    }
}

/// Outcome of resolving one column header.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// The series already existed.
    Known(SeriesId),
    /// This call created the series.
    Created(SeriesId),
    /// The header names no series, or creating it failed; the column's
    /// points must be dropped.
    Unavailable,
}

impl Resolution {
    /// The id points should be written to, if any.
    pub fn usable_id(&self) -> Option<&SeriesId> {
        match self {
            Resolution::Known(id) | Resolution::Created(id) => Some(id),
            Resolution::Unavailable => None,
        }
    }
}

/// Maps column headers to series ids, creating missing series.
pub struct SeriesResolver {
    store: Arc<dyn SeriesStore>,
    cache: Arc<SeriesCache>,
    mode: Mode,
}

impl SeriesResolver {
    pub fn new(store: Arc<dyn SeriesStore>, cache: Arc<SeriesCache>, mode: Mode) -> Self {
        Self { store, cache, mode }
    }

    pub fn cache(&self) -> &Arc<SeriesCache> {
        &self.cache
    }

    /// Resolve a raw column header.
    ///
    /// Never fails: problems are logged and reported as
    /// [`Resolution::Unavailable`].
    pub async fn resolve(&self, raw_header: &str) -> Resolution {
        let header = match SeriesHeader::parse(raw_header) {
            Ok(header) => header,
            Err(e) => {
                warn!("Skipping column: {}", e);
                return Resolution::Unavailable;
            }
        };

        if !self.cache.claim(&header.id, &header.name) {
            return Resolution::Known(header.id);
        }

        debug!("Creating series {} ({:?})", header.id, header.name);
        let request = NewSeries {
            id: header.id.clone(),
            name: header.name,
            description: AUTO_SERIES_DESCRIPTION.to_string(),
        };

        match self.store.create_series(&request).await {
            Ok(()) => {
                info!("Created series {}", request.id);
                metrics::increment(SERIES_CREATED_TOTAL, self.mode.as_str(), 1);
                Resolution::Created(request.id)
            }
            Err(source) => {
                let err = Error::SeriesCreate {
                    id: request.id.clone(),
                    source,
                };
                warn!("{}; dropping column for this file", err);
                self.cache.forget(&request.id);
                Resolution::Unavailable
            }
        }
    }
}
