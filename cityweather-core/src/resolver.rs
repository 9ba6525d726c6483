//! City name → coordinate resolution with a bounded, single-flight memo.
//!
//! Each city name owns one `OnceCell`. Concurrent callers for the same name
//! await the same lookup, so at most one geocoding request is in flight per
//! city. A lookup that fails at the transport level leaves the cell empty and
//! the next caller retries; answers from the service ("found" as well as "no
//! match") are kept until the entry is evicted.

use std::{collections::HashMap, sync::Arc};

use tokio::sync::{Mutex, OnceCell};

use crate::{error::CityError, model::Coordinate, provider::Geocoder};

pub const DEFAULT_CACHE_CAPACITY: usize = 100;

type Slot = Arc<OnceCell<Option<Coordinate>>>;

#[derive(Debug)]
struct LruSlots {
    capacity: usize,
    tick: u64,
    entries: HashMap<String, (u64, Slot)>,
}

impl LruSlots {
    fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            tick: 0,
            entries: HashMap::new(),
        }
    }

    /// Slot for `key`, marking it most recently used.
    fn slot(&mut self, key: &str) -> Slot {
        self.tick += 1;
        let tick = self.tick;

        if let Some((used, slot)) = self.entries.get_mut(key) {
            *used = tick;
            return Arc::clone(slot);
        }

        if self.entries.len() >= self.capacity {
            let oldest = self
                .entries
                .iter()
                .min_by_key(|(_, (used, _))| *used)
                .map(|(k, _)| k.clone());
            if let Some(oldest) = oldest {
                tracing::debug!(city = %oldest, "evicting cached coordinate");
                self.entries.remove(&oldest);
            }
        }

        let slot: Slot = Arc::new(OnceCell::new());
        self.entries.insert(key.to_string(), (tick, Arc::clone(&slot)));
        slot
    }
}

#[derive(Debug)]
pub struct CoordinateResolver {
    geocoder: Arc<dyn Geocoder>,
    slots: Mutex<LruSlots>,
}

impl CoordinateResolver {
    pub fn new(geocoder: Arc<dyn Geocoder>) -> Self {
        Self::with_capacity(geocoder, DEFAULT_CACHE_CAPACITY)
    }

    pub fn with_capacity(geocoder: Arc<dyn Geocoder>, capacity: usize) -> Self {
        Self {
            geocoder,
            slots: Mutex::new(LruSlots::new(capacity)),
        }
    }

    /// Best-effort resolution; every failure maps to `None`.
    pub async fn resolve(&self, city: &str) -> Option<Coordinate> {
        self.try_resolve(city).await.ok()
    }

    /// Like [`resolve`](Self::resolve) but keeps the reason a city could not be resolved.
    pub async fn try_resolve(&self, city: &str) -> Result<Coordinate, CityError> {
        let name = city.trim();
        if name.is_empty() {
            return Err(CityError::NotFound { city: city.to_string() });
        }

        let slot = self.slots.lock().await.slot(name);

        let found = slot
            .get_or_try_init(|| async {
                tracing::debug!(city = name, "geocoding city");
                self.geocoder.lookup(name).await
            })
            .await
            .map_err(|source| CityError::Geocoding {
                city: city.to_string(),
                source,
            })?;

        (*found).ok_or_else(|| CityError::NotFound { city: city.to_string() })
    }

    /// Number of city names currently memoized (including pending lookups).
    pub async fn cached_len(&self) -> usize {
        self.slots.lock().await.entries.len()
    }
}
