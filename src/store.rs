// Layered cache store
// Static fallback < remote detail cache < actively loaded list, merged by hotel id,
// with per-query paging that degrades once from the remote service to the fallback catalog

use std::{
    collections::{hash_map, HashMap},
    sync::{
        atomic::{AtomicU64, Ordering},
        Arc,
    },
};

use dashmap::{mapref::entry::Entry, DashMap};
use parking_lot::RwLock;
use tracing::{debug, info, warn};

use crate::{
    api::{HotelBackend, RemotePage, Unavailable},
    catalog::StaticCatalog,
    filter,
    model::{merge_hotel, Hotel, HotelId, QueryKey, SearchQuery},
};

#[derive(Debug, Default, Clone)]
pub struct StoreStats {
    pub remote_pages: usize,
    pub remote_failures: usize,
    pub fallback_batches: usize,
    pub stale_pages_discarded: usize,
    pub detail_refreshes: usize,
    pub detail_misses: usize,
    pub resets: usize,
}

// Remote -> Fallback only. Nothing moves back until the next reset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Paging {
    Remote {
        next_page: u32,
        total_pages: Option<u32>,
    },
    Fallback {
        cursor: usize,
    },
}

impl Default for Paging {
    fn default() -> Self {
        Paging::Remote {
            next_page: 1,
            total_pages: None,
        }
    }
}

#[derive(Debug, Default)]
struct Session {
    active_key: Option<QueryKey>,
    paging: Paging,
    epoch: u64,
    loaded: Vec<Hotel>,
}

impl Session {
    fn is_active(&self, key: &QueryKey) -> bool {
        self.active_key.as_ref() == Some(key)
    }

    fn is_current(&self, key: &QueryKey, epoch: u64) -> bool {
        self.is_active(key) && self.epoch == epoch
    }

    fn reset(&mut self, key: QueryKey) {
        self.active_key = Some(key);
        self.paging = Paging::default();
        self.loaded.clear();
        self.epoch += 1;
    }

    /// Resets when `key` is not the active query. Returns whether it did.
    fn guard(&mut self, key: &QueryKey) -> bool {
        if self.is_active(key) {
            return false;
        }
        self.reset(key.clone());
        true
    }

    fn upsert_loaded(&mut self, hotel: Hotel) {
        match self.loaded.iter_mut().find(|loaded| loaded.id == hotel.id) {
            Some(existing) => *existing = merge_hotel(existing, hotel),
            None => self.loaded.push(hotel),
        }
    }
}

#[derive(Debug)]
struct CachedHotel {
    // First insertion order, for `all()`
    seq: u64,
    hotel: Hotel,
}

pub struct HotelStore {
    backend: Arc<dyn HotelBackend>,
    catalog: StaticCatalog,
    detail_cache: DashMap<HotelId, CachedHotel>,
    next_seq: AtomicU64,
    session: RwLock<Session>,
    stats: RwLock<StoreStats>,
}

impl HotelStore {
    /// Store over the embedded fallback catalog.
    pub fn new(backend: Arc<dyn HotelBackend>) -> Self {
        Self::with_catalog(backend, StaticCatalog::embedded())
    }

    pub fn with_catalog(backend: Arc<dyn HotelBackend>, catalog: StaticCatalog) -> Self {
        Self {
            backend,
            catalog,
            detail_cache: DashMap::new(),
            next_seq: AtomicU64::new(0),
            session: RwLock::new(Session::default()),
            stats: RwLock::new(StoreStats::default()),
        }
    }

    pub fn catalog(&self) -> &StaticCatalog {
        &self.catalog
    }

    pub fn stats(&self) -> StoreStats {
        self.stats.read().clone()
    }

    /// Every known hotel, one record per id, fresher tiers merged over older ones.
    pub fn all(&self) -> Vec<Hotel> {
        let mut order: Vec<HotelId> = Vec::new();
        let mut merged: HashMap<HotelId, Hotel> = HashMap::new();

        let mut absorb = |hotel: Hotel| match merged.entry(hotel.id) {
            hash_map::Entry::Occupied(mut entry) => {
                let combined = merge_hotel(entry.get(), hotel);
                entry.insert(combined);
            }
            hash_map::Entry::Vacant(entry) => {
                order.push(hotel.id);
                entry.insert(hotel);
            }
        };

        for hotel in self.catalog.hotels() {
            absorb(hotel.clone());
        }

        let mut cached: Vec<(u64, Hotel)> = self
            .detail_cache
            .iter()
            .map(|entry| (entry.seq, entry.hotel.clone()))
            .collect();
        cached.sort_by_key(|(seq, _)| *seq);
        for (_, hotel) in cached {
            absorb(hotel);
        }

        let loaded = self.session.read().loaded.clone();
        for hotel in loaded {
            absorb(hotel);
        }

        order
            .into_iter()
            .filter_map(|id| merged.remove(&id))
            .collect()
    }

    /// Loaded list, then detail cache, then catalog. First hit wins, nothing is merged.
    pub fn find_by_id(&self, id: HotelId) -> Option<Hotel> {
        if let Some(hotel) = self.session.read().loaded.iter().find(|h| h.id == id) {
            return Some(hotel.clone());
        }

        if let Some(cached) = self.detail_cache.get(&id) {
            return Some(cached.hotel.clone());
        }

        self.catalog.find(id).cloned()
    }

    /// Refreshes one hotel from the service. Falls back to the local record when the
    /// service cannot be reached.
    pub async fn get_hotel_detail(&self, id: HotelId) -> Option<Hotel> {
        let local = self.find_by_id(id);

        let remote = match self.backend.fetch_detail(id).await {
            Ok(remote) => remote,
            Err(Unavailable) => {
                self.stats.write().detail_misses += 1;
                debug!(hotel_id = %id, known_locally = local.is_some(), "hotel detail unavailable");
                return local;
            }
        };

        let merged = match &local {
            Some(local) => merge_hotel(local, remote),
            None => remote,
        };

        self.detail_cache
            .entry(id)
            .and_modify(|cached| cached.hotel = merged.clone())
            .or_insert_with(|| CachedHotel {
                seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                hotel: merged.clone(),
            });
        self.session.write().upsert_loaded(merged.clone());
        self.stats.write().detail_refreshes += 1;

        Some(merged)
    }

    pub fn reset_loaded_for(&self, query: &SearchQuery) {
        let key = query.key();
        let epoch = {
            let mut session = self.session.write();
            session.reset(key.clone());
            session.epoch
        };
        self.stats.write().resets += 1;

        info!(key = %key, epoch, "reset loaded hotels");
    }

    /// Loads the next batch for `query`. An empty batch means there is nothing more to load.
    pub async fn load_next_batch(&self, query: &SearchQuery, batch_size: usize) -> Vec<Hotel> {
        if batch_size == 0 {
            return Vec::new();
        }

        let key = query.key();
        let (paging, epoch, implicit_reset) = {
            let mut session = self.session.write();
            let reset = session.guard(&key);
            (session.paging, session.epoch, reset)
        };
        if implicit_reset {
            self.stats.write().resets += 1;
            info!(key = %key, epoch, "query changed, reset loaded hotels");
        }

        if let Paging::Remote {
            next_page,
            total_pages,
        } = paging
        {
            if total_pages.map_or(true, |total| next_page <= total) {
                let page_size = u32::try_from(batch_size).unwrap_or(u32::MAX);

                match self.backend.fetch_page(query, next_page, page_size).await {
                    Ok(page) if !page.records.is_empty() => {
                        return self.apply_remote_page(&key, epoch, page);
                    }
                    Ok(page) => {
                        debug!(key = %key, page = page.page, "remote page came back empty");
                    }
                    Err(Unavailable) => {
                        self.stats.write().remote_failures += 1;
                        debug!(key = %key, page = next_page, "remote page unavailable");
                    }
                }
            }
        }

        self.next_fallback_batch(&key, epoch, query, batch_size)
    }

    fn apply_remote_page(&self, key: &QueryKey, epoch: u64, page: RemotePage) -> Vec<Hotel> {
        self.stats.write().remote_pages += 1;

        // The detail cache is query independent, so even a stale page is worth keeping
        for hotel in &page.records {
            self.upsert_detail(hotel.clone());
        }

        let mut session = self.session.write();
        if !session.is_current(key, epoch) {
            drop(session);
            self.stats.write().stale_pages_discarded += 1;
            warn!(key = %key, page = page.page, "discarding remote page for a query that was reset");
            return Vec::new();
        }

        session.paging = Paging::Remote {
            next_page: page.page.saturating_add(1),
            total_pages: Some(page.total_pages.max(page.page)),
        };
        for hotel in &page.records {
            session.upsert_loaded(hotel.clone());
        }

        page.records
    }

    fn next_fallback_batch(
        &self,
        key: &QueryKey,
        epoch: u64,
        query: &SearchQuery,
        batch_size: usize,
    ) -> Vec<Hotel> {
        let matching = self.catalog.matching(query);

        let mut session = self.session.write();
        if !session.is_current(key, epoch) {
            drop(session);
            self.stats.write().stale_pages_discarded += 1;
            warn!(key = %key, "query was reset while loading, dropping batch");
            return Vec::new();
        }

        let cursor = match session.paging {
            Paging::Fallback { cursor } => cursor,
            Paging::Remote { .. } => {
                info!(key = %key, matches = matching.len(), "switching to fallback catalog");
                0
            }
        };

        let start = cursor.min(matching.len());
        let end = start.saturating_add(batch_size).min(matching.len());
        let batch = matching[start..end].to_vec();

        session.paging = Paging::Fallback { cursor: end };
        for hotel in &batch {
            session.upsert_loaded(hotel.clone());
        }
        drop(session);

        if !batch.is_empty() {
            self.stats.write().fallback_batches += 1;
        }
        batch
    }

    fn upsert_detail(&self, hotel: Hotel) {
        match self.detail_cache.entry(hotel.id) {
            Entry::Occupied(mut entry) => {
                let merged = merge_hotel(&entry.get().hotel, hotel);
                entry.get_mut().hotel = merged;
            }
            Entry::Vacant(entry) => {
                entry.insert(CachedHotel {
                    seq: self.next_seq.fetch_add(1, Ordering::SeqCst),
                    hotel,
                });
            }
        }
    }

    /// False exactly when the next `load_next_batch` for `query` would come back empty.
    pub fn has_more_for(&self, query: &SearchQuery) -> bool {
        let key = query.key();
        let paging = {
            let session = self.session.read();
            if !session.is_active(&key) {
                return true;
            }
            session.paging
        };

        match paging {
            Paging::Fallback { cursor } => cursor < self.catalog.count_matching(query),
            Paging::Remote {
                next_page,
                total_pages,
            } => match total_pages {
                Some(total) if next_page > total => self.catalog.count_matching(query) > 0,
                _ => true,
            },
        }
    }

    /// Hotels loaded so far for `query`. Empty unless `query` is the active one.
    pub fn loaded_search(&self, query: &SearchQuery) -> Vec<Hotel> {
        let key = query.key();
        let session = self.session.read();
        if !session.is_active(&key) {
            return Vec::new();
        }
        filter::filter_and_sort(session.loaded.iter(), query)
    }

    pub fn search(&self, query: &SearchQuery) -> Vec<Hotel> {
        filter::filter_and_sort(&self.all(), query)
    }

    /// One 1-indexed page of `search`.
    pub fn paged_search(&self, query: &SearchQuery, page: usize, page_size: usize) -> Vec<Hotel> {
        if page == 0 || page_size == 0 {
            return Vec::new();
        }

        let offset = match (page - 1).checked_mul(page_size) {
            Some(offset) => offset,
            None => return Vec::new(),
        };

        let results = self.search(query);
        if offset >= results.len() {
            return Vec::new();
        }
        results.into_iter().skip(offset).take(page_size).collect()
    }
}
