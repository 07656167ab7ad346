//! In-memory geocoding cache
//!
//! Keys are normalized addresses, so "350 Fifth Avenue" and
//! "350  fifth ave." share one entry. Entries expire after a fixed TTL and
//! the least recently used entry is evicted when the cache is full.
//!
//! Only successful lookups are stored: an address that does not resolve today
//! may resolve after the provider's data is updated.

use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::{Duration, Instant};

use parking_lot::RwLock;
use serde::Serialize;
use tracing::{debug, info};

use super::geocoding::GeocodingResult;

/// Street-type and direction words folded to their usual abbreviation
const ABBREVIATIONS: &[(&str, &str)] = &[
    ("street", "st"),
    ("avenue", "ave"),
    ("road", "rd"),
    ("drive", "dr"),
    ("boulevard", "blvd"),
    ("lane", "ln"),
    ("court", "ct"),
    ("place", "pl"),
    ("apartment", "apt"),
    ("suite", "ste"),
    ("north", "n"),
    ("south", "s"),
    ("east", "e"),
    ("west", "w"),
];

/// Normalize an address into a cache key.
///
/// Lowercases, treats commas and periods as separators, collapses
/// whitespace and folds common words to abbreviations. Returns `None` for
/// blank input.
pub fn normalize_address(address: &str) -> Option<String> {
    let lowered: String = address
        .to_lowercase()
        .chars()
        .map(|c| if c == ',' || c == '.' { ' ' } else { c })
        .collect();

    let words: Vec<&str> = lowered
        .split_whitespace()
        .map(|word| {
            ABBREVIATIONS
                .iter()
                .find(|(full, _)| *full == word)
                .map(|(_, short)| *short)
                .unwrap_or(word)
        })
        .collect();

    if words.is_empty() {
        None
    } else {
        Some(words.join(" "))
    }
}

struct CacheEntry {
    result: GeocodingResult,
    created_at: Instant,
    /// Logical clock value of the most recent read or write
    last_used: AtomicU64,
}

impl CacheEntry {
    fn is_fresh(&self, ttl: Duration, now: Instant) -> bool {
        now.saturating_duration_since(self.created_at) < ttl
    }
}

/// Cache statistics
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CacheStats {
    pub size: usize,
    pub capacity: usize,
    pub hits: u64,
    pub misses: u64,
    pub hit_rate_percent: f64,
    pub total_requests: u64,
    pub ttl_days: f64,
}

/// Thread-safe TTL + LRU cache of resolved addresses.
///
/// Reads take a shared lock; recency is tracked with an atomic per entry so
/// concurrent hits do not serialize on the writer lock.
pub struct GeocodeCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    capacity: usize,
    ttl: Duration,
    clock: AtomicU64,
    hits: AtomicU64,
    misses: AtomicU64,
}

impl GeocodeCache {
    pub fn new(capacity: usize, ttl: Duration) -> Self {
        info!(
            "Initialized geocoding cache: capacity={}, ttl={:.1} days",
            capacity,
            ttl.as_secs_f64() / 86_400.0
        );
        Self {
            entries: RwLock::new(HashMap::new()),
            capacity,
            ttl,
            clock: AtomicU64::new(0),
            hits: AtomicU64::new(0),
            misses: AtomicU64::new(0),
        }
    }

    pub fn with_ttl_days(capacity: usize, ttl_days: u64) -> Self {
        Self::new(capacity, Duration::from_secs(ttl_days * 86_400))
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed) + 1
    }

    /// Cached result for `address`, if present and not expired
    pub fn get(&self, address: &str) -> Option<GeocodingResult> {
        self.get_at(address, Instant::now())
    }

    fn get_at(&self, address: &str, now: Instant) -> Option<GeocodingResult> {
        let key = normalize_address(address)?;
        let entries = self.entries.read();

        match entries.get(&key) {
            Some(entry) if entry.is_fresh(self.ttl, now) => {
                entry.last_used.store(self.tick(), Ordering::Relaxed);
                self.hits.fetch_add(1, Ordering::Relaxed);
                debug!("Geocoding cache hit for '{}'", address);
                Some(entry.result.clone())
            }
            _ => {
                self.misses.fetch_add(1, Ordering::Relaxed);
                debug!("Geocoding cache miss for '{}'", address);
                None
            }
        }
    }

    /// Store a resolved address.
    ///
    /// A key is written at most once per TTL window: when a fresh entry
    /// already exists it is kept and returned instead of `result`.
    pub fn insert(&self, address: &str, result: GeocodingResult) -> GeocodingResult {
        self.insert_at(address, result, Instant::now())
    }

    fn insert_at(&self, address: &str, result: GeocodingResult, now: Instant) -> GeocodingResult {
        let Some(key) = normalize_address(address) else {
            return result;
        };
        if self.capacity == 0 {
            return result;
        }

        let mut entries = self.entries.write();

        if let Some(existing) = entries.get(&key) {
            if existing.is_fresh(self.ttl, now) {
                existing.last_used.store(self.tick(), Ordering::Relaxed);
                return existing.result.clone();
            }
        }

        if !entries.contains_key(&key) && entries.len() >= self.capacity {
            let ttl = self.ttl;
            entries.retain(|_, entry| entry.is_fresh(ttl, now));

            if entries.len() >= self.capacity {
                let lru_key = entries
                    .iter()
                    .min_by_key(|(_, entry)| entry.last_used.load(Ordering::Relaxed))
                    .map(|(k, _)| k.clone());
                if let Some(lru_key) = lru_key {
                    debug!("Evicting least recently used geocoding entry '{}'", lru_key);
                    entries.remove(&lru_key);
                }
            }
        }

        entries.insert(
            key,
            CacheEntry {
                result: result.clone(),
                created_at: now,
                last_used: AtomicU64::new(self.tick()),
            },
        );
        debug!(
            "Cached coordinates for '{}' -> ({}, {})",
            address, result.coordinates.lat, result.coordinates.lng
        );

        result
    }

    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    pub fn stats(&self) -> CacheStats {
        let hits = self.hits.load(Ordering::Relaxed);
        let misses = self.misses.load(Ordering::Relaxed);
        let total = hits + misses;
        let hit_rate = if total > 0 {
            (hits as f64 / total as f64 * 10_000.0).round() / 100.0
        } else {
            0.0
        };

        CacheStats {
            size: self.len(),
            capacity: self.capacity,
            hits,
            misses,
            hit_rate_percent: hit_rate,
            total_requests: total,
            ttl_days: self.ttl.as_secs_f64() / 86_400.0,
        }
    }
}
